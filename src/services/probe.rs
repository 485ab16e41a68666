//! Website embeddability probe.
//!
//! Kiosks show websites in an iframe, which many sites forbid. Before an owner
//! adds a website to the rotation the dashboard can ask whether the target
//! sends `X-Frame-Options` or a CSP `frame-ancestors` directive that would
//! leave the kiosk frame blank.
//!
//! When a CSP carries `frame-ancestors`, browsers ignore `X-Frame-Options`;
//! the probe applies the same precedence.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use reqwest::header::{CONTENT_SECURITY_POLICY, HeaderMap, LOCATION, X_FRAME_OPTIONS};
use reqwest::{Url, redirect};
use serde::Serialize;

const PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Redirect hops followed before giving up; each hop is re-checked.
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe URL: {0}")]
    InvalidUrl(&'static str),
}

impl crate::frame::ErrorCode for ProbeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "E_PROBE_URL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub reachable: bool,
    pub status: Option<u16>,
    pub embeddable: bool,
    /// Which header blocked embedding, or the transport error.
    pub reason: Option<String>,
}

impl ProbeReport {
    fn unreachable(url: &str, reason: String) -> Self {
        Self { url: url.to_owned(), reachable: false, status: None, embeddable: false, reason: Some(reason) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Allowed,
    Blocked(String),
}

/// Fetch `url` and report whether a kiosk served from `embedder_origin` could
/// frame it. Transport failures are reported, not returned as errors.
///
/// Only hosts that resolve exclusively to public addresses are contacted, and
/// the connection is pinned to the addresses that were checked. Redirects are
/// followed by hand so every hop passes the same check.
///
/// # Errors
///
/// Returns `InvalidUrl` unless `url` (and every redirect target) is an
/// absolute http(s) URL on a public host.
pub async fn probe(url: &str, embedder_origin: Option<&str>) -> Result<ProbeReport, ProbeError> {
    let requested = url.trim();
    let mut target = parse_target(requested)?;

    for _ in 0..=MAX_REDIRECTS {
        let addrs = match public_addrs(&target).await {
            Ok(addrs) => addrs,
            Err(Resolve::Lookup(reason)) => return Ok(ProbeReport::unreachable(requested, reason)),
            Err(Resolve::Forbidden) => return Err(ProbeError::InvalidUrl("host is not a public address")),
        };

        let response = match fetch(&target, &addrs).await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(url = %target, error = %e, "website probe failed");
                return Ok(ProbeReport::unreachable(requested, e.to_string()));
            }
        };

        let status = response.status();
        if status.is_redirection() {
            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| target.join(location).ok());
            if let Some(next) = next {
                tracing::debug!(from = %target, to = %next, "website probe redirected");
                target = check_scheme(next)?;
                continue;
            }
        }

        let verdict = frame_verdict(response.headers(), embedder_origin);
        tracing::debug!(url = %target, status = status.as_u16(), ?verdict, "website probed");
        let (embeddable, reason) = match verdict {
            Verdict::Allowed => (true, None),
            Verdict::Blocked(reason) => (false, Some(reason)),
        };
        return Ok(ProbeReport {
            url: requested.to_owned(),
            reachable: true,
            status: Some(status.as_u16()),
            embeddable,
            reason,
        });
    }

    Ok(ProbeReport::unreachable(requested, format!("more than {MAX_REDIRECTS} redirects")))
}

fn parse_target(raw: &str) -> Result<Url, ProbeError> {
    let url = Url::parse(raw).map_err(|_| ProbeError::InvalidUrl("expected an absolute http(s) URL"))?;
    check_scheme(url)
}

fn check_scheme(url: Url) -> Result<Url, ProbeError> {
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ProbeError::InvalidUrl("expected an absolute http(s) URL"));
    }
    Ok(url)
}

enum Resolve {
    Lookup(String),
    Forbidden,
}

/// Resolve the target host; every address must be public.
async fn public_addrs(url: &Url) -> Result<Vec<SocketAddr>, Resolve> {
    let host = url.host_str().ok_or(Resolve::Forbidden)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Resolve::Lookup(format!("dns lookup failed: {e}")))?
        .collect::<Vec<_>>();
    if addrs.is_empty() {
        return Err(Resolve::Lookup(format!("no addresses for {host}")));
    }
    if !addrs.iter().all(|addr| is_public_ip(addr.ip())) {
        tracing::warn!(%host, "website probe refused non-public host");
        return Err(Resolve::Forbidden);
    }
    Ok(addrs)
}

async fn fetch(url: &Url, addrs: &[SocketAddr]) -> Result<reqwest::Response, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(PROBE_TIMEOUT);
    if let Some(domain) = url.domain() {
        builder = builder.resolve_to_addrs(domain, addrs);
    }
    builder.build()?.get(url.clone()).send().await
}

/// Globally routable unicast address.
fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => {
                !(v6.is_loopback()
                    || v6.is_unspecified()
                    || v6.is_multicast()
                    || v6.is_unique_local()
                    || v6.is_unicast_link_local())
            }
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (64..128).contains(&b);
    let this_network = a == 0;
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation()
        || shared
        || this_network)
}

fn frame_verdict(headers: &HeaderMap, embedder_origin: Option<&str>) -> Verdict {
    let ancestors = headers
        .get_all(CONTENT_SECURITY_POLICY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(frame_ancestors);
    if let Some(sources) = ancestors {
        return ancestors_verdict(&sources, embedder_origin);
    }

    match headers.get(X_FRAME_OPTIONS).and_then(|v| v.to_str().ok()) {
        Some(value) => {
            let value = value.trim().to_ascii_uppercase();
            if value.is_empty() {
                Verdict::Allowed
            } else {
                Verdict::Blocked(format!("X-Frame-Options: {value}"))
            }
        }
        None => Verdict::Allowed,
    }
}

/// Source list of the `frame-ancestors` directive in one CSP header value.
fn frame_ancestors(policy: &str) -> Option<Vec<String>> {
    policy.split(';').find_map(|directive| {
        let mut parts = directive.split_whitespace();
        let name = parts.next()?;
        name.eq_ignore_ascii_case("frame-ancestors")
            .then(|| parts.map(str::to_ascii_lowercase).collect())
    })
}

fn ancestors_verdict(sources: &[String], embedder_origin: Option<&str>) -> Verdict {
    let blocked = || Verdict::Blocked(format!("CSP frame-ancestors {}", sources.join(" ")));
    if sources.is_empty() || sources.iter().any(|s| s == "'none'") {
        return blocked();
    }
    if sources.iter().any(|s| s == "*") {
        return Verdict::Allowed;
    }
    let Some(embedder) = embedder_origin.map(str::to_ascii_lowercase) else {
        return blocked();
    };
    let (embedder_scheme, embedder_host) = split_origin(&embedder);
    let allowed = sources.iter().any(|source| {
        if let Some(scheme) = source.strip_suffix(':') {
            return scheme == embedder_scheme;
        }
        let (scheme, host) = split_origin(source);
        if !scheme.is_empty() && scheme != embedder_scheme {
            return false;
        }
        match host.strip_prefix("*.") {
            Some(suffix) => embedder_host.ends_with(&format!(".{suffix}")),
            None => host == embedder_host,
        }
    });
    if allowed { Verdict::Allowed } else { blocked() }
}

/// `https://a.example:8443/x` -> (`https`, `a.example:8443`).
fn split_origin(source: &str) -> (&str, &str) {
    let (scheme, rest) = source.split_once("://").unwrap_or(("", source));
    let host = rest.split('/').next().unwrap_or(rest);
    (scheme, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(reqwest::header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).expect("header value"));
        }
        map
    }

    #[test]
    fn no_headers_is_embeddable() {
        assert_eq!(frame_verdict(&HeaderMap::new(), None), Verdict::Allowed);
    }

    #[test]
    fn x_frame_options_blocks() {
        for value in ["DENY", "sameorigin"] {
            let verdict = frame_verdict(&headers(&[(X_FRAME_OPTIONS, value)]), Some("https://tv.example"));
            assert!(matches!(verdict, Verdict::Blocked(reason) if reason.starts_with("X-Frame-Options")));
        }
    }

    #[test]
    fn frame_ancestors_none_blocks() {
        let map = headers(&[(CONTENT_SECURITY_POLICY, "default-src 'self'; frame-ancestors 'none'")]);
        assert!(matches!(frame_verdict(&map, None), Verdict::Blocked(_)));
    }

    #[test]
    fn frame_ancestors_wildcard_overrides_x_frame_options() {
        let map = headers(&[(X_FRAME_OPTIONS, "DENY"), (CONTENT_SECURITY_POLICY, "frame-ancestors *")]);
        assert_eq!(frame_verdict(&map, None), Verdict::Allowed);
    }

    #[test]
    fn frame_ancestors_matches_embedder_host() {
        let map = headers(&[(CONTENT_SECURITY_POLICY, "frame-ancestors 'self' https://*.signdeck.test")]);
        assert_eq!(frame_verdict(&map, Some("https://tv.signdeck.test")), Verdict::Allowed);
        assert!(matches!(frame_verdict(&map, Some("https://other.test")), Verdict::Blocked(_)));
        assert!(matches!(frame_verdict(&map, Some("http://tv.signdeck.test")), Verdict::Blocked(_)));
        assert!(matches!(frame_verdict(&map, None), Verdict::Blocked(_)));
    }

    #[test]
    fn scheme_source_matches_any_host() {
        let map = headers(&[(CONTENT_SECURITY_POLICY, "frame-ancestors https:")]);
        assert_eq!(frame_verdict(&map, Some("https://anything.test")), Verdict::Allowed);
    }

    #[test]
    fn csp_without_frame_ancestors_falls_back_to_x_frame_options() {
        let map = headers(&[(CONTENT_SECURITY_POLICY, "default-src 'self'"), (X_FRAME_OPTIONS, "DENY")]);
        assert!(matches!(frame_verdict(&map, None), Verdict::Blocked(_)));
    }

    #[tokio::test]
    async fn relative_and_non_http_urls_are_rejected() {
        assert!(matches!(probe("/media/a.png", None).await, Err(ProbeError::InvalidUrl(_))));
        assert!(matches!(probe("ftp://x.example/file", None).await, Err(ProbeError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn internal_hosts_are_never_contacted() {
        for url in [
            "http://127.0.0.1/",
            "http://127.0.0.1:5432/",
            "http://169.254.169.254/latest/meta-data/",
            "http://10.0.0.8/admin",
            "http://[::1]:3000/",
            "http://0.0.0.0/",
        ] {
            assert!(matches!(probe(url, None).await, Err(ProbeError::InvalidUrl(_))), "{url} must be refused");
        }
    }

    #[test]
    fn address_classes() {
        for ip in ["127.0.0.1", "10.1.2.3", "172.16.0.1", "192.168.1.1", "169.254.169.254", "100.64.0.1", "0.0.0.0"] {
            assert!(!is_public_ip(ip.parse().expect("ip")), "{ip}");
        }
        for ip in ["::1", "fe80::1", "fd00::1", "::ffff:127.0.0.1", "::"] {
            assert!(!is_public_ip(ip.parse().expect("ip")), "{ip}");
        }
        for ip in ["93.184.216.34", "1.1.1.1", "2606:4700:4700::1111"] {
            assert!(is_public_ip(ip.parse().expect("ip")), "{ip}");
        }
    }
}
