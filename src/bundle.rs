//! Static TV bundle.
//!
//! Kiosk browsers on shared hosting load the frontend from a sub-path
//! (`/tv/` by default) instead of the domain root. `build` copies a built
//! frontend directory, rewrites absolute asset references in text assets to
//! the sub-path, and writes an Apache `.htaccess` that serves `index.html` for
//! any path that is not a real file.

use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE: &str = "/tv/";

/// File extensions whose contents are scanned for absolute references.
const REWRITE_EXTENSIONS: &[&str] = &["html", "js", "css"];

/// `(marker, required continuation)`: the base is inserted right after the
/// marker's trailing `/` when the text that follows starts with the
/// continuation.
const REFERENCE_MARKERS: &[(&str, &str)] = &[
    ("src=\"/", ""),
    ("href=\"/", ""),
    ("url(/", ""),
    ("\"/", "assets/"),
];

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("source directory not found: {0}")]
    MissingSource(PathBuf),
    #[error("source directory has no index.html: {0}")]
    MissingIndex(PathBuf),
    #[error("output directory {out} must not be inside the source {src}")]
    NestedOutput { src: PathBuf, out: PathBuf },
    #[error("base path must start and end with '/': {0}")]
    InvalidBase(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl crate::frame::ErrorCode for BundleError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingSource(_) => "E_BUNDLE_SOURCE",
            Self::MissingIndex(_) => "E_BUNDLE_INDEX",
            Self::NestedOutput { .. } => "E_BUNDLE_NESTED",
            Self::InvalidBase(_) => "E_BUNDLE_BASE",
            Self::Io { .. } => "E_BUNDLE_IO",
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> BundleError + '_ {
    move |source| BundleError::Io { path: path.to_path_buf(), source }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BundleReport {
    pub files_copied: usize,
    /// Text files whose contents changed.
    pub files_rewritten: usize,
}

/// Copy `src` into `out`, rebasing absolute references onto `base`.
///
/// # Errors
///
/// Fails if `src` is missing or has no `index.html`, `out` lies inside
/// `src`, `base` is not a slash-delimited path, or any filesystem operation
/// fails.
pub fn build(src: &Path, out: &Path, base: &str) -> Result<BundleReport, BundleError> {
    if !base.starts_with('/') || !base.ends_with('/') || base.len() < 2 {
        return Err(BundleError::InvalidBase(base.to_owned()));
    }
    if !src.is_dir() {
        return Err(BundleError::MissingSource(src.to_path_buf()));
    }
    if !src.join("index.html").is_file() {
        return Err(BundleError::MissingIndex(src.to_path_buf()));
    }
    fs::create_dir_all(out).map_err(io_err(out))?;

    let src_abs = src.canonicalize().map_err(io_err(src))?;
    let out_abs = out.canonicalize().map_err(io_err(out))?;
    if out_abs.starts_with(&src_abs) {
        return Err(BundleError::NestedOutput { src: src_abs, out: out_abs });
    }

    let mut report = BundleReport::default();
    copy_tree(&src_abs, &out_abs, base, &mut report)?;

    let htaccess = out_abs.join(".htaccess");
    fs::write(&htaccess, htaccess_contents(base)).map_err(io_err(&htaccess))?;

    tracing::info!(
        src = %src_abs.display(),
        out = %out_abs.display(),
        copied = report.files_copied,
        rewritten = report.files_rewritten,
        "bundle: tv bundle written"
    );
    Ok(report)
}

fn copy_tree(from: &Path, to: &Path, base: &str, report: &mut BundleReport) -> Result<(), BundleError> {
    fs::create_dir_all(to).map_err(io_err(to))?;
    for entry in fs::read_dir(from).map_err(io_err(from))? {
        let entry = entry.map_err(io_err(from))?;
        let path = entry.path();
        let target = to.join(entry.file_name());
        let ty = entry.file_type().map_err(io_err(&path))?;

        if ty.is_dir() {
            copy_tree(&path, &target, base, report)?;
        } else if ty.is_file() {
            if is_rewritable(&path) {
                let text = fs::read_to_string(&path).map_err(io_err(&path))?;
                let rebased = rebase_references(&text, base);
                if rebased != text {
                    report.files_rewritten += 1;
                }
                fs::write(&target, rebased).map_err(io_err(&target))?;
            } else {
                fs::copy(&path, &target).map_err(io_err(&path))?;
            }
            report.files_copied += 1;
        }
    }
    Ok(())
}

fn is_rewritable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| REWRITE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Insert `base` after every absolute-reference marker in `text`.
///
/// Protocol-relative URLs (`//cdn...`) and references already under `base`
/// are left alone, so rebasing is idempotent.
#[must_use]
pub fn rebase_references(text: &str, base: &str) -> String {
    let insert = base.trim_start_matches('/');
    let mut out = text.to_owned();
    for (marker, continuation) in REFERENCE_MARKERS {
        out = rebase_marker(&out, marker, continuation, insert);
    }
    out
}

fn rebase_marker(text: &str, marker: &str, continuation: &str, insert: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(marker) {
        let after = pos + marker.len();
        out.push_str(&rest[..after]);
        let tail = &rest[after..];
        if tail.starts_with(continuation) && !tail.starts_with('/') && !tail.starts_with(insert) {
            out.push_str(insert);
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

#[must_use]
pub fn htaccess_contents(base: &str) -> String {
    format!(
        "<IfModule mod_rewrite.c>\n\
         RewriteEngine On\n\
         RewriteBase {base}\n\
         RewriteRule ^index\\.html$ - [L]\n\
         RewriteCond %{{REQUEST_FILENAME}} !-f\n\
         RewriteCond %{{REQUEST_FILENAME}} !-d\n\
         RewriteRule . {base}index.html [L]\n\
         </IfModule>\n"
    )
}

#[cfg(test)]
#[path = "bundle_test.rs"]
mod tests;
