use std::process;
use std::sync::Arc;

use signdeck::config::Config;
use signdeck::services::{auth, email, housekeeping, media::FsMediaStore};
use signdeck::{db, routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => fail("invalid configuration", &e),
    };
    let port = config.port;

    let pool = match db::init_pool(&config.database_url, config.db_max_connections).await {
        Ok(pool) => pool,
        Err(e) => fail("database init failed", &e),
    };

    if let Some((admin_email, password)) = &config.bootstrap_admin {
        if let Err(e) = auth::ensure_bootstrap_admin(&pool, admin_email, password).await {
            fail("bootstrap admin failed", &e);
        }
    }

    let mailer = email::mailer_from_config(&config);
    let media = Arc::new(FsMediaStore::new(
        config.media_dir.clone(),
        config.media_base_url.clone(),
        config.media_max_bytes,
    ));
    let state = state::AppState::new(pool, config, mailer, media);

    let _housekeeping = housekeeping::spawn_housekeeping_task(state.clone());

    let app = routes::app(state);
    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => fail("failed to bind", &e),
    };

    tracing::info!(%port, "signdeck listening");
    if let Err(e) = axum::serve(listener, app).await {
        fail("server failed", &e);
    }
}

fn fail(context: &str, err: &dyn std::fmt::Display) -> ! {
    tracing::error!(error = %err, "{context}");
    process::exit(1);
}
