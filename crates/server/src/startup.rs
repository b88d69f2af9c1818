use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use common::utils::logging::init_logging_default;
use dotenvy::dotenv;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::info;

use service::auth_service::AuthSettings;
use service::mailer::LogMailer;

use crate::routes::{self, auth};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load host/port from configs or env vars, with sensible fallbacks
fn load_bind_addr() -> anyhow::Result<SocketAddr> {
    let (host, port) = match configs::load_default() {
        Ok(cfg) => (cfg.server.host, cfg.server.port),
        Err(_) => {
            let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port = env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(5000);
            (host, port)
        }
    };
    Ok(format!("{}:{}", host, port).parse()?)
}

fn load_auth_settings() -> AuthSettings {
    if let Ok(mut cfg) = configs::load_default() {
        cfg.auth.normalize_from_env();
        if !cfg.auth.jwt_secret.trim().is_empty() {
            return AuthSettings {
                jwt_secret: cfg.auth.jwt_secret,
                token_ttl_hours: cfg.auth.token_ttl_hours,
            };
        }
    }
    let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string());
    AuthSettings { jwt_secret, token_ttl_hours: 12 }
}

/// Public entry: connect, migrate, build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging_default();

    let db = models::db::connect().await?;
    migration::Migrator::up(&db, None).await?;
    info!("database connected and migrated");

    let state = auth::ServerState {
        db,
        auth: load_auth_settings(),
        mailer: Arc::new(LogMailer),
    };

    let app: Router = routes::build_router(state, build_cors());

    let addr = load_bind_addr()?;
    info!(%addr, "starting booking api");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
