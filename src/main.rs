use sessiongate::config::ServerConfig;
use sessiongate::{routes, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("invalid configuration");
    let identity = state::build_identity(&config.identity).expect("identity client init failed");
    let state = state::AppState::new(identity, config.auth.clone());
    state.store.initialize().await;
    tracing::info!(phase = ?state.store.phase(), "session store initialized");

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "sessiongate listening");
    axum::serve(listener, app).await.expect("server failed");
}
