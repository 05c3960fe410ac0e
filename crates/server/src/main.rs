use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use configurator::config::Settings;
use configurator::Session;

mod routes;

const UPGRADE_POLL: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session>>,
    pub settings: Arc<Settings>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("configurator=info,server=info")),
        )
        .init();

    let settings = Settings::load();
    let bind = settings.server.bind.clone();
    let state = AppState {
        session: Arc::new(Mutex::new(Session::from_settings(settings.clone()).await)),
        settings: Arc::new(settings),
    };

    tokio::spawn(load_model(state.session.clone()));

    let app = Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/command", post(routes::command))
        .route("/api/publish", post(routes::publish))
        .route("/api/state", get(routes::current_state))
        .route("/api/launch", post(routes::launch))
        .route("/ar", get(routes::ar_viewer))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("Server running on http://{}", bind);
    axum::serve(listener, app).await
}

/// Load the base model, then swap in high detail once it has arrived.
///
/// The session lock is only taken for short steps; neither download holds
/// it, so commands keep flowing while assets arrive.
async fn load_model(session: Arc<Mutex<Session>>) {
    let fetch = session.lock().await.begin_load();
    let imported = fetch.run().await;
    if let Err(e) = session.lock().await.finish_load(imported) {
        tracing::error!("Model load failed: {}", e);
        return;
    }
    loop {
        tokio::time::sleep(UPGRADE_POLL).await;
        let mut session = session.lock().await;
        if !session.upgrade_pending() {
            return;
        }
        match session.poll_upgrade().await {
            Ok(true) => return,
            Ok(false) => {}
            Err(_) => return,
        }
    }
}
