use anyhow::Context;
use pairrelay::{AppState, Broker, config::Settings, db, routes, transport::Transport};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pairrelay=debug")))
        .init();

    let settings = Settings::from_env()?;

    let db_pool = db::connect(&settings.database_url)
        .await
        .with_context(|| format!("opening {}", settings.database_url))?;
    let transport = Transport::new(settings.feed_capacity, settings.outbound_webhook.clone());

    let bind_addr = settings.bind_addr.clone();
    let app_state = AppState {
        broker: Broker::new(db_pool, transport, settings),
    };

    let app = routes::router()
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(%bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
