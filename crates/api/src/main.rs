use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{info, warn};

use larder_infra::jobs::ScheduledRegeneration;
use larder_infra::{CoreConfig, CoreStore, InMemoryStore, PostgresStore, Services};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    larder_observability::init();

    let config = CoreConfig::from_env();

    let addr: SocketAddr = match std::env::var("LARDER_BIND_ADDR") {
        Ok(raw) => raw.parse().with_context(|| format!("invalid LARDER_BIND_ADDR {raw}"))?,
        Err(_) => {
            warn!("LARDER_BIND_ADDR not set; using {DEFAULT_BIND_ADDR}");
            DEFAULT_BIND_ADDR.parse()?
        }
    };

    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = PgPool::connect(&url).await.context("failed to connect to postgres")?;
            let store = PostgresStore::new(pool);
            store.migrate().await.context("failed to apply migrations")?;
            serve(Arc::new(store), config, addr).await
        }
        Err(_) => {
            warn!("DATABASE_URL not set; using in-memory store");
            serve(Arc::new(InMemoryStore::new()), config, addr).await
        }
    }
}

async fn serve<S: CoreStore>(store: Arc<S>, config: CoreConfig, addr: SocketAddr) -> anyhow::Result<()> {
    let services = Services::new(store, config.clone());
    let regeneration = ScheduledRegeneration::default()
        .with_interval(config.regeneration_interval)
        .spawn("alert-regeneration", services.alerts.clone());

    let app = larder_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("shutting down alert regeneration");
    tokio::task::spawn_blocking(move || regeneration.shutdown()).await?;
    Ok(())
}
