use std::sync::Arc;

use bidride::config::Config;
use bidride::db::PgPool;
use bidride::engine::Engine;
use bidride::error::Error;
use bidride::events::{EventPublisher, NoopPublisher, WebhookPublisher};
use bidride::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let PgPool(pool) = PgPool::new(&config.database_url, config.max_connections).await?;

    let publisher: Arc<dyn EventPublisher> = match &config.event_webhook_url {
        Some(url) => {
            tracing::info!("publishing ride events to {}", url);
            Arc::new(WebhookPublisher::new(url.clone()).with_retry(
                config.event_webhook_max_attempts,
                config.event_webhook_backoff,
            ))
        }
        None => {
            tracing::warn!("EVENT_WEBHOOK_URL is not set, ride events will be dropped");
            Arc::new(NoopPublisher)
        }
    };

    let engine = Engine::new(pool, publisher).await?;

    serve(engine, config.listen_addr).await
}
