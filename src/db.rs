use sqlx::{postgres::PgPoolOptions, Executor, Pool, Postgres};

use crate::error::Error;

// serializes schema creation between processes starting against the same database
const SCHEMA_LOCK_KEY: i64 = 0x6269_6472_6964_65;

/// Partial unique index allowing a single accepted bid per ride.
pub const ONE_ACCEPTED_BID_INDEX: &str = "bids_one_accepted_per_ride";

pub struct PgPool(pub Pool<Postgres>);

impl PgPool {
    #[tracing::instrument(name = "PgPool::new", skip(db_uri))]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        Ok(Self(pool))
    }
}

/// Creates the ride and bid tables when they do not exist yet. Existing data is kept.
#[tracing::instrument(skip_all)]
pub async fn create_schema(pool: &Pool<Postgres>) -> Result<(), Error> {
    let mut tx = pool.begin().await?;

    tx.execute(sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_KEY))
        .await?;

    // ride store; `data` holds the full aggregate, the other columns are for lookups
    tx.execute(
        "CREATE TABLE IF NOT EXISTS rides (
            id UUID PRIMARY KEY,
            passenger_id UUID NOT NULL,
            driver_id UUID,
            status VARCHAR NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            data JSONB NOT NULL
        )",
    )
    .await?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS rides_passenger_idx ON rides (passenger_id, created_at DESC)",
    )
    .await?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS rides_driver_idx ON rides (driver_id, created_at DESC)",
    )
    .await?;
    tx.execute("CREATE INDEX IF NOT EXISTS rides_status_idx ON rides (status, created_at DESC)")
        .await?;
    tx.execute("CREATE INDEX IF NOT EXISTS rides_created_idx ON rides (created_at DESC)")
        .await?;

    // bid store
    tx.execute(
        "CREATE TABLE IF NOT EXISTS bids (
            id UUID PRIMARY KEY,
            ride_id UUID NOT NULL,
            driver_id UUID NOT NULL,
            price DOUBLE PRECISION NOT NULL CHECK (price > 0),
            status VARCHAR NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            CONSTRAINT fk_bid_ride FOREIGN KEY(ride_id) REFERENCES rides(id)
        )",
    )
    .await?;
    tx.execute("CREATE INDEX IF NOT EXISTS bids_ride_idx ON bids (ride_id, created_at ASC)")
        .await?;

    // at most one accepted bid per ride, whatever the application does
    let accepted_index = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON bids (ride_id) WHERE status = 'accepted'",
        ONE_ACCEPTED_BID_INDEX
    );
    tx.execute(accepted_index.as_str()).await?;

    tx.commit().await?;

    Ok(())
}
