use super::Database;

use futures::TryStreamExt;
use sqlx::{postgres::PgRow, Executor, Row, Transaction};
use uuid::Uuid;

use crate::{
    entities::{Bid, BidStatus},
    error::Error,
};

const BID_COLUMNS: &str = "id, ride_id, driver_id, price, status, created_at";

fn bid_from_row(row: &PgRow) -> Result<Bid, Error> {
    let status: String = row.try_get("status")?;

    Ok(Bid {
        id: row.try_get("id")?,
        ride_id: row.try_get("ride_id")?,
        driver_id: row.try_get("driver_id")?,
        price: row.try_get("price")?,
        status: status.parse::<BidStatus>()?,
        created_at: row.try_get("created_at")?,
    })
}

#[tracing::instrument(skip(tx, bid), fields(bid_id = %bid.id, ride_id = %bid.ride_id))]
pub async fn insert_bid(tx: &mut Transaction<'_, Database>, bid: &Bid) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "INSERT INTO bids (id, ride_id, driver_id, price, status, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&bid.id)
        .bind(&bid.ride_id)
        .bind(&bid.driver_id)
        .bind(bid.price)
        .bind(bid.status.name())
        .bind(&bid.created_at),
    )
    .await?;

    Ok(())
}

/// Locks a bid of `ride_id`. A bid of another ride is reported as missing.
#[tracing::instrument(skip(tx))]
pub async fn fetch_bid_for_update(
    tx: &mut Transaction<'_, Database>,
    ride_id: &Uuid,
    bid_id: &Uuid,
) -> Result<Bid, Error> {
    let query = format!(
        "SELECT {} FROM bids WHERE id = $1 AND ride_id = $2 FOR UPDATE",
        BID_COLUMNS
    );

    let row = tx
        .fetch_optional(sqlx::query(&query).bind(bid_id).bind(ride_id))
        .await?
        .ok_or_else(|| Error::bid_not_found())?;

    bid_from_row(&row)
}

/// All bids of a ride, oldest first.
#[tracing::instrument(skip(executor))]
pub async fn list_bids<'e, E>(executor: E, ride_id: &Uuid) -> Result<Vec<Bid>, Error>
where
    E: Executor<'e, Database = Database>,
{
    let query = format!(
        "SELECT {} FROM bids WHERE ride_id = $1 ORDER BY created_at ASC, id ASC",
        BID_COLUMNS
    );

    let mut rows = executor.fetch(sqlx::query(&query).bind(ride_id));
    let mut bids = vec![];

    while let Some(row) = rows.try_next().await? {
        bids.push(bid_from_row(&row)?);
    }

    Ok(bids)
}

/// Marks `accepted_bid_id` accepted and every other pending bid of the ride rejected.
/// Returns the number of rejected bids.
#[tracing::instrument(skip(tx))]
pub async fn settle_bids(
    tx: &mut Transaction<'_, Database>,
    ride_id: &Uuid,
    accepted_bid_id: &Uuid,
) -> Result<u64, Error> {
    tx.execute(
        sqlx::query("UPDATE bids SET status = $3 WHERE id = $2 AND ride_id = $1")
            .bind(ride_id)
            .bind(accepted_bid_id)
            .bind(BidStatus::Accepted.name()),
    )
    .await?;

    let rejected = tx
        .execute(
            sqlx::query(
                "UPDATE bids SET status = $3 WHERE ride_id = $1 AND id <> $2 AND status = $4",
            )
            .bind(ride_id)
            .bind(accepted_bid_id)
            .bind(BidStatus::Rejected.name())
            .bind(BidStatus::Pending.name()),
        )
        .await?
        .rows_affected();

    Ok(rejected)
}
