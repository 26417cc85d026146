use super::Database;

use futures::TryStreamExt;
use sqlx::{types::Json, Executor, Row, Transaction};
use uuid::Uuid;

use crate::{
    entities::{Ride, RideStatus},
    error::Error,
};

/// Which rides a listing returns. Listings are always most recent first.
#[derive(Clone, Copy, Debug)]
pub enum RideFilter {
    Passenger(Uuid),
    Driver(Uuid),
    Open,
    All,
}

#[tracing::instrument(skip(executor, ride), fields(ride_id = %ride.id))]
pub async fn insert_ride<'e, E>(executor: E, ride: &Ride) -> Result<(), Error>
where
    E: Executor<'e, Database = Database>,
{
    executor
        .execute(
            sqlx::query(
                "INSERT INTO rides (id, passenger_id, driver_id, status, created_at, updated_at, data) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&ride.id)
            .bind(&ride.passenger_id)
            .bind(&ride.driver_id)
            .bind(ride.status.name())
            .bind(&ride.created_at)
            .bind(&ride.updated_at)
            .bind(Json(ride)),
        )
        .await?;

    Ok(())
}

#[tracing::instrument(skip(executor))]
pub async fn fetch_ride<'e, E>(executor: E, id: &Uuid) -> Result<Ride, Error>
where
    E: Executor<'e, Database = Database>,
{
    let Json(ride): Json<Ride> = executor
        .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(id))
        .await?
        .ok_or_else(|| Error::ride_not_found())?
        .try_get("data")?;

    Ok(ride)
}

/// Locks the ride row exclusively until the transaction ends.
#[tracing::instrument(skip(tx))]
pub async fn fetch_ride_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Ride, Error> {
    let Json(ride): Json<Ride> = tx
        .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| Error::ride_not_found())?
        .try_get("data")?;

    Ok(ride)
}

/// Locks the ride row against updates while letting other sharers through.
#[tracing::instrument(skip(tx))]
pub async fn fetch_ride_for_share(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Ride, Error> {
    let Json(ride): Json<Ride> = tx
        .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1 FOR SHARE").bind(id))
        .await?
        .ok_or_else(|| Error::ride_not_found())?
        .try_get("data")?;

    Ok(ride)
}

#[tracing::instrument(skip(tx, ride), fields(ride_id = %ride.id, revision = ride.revision))]
pub async fn update_ride(tx: &mut Transaction<'_, Database>, ride: &Ride) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "UPDATE rides SET driver_id = $2, status = $3, updated_at = $4, data = $5 WHERE id = $1",
        )
        .bind(&ride.id)
        .bind(&ride.driver_id)
        .bind(ride.status.name())
        .bind(&ride.updated_at)
        .bind(Json(ride)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(executor))]
pub async fn list_rides<'e, E>(executor: E, filter: RideFilter, limit: i64) -> Result<Vec<Ride>, Error>
where
    E: Executor<'e, Database = Database>,
{
    let query = match filter {
        RideFilter::Passenger(passenger_id) => sqlx::query(
            "SELECT data FROM rides WHERE passenger_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(passenger_id)
        .bind(limit),
        RideFilter::Driver(driver_id) => sqlx::query(
            "SELECT data FROM rides WHERE driver_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(driver_id)
        .bind(limit),
        RideFilter::Open => sqlx::query(
            "SELECT data FROM rides WHERE status IN ($1, $2) ORDER BY created_at DESC, id DESC LIMIT $3",
        )
        .bind(RideStatus::Requested.name())
        .bind(RideStatus::Bidding.name())
        .bind(limit),
        RideFilter::All => {
            sqlx::query("SELECT data FROM rides ORDER BY created_at DESC, id DESC LIMIT $1")
                .bind(limit)
        }
    };

    let mut rows = executor.fetch(query);
    let mut rides = vec![];

    while let Some(row) = rows.try_next().await? {
        let Json(ride): Json<Ride> = row.try_get("data")?;
        rides.push(ride);
    }

    Ok(rides)
}
