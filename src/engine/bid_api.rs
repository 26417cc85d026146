use super::bid_store::{fetch_bid_for_update, insert_bid, list_bids, settle_bids};
use super::ride_store::{fetch_ride, fetch_ride_for_share, fetch_ride_for_update, update_ride};
use super::Engine;

use async_trait::async_trait;
use sqlx::Acquire;
use uuid::Uuid;

use crate::{
    api::BidAPI,
    auth::User,
    entities::{validate_price, Bid, Ride},
    error::Error,
};

#[async_trait]
impl BidAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn place_bid(&self, user: User, ride_id: Uuid, price: f64) -> Result<Bid, Error> {
        validate_price(price)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        // a shared lock lets bids on the same ride proceed together while keeping
        // an accept or status change from committing underneath this insert
        let ride = fetch_ride_for_share(&mut tx, &ride_id).await?;

        self.authorize(user.clone(), "place_bid", ride.clone())?;

        ride.ensure_open()?;

        let bid = Bid::new(ride.id, user.id, price)?;

        insert_bid(&mut tx, &bid).await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride.id, bid_id = %bid.id, "bid placed");

        self.events.bid_placed(&bid, ride.revision).await;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bids(&self, user: User, ride_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let ride = fetch_ride(&mut conn, &ride_id).await?;

        self.authorize(user.clone(), "read", ride.clone())?;

        list_bids(&mut conn, &ride.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(&self, user: User, ride_id: Uuid, bid_id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        // concurrent accepts for the same ride queue up here; the losers see a matched ride
        let mut ride = fetch_ride_for_update(&mut tx, &ride_id).await?;

        self.authorize(user.clone(), "accept_bid", ride.clone())
            .map_err(|err| {
                if err.is_forbidden() {
                    Error::not_passenger()
                } else {
                    err
                }
            })?;

        let mut bid = fetch_bid_for_update(&mut tx, &ride.id, &bid_id).await?;

        if !ride.is_open() {
            tracing::info!("ride is no longer open, returning early...");
            return Err(Error::invalid_status());
        }

        bid.accept()?;
        ride.accept_bid(&bid)?;

        let rejected = settle_bids(&mut tx, &ride.id, &bid.id).await?;
        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride.id, bid_id = %bid.id, rejected, "bid accepted, ride matched");

        self.events.ride_matched(&ride, &bid).await;

        Ok(ride)
    }
}
