use super::ride_store::{
    fetch_ride, fetch_ride_for_update, insert_ride, list_rides, update_ride, RideFilter,
};
use super::Engine;

use async_trait::async_trait;
use sqlx::Acquire;
use uuid::Uuid;

use crate::{
    api::{clamp_limit, RideAPI},
    auth::{Platform, User},
    entities::{Location, Ride, RideStatus, Transition},
    error::Error,
};

#[async_trait]
impl RideAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_ride(&self, user: User, from: Location, to: Location) -> Result<Ride, Error> {
        self.authorize(user.clone(), "create_ride", Platform)?;

        let mut ride = Ride::new(user.id, from, to)?;
        ride.open_for_bids()?;

        let mut conn = self.pool.acquire().await?;
        insert_ride(&mut conn, &ride).await?;

        tracing::info!(ride_id = %ride.id, "ride created, open for bids");

        self.events.ride_requested(&ride).await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;

        let ride = fetch_ride(&mut conn, &id).await?;

        self.authorize(user.clone(), "read", ride.clone())?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn update_ride_status(
        &self,
        user: User,
        id: Uuid,
        status: RideStatus,
    ) -> Result<Ride, Error> {
        Transition::for_target(status)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &id).await?;

        // the state check comes first so that a premature request reads as a conflict
        let transition = ride.transition_to(status)?;

        self.authorize(user.clone(), transition.action(), ride.clone())?;

        ride.apply(transition)?;

        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        tracing::info!(ride_id = %ride.id, status = ride.status.name(), "ride status changed");

        self.events.status_changed(&ride).await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn list_passenger_rides(
        &self,
        user: User,
        passenger_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Ride>, Error> {
        self.authorize(user.clone(), "list_rides", passenger_id.to_string())?;

        let mut conn = self.pool.acquire().await?;

        list_rides(&mut conn, RideFilter::Passenger(passenger_id), clamp_limit(limit)).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_driver_rides(
        &self,
        user: User,
        driver_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Ride>, Error> {
        self.authorize(user.clone(), "list_rides", driver_id.to_string())?;

        let mut conn = self.pool.acquire().await?;

        list_rides(&mut conn, RideFilter::Driver(driver_id), clamp_limit(limit)).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_open_rides(&self, user: User, limit: Option<u32>) -> Result<Vec<Ride>, Error> {
        self.authorize(user.clone(), "list_open_rides", Platform)?;

        let mut conn = self.pool.acquire().await?;

        list_rides(&mut conn, RideFilter::Open, clamp_limit(limit)).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_all_rides(&self, user: User, limit: Option<u32>) -> Result<Vec<Ride>, Error> {
        self.authorize(user.clone(), "list_all_rides", Platform)?;

        let mut conn = self.pool.acquire().await?;

        list_rides(&mut conn, RideFilter::All, clamp_limit(limit)).await
    }
}
