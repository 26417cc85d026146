use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Bid, Location, Ride, RideStatus};
use crate::error::Error;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Resolves an optional caller-supplied page size to `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<u32>) -> i64 {
    i64::from(limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
}

#[async_trait]
pub trait RideAPI {
    async fn create_ride(&self, user: User, from: Location, to: Location) -> Result<Ride, Error>;
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn update_ride_status(
        &self,
        user: User,
        id: Uuid,
        status: RideStatus,
    ) -> Result<Ride, Error>;
    async fn list_passenger_rides(
        &self,
        user: User,
        passenger_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Ride>, Error>;
    async fn list_driver_rides(
        &self,
        user: User,
        driver_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Ride>, Error>;
    async fn list_open_rides(&self, user: User, limit: Option<u32>) -> Result<Vec<Ride>, Error>;
    async fn list_all_rides(&self, user: User, limit: Option<u32>) -> Result<Vec<Ride>, Error>;
}

#[async_trait]
pub trait BidAPI {
    async fn place_bid(&self, user: User, ride_id: Uuid, price: f64) -> Result<Bid, Error>;
    async fn list_bids(&self, user: User, ride_id: Uuid) -> Result<Vec<Bid>, Error>;
    async fn accept_bid(&self, user: User, ride_id: Uuid, bid_id: Uuid) -> Result<Ride, Error>;
}

pub trait API: RideAPI + BidAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;

#[test]
fn limits_default_and_cap() {
    assert_eq!(clamp_limit(None), 20);
    assert_eq!(clamp_limit(Some(0)), 1);
    assert_eq!(clamp_limit(Some(35)), 35);
    assert_eq!(clamp_limit(Some(10_000)), 100);
}
