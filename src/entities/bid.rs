use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub price: f64,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(Error::unexpected_error()),
        }
    }
}

pub fn validate_price(price: f64) -> Result<(), Error> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::invalid_price());
    }

    Ok(())
}

impl Bid {
    pub fn new(ride_id: Uuid, driver_id: Uuid, price: f64) -> Result<Self, Error> {
        validate_price(price)?;

        Ok(Self {
            id: Uuid::new_v4(),
            ride_id,
            driver_id,
            price,
            status: Status::Pending,
            created_at: super::now(),
        })
    }

    #[tracing::instrument]
    pub fn accept(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Accepted;
                Ok(())
            }
            _ => Err(Error::invalid_status()),
        }
    }
}

#[test]
fn new_bid_is_pending() {
    let bid = Bid::new(Uuid::new_v4(), Uuid::new_v4(), 12.5).unwrap();

    assert_eq!(bid.status, Status::Pending);
    assert_eq!(bid.price, 12.5);
    // matches what a TIMESTAMPTZ column stores
    assert_eq!(bid.created_at.timestamp_subsec_nanos() % 1_000, 0);
}

#[test]
fn non_positive_prices_are_rejected() {
    for price in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = Bid::new(Uuid::new_v4(), Uuid::new_v4(), price).unwrap_err();
        assert_eq!(err.code, Error::invalid_price().code);
    }
}

#[test]
fn only_pending_bids_are_accepted() {
    let mut bid = Bid::new(Uuid::new_v4(), Uuid::new_v4(), 10.0).unwrap();
    bid.accept().unwrap();

    assert_eq!(bid.status, Status::Accepted);
    assert!(bid.accept().unwrap_err().is_conflict());

    let mut bid = Bid::new(Uuid::new_v4(), Uuid::new_v4(), 10.0).unwrap();
    bid.status = Status::Rejected;

    assert!(bid.accept().unwrap_err().is_conflict());
    assert_eq!(bid.status, Status::Rejected);
}

#[test]
fn status_names_round_trip() {
    for status in [Status::Pending, Status::Accepted, Status::Rejected] {
        assert_eq!(status.name().parse::<Status>().unwrap(), status);
    }
}
