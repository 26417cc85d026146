use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::{Bid, Location};
use crate::error::Error;

/// A passenger's trip request, tracked from creation until it completes or is cancelled.
///
/// `driver_id` and `price` are set together, exactly once, when a bid is accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: Status,
    #[serde(rename = "from")]
    pub origin: Location,
    #[serde(rename = "to")]
    pub destination: Location,
    pub price: Option<f64>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Requested,
    Bidding,
    Matched,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Requested,
        Status::Bidding,
        Status::Matched,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Bidding => "bidding",
            Self::Matched => "matched",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `requested` and `bidding` both accept bids and acceptance.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Requested | Self::Bidding)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(Error::invalid_status_target)
    }
}

/// A caller-driven status change, named after the policy action that authorizes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Start,
    Complete,
    Cancel,
}

impl Transition {
    /// Maps a requested status to the transition reaching it. Only `in_progress`,
    /// `completed` and `cancelled` can be requested by a caller.
    pub fn for_target(target: Status) -> Result<Self, Error> {
        match target {
            Status::InProgress => Ok(Self::Start),
            Status::Completed => Ok(Self::Complete),
            Status::Cancelled => Ok(Self::Cancel),
            Status::Requested | Status::Bidding | Status::Matched => {
                Err(Error::invalid_status_target())
            }
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    pub fn target(&self) -> Status {
        match self {
            Self::Start => Status::InProgress,
            Self::Complete => Status::Completed,
            Self::Cancel => Status::Cancelled,
        }
    }
}

impl Ride {
    pub fn new(passenger_id: Uuid, origin: Location, destination: Location) -> Result<Self, Error> {
        origin.validate()?;
        destination.validate()?;

        let now = super::now();

        Ok(Self {
            id: Uuid::new_v4(),
            passenger_id,
            driver_id: None,
            status: Status::Requested,
            origin,
            destination,
            price: None,
            revision: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_driver(&self, id: &Uuid) -> bool {
        self.driver_id.as_ref() == Some(id)
    }

    pub fn ensure_open(&self) -> Result<(), Error> {
        if !self.is_open() {
            return Err(Error::ride_not_open_for_bidding());
        }

        Ok(())
    }

    pub fn open_for_bids(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Requested => {
                self.status = Status::Bidding;
                Ok(())
            }
            Status::Bidding => Ok(()),
            _ => Err(Error::invalid_status()),
        }
    }

    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn accept_bid(&mut self, bid: &Bid) -> Result<(), Error> {
        if bid.ride_id != self.id {
            return Err(Error::bid_not_found());
        }

        if !self.is_open() || self.driver_id.is_some() || self.price.is_some() {
            return Err(Error::invalid_status());
        }

        self.driver_id = Some(bid.driver_id);
        self.price = Some(bid.price);
        self.status = Status::Matched;
        self.touch();

        Ok(())
    }

    /// Resolves `target` against the current status.
    ///
    /// Targets that no caller may ever request fail with an input error; targets that are
    /// valid in general but not from the current status fail with `invalid_status`.
    pub fn transition_to(&self, target: Status) -> Result<Transition, Error> {
        let transition = Transition::for_target(target)?;

        let allowed = match (self.status, transition) {
            (Status::Matched, Transition::Start) => true,
            (Status::InProgress, Transition::Complete) => true,
            (from, Transition::Cancel) => !from.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(Error::invalid_status());
        }

        Ok(transition)
    }

    #[tracing::instrument(skip(self), fields(ride_id = %self.id))]
    pub fn apply(&mut self, transition: Transition) -> Result<(), Error> {
        self.transition_to(transition.target())?;

        self.status = transition.target();
        self.touch();

        Ok(())
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = super::now();
    }
}

impl PolarClass for Ride {
    fn get_polar_class_builder() -> oso::ClassBuilder<Ride> {
        oso::Class::builder()
            .name("Ride")
            .add_attribute_getter("id", |recv: &Ride| recv.id.to_string())
            .add_attribute_getter("passenger_id", |recv: &Ride| recv.passenger_id.to_string())
            .add_attribute_getter("status", |recv: &Ride| recv.status.name().to_string())
            .add_method("is_open", |recv: &Ride| recv.is_open())
            .add_method("is_driver", |recv: &Ride, id: String| {
                Uuid::parse_str(&id).map_or(false, |id| recv.is_driver(&id))
            })
    }

    fn get_polar_class() -> oso::Class {
        let builder = Ride::get_polar_class_builder();
        builder.build()
    }
}

#[cfg(test)]
fn open_ride() -> Ride {
    let mut ride = Ride::new(
        Uuid::new_v4(),
        Location::new(0.0, 0.0),
        Location::new(1.0, 1.0),
    )
    .unwrap();
    ride.open_for_bids().unwrap();
    ride
}

#[cfg(test)]
fn ride_in(status: Status) -> Ride {
    let mut ride = open_ride();
    ride.status = status;
    if matches!(status, Status::Matched | Status::InProgress | Status::Completed) {
        ride.driver_id = Some(Uuid::new_v4());
        ride.price = Some(10.0);
    }
    ride
}

#[test]
fn new_ride_is_open_and_unmatched() {
    let ride = open_ride();

    assert_eq!(ride.status, Status::Bidding);
    assert!(ride.is_open());
    assert_eq!(ride.driver_id, None);
    assert_eq!(ride.price, None);
    assert_eq!(ride.revision, 1);
}

#[test]
fn new_ride_validates_both_points() {
    let err = Ride::new(
        Uuid::new_v4(),
        Location::new(91.0, 0.0),
        Location::new(0.0, 0.0),
    )
    .unwrap_err();
    assert_eq!(err.code, Error::invalid_coordinates().code);

    let err = Ride::new(
        Uuid::new_v4(),
        Location::new(0.0, 0.0),
        Location::new(0.0, -200.0),
    )
    .unwrap_err();
    assert_eq!(err.code, Error::invalid_coordinates().code);
}

#[test]
fn accept_bid_fixes_driver_and_price() {
    let mut ride = open_ride();
    let bid = Bid::new(ride.id, Uuid::new_v4(), 400.0).unwrap();

    ride.accept_bid(&bid).unwrap();

    assert_eq!(ride.status, Status::Matched);
    assert_eq!(ride.driver_id, Some(bid.driver_id));
    assert_eq!(ride.price, Some(400.0));
    assert_eq!(ride.revision, 2);
}

#[test]
fn accept_bid_happens_once() {
    let mut ride = open_ride();
    let first = Bid::new(ride.id, Uuid::new_v4(), 400.0).unwrap();
    let second = Bid::new(ride.id, Uuid::new_v4(), 300.0).unwrap();

    ride.accept_bid(&first).unwrap();
    let err = ride.accept_bid(&second).unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(ride.driver_id, Some(first.driver_id));
    assert_eq!(ride.price, Some(400.0));
}

#[test]
fn accept_bid_of_another_ride_is_not_found() {
    let mut ride = open_ride();
    let bid = Bid::new(Uuid::new_v4(), Uuid::new_v4(), 400.0).unwrap();

    assert!(ride.accept_bid(&bid).unwrap_err().is_not_found());
    assert!(ride.is_open());
}

#[test]
fn closed_rides_refuse_bids() {
    for status in Status::ALL {
        let ride = ride_in(status);
        assert_eq!(ride.ensure_open().is_ok(), status.is_open());
    }
}

#[test]
fn transition_table() {
    use Status::*;

    let allowed = [
        (Matched, InProgress),
        (InProgress, Completed),
        (Requested, Cancelled),
        (Bidding, Cancelled),
        (Matched, Cancelled),
        (InProgress, Cancelled),
    ];

    for from in Status::ALL {
        for to in Status::ALL {
            let result = ride_in(from).transition_to(to);

            if allowed.contains(&(from, to)) {
                assert_eq!(result.unwrap().target(), to);
            } else {
                let err = result.unwrap_err();
                assert!(
                    err.is_conflict() || err.code == Error::invalid_status_target().code,
                    "{:?} -> {:?} should be refused",
                    from,
                    to
                );
            }
        }
    }
}

#[test]
fn start_before_match_is_a_conflict() {
    let ride = open_ride();

    assert!(ride.transition_to(Status::InProgress).unwrap_err().is_conflict());
    assert!(ride.transition_to(Status::Completed).unwrap_err().is_conflict());
}

#[test]
fn terminal_states_are_final() {
    for status in [Status::Completed, Status::Cancelled] {
        let mut ride = ride_in(status);

        for transition in [Transition::Start, Transition::Complete, Transition::Cancel] {
            assert!(ride.apply(transition).unwrap_err().is_conflict());
        }
        assert_eq!(ride.status, status);
    }
}

#[test]
fn apply_bumps_revision() {
    let mut ride = ride_in(Status::Matched);
    let revision = ride.revision;

    ride.apply(Transition::Start).unwrap();
    ride.apply(Transition::Complete).unwrap();

    assert_eq!(ride.status, Status::Completed);
    assert_eq!(ride.revision, revision + 2);
}

#[test]
fn only_caller_reachable_targets_map_to_transitions() {
    assert_eq!(Transition::for_target(Status::InProgress).unwrap(), Transition::Start);
    assert_eq!(Transition::for_target(Status::Completed).unwrap(), Transition::Complete);
    assert_eq!(Transition::for_target(Status::Cancelled).unwrap(), Transition::Cancel);

    for status in [Status::Requested, Status::Bidding, Status::Matched] {
        let err = Transition::for_target(status).unwrap_err();
        assert_eq!(err.code, Error::invalid_status_target().code);
    }
}

#[test]
fn status_parsing() {
    assert_eq!("in_progress".parse::<Status>().unwrap(), Status::InProgress);
    assert_eq!(
        "teleported".parse::<Status>().unwrap_err().code,
        Error::invalid_status_target().code
    );
}

#[test]
fn ride_json_uses_from_and_to() {
    let json = serde_json::to_value(open_ride()).unwrap();

    assert_eq!(json["status"], "bidding");
    assert_eq!(json["from"]["lat"], 0.0);
    assert_eq!(json["to"]["lng"], 1.0);
    assert!(json["driverId"].is_null());
    assert!(json["passengerId"].is_string());
}
