//! Domain events emitted by the engine after each committed change.
//!
//! Delivery is at-least-once and best effort: an [`EventPublisher`] failure is
//! logged by the [`Emitter`] and never surfaces to the operation that caused it.
//! Every event carries the ride `revision` it was produced against so consumers
//! can drop stale or duplicated deliveries.

pub mod webhook;

pub use webhook::WebhookPublisher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::entities::{Bid, Ride, RideStatus};
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RideEvent {
    #[serde(rename = "ride.requested", rename_all = "camelCase")]
    Requested {
        ride_id: Uuid,
        passenger_id: Uuid,
        ride: Ride,
        revision: i64,
    },
    #[serde(rename = "ride.bid.placed", rename_all = "camelCase")]
    BidPlaced {
        ride_id: Uuid,
        bid_id: Uuid,
        driver_id: Uuid,
        price: f64,
        revision: i64,
    },
    #[serde(rename = "ride.matched", rename_all = "camelCase")]
    Matched {
        ride_id: Uuid,
        driver_id: Uuid,
        price: f64,
        revision: i64,
    },
    #[serde(rename = "ride.status.changed", rename_all = "camelCase")]
    StatusChanged {
        ride_id: Uuid,
        status: RideStatus,
        revision: i64,
    },
}

impl RideEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Requested { .. } => "ride.requested",
            Self::BidPlaced { .. } => "ride.bid.placed",
            Self::Matched { .. } => "ride.matched",
            Self::StatusChanged { .. } => "ride.status.changed",
        }
    }

    pub fn ride_id(&self) -> Uuid {
        match self {
            Self::Requested { ride_id, .. }
            | Self::BidPlaced { ride_id, .. }
            | Self::Matched { ride_id, .. }
            | Self::StatusChanged { ride_id, .. } => *ride_id,
        }
    }

    pub fn revision(&self) -> i64 {
        match self {
            Self::Requested { revision, .. }
            | Self::BidPlaced { revision, .. }
            | Self::Matched { revision, .. }
            | Self::StatusChanged { revision, .. } => *revision,
        }
    }
}

/// Transport seam for ride events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: RideEvent) -> Result<(), Error>;
}

/// Discards every event, for deployments without a message bus.
#[derive(Clone, Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: RideEvent) -> Result<(), Error> {
        Ok(())
    }
}

/// Keeps published events in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RideEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RideEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_for(&self, ride_id: Uuid) -> Vec<RideEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.ride_id() == ride_id)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: RideEvent) -> Result<(), Error> {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }

        Ok(())
    }
}

/// The four emission operations the engine calls after a commit.
#[derive(Clone)]
pub struct Emitter {
    publisher: Arc<dyn EventPublisher>,
}

impl Emitter {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub async fn ride_requested(&self, ride: &Ride) {
        self.emit(RideEvent::Requested {
            ride_id: ride.id,
            passenger_id: ride.passenger_id,
            ride: ride.clone(),
            revision: ride.revision,
        })
        .await
    }

    pub async fn bid_placed(&self, bid: &Bid, revision: i64) {
        self.emit(RideEvent::BidPlaced {
            ride_id: bid.ride_id,
            bid_id: bid.id,
            driver_id: bid.driver_id,
            price: bid.price,
            revision,
        })
        .await
    }

    pub async fn ride_matched(&self, ride: &Ride, bid: &Bid) {
        self.emit(RideEvent::Matched {
            ride_id: ride.id,
            driver_id: bid.driver_id,
            price: bid.price,
            revision: ride.revision,
        })
        .await
    }

    pub async fn status_changed(&self, ride: &Ride) {
        self.emit(RideEvent::StatusChanged {
            ride_id: ride.id,
            status: ride.status,
            revision: ride.revision,
        })
        .await
    }

    async fn emit(&self, event: RideEvent) {
        let name = event.name();
        let ride_id = event.ride_id();

        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(event = name, %ride_id, "failed to deliver ride event: {}", err);
        }
    }
}

#[cfg(test)]
struct FailingPublisher;

#[cfg(test)]
#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: RideEvent) -> Result<(), Error> {
        Err(Error::upstream_error())
    }
}

#[cfg(test)]
fn sample_ride() -> Ride {
    use crate::entities::Location;

    Ride::new(
        Uuid::new_v4(),
        Location::new(0.0, 0.0),
        Location::new(1.0, 1.0),
    )
    .unwrap()
}

#[test]
fn event_json_schema() {
    let ride = sample_ride();
    let bid = Bid::new(ride.id, Uuid::new_v4(), 500.0).unwrap();

    let event = RideEvent::BidPlaced {
        ride_id: ride.id,
        bid_id: bid.id,
        driver_id: bid.driver_id,
        price: bid.price,
        revision: 1,
    };
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["type"], "ride.bid.placed");
    assert_eq!(json["rideId"], ride.id.to_string());
    assert_eq!(json["bidId"], bid.id.to_string());
    assert_eq!(json["driverId"], bid.driver_id.to_string());
    assert_eq!(json["price"], 500.0);

    let event = RideEvent::StatusChanged {
        ride_id: ride.id,
        status: RideStatus::InProgress,
        revision: 3,
    };
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["type"], "ride.status.changed");
    assert_eq!(json["status"], "in_progress");
    assert_eq!(json["revision"], 3);
}

#[test]
fn requested_event_carries_snapshot() {
    let ride = sample_ride();
    let publisher = Arc::new(RecordingPublisher::new());
    let emitter = Emitter::new(publisher.clone());

    tokio_test::block_on(emitter.ride_requested(&ride));

    let events = publisher.events();
    assert_eq!(events.len(), 1);

    let json = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(json["type"], "ride.requested");
    assert_eq!(json["passengerId"], ride.passenger_id.to_string());
    assert_eq!(json["ride"]["id"], ride.id.to_string());
}

#[test]
fn emitter_preserves_call_order() {
    let mut ride = sample_ride();
    ride.open_for_bids().unwrap();
    let bid = Bid::new(ride.id, Uuid::new_v4(), 42.0).unwrap();

    let publisher = Arc::new(RecordingPublisher::new());
    let emitter = Emitter::new(publisher.clone());

    tokio_test::block_on(async {
        emitter.ride_requested(&ride).await;
        emitter.bid_placed(&bid, ride.revision).await;
        ride.accept_bid(&bid).unwrap();
        emitter.ride_matched(&ride, &bid).await;
    });

    let names: Vec<&str> = publisher.events().iter().map(|event| event.name()).collect();
    assert_eq!(names, vec!["ride.requested", "ride.bid.placed", "ride.matched"]);

    let revisions: Vec<i64> = publisher
        .events_for(ride.id)
        .iter()
        .map(|event| event.revision())
        .collect();
    assert_eq!(revisions, vec![1, 1, 2]);
}

#[test]
fn publish_failures_are_swallowed() {
    let ride = sample_ride();
    let emitter = Emitter::new(Arc::new(FailingPublisher));

    // completes without panicking or returning an error
    tokio_test::block_on(emitter.status_changed(&ride));
}

#[test]
fn noop_publisher_accepts_everything() {
    let ride = sample_ride();

    let result = tokio_test::block_on(NoopPublisher.publish(RideEvent::StatusChanged {
        ride_id: ride.id,
        status: RideStatus::Cancelled,
        revision: 2,
    }));

    assert!(result.is_ok());
}
