use oso::{Oso, PolarClass};

use crate::auth::{Platform, User};
use crate::entities::Ride;
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(Platform::get_polar_class())?;
    o.register_class(User::get_polar_class())?;
    o.register_class(Ride::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
fn matched_ride(passenger_id: uuid::Uuid, driver_id: uuid::Uuid) -> Ride {
    use crate::entities::{Bid, Location};

    let mut ride = Ride::new(
        passenger_id,
        Location::new(0.0, 0.0),
        Location::new(1.0, 1.0),
    )
    .unwrap();
    ride.open_for_bids().unwrap();

    let bid = Bid::new(ride.id, driver_id, 100.0).unwrap();
    ride.accept_bid(&bid).unwrap();

    ride
}

#[test]
fn platform_actions_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger = User::passenger(Uuid::new_v4());
    let driver = User::driver(Uuid::new_v4());
    let admin = User::admin(Uuid::new_v4());

    let result = authorizor.is_allowed(passenger.clone(), "create_ride", Platform);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(driver.clone(), "create_ride", Platform);
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(passenger.clone(), "list_open_rides", Platform);
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "list_open_rides", Platform);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(admin.clone(), "list_open_rides", Platform);
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(driver.clone(), "list_all_rides", Platform);
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(admin.clone(), "list_all_rides", Platform);
    assert_eq!(result.unwrap(), true);
}

#[test]
fn ride_listing_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger = User::passenger(Uuid::new_v4());
    let admin = User::admin(Uuid::new_v4());

    let result = authorizor.is_allowed(passenger.clone(), "list_rides", passenger.id.to_string());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(passenger.clone(), "list_rides", Uuid::new_v4().to_string());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(admin.clone(), "list_rides", Uuid::new_v4().to_string());
    assert_eq!(result.unwrap(), true);
}

#[test]
fn open_ride_test() {
    use crate::entities::Location;
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger = User::passenger(Uuid::new_v4());
    let other_passenger = User::passenger(Uuid::new_v4());
    let driver = User::driver(Uuid::new_v4());

    let mut ride = Ride::new(
        passenger.id,
        Location::new(0.0, 0.0),
        Location::new(1.0, 1.0),
    )
    .unwrap();
    ride.open_for_bids().unwrap();

    let result = authorizor.is_allowed(passenger.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(other_passenger.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(driver.clone(), "place_bid", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(passenger.clone(), "place_bid", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(passenger.clone(), "accept_bid", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(other_passenger.clone(), "accept_bid", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "accept_bid", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(passenger.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(driver.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn driver_acting_as_own_passenger_cannot_bid_test() {
    use crate::entities::Location;
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let id = Uuid::new_v4();
    let ride = Ride::new(id, Location::new(0.0, 0.0), Location::new(1.0, 1.0)).unwrap();

    let result = authorizor.is_allowed(User::driver(id), "place_bid", ride);
    assert_eq!(result.unwrap(), false);
}

#[test]
fn matched_ride_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger = User::passenger(Uuid::new_v4());
    let driver = User::driver(Uuid::new_v4());
    let other_driver = User::driver(Uuid::new_v4());
    let admin = User::admin(Uuid::new_v4());

    let ride = matched_ride(passenger.id, driver.id);

    let result = authorizor.is_allowed(driver.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(other_driver.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(admin.clone(), "read", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(driver.clone(), "start", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(other_driver.clone(), "start", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(passenger.clone(), "start", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "complete", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(passenger.clone(), "complete", ride.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(driver.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(passenger.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(admin.clone(), "cancel", ride.clone());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn role_must_match_identity_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger_id = Uuid::new_v4();
    let driver_id = Uuid::new_v4();
    let ride = matched_ride(passenger_id, driver_id);

    // the matched driver's id presented with the passenger role
    let result = authorizor.is_allowed(User::passenger(driver_id), "start", ride.clone());
    assert_eq!(result.unwrap(), false);

    // the passenger's id presented with the driver role
    let result = authorizor.is_allowed(User::driver(passenger_id), "cancel", ride.clone());
    assert_eq!(result.unwrap(), false);
}
