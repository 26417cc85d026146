use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            address: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        // range checks are false for NaN
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.is_valid() {
            return Err(Error::invalid_coordinates());
        }

        Ok(())
    }
}

#[test]
fn coordinate_bounds_are_inclusive() {
    assert!(Location::new(0.0, 0.0).is_valid());
    assert!(Location::new(90.0, 180.0).is_valid());
    assert!(Location::new(-90.0, -180.0).is_valid());
}

#[test]
fn out_of_range_coordinates_are_rejected() {
    let cases = [
        Location::new(90.1, 0.0),
        Location::new(-90.1, 0.0),
        Location::new(0.0, 180.5),
        Location::new(0.0, -181.0),
        Location::new(f64::NAN, 0.0),
        Location::new(0.0, f64::INFINITY),
    ];

    for location in cases.iter() {
        let err = location.validate().unwrap_err();
        assert_eq!(err.code, Error::invalid_coordinates().code);
    }
}

#[test]
fn address_is_optional_in_json() {
    let location: Location = serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5}"#).unwrap();
    assert_eq!(location, Location::new(1.5, 2.5));

    let location: Location =
        serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5, "address": "Main St"}"#).unwrap();
    assert_eq!(location.address.as_deref(), Some("Main St"));

    let json = serde_json::to_value(Location::new(0.0, 0.0)).unwrap();
    assert!(json.get("address").is_none());
}
