mod bid;
mod location;
mod ride;

pub use bid::{validate_price, Bid, Status as BidStatus};
pub use location::Location;
pub use ride::{Ride, Status as RideStatus, Transition};

use chrono::{DateTime, SubsecRound, Utc};

// postgres TIMESTAMPTZ keeps microseconds
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
