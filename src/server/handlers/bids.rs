use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{Bid, Ride};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    price: f64,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(ride_id): Path<Uuid>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api.place_bid(user, ride_id, params.price).await?;

    Ok(bid.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.list_bids(user, ride_id).await?;

    Ok(bids.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path((ride_id, bid_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Ride>, Error> {
    let ride = api.accept_bid(user, ride_id, bid_id).await?;

    Ok(ride.into())
}
