use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ListParams;
use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::{Location, Ride, RideStatus};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    from: Location,
    to: Location,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateStatusParams {
    status: String,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<CreateParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.create_ride(user, params.from, params.to).await?;

    Ok(ride.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.find_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn update_status(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateStatusParams>,
) -> Result<Json<Ride>, Error> {
    let status: RideStatus = params.status.parse()?;
    let ride = api.update_ride_status(user, id, status).await?;

    Ok(ride.into())
}

pub async fn list_all(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Ride>>, Error> {
    let rides = api.list_all_rides(user, params.limit).await?;

    Ok(rides.into())
}

pub async fn list_open(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Ride>>, Error> {
    let rides = api.list_open_rides(user, params.limit).await?;

    Ok(rides.into())
}

pub async fn list_by_passenger(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Ride>>, Error> {
    let rides = api.list_passenger_rides(user, id, params.limit).await?;

    Ok(rides.into())
}

pub async fn list_by_driver(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Ride>>, Error> {
    let rides = api.list_driver_rides(user, id, params.limit).await?;

    Ok(rides.into())
}
