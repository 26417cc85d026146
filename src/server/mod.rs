mod handlers;
mod identity;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::api::{DynAPI, API};
use crate::error::Error;
use crate::server::handlers::{bids, rides};

pub use identity::{USER_ID_HEADER, USER_ROLE_HEADER};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/rides", post(rides::create).get(rides::list_all))
        .route("/open_rides", get(rides::list_open))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/status", patch(rides::update_status))
        .route("/rides/:id/bids", post(bids::create).get(bids::list))
        .route("/rides/:id/bids/:bid_id/accept", patch(bids::accept))
        .route("/passengers/:id/rides", get(rides::list_by_passenger))
        .route("/drivers/:id/rides", get(rides::list_by_driver))
        .layer(Extension(api))
}

pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    let api = Arc::new(api) as DynAPI;

    let app = router(api);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|err| {
            tracing::error!("server error: {}", err);
            Error::unexpected_error()
        })
}
