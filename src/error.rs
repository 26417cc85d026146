use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

use crate::db::ONE_ACCEPTED_BID_INDEX;

// postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Internal,
    Storage,
    InvalidInput,
    NotFound,
    Forbidden,
    Conflict,
    Unauthenticated,
}

impl Error {
    fn new(code: i32, message: &str) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.code {
            2 => ErrorKind::Storage,
            100..=199 => ErrorKind::InvalidInput,
            200..=299 => ErrorKind::NotFound,
            300..=399 => ErrorKind::Forbidden,
            400..=499 => ErrorKind::Conflict,
            500..=599 => ErrorKind::Unauthenticated,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_forbidden(&self) -> bool {
        self.kind() == ErrorKind::Forbidden
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn env_var_error() -> Self {
        Self::new(1, "environment variable error")
    }

    pub fn database_error() -> Self {
        Self::new(2, "database error")
    }

    pub fn reqwest_error() -> Self {
        Self::new(3, "reqwest error")
    }

    pub fn upstream_error() -> Self {
        Self::new(4, "upstream error")
    }

    pub fn unexpected_error() -> Self {
        Self::new(5, "unexpected error")
    }

    pub fn policy_error() -> Self {
        Self::new(6, "policy evaluation error")
    }

    pub fn config_error() -> Self {
        Self::new(7, "invalid configuration")
    }

    pub fn webhook_rejected() -> Self {
        Self::new(8, "event rejected by webhook")
    }

    pub fn invalid_coordinates() -> Self {
        Self::new(100, "invalid coordinates")
    }

    pub fn invalid_price() -> Self {
        Self::new(101, "invalid price")
    }

    pub fn invalid_status_target() -> Self {
        Self::new(102, "invalid status target")
    }

    pub fn ride_not_found() -> Self {
        Self::new(200, "ride not found")
    }

    pub fn bid_not_found() -> Self {
        Self::new(201, "bid not found")
    }

    pub fn not_passenger() -> Self {
        Self::new(300, "caller is not the passenger of this ride")
    }

    pub fn forbidden() -> Self {
        Self::new(301, "forbidden")
    }

    pub fn ride_not_open_for_bidding() -> Self {
        Self::new(400, "ride is not open for bidding")
    }

    pub fn invalid_status() -> Self {
        Self::new(401, "invalid status")
    }

    pub fn unauthenticated() -> Self {
        Self::new(500, "missing or invalid caller identity")
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(_: env::VarError) -> Self {
        Self::env_var_error()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // the accepted-bid unique index only fires when two accepts interleave
        let is_second_acceptance = err.as_database_error().map_or(false, |db_err| {
            db_err.code().map_or(false, |code| code == UNIQUE_VIOLATION)
                && db_err.constraint() == Some(ONE_ACCEPTED_BID_INDEX)
        });

        if is_second_acceptance {
            return Self::ride_not_open_for_bidding();
        }

        tracing::error!("database error: {:?}", err);
        Self::database_error()
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        tracing::warn!("reqwest error: {:?}", err);
        Self::reqwest_error()
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        tracing::error!("oso error: {:?}", err);
        Self::policy_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.kind() {
            ErrorKind::Internal | ErrorKind::Storage => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, self.message.as_str()),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.message.as_str()),
            ErrorKind::Forbidden => (StatusCode::FORBIDDEN, self.message.as_str()),
            ErrorKind::Conflict => (StatusCode::CONFLICT, self.message.as_str()),
            ErrorKind::Unauthenticated => (StatusCode::UNAUTHORIZED, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[test]
fn error_kinds_follow_code_ranges() {
    assert_eq!(Error::database_error().kind(), ErrorKind::Storage);
    assert_eq!(Error::unexpected_error().kind(), ErrorKind::Internal);
    assert_eq!(Error::invalid_price().kind(), ErrorKind::InvalidInput);
    assert_eq!(Error::bid_not_found().kind(), ErrorKind::NotFound);
    assert_eq!(Error::not_passenger().kind(), ErrorKind::Forbidden);
    assert_eq!(Error::invalid_status().kind(), ErrorKind::Conflict);
    assert_eq!(Error::unauthenticated().kind(), ErrorKind::Unauthenticated);
}

#[test]
fn conflict_is_distinguishable_from_not_found_and_forbidden() {
    let err = Error::ride_not_open_for_bidding();

    assert!(err.is_conflict());
    assert!(!err.is_not_found());
    assert!(!err.is_forbidden());
}

#[test]
fn error_status_codes() {
    assert_eq!(
        Error::invalid_coordinates().into_response().status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        Error::ride_not_found().into_response().status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        Error::forbidden().into_response().status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        Error::invalid_status().into_response().status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        Error::database_error().into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        Error::unauthenticated().into_response().status(),
        StatusCode::UNAUTHORIZED
    );
}

#[cfg(test)]
#[derive(Debug)]
struct UniqueViolation {
    constraint: &'static str,
}

#[cfg(test)]
impl Display for UniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.constraint)
    }
}

#[cfg(test)]
impl std::error::Error for UniqueViolation {}

#[cfg(test)]
impl sqlx::error::DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
        Some(UNIQUE_VIOLATION.into())
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.constraint)
    }
}

#[test]
fn only_the_accepted_bid_index_maps_to_conflict() {
    let err: Error = sqlx::Error::Database(Box::new(UniqueViolation {
        constraint: ONE_ACCEPTED_BID_INDEX,
    }))
    .into();
    assert!(err.is_conflict());

    let err: Error = sqlx::Error::Database(Box::new(UniqueViolation {
        constraint: "bids_pkey",
    }))
    .into();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[test]
fn row_not_found_is_a_storage_error() {
    let err: Error = sqlx::Error::RowNotFound.into();

    assert_eq!(err.kind(), ErrorKind::Storage);
}
