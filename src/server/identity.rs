use axum::{
    async_trait,
    extract::{FromRequest, RequestParts},
    http::HeaderMap,
};
use uuid::Uuid;

use crate::auth::{Role, User};
use crate::error::Error;

/// Set by the gateway after it has authenticated the caller.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub fn user_from_headers(headers: &HeaderMap) -> Result<User, Error> {
    let id = header(headers, USER_ID_HEADER)
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| Error::unauthenticated())?;

    let role: Role = header(headers, USER_ROLE_HEADER)
        .ok_or_else(|| Error::unauthenticated())?
        .trim()
        .parse()?;

    Ok(User::new(id, role))
}

#[async_trait]
impl<B> FromRequest<B> for User
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        user_from_headers(req.headers())
    }
}

#[cfg(test)]
fn headers_with(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.insert(*name, value.parse().unwrap());
    }
    headers
}

#[test]
fn identity_is_read_from_headers() {
    let id = Uuid::new_v4();
    let headers = headers_with(&[
        (USER_ID_HEADER, &id.to_string()),
        (USER_ROLE_HEADER, "driver"),
    ]);

    let user = user_from_headers(&headers).unwrap();

    assert_eq!(user.id, id);
    assert_eq!(user.role, Role::Driver);
}

#[test]
fn missing_or_malformed_identity_is_unauthenticated() {
    let id = Uuid::new_v4().to_string();

    let cases = [
        headers_with(&[]),
        headers_with(&[(USER_ID_HEADER, &id)]),
        headers_with(&[(USER_ID_HEADER, "not-a-uuid"), (USER_ROLE_HEADER, "passenger")]),
        headers_with(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "system")]),
    ];

    for headers in cases.iter() {
        let err = user_from_headers(headers).unwrap_err();
        assert_eq!(err.code, Error::unauthenticated().code);
    }
}
