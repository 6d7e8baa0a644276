use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use crate::constants::SESSION_COOKIE;

use super::jwt::{verify_jwt_session, SessionData};

#[derive(Debug)]
struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Requires a valid session cookie.
pub fn with_session(
    secret: Arc<[u8]>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::cookie::<String>(SESSION_COOKIE).and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            match verify_jwt_session(session, &secret) {
                Ok(data) => Ok(SessionData::from(data)),
                Err(_) => Err(warp::reject::custom(Unauthorized)),
            }
        }
    })
}

/// Anonymous requests, and requests with an invalid cookie, pass through as `None`.
pub fn with_possible_session(
    secret: Arc<[u8]>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).and_then(move |session: Option<String>| {
        let session = session
            .and_then(|session| verify_jwt_session(session, &secret).ok())
            .map(SessionData::from);
        async move { Ok::<_, Rejection>(session) }
    })
}
