use actix_web::{http::header, HttpRequest};

use constant_time_eq::constant_time_eq;

use crate::errors::ServiceError;

/// Bearer token guarding read routes. `None` leaves them open.
#[derive(Debug, Clone, Default)]
pub struct AccessToken(pub Option<String>);

pub fn authorize(rq: &HttpRequest, access: &AccessToken) -> Result<(), ServiceError> {
    let expected = match &access.0 {
        Some(token) => token,
        None => return Ok(()),
    };

    bearer_token(rq)
        .and_then(|token| {
            if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
                Ok(())
            } else {
                Err("bad token")
            }
        })
        .map_err(|message| {
            log::debug!("rejected {} {}: {}", rq.method(), rq.path(), message);

            ServiceError::Unauthorized {
                message: message.into(),
            }
        })
}

fn bearer_token(rq: &HttpRequest) -> Result<&str, &'static str> {
    rq.headers()
        .get(header::AUTHORIZATION)
        .ok_or("missing Authorization header")?
        .to_str()
        .map_err(|_| "bad Authorization header")?
        .strip_prefix("Bearer ")
        .ok_or("bad Bearer token format")
}
