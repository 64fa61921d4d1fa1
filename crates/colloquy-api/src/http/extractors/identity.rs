//! Caller identity extractor.
//!
//! Identity is asserted by the upstream gateway through headers:
//! - `X-User-ID`: absent or blank means guest
//! - `X-Plan-ID`: absent means `free` for accounts, `visitor` for guests
//! - `X-User-Role`: passed through
//!
//! Guests may also carry their session id in the `session_id` cookie.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use colloquy_types::identity::Caller;
use colloquy_types::tier::PlanTier;

use crate::http::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const PLAN_ID_HEADER: &str = "x-plan-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const SESSION_COOKIE: &str = "session_id";

/// The resolved caller of a request.
pub struct Identity(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(Identity)
    }
}

fn header(headers: &HeaderMap, name: &str) -> Result<Option<String>, AppError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AppError::Validation(format!("Invalid {name} header encoding")))?
                .trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
    }
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, AppError> {
    let user_id = header(headers, USER_ID_HEADER)?;
    let role = header(headers, USER_ROLE_HEADER)?;
    let plan_id = header(headers, PLAN_ID_HEADER)?.unwrap_or_else(|| {
        if user_id.is_some() {
            Caller::DEFAULT_ACCOUNT_PLAN.to_string()
        } else {
            PlanTier::Visitor.as_str().to_string()
        }
    });

    Ok(Caller {
        user_id,
        role,
        plan_id: Some(plan_id),
    })
}

/// The `session_id` cookie, if present and non-empty.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value handing a guest their session id.
pub fn session_cookie_header(session_id: &str, max_age_secs: u64) -> String {
    format!(
        "{SESSION_COOKIE}={session_id}; Path=/; Max-Age={max_age_secs}; HttpOnly; Secure; SameSite=Lax"
    )
}
