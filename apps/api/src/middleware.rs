use std::net::SocketAddr;
use std::str::FromStr;

use axum::extract::{ConnectInfo, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use cloudgate_application::RequestContext;
use cloudgate_core::{AppError, UserIdentity, UserRole};

use crate::error::{ApiError, ApiResult};

pub const SUBJECT_HEADER: &str = "x-authenticated-subject";
pub const ROLE_HEADER: &str = "x-authenticated-role";
pub const EMAIL_HEADER: &str = "x-authenticated-email";

/// Builds the caller identity from headers set by the upstream authenticating proxy.
pub async fn require_identity(mut request: Request, next: Next) -> ApiResult<Response> {
    let identity = identity_from_headers(request.headers())?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn identity_from_headers(headers: &HeaderMap) -> Result<UserIdentity, AppError> {
    let subject = header_value(headers, SUBJECT_HEADER)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    // A missing role header means the least privileged role.
    let role = match header_value(headers, ROLE_HEADER) {
        Some(role) => UserRole::from_str(role.as_str())
            .map_err(|_| AppError::Unauthorized(format!("unrecognized role '{role}'")))?,
        None => UserRole::Readonly,
    };

    Ok(UserIdentity::new(
        subject,
        header_value(headers, EMAIL_HEADER),
        role,
    ))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Transport metadata for audit entries.
#[derive(Debug, Clone)]
pub struct ClientContext(pub RequestContext);

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(address)| address.ip().to_string());

        Ok(Self(RequestContext {
            forwarded_for: header_value(&parts.headers, "x-forwarded-for"),
            real_ip: header_value(&parts.headers, "x-real-ip"),
            peer_addr,
            user_agent: header_value(&parts.headers, header::USER_AGENT.as_str()),
        }))
    }
}
