// Request identity context
//
// Authentication lives upstream; by the time a request reaches this core
// the gateway has already resolved the caller and stamps the tenancy tuple
// onto the request as headers. This extractor only parses and propagates
// it.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const RESTAURANT_HEADER: &str = "x-restaurant-id";
pub const USER_HEADER: &str = "x-user-id";

/// The tenancy tuple every cart and order operation is keyed by.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub restaurant_id: Uuid,
    pub user_id: Uuid,
}

fn header_uuid(parts: &Parts, name: &'static str) -> Result<Uuid, ApiError> {
    let raw = parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::MissingContext(format!("missing {} header", name)))?;
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::MissingContext(format!("{} header is not a valid UUID", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(TenantContext {
            tenant_id: header_uuid(parts, TENANT_HEADER)?,
            restaurant_id: header_uuid(parts, RESTAURANT_HEADER)?,
            user_id: header_uuid(parts, USER_HEADER)?,
        })
    }
}
