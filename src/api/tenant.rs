//! Tenant context extraction.
//!
//! The upstream identity service authenticates the caller and forwards the
//! owning tenant in the `x-tenant-id` header; this service only consumes
//! it. Every read and mutation is scoped by the extracted tenant.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// The tenant a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantId(pub Uuid);

impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_HEADER)
            .ok_or_else(|| AppError::Auth("missing tenant context".to_string()))?;

        let raw = value
            .to_str()
            .map_err(|_| AppError::Auth("malformed tenant header".to_string()))?;

        let tenant_id = raw
            .parse::<Uuid>()
            .map_err(|_| AppError::Auth("malformed tenant id".to_string()))?;

        Ok(TenantId(tenant_id))
    }
}
