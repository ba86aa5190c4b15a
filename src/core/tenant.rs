//! Tenant and actor resolution for incoming requests.

use axum::extract::FromRequestParts;
use axum::http::header::HeaderMap;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::config::TenantConfig;
use crate::core::shared::state::AppState;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("Tenant context required")]
    Missing,
    #[error("Invalid tenant ID format: {0}")]
    InvalidFormat(String),
}

impl IntoResponse for TenantError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Tenant the request is scoped to, plus the acting user when the
/// upstream identity proxy supplied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
}

pub fn resolve_tenant(headers: &HeaderMap, config: &TenantConfig) -> Result<TenantContext, TenantError> {
    let tenant_id = match headers.get(config.header_name.as_str()) {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| TenantError::InvalidFormat("Header value is not valid UTF-8".to_string()))?
                .trim();
            if raw.is_empty() {
                config.default_tenant.ok_or(TenantError::Missing)?
            } else {
                raw.parse::<Uuid>()
                    .map_err(|_| TenantError::InvalidFormat(format!("'{raw}' is not a valid UUID")))?
            }
        }
        None => config.default_tenant.ok_or(TenantError::Missing)?,
    };

    let user_id = headers
        .get(config.user_header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<Uuid>().ok());

    Ok(TenantContext { tenant_id, user_id })
}

impl FromRequestParts<Arc<AppState>> for TenantContext {
    type Rejection = TenantError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_tenant(&parts.headers, &state.config.tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const TENANT: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_header_tenant_with_whitespace() {
        let ctx = resolve_tenant(&headers(&[("X-Tenant-ID", &format!("  {TENANT} "))]), &TenantConfig::default()).unwrap();
        assert_eq!(ctx.tenant_id.to_string(), TENANT);
        assert_eq!(ctx.user_id, None);
    }

    #[test]
    fn test_missing_tenant_without_default() {
        let result = resolve_tenant(&HeaderMap::new(), &TenantConfig::default());
        assert_eq!(result, Err(TenantError::Missing));
    }

    #[test]
    fn test_missing_tenant_falls_back_to_default() {
        let default = Uuid::new_v4();
        let config = TenantConfig {
            default_tenant: Some(default),
            ..TenantConfig::default()
        };
        let ctx = resolve_tenant(&HeaderMap::new(), &config).unwrap();
        assert_eq!(ctx.tenant_id, default);
    }

    #[test]
    fn test_invalid_tenant_rejected() {
        let result = resolve_tenant(&headers(&[("X-Tenant-ID", "not-a-uuid")]), &TenantConfig::default());
        assert!(matches!(result, Err(TenantError::InvalidFormat(_))));
    }

    #[test]
    fn test_user_header_is_optional_and_lenient() {
        let user = Uuid::new_v4();
        let ctx = resolve_tenant(
            &headers(&[("X-Tenant-ID", TENANT), ("X-User-ID", &user.to_string())]),
            &TenantConfig::default(),
        )
        .unwrap();
        assert_eq!(ctx.user_id, Some(user));

        let ctx = resolve_tenant(
            &headers(&[("X-Tenant-ID", TENANT), ("X-User-ID", "garbage")]),
            &TenantConfig::default(),
        )
        .unwrap();
        assert_eq!(ctx.user_id, None);
    }
}
