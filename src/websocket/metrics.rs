use crate::server::SignalRelay;
use axum::extract::{Extension, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use std::sync::Arc;

use crate::config::SecurityConfig;

/// Access policy for the metrics endpoint, attached to the router as an extension.
#[derive(Debug, Clone, Default)]
pub enum MetricsAccess {
    #[default]
    Open,
    Bearer(Arc<str>),
    /// Auth is required but no usable token is configured; every request is refused.
    Denied,
}

impl MetricsAccess {
    #[must_use]
    pub fn bearer(token: impl Into<Arc<str>>) -> Self {
        Self::Bearer(token.into())
    }

    #[must_use]
    pub fn from_config(security: &SecurityConfig) -> Self {
        if !security.require_metrics_auth {
            return Self::Open;
        }

        match security.metrics_auth_token.as_deref() {
            Some(token) if !token.is_empty() => Self::bearer(token),
            _ => {
                tracing::warn!(
                    "Metrics authentication required but no token configured, refusing all metrics requests"
                );
                Self::Denied
            }
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        let expected = match self {
            Self::Open => return Ok(()),
            Self::Bearer(token) => token.as_ref(),
            Self::Denied => {
                tracing::warn!("Unauthorized metrics access attempt: no token configured");
                return Err(StatusCode::UNAUTHORIZED);
            }
        };

        let Some(raw_header) = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
        else {
            tracing::warn!("Unauthorized metrics access attempt: missing Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        };

        let Some(token) = raw_header.strip_prefix("Bearer ") else {
            tracing::warn!("Unauthorized metrics access attempt: invalid Authorization scheme");
            return Err(StatusCode::UNAUTHORIZED);
        };

        if token == expected {
            tracing::debug!("Metrics access authorized via bearer token");
            Ok(())
        } else {
            tracing::warn!("Unauthorized metrics access attempt: token rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Metrics endpoint: relay counters plus the live registry size.
pub async fn metrics_handler(
    headers: HeaderMap,
    State(relay): State<Arc<SignalRelay>>,
    Extension(access): Extension<MetricsAccess>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    access.authorize(&headers)?;

    let snapshot = relay.metrics().snapshot();
    Ok(Json(serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "registeredConnections": relay.connection_count(),
        "maxConnections": relay.config().max_connections,
        "relayMetrics": snapshot,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security(require: bool, token: Option<&str>) -> SecurityConfig {
        SecurityConfig {
            require_metrics_auth: require,
            metrics_auth_token: token.map(str::to_string),
            ..SecurityConfig::default()
        }
    }

    fn with_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn required_auth_without_token_refuses_everything() {
        for token in [None, Some("")] {
            let access = MetricsAccess::from_config(&security(true, token));
            assert!(matches!(access, MetricsAccess::Denied));
            assert_eq!(
                access.authorize(&HeaderMap::new()),
                Err(StatusCode::UNAUTHORIZED)
            );
            assert_eq!(
                access.authorize(&with_bearer("")),
                Err(StatusCode::UNAUTHORIZED)
            );
        }
    }

    #[test]
    fn token_is_ignored_when_auth_not_required() {
        let access = MetricsAccess::from_config(&security(false, Some("secret")));
        assert!(access.authorize(&HeaderMap::new()).is_ok());
    }

    #[test]
    fn bearer_policy_checks_scheme_and_token() {
        let access = MetricsAccess::from_config(&security(true, Some("secret")));
        assert!(access.authorize(&with_bearer("secret")).is_ok());
        assert_eq!(
            access.authorize(&with_bearer("other")),
            Err(StatusCode::UNAUTHORIZED)
        );

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, "Basic secret".parse().unwrap());
        assert_eq!(access.authorize(&basic), Err(StatusCode::UNAUTHORIZED));
    }
}
