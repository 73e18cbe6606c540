//! Device token extractor for the push endpoint.

use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::convert::Infallible;

/// Header carrying a device token.
pub const DEVICE_TOKEN_HEADER: &str = "x-device-token";

/// Token presented by a pushing device, if any.
///
/// Looked up, in order, in the `token` query parameter, an
/// `Authorization: Bearer` header and the `X-Device-Token` header.
#[derive(Debug, Clone, Default)]
pub struct DeviceToken(pub Option<String>);

impl DeviceToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for DeviceToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(params)| params.get("token").cloned());

        let from_bearer = || {
            parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
        };

        let from_header = || {
            parts
                .headers
                .get(DEVICE_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|t| t.trim().to_string())
        };

        let token = from_query
            .filter(|t| !t.is_empty())
            .or_else(|| from_bearer().filter(|t| !t.is_empty()))
            .or_else(|| from_header().filter(|t| !t.is_empty()));

        Ok(DeviceToken(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Option<String> {
        let (mut parts, _) = request.into_parts();
        DeviceToken::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn test_token_channels() {
        let query = Request::builder().uri("/osmand?id=a&token=q1").body(()).unwrap();
        assert_eq!(extract(query).await.as_deref(), Some("q1"));

        let bearer = Request::builder()
            .uri("/api/v1/push")
            .header("Authorization", "Bearer b2")
            .body(())
            .unwrap();
        assert_eq!(extract(bearer).await.as_deref(), Some("b2"));

        let header = Request::builder()
            .uri("/api/v1/push")
            .header("X-Device-Token", "h3")
            .body(())
            .unwrap();
        assert_eq!(extract(header).await.as_deref(), Some("h3"));
    }

    #[tokio::test]
    async fn test_query_wins_and_empty_is_absent() {
        let both = Request::builder()
            .uri("/osmand?token=q1")
            .header("X-Device-Token", "h3")
            .body(())
            .unwrap();
        assert_eq!(extract(both).await.as_deref(), Some("q1"));

        let empty = Request::builder().uri("/osmand?token=").body(()).unwrap();
        assert_eq!(extract(empty).await, None);
    }
}
