use crate::error::ApiError;
use crate::AppState;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use scavcore::{hash_token, ApiKey, ApiKeyStore, ApiKeyVerifier};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Check a client's `X-API-Key` against the stored key hashes
pub async fn verify_api_key(req: &HttpRequest, keys: &dyn ApiKeyStore) -> Result<(), ApiError> {
    let token = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingApiKey)?;

    let stored = keys.api_keys().await?;
    if ApiKeyVerifier::new(&stored).verify(token) {
        Ok(())
    } else {
        tracing::warn!(peer = ?req.peer_addr(), "Rejected connection with unknown api key");
        Err(ApiError::IncorrectApiKey)
    }
}

/// Check the operator bearer token. Open when no token is configured.
pub fn verify_operator(req: &HttpRequest, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(ApiError::Unauthorized)?;

    // Compare digests so the check takes the same time for any input
    if ApiKey::from_token(expected).matches(&hash_token(presented)) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Extractor that admits only operators
pub struct Operator;

impl FromRequest for Operator {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let expected = req
            .app_data::<web::Data<AppState>>()
            .and_then(|state| state.admin_token.as_deref());
        ready(verify_operator(req, expected).map(|_| Operator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_operator_open_without_token() {
        let req = TestRequest::default().to_http_request();
        assert!(verify_operator(&req, None).is_ok());
    }

    #[test]
    fn test_operator_requires_matching_bearer() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer s3cret"))
            .to_http_request();
        assert!(verify_operator(&req, Some("s3cret")).is_ok());
        assert!(matches!(
            verify_operator(&req, Some("other")),
            Err(ApiError::Unauthorized)
        ));

        let bare = TestRequest::default().to_http_request();
        assert!(matches!(
            verify_operator(&bare, Some("s3cret")),
            Err(ApiError::Unauthorized)
        ));
    }
}
