//! 토큰 → 사용자 ID 검증.
//!
//! 세션 발급은 이 서비스 밖의 일입니다. 여기서는 이미 발급된 토큰을
//! 사용자 ID로 바꾸는 검증만 합니다.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// 불투명 토큰을 사용자 ID로 바꾸는 검증기.
pub trait IdentityVerifier: Send + Sync {
    /// 토큰 검증. 성공 시 사용자 ID.
    fn verify(&self, token: &str) -> Result<String, ApiError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// HS256 JWT 검증기.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, ApiError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {}", e)))?;
        Ok(data.claims.sub)
    }
}

/// 인증된 요청의 사용자 ID 추출기.
///
/// `Authorization: Bearer <token>` 헤더를 검증기로 확인합니다.
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".to_string()))?;

        state.verifier.verify(token).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn issue(secret: &str, sub: &str, exp: usize) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_user_id() {
        let verifier = JwtVerifier::new("test-secret");
        let token = issue("test-secret", "user-42", usize::MAX / 2);
        assert_eq!(verifier.verify(&token).unwrap(), "user-42");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = JwtVerifier::new("test-secret");
        let token = issue("other-secret", "user-42", usize::MAX / 2);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new("test-secret");
        let token = issue("test-secret", "user-42", 1_000);
        assert!(verifier.verify(&token).is_err());
    }
}
