use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String, // user_id
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct TokenService;

impl TokenService {
    pub fn create_access_token(
        user_id: Uuid,
        username: &str,
        secret: &str,
        ttl_min: i64,
    ) -> String {
        let now = Utc::now();
        let exp = now + Duration::minutes(ttl_min);

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("Failed to encode access token")
    }

    pub fn verify_access_token(token: &str, secret: &str) -> Option<AccessTokenClaims> {
        decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .ok()
    }
}
