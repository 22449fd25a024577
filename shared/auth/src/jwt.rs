use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use mentorbook_common::{AppError, JwtConfig};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub token_type: TokenKind,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user_id: Uuid, username: String, token_type: TokenKind, lifetime: Duration, issuer: &str) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id.to_string(),
            username,
            token_type,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            iss: issuer.to_string(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| AppError::Authentication(format!("Invalid user ID in token: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    issuer: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_ref()),
            decoding_key: DecodingKey::from_secret(config.secret.as_ref()),
            validation,
            access_lifetime: Duration::hours(config.expiration_hours as i64),
            refresh_lifetime: Duration::hours(config.refresh_expiration_hours as i64),
            issuer: config.issuer.clone(),
        }
    }

    pub fn generate_token(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn issue_pair(&self, user_id: Uuid, username: &str) -> Result<TokenPair, AppError> {
        let access = Claims::new(user_id, username.to_string(), TokenKind::Access, self.access_lifetime, &self.issuer);
        let refresh = Claims::new(user_id, username.to_string(), TokenKind::Refresh, self.refresh_lifetime, &self.issuer);

        Ok(TokenPair {
            access: self.generate_token(&access)?,
            refresh: self.generate_token(&refresh)?,
            expires_at: Utc::now() + self.access_lifetime,
        })
    }

    /// Decodes `token` and checks it was minted for `expected` use.
    pub fn validate_token(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

        if claims.token_type != expected {
            return Err(AppError::Authentication("Token has wrong type".to_string()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_hours: 1,
            refresh_expiration_hours: 24,
            issuer: "mentorbook-test".to_string(),
        }
    }

    #[test]
    fn issued_pair_validates_by_kind() {
        let service = JwtService::new(&config());
        let user_id = Uuid::new_v4();
        let pair = service.issue_pair(user_id, "alice").unwrap();

        let access = service.validate_token(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(access.user_id().unwrap(), user_id);
        assert_eq!(access.username, "alice");

        assert!(service.validate_token(&pair.access, TokenKind::Refresh).is_err());
        assert!(service.validate_token(&pair.refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let service = JwtService::new(&config());
        let other = JwtService::new(&JwtConfig {
            secret: "another-secret".to_string(),
            ..config()
        });
        let pair = other.issue_pair(Uuid::new_v4(), "mallory").unwrap();

        let err = service.validate_token(&pair.access, TokenKind::Access).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new(&config());
        let claims = Claims::new(
            Uuid::new_v4(),
            "bob".to_string(),
            TokenKind::Access,
            Duration::hours(-2),
            "mentorbook-test",
        );
        let token = service.generate_token(&claims).unwrap();

        assert!(service.validate_token(&token, TokenKind::Access).is_err());
    }
}
