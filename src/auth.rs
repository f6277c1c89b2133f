use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub exp: usize,
}

/// Password hashing and bearer tokens.
#[derive(Clone)]
pub struct Auth {
    secret: String,
    cost: u32,
    token_ttl: Duration,
}

impl Auth {
    pub fn new(secret: impl Into<String>) -> Self {
        Auth {
            secret: secret.into(),
            cost: bcrypt::DEFAULT_COST,
            token_ttl: Duration::days(7),
        }
    }

    /// Lower bcrypt cost, for tests.
    #[must_use]
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    pub fn issue_token(&self, user_id: &str, name: &str) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(self.token_ttl)
            .ok_or_else(|| ChatError::Internal("token expiry overflow".to_string()))?
            .timestamp();

        let claims = Claims {
            sub: user_id.to_owned(),
            name: name.to_owned(),
            exp: usize::try_from(expiration).unwrap_or(usize::MAX),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn passwords_round_trip() {
        let auth = Auth::new("secret").with_cost(TEST_COST);
        let hash = auth.hash_password("hunter2").unwrap();
        assert!(auth.verify_password("hunter2", &hash));
        assert!(!auth.verify_password("hunter3", &hash));
        assert!(!auth.verify_password("hunter2", "not-a-hash"));
    }

    #[test]
    fn tokens_are_bound_to_the_secret() {
        let auth = Auth::new("secret");
        let token = auth.issue_token("u1", "alice").unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.name, "alice");

        let other = Auth::new("other-secret");
        assert!(matches!(other.verify_token(&token), Err(ChatError::Unauthorized)));
        assert!(matches!(auth.verify_token("garbage"), Err(ChatError::Unauthorized)));
    }
}
