//! Authorization seam.
//!
//! Authentication itself is an external collaborator; services only consume
//! an opaque "caller is authorized" predicate.

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tally_core::AppError;

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Verify the caller's token. `Err(Unauthorized)` on rejection.
    async fn authorize(&self, token: &str) -> Result<(), AppError>;
}

/// Compares the presented token against a configured secret in constant time.
pub struct StaticTokenAuthorizer {
    token: String,
}

impl StaticTokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn authorize(&self, token: &str) -> Result<(), AppError> {
        let expected = self.token.as_bytes();
        let presented = token.as_bytes();

        let ok = expected.len() == presented.len() && expected.ct_eq(presented).into();
        if ok {
            Ok(())
        } else {
            Err(AppError::Unauthorized("Invalid API token".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_accepts_match() {
        let auth = StaticTokenAuthorizer::new("secret-token");
        assert!(auth.authorize("secret-token").await.is_ok());
    }

    #[tokio::test]
    async fn test_static_token_rejects_mismatch() {
        let auth = StaticTokenAuthorizer::new("secret-token");
        assert!(matches!(
            auth.authorize("wrong").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(auth.authorize("secret-token ").await.is_err());
        assert!(auth.authorize("").await.is_err());
    }
}
