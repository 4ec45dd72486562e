//! Form tokens tying each submission to the session that rendered the form.
//!
//! A token is `nonce.signature`: the nonce lives in the session and the
//! signature is an HMAC-SHA256 of the nonce keyed with the app secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use sha2::Sha256;
use std::sync::Arc;
use tower_sessions::Session;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SESSION_NONCE_KEY: &str = "csrf_nonce";

#[derive(Clone)]
pub struct CsrfGuard {
    secret: Arc<Secret<String>>,
}

impl CsrfGuard {
    pub fn new(secret: Secret<String>) -> Self {
        Self {
            secret: Arc::new(secret),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid CSRF key: {}", e)))
    }

    pub fn sign(&self, nonce: &str) -> Result<String, AppError> {
        let mut mac = self.mac()?;
        mac.update(nonce.as_bytes());
        Ok(format!(
            "{}.{}",
            nonce,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Check a token's signature and that its nonce is `expected_nonce`.
    pub fn verify_token(&self, token: &str, expected_nonce: &str) -> bool {
        let Some((nonce, signature)) = token.split_once('.') else {
            return false;
        };
        if nonce != expected_nonce {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(nonce.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }

    /// Token for a form about to be rendered. Reuses the session's nonce so
    /// several open tabs stay valid.
    pub async fn issue(&self, session: &Session) -> Result<String, AppError> {
        let existing: Option<String> = session
            .get(SESSION_NONCE_KEY)
            .await
            .map_err(|e| AppError::SessionError(e.to_string()))?;

        let nonce = match existing {
            Some(nonce) => nonce,
            None => {
                let nonce = Uuid::new_v4().simple().to_string();
                session
                    .insert(SESSION_NONCE_KEY, &nonce)
                    .await
                    .map_err(|e| AppError::SessionError(e.to_string()))?;
                nonce
            }
        };

        self.sign(&nonce)
    }

    /// Reject a submission whose token does not match this session.
    pub async fn verify(&self, session: &Session, token: &str) -> Result<(), AppError> {
        let nonce: Option<String> = session
            .get(SESSION_NONCE_KEY)
            .await
            .map_err(|e| AppError::SessionError(e.to_string()))?;

        match nonce {
            Some(nonce) if self.verify_token(token, &nonce) => Ok(()),
            _ => {
                tracing::warn!("Rejected form submission with invalid CSRF token");
                Err(AppError::Forbidden(anyhow::anyhow!(
                    "The form has expired or is invalid; reload the page and try again"
                )))
            }
        }
    }
}
