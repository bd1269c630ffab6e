use crate::core::constants::AUTH_TOKEN_DURATION_MS;
use crate::core::signer::WalletSigner;
use crate::error::{PaymentsSdkError, Result};
use crate::store::tokens::AuthTokenStore;
use crate::types::AuthToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The rollup's signed-message handshake. Implementations ask the wallet to
/// sign the rollup's challenge and return the issued bearer token.
#[async_trait]
pub trait RollupAuthenticator: Send + Sync {
    async fn request_token(&self, endpoint: &str, wallet: &dyn WalletSigner) -> Result<String>;
}

#[derive(Deserialize)]
struct ChallengeResponse {
    challenge: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    pubkey: String,
    challenge: &'a str,
    /// base58 signature of the challenge's UTF-8 bytes
    signature: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
    error: Option<String>,
}

/// Challenge/login handshake against the rollup's `/auth` routes.
#[derive(Default)]
pub struct HttpRollupAuthenticator {
    client: reqwest::Client,
}

impl HttpRollupAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }
}

fn http_error(stage: &str, e: reqwest::Error) -> PaymentsSdkError {
    PaymentsSdkError::Connection(format!("rollup {}: {}", stage, e))
}

#[async_trait]
impl RollupAuthenticator for HttpRollupAuthenticator {
    async fn request_token(&self, endpoint: &str, wallet: &dyn WalletSigner) -> Result<String> {
        let base = endpoint.trim_end_matches('/');
        let owner = wallet.pubkey();

        let challenge: ChallengeResponse = self
            .client
            .get(format!("{}/auth/challenge?pubkey={}", base, owner))
            .send()
            .await
            .map_err(|e| http_error("challenge", e))?
            .json()
            .await
            .map_err(|e| http_error("challenge", e))?;
        let challenge = challenge.challenge.ok_or_else(|| {
            PaymentsSdkError::Connection(format!(
                "rollup refused a challenge: {}",
                challenge.error.unwrap_or_default()
            ))
        })?;
        debug!(%owner, "rollup challenge received");

        let signature = wallet
            .sign_message(challenge.as_bytes())
            .await
            .map_err(PaymentsSdkError::Signing)?;
        let request = LoginRequest {
            pubkey: owner.to_string(),
            challenge: &challenge,
            signature: signature.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/auth/login", base))
            .json(&request)
            .send()
            .await
            .map_err(|e| http_error("login", e))?;
        let status = response.status();
        let login: LoginResponse = response.json().await.map_err(|e| http_error("login", e))?;
        if !status.is_success() {
            warn!(%owner, %status, "rollup login rejected");
            return Err(PaymentsSdkError::Connection(format!(
                "rollup login failed ({}): {}",
                status,
                login.error.unwrap_or_default()
            )));
        }
        Ok(login.token.unwrap_or_default())
    }
}

/// Obtains, caches and checks rollup authorization per owner.
pub struct AuthManager {
    endpoint: String,
    store: Arc<dyn AuthTokenStore>,
    authenticator: Option<Arc<dyn RollupAuthenticator>>,
}

impl AuthManager {
    pub fn new(endpoint: impl ToString, store: Arc<dyn AuthTokenStore>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            store,
            authenticator: None,
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn RollupAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn store(&self) -> &Arc<dyn AuthTokenStore> {
        &self.store
    }

    /// Run the handshake for the wallet's owner and cache the token.
    pub async fn authenticate(&self, wallet: &dyn WalletSigner) -> Result<AuthToken> {
        let owner = wallet.pubkey();
        let authenticator = self.authenticator.as_ref().ok_or_else(|| {
            PaymentsSdkError::Config("no rollup authenticator configured".to_string())
        })?;

        // Expiry counts from before the handshake
        let expires_at = chrono::Utc::now().timestamp_millis() + AUTH_TOKEN_DURATION_MS;
        let token = authenticator.request_token(&self.endpoint, wallet).await?;
        if token.is_empty() {
            warn!(%owner, "rollup returned an empty token");
            return Err(PaymentsSdkError::NotAuthenticated(owner));
        }

        let token = AuthToken { token, expires_at };
        self.store.set(&owner, token.clone()).await?;
        info!(%owner, expires_at, "rollup authenticated");
        Ok(token)
    }

    pub async fn logout(&self, owner: &Pubkey) -> Result<()> {
        self.store.remove(owner).await?;
        info!(%owner, "rollup token removed");
        Ok(())
    }

    /// The owner's token when present and not yet expired.
    pub async fn token_for(&self, owner: &Pubkey) -> Result<Option<AuthToken>> {
        Ok(self.store.get(owner).await?.filter(AuthToken::is_valid))
    }

    pub async fn is_authenticated(&self, owner: &Pubkey) -> Result<bool> {
        Ok(self.token_for(owner).await?.is_some())
    }

    pub async fn require(&self, owner: &Pubkey) -> Result<AuthToken> {
        self.token_for(owner)
            .await?
            .ok_or(PaymentsSdkError::NotAuthenticated(*owner))
    }
}
