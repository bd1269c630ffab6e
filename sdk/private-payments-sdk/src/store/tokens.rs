//! Rollup authorization tokens, keyed by owner.
//!
//! Every change publishes the complete token map on a broadcast channel so
//! observers never have to re-read the store.

use crate::error::{PaymentsSdkError, Result};
use crate::store::write_atomically;
use crate::types::AuthToken;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

pub type TokenMap = BTreeMap<Pubkey, AuthToken>;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[async_trait]
pub trait AuthTokenStore: Send + Sync {
    async fn get(&self, owner: &Pubkey) -> Result<Option<AuthToken>>;

    async fn set(&self, owner: &Pubkey, token: AuthToken) -> Result<()>;

    async fn remove(&self, owner: &Pubkey) -> Result<()>;

    /// Receives the full map after every change.
    fn subscribe(&self) -> broadcast::Receiver<TokenMap>;
}

pub struct MemoryTokenStore {
    tokens: RwLock<TokenMap>,
    changes: broadcast::Sender<TokenMap>,
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::with_tokens(TokenMap::new())
    }
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenMap) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            tokens: RwLock::new(tokens),
            changes,
        }
    }

    async fn snapshot(&self) -> TokenMap {
        self.tokens.read().await.clone()
    }

    /// Apply `change`. Nothing is broadcast when the map is unchanged.
    async fn update(&self, change: impl FnOnce(&mut TokenMap)) {
        let mut tokens = self.tokens.write().await;
        let mut next = tokens.clone();
        change(&mut next);
        if next != *tokens {
            *tokens = next.clone();
            drop(tokens);
            // No receivers is fine
            let _ = self.changes.send(next);
        }
    }
}

#[async_trait]
impl AuthTokenStore for MemoryTokenStore {
    async fn get(&self, owner: &Pubkey) -> Result<Option<AuthToken>> {
        Ok(self.tokens.read().await.get(owner).cloned())
    }

    async fn set(&self, owner: &Pubkey, token: AuthToken) -> Result<()> {
        self.update(|tokens| {
            tokens.insert(*owner, token);
        })
        .await;
        Ok(())
    }

    async fn remove(&self, owner: &Pubkey) -> Result<()> {
        self.update(|tokens| {
            tokens.remove(owner);
        })
        .await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TokenMap> {
        self.changes.subscribe()
    }
}

/// [`MemoryTokenStore`] mirrored to a JSON file of base58 owner -> token.
///
/// Writers are serialized and the file is replaced atomically. Memory and
/// subscribers only see a change once it is on disk.
pub struct FileTokenStore {
    path: PathBuf,
    inner: MemoryTokenStore,
    writes: Mutex<()>,
}

impl FileTokenStore {
    /// Load `path`, starting empty when it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tokens = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse_token_file(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TokenMap::new(),
            Err(e) => {
                return Err(PaymentsSdkError::Store(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            },
        };
        debug!(path = %path.display(), owners = tokens.len(), "token store loaded");
        Ok(Self {
            path,
            inner: MemoryTokenStore::with_tokens(tokens),
            writes: Mutex::new(()),
        })
    }

    async fn apply(&self, change: impl FnOnce(&mut TokenMap) + Send) -> Result<()> {
        let _guard = self.writes.lock().await;
        let current = self.inner.snapshot().await;
        let mut next = current.clone();
        change(&mut next);
        if next == current {
            return Ok(());
        }

        let keyed: BTreeMap<String, &AuthToken> =
            next.iter().map(|(k, v)| (k.to_string(), v)).collect();
        let raw = serde_json::to_string_pretty(&keyed)
            .map_err(|e| PaymentsSdkError::Store(e.to_string()))?;
        write_atomically(&self.path, raw).await?;

        self.inner.update(|tokens| *tokens = next).await;
        Ok(())
    }
}

fn parse_token_file(raw: &str) -> Result<TokenMap> {
    let keyed: BTreeMap<String, AuthToken> =
        serde_json::from_str(raw).map_err(|e| PaymentsSdkError::Store(e.to_string()))?;
    let mut tokens = TokenMap::new();
    for (owner, token) in keyed {
        match Pubkey::from_str(&owner) {
            Ok(owner) => {
                tokens.insert(owner, token);
            },
            Err(e) => warn!(%owner, error = %e, "skipping malformed token entry"),
        }
    }
    Ok(tokens)
}

#[async_trait]
impl AuthTokenStore for FileTokenStore {
    async fn get(&self, owner: &Pubkey) -> Result<Option<AuthToken>> {
        self.inner.get(owner).await
    }

    async fn set(&self, owner: &Pubkey, token: AuthToken) -> Result<()> {
        self.apply(|tokens| {
            tokens.insert(*owner, token);
        })
        .await
    }

    async fn remove(&self, owner: &Pubkey) -> Result<()> {
        self.apply(|tokens| {
            tokens.remove(owner);
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<TokenMap> {
        self.inner.subscribe()
    }
}
