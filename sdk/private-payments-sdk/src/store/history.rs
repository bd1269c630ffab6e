use crate::core::constants::MAX_TRANSACTION_HISTORY;
use crate::error::{PaymentsSdkError, Result};
use crate::store::write_atomically;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Send,
    Receive,
    Withdraw,
    Deposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub kind: HistoryKind,
    pub amount: Decimal,
    pub token_symbol: String,
    pub counterparty: String,
    pub timestamp: DateTime<Utc>,
    pub status: HistoryStatus,
    pub signature: String,
}

impl HistoryEntry {
    /// A successful entry stamped now.
    pub fn success(
        kind: HistoryKind,
        amount: Decimal,
        token_symbol: impl ToString,
        counterparty: impl ToString,
        signature: impl ToString,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            token_symbol: token_symbol.to_string(),
            counterparty: counterparty.to_string(),
            timestamp: Utc::now(),
            status: HistoryStatus::Success,
            signature: signature.to_string(),
        }
    }
}

/// Per-owner transaction log, newest first, capped at
/// [`MAX_TRANSACTION_HISTORY`] entries.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, owner: &Pubkey, entry: HistoryEntry) -> Result<()>;

    async fn list(&self, owner: &Pubkey) -> Result<Vec<HistoryEntry>>;

    async fn clear(&self, owner: &Pubkey) -> Result<()>;
}

fn push_capped(log: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    log.insert(0, entry);
    log.truncate(MAX_TRANSACTION_HISTORY);
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    logs: RwLock<HashMap<Pubkey, Vec<HistoryEntry>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record(&self, owner: &Pubkey, entry: HistoryEntry) -> Result<()> {
        push_capped(self.logs.write().await.entry(*owner).or_default(), entry);
        Ok(())
    }

    async fn list(&self, owner: &Pubkey) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .logs
            .read()
            .await
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, owner: &Pubkey) -> Result<()> {
        self.logs.write().await.remove(owner);
        Ok(())
    }
}

/// One JSON file per owner under `dir`, named `<owner>.json`.
pub struct FileHistoryStore {
    dir: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileHistoryStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            PaymentsSdkError::Store(format!("failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    fn path_for(&self, owner: &Pubkey) -> PathBuf {
        self.dir.join(format!("{}.json", owner))
    }

    async fn load(&self, owner: &Pubkey) -> Result<Vec<HistoryEntry>> {
        let path = self.path_for(owner);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| PaymentsSdkError::Store(e.to_string()))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PaymentsSdkError::Store(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn record(&self, owner: &Pubkey, entry: HistoryEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut log = self.load(owner).await?;
        push_capped(&mut log, entry);

        let path = self.path_for(owner);
        let raw =
            serde_json::to_string_pretty(&log).map_err(|e| PaymentsSdkError::Store(e.to_string()))?;
        write_atomically(&path, raw).await
    }

    async fn list(&self, owner: &Pubkey) -> Result<Vec<HistoryEntry>> {
        let _guard = self.lock.lock().await;
        self.load(owner).await
    }

    async fn clear(&self, owner: &Pubkey) -> Result<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(self.path_for(owner)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PaymentsSdkError::Store(e.to_string())),
        }
    }
}
