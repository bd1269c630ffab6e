use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;

/// Abstraction for the owner's wallet.
/// This allows the SDK to work with:
/// 1. Local Keypairs (Backend/CLI)
/// 2. Wallet Adapters (one approval prompt for a whole batch)
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Sign every transaction of the batch in one approval.
    /// Transactions arrive with blockhash and fee payer already set and may
    /// already carry other signatures, which must be kept.
    async fn sign_transactions(&self, txs: Vec<Transaction>) -> Result<Vec<Transaction>, String>;

    /// Sign an arbitrary message (used by the rollup authorization handshake).
    /// Not all signers support this.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, String>;
}

/// [`WalletSigner`] over a local keypair.
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl WalletSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transactions(
        &self,
        mut txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, String> {
        for tx in txs.iter_mut() {
            let blockhash = tx.message.recent_blockhash;
            tx.try_partial_sign(&[&self.keypair], blockhash)
                .map_err(|e| e.to_string())?;
        }
        Ok(txs)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, String> {
        Ok(self.keypair.sign_message(message))
    }
}
