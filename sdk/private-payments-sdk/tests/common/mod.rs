//! In-memory simulation of the persistent ledger and the rollup.
//!
//! Both ledgers share one `Network`; transactions are decoded by
//! discriminator and applied atomically so the orchestrators can run end to
//! end without a validator.

#![allow(dead_code)]

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use private_payments_sdk::core::config::{SdkConfig, TimingConfig};
use private_payments_sdk::core::connection::{
    ConnectionError, RollupConnector, SendOptions, SolConnection,
};
use private_payments_sdk::core::constants::*;
use private_payments_sdk::core::signer::{KeypairSigner, WalletSigner};
use private_payments_sdk::store::tokens::{MemoryTokenStore, TokenMap};
use private_payments_sdk::types::{AuthToken, DepositAccount, ModifyDepositArgs, SignatureStatus};
use private_payments_sdk::utils::{
    account_discriminator, associated_token_address, derive_deposit_pda, derive_vault_pda,
    instruction_discriminator,
};
use private_payments_sdk::PrivatePayments;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::Transaction;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const USDC: Pubkey = solana_sdk::pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ledger {
    Persistent,
    Rollup,
}

/// One accepted transaction, as seen by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub ledger: Ledger,
    pub instructions: Vec<&'static str>,
    pub fee_payer: Pubkey,
    pub signature: Signature,
}

#[derive(Default, Clone)]
struct Accounts {
    persistent: HashMap<Pubkey, Account>,
    rollup: HashMap<Pubkey, Account>,
    tokens: HashMap<Pubkey, u64>,
    sessions: HashSet<Pubkey>,
}

#[derive(Default)]
struct State {
    accounts: Accounts,
    statuses: HashMap<Signature, SignatureStatus>,
    logs: HashMap<Signature, Vec<String>>,
    submitted: Vec<Submitted>,
    reject: Option<&'static str>,
    commit_logs: bool,
    rollup_reads_fail: bool,
}

pub struct Network {
    state: Mutex<State>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                commit_logs: true,
                ..State::default()
            }),
        })
    }

    pub fn persistent(self: &Arc<Self>) -> Arc<LedgerView> {
        Arc::new(LedgerView {
            network: self.clone(),
            ledger: Ledger::Persistent,
        })
    }

    pub fn rollup(self: &Arc<Self>) -> Arc<LedgerView> {
        Arc::new(LedgerView {
            network: self.clone(),
            ledger: Ledger::Rollup,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Credit the owner's token account outside of custody.
    pub fn fund(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) {
        let ata = associated_token_address(owner, mint).unwrap();
        *self.lock().accounts.tokens.entry(ata).or_default() += amount;
    }

    pub fn wallet_tokens(&self, owner: &Pubkey, mint: &Pubkey) -> u64 {
        let ata = associated_token_address(owner, mint).unwrap();
        self.lock().accounts.tokens.get(&ata).copied().unwrap_or(0)
    }

    pub fn vault_tokens(&self, mint: &Pubkey) -> u64 {
        let (vault, _) = derive_vault_pda(&PAYMENTS_PROGRAM_ID, mint).unwrap();
        self.wallet_tokens(&vault, mint)
    }

    /// Place an existing record, backed by the same amount in the vault.
    pub fn seed_deposit(&self, owner: &Pubkey, mint: &Pubkey, amount: u64, delegated: bool) {
        let (address, _) = derive_deposit_pda(&PAYMENTS_PROGRAM_ID, owner, mint).unwrap();
        let (vault, _) = derive_vault_pda(&PAYMENTS_PROGRAM_ID, mint).unwrap();
        let vault_ata = associated_token_address(&vault, mint).unwrap();
        let record = deposit_account(*owner, *mint, amount, PAYMENTS_PROGRAM_ID);

        let mut state = self.lock();
        *state.accounts.tokens.entry(vault_ata).or_default() += amount;
        if delegated {
            let mut shadow = record.clone();
            shadow.owner = DELEGATION_PROGRAM_ID;
            state.accounts.persistent.insert(address, shadow);
            state.accounts.rollup.insert(address, record);
        } else {
            state.accounts.persistent.insert(address, record);
        }
    }

    /// (persistent amount, rollup amount, persistent owner program)
    pub fn deposit(&self, owner: &Pubkey, mint: &Pubkey) -> (Option<u64>, Option<u64>, Option<Pubkey>) {
        let (address, _) = derive_deposit_pda(&PAYMENTS_PROGRAM_ID, owner, mint).unwrap();
        let state = self.lock();
        let persistent = state.accounts.persistent.get(&address);
        (
            persistent.map(|a| decode(&a.data).amount),
            state.accounts.rollup.get(&address).map(|a| decode(&a.data).amount),
            persistent.map(|a| a.owner),
        )
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.lock().submitted.clone()
    }

    /// Instruction names of every accepted transaction, in order.
    pub fn submitted_names(&self) -> Vec<Vec<&'static str>> {
        self.submitted().into_iter().map(|s| s.instructions).collect()
    }

    pub fn live_sessions(&self) -> usize {
        self.lock().accounts.sessions.len()
    }

    /// Reject every transaction containing `instruction`.
    pub fn reject(&self, instruction: &'static str) {
        self.lock().reject = Some(instruction);
    }

    /// Stop writing commitment logs for undelegations.
    pub fn without_commit_logs(&self) {
        self.lock().commit_logs = false;
    }

    pub fn fail_rollup_reads(&self) {
        self.lock().rollup_reads_fail = true;
    }

    fn execute(&self, ledger: Ledger, tx: &Transaction) -> Result<Signature, String> {
        tx.verify().map_err(|e| format!("signature verification failed: {}", e))?;
        let signature = tx.signatures[0];
        let keys = &tx.message.account_keys;
        let fee_payer = keys[0];

        let mut state = self.lock();
        let mut scratch = state.accounts.clone();
        let mut names = Vec::new();
        let mut logs = Vec::new();

        for ix in &tx.message.instructions {
            let program = *ix.program_id(keys);
            let accounts: Vec<Pubkey> = ix.accounts.iter().map(|i| keys[*i as usize]).collect();
            let name = instruction_name(&program, &ix.data)?;
            if state.reject == Some(name) {
                return Err(format!("{} rejected", name));
            }
            apply(&mut scratch, ledger, name, &accounts, &ix.data[8..], &mut logs)?;
            names.push(name);
        }

        if names.contains(&"undelegate") && state.commit_logs {
            let scheduled = synthetic_signature();
            let commit = synthetic_signature();
            logs.push(format!("Program log: ScheduledCommitSent signature: {}", scheduled));
            state.logs.insert(
                scheduled,
                vec![format!("Program log: ScheduledCommitSent signature[0]: {}", commit)],
            );
        }

        state.accounts = scratch;
        state.logs.insert(signature, logs);
        state.statuses.insert(signature, SignatureStatus::Confirmed);
        state.submitted.push(Submitted {
            ledger,
            instructions: names,
            fee_payer,
            signature,
        });
        Ok(signature)
    }
}

fn synthetic_signature() -> Signature {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    let mut bytes = [0xc0u8; 64];
    bytes[..8].copy_from_slice(&NEXT.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    Signature::from(bytes)
}

fn instruction_name(program: &Pubkey, data: &[u8]) -> Result<&'static str, String> {
    const PAYMENTS: [&str; 6] = [
        "initialize_deposit",
        "create_permission",
        "modify_balance",
        "delegate",
        "undelegate",
        "transfer_deposit",
    ];
    const SESSIONS: [&str; 2] = ["create_session", "revoke_session"];

    let names: &[&'static str] = if *program == PAYMENTS_PROGRAM_ID {
        &PAYMENTS
    } else if *program == SESSION_KEYS_PROGRAM_ID {
        &SESSIONS
    } else {
        return Err(format!("unknown program {}", program));
    };
    names
        .iter()
        .find(|name| data.len() >= 8 && data[..8] == instruction_discriminator(name))
        .copied()
        .ok_or_else(|| "unknown instruction".to_string())
}

fn deposit_account(user: Pubkey, token_mint: Pubkey, amount: u64, owner: Pubkey) -> Account {
    let mut data = account_discriminator("Deposit").to_vec();
    DepositAccount {
        user,
        token_mint,
        amount,
    }
    .serialize(&mut data)
    .unwrap();
    Account {
        lamports: 1_000_000,
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

fn decode(data: &[u8]) -> DepositAccount {
    DepositAccount::try_from_slice(&data[8..]).unwrap()
}

fn set_amount(account: &mut Account, amount: u64) {
    let mut deposit = decode(&account.data);
    deposit.amount = amount;
    let mut data = account.data[..8].to_vec();
    deposit.serialize(&mut data).unwrap();
    account.data = data;
}

fn resident<'a>(accounts: &'a mut Accounts, address: &Pubkey) -> Result<&'a mut Account, String> {
    match accounts.persistent.get_mut(address) {
        Some(account) if account.owner == PAYMENTS_PROGRAM_ID => Ok(account),
        Some(_) => Err(format!("{} is not owned by the program", address)),
        None => Err(format!("{} does not exist", address)),
    }
}

fn apply(
    accounts: &mut Accounts,
    ledger: Ledger,
    name: &str,
    keys: &[Pubkey],
    args: &[u8],
    logs: &mut Vec<String>,
) -> Result<(), String> {
    logs.push(format!("Program log: Instruction: {}", name));
    match (ledger, name) {
        (Ledger::Persistent, "initialize_deposit") => {
            let (user, deposit, mint) = (keys[1], keys[2], keys[3]);
            if accounts.persistent.contains_key(&deposit) {
                return Err("deposit already in use".to_string());
            }
            accounts
                .persistent
                .insert(deposit, deposit_account(user, mint, 0, PAYMENTS_PROGRAM_ID));
        },
        (Ledger::Persistent, "create_permission") => {
            resident(accounts, &keys[2])?;
            accounts.persistent.insert(
                keys[3],
                Account {
                    owner: PERMISSION_PROGRAM_ID,
                    ..Account::default()
                },
            );
        },
        (Ledger::Persistent, "modify_balance") => {
            let ModifyDepositArgs { amount, increase } =
                ModifyDepositArgs::try_from_slice(args).map_err(|e| e.to_string())?;
            let (user_ata, vault_ata) = (keys[4], keys[5]);
            let record = resident(accounts, &keys[3])?;
            let current = decode(&record.data).amount;
            let (from, to, next) = if increase {
                (user_ata, vault_ata, current + amount)
            } else {
                let next = current
                    .checked_sub(amount)
                    .ok_or_else(|| "insufficient deposit".to_string())?;
                (vault_ata, user_ata, next)
            };
            set_amount(record, next);

            let available = accounts.tokens.get(&from).copied().unwrap_or(0);
            if available < amount {
                return Err("insufficient token balance".to_string());
            }
            accounts.tokens.insert(from, available - amount);
            *accounts.tokens.entry(to).or_default() += amount;
        },
        (Ledger::Persistent, "delegate") => {
            let (record_pda, deposit) = (keys[3], keys[5]);
            let record = resident(accounts, &deposit)?;
            record.owner = DELEGATION_PROGRAM_ID;
            let mut live = record.clone();
            live.owner = PAYMENTS_PROGRAM_ID;
            accounts.rollup.insert(deposit, live);
            accounts.persistent.insert(
                record_pda,
                Account {
                    owner: DELEGATION_PROGRAM_ID,
                    ..Account::default()
                },
            );
        },
        (Ledger::Rollup, "undelegate") => {
            let deposit = keys[3];
            check_session(accounts, keys[2])?;
            let live = accounts
                .rollup
                .remove(&deposit)
                .ok_or_else(|| "deposit not delegated".to_string())?;
            accounts.persistent.insert(deposit, live);
        },
        (ledger, "transfer_deposit") => {
            let amount = u64::try_from_slice(args).map_err(|e| e.to_string())?;
            check_session(accounts, keys[2])?;
            let (source, destination) = (keys[3], keys[4]);
            let map = match ledger {
                Ledger::Persistent => {
                    resident(accounts, &source)?;
                    resident(accounts, &destination)?;
                    &mut accounts.persistent
                },
                Ledger::Rollup => &mut accounts.rollup,
            };
            let from = map
                .get_mut(&source)
                .ok_or_else(|| "source not available".to_string())?;
            let balance = decode(&from.data).amount;
            if balance < amount {
                return Err("insufficient deposit".to_string());
            }
            set_amount(from, balance - amount);
            let to = map
                .get_mut(&destination)
                .ok_or_else(|| "destination not available".to_string())?;
            let balance = decode(&to.data).amount;
            set_amount(to, balance + amount);
        },
        (Ledger::Persistent, "create_session") => {
            accounts.sessions.insert(keys[0]);
        },
        (Ledger::Persistent, "revoke_session") => {
            if !accounts.sessions.remove(&keys[0]) {
                return Err("unknown session".to_string());
            }
        },
        (ledger, name) => return Err(format!("{} is not valid on {:?}", name, ledger)),
    }
    Ok(())
}

fn check_session(accounts: &Accounts, token: Pubkey) -> Result<(), String> {
    if token == PAYMENTS_PROGRAM_ID || accounts.sessions.contains(&token) {
        Ok(())
    } else {
        Err("invalid session token".to_string())
    }
}

pub struct LedgerView {
    network: Arc<Network>,
    ledger: Ledger,
}

#[async_trait]
impl SolConnection for LedgerView {
    async fn send_transaction_with_options(
        &self,
        tx: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, ConnectionError> {
        match self.network.execute(self.ledger, tx) {
            Ok(signature) => Ok(signature),
            // Without preflight the ledger accepts the transaction and
            // reports the failure through its status.
            Err(reason) if options.skip_preflight => {
                let signature = tx.signatures[0];
                self.network
                    .lock()
                    .statuses
                    .insert(signature, SignatureStatus::Failed(reason));
                Ok(signature)
            },
            Err(reason) => Err(reason.into()),
        }
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, ConnectionError> {
        Ok(self
            .network
            .lock()
            .statuses
            .get(signature)
            .cloned()
            .unwrap_or(SignatureStatus::Pending))
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, ConnectionError> {
        let state = self.network.lock();
        match self.ledger {
            Ledger::Persistent => Ok(state.accounts.persistent.get(pubkey).cloned()),
            Ledger::Rollup if state.rollup_reads_fail => Err("access denied".into()),
            Ledger::Rollup => Ok(state.accounts.rollup.get(pubkey).cloned()),
        }
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ConnectionError> {
        Ok(Hash::new_unique())
    }

    async fn get_transaction_logs(
        &self,
        signature: &Signature,
    ) -> Result<Option<Vec<String>>, ConnectionError> {
        Ok(self.network.lock().logs.get(signature).cloned())
    }
}

pub struct MockConnector {
    network: Arc<Network>,
}

impl RollupConnector for MockConnector {
    fn connect(&self, _token: &AuthToken) -> Arc<dyn SolConnection> {
        self.network.rollup()
    }
}

/// Keypair wallet that counts approval prompts.
pub struct CountingWallet {
    inner: KeypairSigner,
    pub prompts: AtomicUsize,
}

impl CountingWallet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: KeypairSigner::new(Keypair::new()),
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for CountingWallet {
    fn pubkey(&self) -> Pubkey {
        self.inner.pubkey()
    }

    async fn sign_transactions(&self, txs: Vec<Transaction>) -> Result<Vec<Transaction>, String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_transactions(txs).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, String> {
        self.inner.sign_message(message).await
    }
}

pub fn test_config() -> SdkConfig {
    SdkConfig {
        permission_ping: false,
        timing: TimingConfig::immediate(),
        ..SdkConfig::default()
    }
}

pub fn valid_token() -> AuthToken {
    AuthToken {
        token: "test-token".to_string(),
        expires_at: chrono::Utc::now().timestamp_millis() + AUTH_TOKEN_DURATION_MS,
    }
}

/// Client for `wallet` with a rollup token already cached.
pub fn authenticated_client(network: &Arc<Network>, wallet: Arc<CountingWallet>) -> PrivatePayments {
    let mut tokens = TokenMap::new();
    tokens.insert(wallet.pubkey(), valid_token());
    client_with_tokens(network, wallet, tokens)
}

pub fn client_with_tokens(
    network: &Arc<Network>,
    wallet: Arc<CountingWallet>,
    tokens: TokenMap,
) -> PrivatePayments {
    PrivatePayments::builder(test_config())
        .with_persistent_connection(network.persistent())
        .with_rollup_connector(Arc::new(MockConnector {
            network: network.clone(),
        }))
        .with_wallet(wallet)
        .with_token_store(Arc::new(MemoryTokenStore::with_tokens(tokens)))
        .build()
}
