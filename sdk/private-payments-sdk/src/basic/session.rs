use crate::advanced::instructions;
use crate::error::Result;
use crate::utils::derive_session_token_pda;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

/// A time-boxed capability letting an ephemeral key act for `owner` on the
/// target program. Single use: the key is dropped with the session.
pub struct Session {
    pub owner: Pubkey,
    /// Session token account
    pub address: Pubkey,
    pub keypair: Keypair,
    /// Unix seconds; `None` when left to the session program's default
    pub valid_until: Option<i64>,
    pub create_instruction: Instruction,
    pub revoke_instruction: Instruction,
}

impl Session {
    pub fn signer(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

pub struct SessionManager {
    session_program: Pubkey,
    target_program: Pubkey,
    validity_secs: Option<i64>,
}

impl SessionManager {
    pub fn new(session_program: Pubkey, target_program: Pubkey) -> Self {
        Self {
            session_program,
            target_program,
            validity_secs: None,
        }
    }

    pub fn with_validity_secs(mut self, secs: Option<i64>) -> Self {
        self.validity_secs = secs;
        self
    }

    /// Fresh ephemeral key plus the (unsubmitted) create and revoke calls.
    pub fn create_session(&self, owner: &Pubkey) -> Result<Session> {
        let keypair = Keypair::new();
        let address = derive_session_token_pda(
            &self.session_program,
            &self.target_program,
            &keypair.pubkey(),
            owner,
        )?;
        let valid_until = self
            .validity_secs
            .map(|secs| chrono::Utc::now().timestamp() + secs);

        let create_instruction = instructions::create_session(
            &self.session_program,
            &address,
            &keypair.pubkey(),
            owner,
            &self.target_program,
            valid_until,
        )?;
        let revoke_instruction =
            instructions::revoke_session(&self.session_program, &address, owner)?;

        Ok(Session {
            owner: *owner,
            address,
            keypair,
            valid_until,
            create_instruction,
            revoke_instruction,
        })
    }
}
