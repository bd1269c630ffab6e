use crate::advanced::plan::{ActionPlan, AfterConfirm, PlanContext, PlanStep};
use crate::basic::client::{token_symbol, PrivatePayments};
use crate::basic::transfer::EntryFactory;
use crate::error::{PaymentsSdkError, Result};
use crate::store::history::{HistoryEntry, HistoryKind};
use crate::utils::{short_address, to_raw_amount};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub mint: Pubkey,
    pub amount: Decimal,
    pub decimals: u8,
}

/// A delegated record is brought back under a session first; a resident
/// one is debited directly.
pub fn plan_withdrawal_steps(delegated: bool, amount: u64) -> Vec<PlanStep> {
    if delegated {
        vec![
            PlanStep::CreateSession,
            PlanStep::Undelegate,
            PlanStep::RelocateOut(amount),
            PlanStep::RevokeSession,
        ]
    } else {
        vec![PlanStep::RelocateOut(amount)]
    }
}

impl PrivatePayments {
    /// Move `request.amount` out of custody back to the owner's token
    /// account.
    ///
    /// When the undelegation's commitment proof never shows up, the
    /// withdrawal still proceeds after the fallback delays, so the debit may
    /// race a record that has not settled yet.
    pub async fn withdraw(&self, request: WithdrawRequest) -> Result<Signature> {
        let wallet = self.wallet()?.clone();
        let owner = wallet.pubkey();
        let rollup = self.rollup_for(&owner).await?;
        let amount = to_raw_amount(request.amount, request.decimals)?;

        let run = self.status.begin().ok_or_else(|| {
            PaymentsSdkError::InvalidRequest("another transfer is in flight".to_string())
        })?;
        self.status.report("Preparing withdrawal...", 10);

        let view = self
            .reader(None)
            .read_persistent(&owner, &request.mint)
            .await?;
        if !view.exists() {
            return Err(PaymentsSdkError::InvalidRequest(
                "no deposit to withdraw from".to_string(),
            ));
        }
        let delegated = view.is_delegated();
        let steps = plan_withdrawal_steps(delegated, amount);
        info!(%owner, amount, delegated, steps = ?steps, "withdrawal planned");

        let session = if delegated {
            self.status.report("Creating session...", 30);
            Some(self.sessions.create_session(&owner)?)
        } else {
            None
        };

        self.status.report("Withdrawing tokens...", 70);
        let factory = EntryFactory {
            engine: &self.relocation,
            timing: &self.config.timing,
            owner,
            mint: request.mint,
            recipient: None,
            session: session.as_ref(),
            undelegate_hook: AfterConfirm::AwaitUndelegation {
                record: view.address,
            },
        };
        let entries = steps
            .iter()
            .map(|step| factory.entry(*step).map(Some))
            .collect::<Result<Vec<_>>>()?;
        let plan = ActionPlan::new(entries);

        let ctx = PlanContext {
            persistent: self.persistent.as_ref(),
            rollup: delegated.then_some(rollup.as_ref()),
            timing: &self.config.timing,
            delegation_program: self.config.delegation_program,
        };
        self.status.report("Signing transactions...", 80);
        let signed = plan
            .sign(&ctx, wallet.as_ref(), session.as_ref().map(|s| &s.keypair))
            .await?;

        self.status.report("Broadcasting...", 90);
        let signature = signed.submit(&ctx).await?;
        run.succeed("Withdrawal complete!");
        info!(%owner, %signature, "withdrawal complete");

        self.record_history(
            &owner,
            HistoryEntry::success(
                HistoryKind::Withdraw,
                request.amount,
                token_symbol(&request.mint),
                short_address(&owner),
                signature,
            ),
        )
        .await;
        Ok(signature)
    }
}
