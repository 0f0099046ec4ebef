//! Balance reconciliation: rebuild an account's balance from its
//! transaction history and push the refreshed account to its owner.

use crate::error::AppResult;
use crate::models::AccountType;
use crate::presence::PresenceRouter;
use crate::repositories::ProfileRepository;
use crate::websocket::WsEvent;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ReconciliationService {
    profiles: Arc<ProfileRepository>,
    router: Arc<PresenceRouter>,
}

impl ReconciliationService {
    pub fn new(profiles: Arc<ProfileRepository>, router: Arc<PresenceRouter>) -> Self {
        Self { profiles, router }
    }

    /// Recompute one live account's balance as the exact sum of its
    /// transactions, persist it, and push the refreshed account to the
    /// owning member if connected. Idempotent: with no new transactions the
    /// balance and the pushed payload are unchanged.
    pub async fn reconcile(&self, member_name: &str, account_type: AccountType) -> AppResult<Decimal> {
        let profile = self
            .profiles
            .update(member_name, |profile| {
                let account = profile.account_mut(account_type);
                account.balance_total = account.computed_balance();
            })
            .await?;

        let account = profile.account(account_type).clone();
        let balance = account.balance_total;
        info!(
            "Reconciled {} {:?} account to {}",
            member_name, account_type, balance
        );

        let event = match account_type {
            AccountType::Checking => WsEvent::CheckingAccountUpdate { account },
            AccountType::Savings => WsEvent::SavingsAccountUpdate { account },
        };
        if !self.router.send_to(member_name, event).await {
            debug!("No live connection for '{}', skipping push", member_name);
        }

        Ok(balance)
    }

    /// Reconcile the shadow (time travel) copy of an account. Pushes the
    /// shadow account under its own event so clients route it to the
    /// simulation view.
    pub async fn reconcile_shadow(
        &self,
        member_name: &str,
        account_type: AccountType,
    ) -> AppResult<Decimal> {
        let profile = self
            .profiles
            .update_shadow(member_name, |profile| {
                let account = profile.account_mut(account_type);
                account.balance_total = account.computed_balance();
            })
            .await?;

        let account = profile.account(account_type).clone();
        let balance = account.balance_total;
        info!(
            "Reconciled {} shadow {:?} account to {}",
            member_name, account_type, balance
        );

        let event = WsEvent::TimeTravelAccountUpdate { account };
        if !self.router.send_to(member_name, event).await {
            debug!("No live connection for '{}', skipping push", member_name);
        }

        Ok(balance)
    }
}
