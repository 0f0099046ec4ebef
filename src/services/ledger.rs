//! Ledger mutations: deposits, transfers, peer payments, loans, and
//! obligation registration.
//!
//! Every operation appends to the transaction history and then hands the
//! touched account to reconciliation, which rebuilds the balance and pushes
//! the update. Balances are allowed to go negative: this is a classroom
//! simulation and overdrafts are a lesson, not an error.

use crate::error::{AppError, AppResult};
use crate::models::{
    AccountType, Obligation, ObligationKind, RecurrenceKind, StudentProfile, Transaction,
};
use crate::repositories::ProfileRepository;
use crate::services::{ReconciliationService, RecurringScheduler};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

pub struct LedgerService {
    profiles: Arc<ProfileRepository>,
    reconciliation: Arc<ReconciliationService>,
    scheduler: Arc<RecurringScheduler>,
}

impl LedgerService {
    pub fn new(
        profiles: Arc<ProfileRepository>,
        reconciliation: Arc<ReconciliationService>,
        scheduler: Arc<RecurringScheduler>,
    ) -> Self {
        Self {
            profiles,
            reconciliation,
            scheduler,
        }
    }

    /// Credit an account with a one-off deposit
    pub async fn deposit(
        &self,
        member_name: &str,
        account_type: AccountType,
        amount: Decimal,
    ) -> AppResult<Decimal> {
        require_positive(amount)?;
        let now = Utc::now();
        self.profiles
            .update(member_name, move |profile| {
                profile.account_mut(account_type).append_transaction(
                    Transaction::once(amount, "Deposit", "Deposit", now),
                    now,
                );
            })
            .await?;
        self.reconciliation.reconcile(member_name, account_type).await
    }

    /// Move funds between the two accounts of one profile.
    ///
    /// Both legs land in one write of the profile document; each account
    /// then reconciles (and pushes) independently.
    pub async fn transfer(
        &self,
        member_name: &str,
        from_type: AccountType,
        to_type: AccountType,
        amount: Decimal,
    ) -> AppResult<()> {
        require_positive(amount)?;
        if from_type == to_type {
            return Err(AppError::Validation(
                "Transfer accounts must differ".to_string(),
            ));
        }

        let now = Utc::now();
        self.profiles
            .update(member_name, move |profile| {
                profile.account_mut(from_type).append_transaction(
                    Transaction::once(
                        -amount,
                        &format!("Transfer to {}", to_type.as_str()),
                        "Transfer",
                        now,
                    ),
                    now,
                );
                profile.account_mut(to_type).append_transaction(
                    Transaction::once(
                        amount,
                        &format!("Transfer from {}", from_type.as_str()),
                        "Transfer",
                        now,
                    ),
                    now,
                );
            })
            .await?;

        self.reconciliation.reconcile(member_name, from_type).await?;
        self.reconciliation.reconcile(member_name, to_type).await?;
        info!(
            "Transferred {} from {:?} to {:?} for '{}'",
            amount, from_type, to_type, member_name
        );
        Ok(())
    }

    /// Move funds from one member's checking account to another's.
    ///
    /// The two profile writes are sequential, not atomic as a pair: a crash
    /// between them leaves the debit without the credit.
    pub async fn send_funds(
        &self,
        sender_name: &str,
        recipient_name: &str,
        amount: Decimal,
    ) -> AppResult<()> {
        require_positive(amount)?;
        // Fail on an unknown recipient before the sender is debited
        self.profiles.get(recipient_name).await?;

        let now = Utc::now();
        let recipient_label = recipient_name.to_string();
        self.profiles
            .update(sender_name, move |profile| {
                profile.account_mut(AccountType::Checking).append_transaction(
                    Transaction::once(
                        -amount,
                        &format!("Sent to {}", recipient_label),
                        "Transfer",
                        now,
                    ),
                    now,
                );
            })
            .await?;

        let sender_label = sender_name.to_string();
        self.profiles
            .update(recipient_name, move |profile| {
                profile.account_mut(AccountType::Checking).append_transaction(
                    Transaction::once(
                        amount,
                        &format!("Received from {}", sender_label),
                        "Transfer",
                        now,
                    ),
                    now,
                );
            })
            .await?;

        self.reconciliation
            .reconcile(sender_name, AccountType::Checking)
            .await?;
        self.reconciliation
            .reconcile(recipient_name, AccountType::Checking)
            .await?;
        info!(
            "Sent {} from '{}' to '{}'",
            amount, sender_name, recipient_name
        );
        Ok(())
    }

    /// Credit a loan onto the member's checking account
    pub async fn take_loan(&self, member_name: &str, amount: Decimal) -> AppResult<Decimal> {
        require_positive(amount)?;
        let now = Utc::now();
        self.profiles
            .update(member_name, move |profile| {
                profile.account_mut(AccountType::Checking).append_transaction(
                    Transaction::once(amount, "Loan", "Loan", now),
                    now,
                );
            })
            .await?;
        info!("Loan of {} granted to '{}'", amount, member_name);
        self.reconciliation
            .reconcile(member_name, AccountType::Checking)
            .await
    }

    /// Register a recurring bill or payment on an account.
    ///
    /// The amount's sign is normalized by kind, the obligation is appended,
    /// every obligation on the profile is (re-)registered with the
    /// scheduler, and the account reconciles so the owner sees the updated
    /// document.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_obligation(
        &self,
        member_name: &str,
        account_type: AccountType,
        kind: ObligationKind,
        amount: Decimal,
        interval: RecurrenceKind,
        name: &str,
        category: &str,
        date: Option<DateTime<Utc>>,
    ) -> AppResult<StudentProfile> {
        if amount == Decimal::ZERO {
            return Err(AppError::Validation("amount must be nonzero".to_string()));
        }
        if name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".to_string()));
        }

        let obligation = Obligation {
            amount: kind.normalize_amount(amount),
            interval,
            name: name.to_string(),
            category: category.to_string(),
            date: date.unwrap_or_else(Utc::now),
        };

        let appended = obligation.clone();
        let profile = self
            .profiles
            .update(member_name, move |profile| {
                profile
                    .account_mut(account_type)
                    .obligations_mut(kind)
                    .push(appended.clone());
            })
            .await?;

        self.scheduler.register_profile(&profile).await;
        self.reconciliation.reconcile(member_name, account_type).await?;
        info!(
            "Registered {} '{}' ({}) on {:?} account of '{}'",
            kind.as_str(),
            obligation.name,
            obligation.interval.as_str(),
            account_type,
            member_name
        );
        Ok(profile)
    }
}

fn require_positive(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "amount must be a positive number".to_string(),
        ));
    }
    Ok(())
}
