//! Time-travel simulation over shadow profiles.
//!
//! The simulator never touches the live ledger: it lazily clones the live
//! profile into a shadow copy with an empty history, then fast-forwards the
//! shadow through a requested number of days in one synchronous batch.

use crate::error::{AppError, AppResult, StoreError};
use crate::models::{AccountType, StudentProfile, Transaction};
use crate::repositories::ProfileRepository;
use crate::services::ReconciliationService;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

pub struct TimeTravelService {
    profiles: Arc<ProfileRepository>,
    reconciliation: Arc<ReconciliationService>,
}

impl TimeTravelService {
    pub fn new(profiles: Arc<ProfileRepository>, reconciliation: Arc<ReconciliationService>) -> Self {
        Self {
            profiles,
            reconciliation,
        }
    }

    /// Fetch the member's shadow profile, cloning it from the live profile
    /// on first access. Returns the profile and whether it was just created.
    /// Fails with `NotFound` when there is no live profile to clone.
    pub async fn ensure_shadow_profile(
        &self,
        member_name: &str,
    ) -> AppResult<(StudentProfile, bool)> {
        if let Some(existing) = self.profiles.try_get_shadow(member_name).await? {
            return Ok((existing, false));
        }

        let live = self.profiles.get(member_name).await?;
        let shadow = live.as_shadow();
        match self.profiles.create_shadow(&shadow).await {
            Ok(()) => {
                info!("Created time travel profile for '{}'", member_name);
                Ok((shadow, true))
            }
            // Lost a create race; the winner's copy is equivalent
            Err(StoreError::Duplicate(_)) => {
                let existing = self.profiles.try_get_shadow(member_name).await?.ok_or_else(|| {
                    StoreError::NotFound(format!(
                        "No time travel profile found for member '{}'",
                        member_name
                    ))
                })?;
                Ok((existing, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fast-forward the shadow profile `days` days.
    ///
    /// Day numbering starts at zero and an obligation fires on every day
    /// where `day % interval_days == 0`, so day zero fires every obligation
    /// once. Each account's fires land in a single write, then the shadow
    /// balances are reconciled and pushed.
    pub async fn simulate(&self, member_name: &str, days: u32) -> AppResult<()> {
        if days == 0 {
            return Err(AppError::Validation(
                "days must be a positive number".to_string(),
            ));
        }

        self.ensure_shadow_profile(member_name).await?;
        let started_at = Utc::now();

        for account_type in [AccountType::Checking, AccountType::Savings] {
            self.profiles
                .update_shadow(member_name, move |profile| {
                    let account = profile.account_mut(account_type);
                    let mut fires: Vec<(Transaction, DateTime<Utc>)> = Vec::new();
                    for day in 0..days {
                        let fire_date = started_at + Duration::days(i64::from(day));
                        for (_, obligation) in account.obligations() {
                            if day % obligation.interval.period_days() == 0 {
                                fires.push((obligation.fire(fire_date), fire_date));
                            }
                        }
                    }
                    for (transaction, fired_at) in fires {
                        account.append_transaction(transaction, fired_at);
                    }
                })
                .await?;

            self.reconciliation
                .reconcile_shadow(member_name, account_type)
                .await?;
        }

        info!("Simulated {} days for '{}'", days, member_name);
        Ok(())
    }
}
