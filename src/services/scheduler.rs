//! Recurring obligation scheduler.
//!
//! Keeps an in-process job table of every registered bill and payment and
//! fires the due ones on a fixed tick. Jobs are keyed by obligation
//! identity, so re-registering a profile is an idempotent upsert rather
//! than a duplicate registration.

use crate::config::{RecurrenceMode, SchedulerConfig};
use crate::error::AppResult;
use crate::models::{
    AccountType, ObligationKind, RecurrenceKind, StudentProfile, Transaction,
};
use crate::repositories::ProfileRepository;
use crate::services::ReconciliationService;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{error, info, warn};

/// Identity of one registered obligation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObligationKey {
    pub member_name: String,
    pub account_type: AccountType,
    pub kind: ObligationKind,
    pub name: String,
}

/// A resolved recurrence slot.
///
/// Calendar rules fire at 00:00 UTC of their day; step rules keep the
/// anchor's time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceRule {
    /// Every week on a fixed weekday
    WeeklyOn(Weekday),
    /// The 1st and the 15th of every month
    SemiMonthly,
    /// A fixed day of every month (clamped to month length)
    MonthlyOn { day: u32 },
    /// A fixed month/day every year (clamped for short Februaries)
    YearlyOn { month: u32, day: u32 },
    /// Fixed-length day steps from a creation anchor
    EveryDays {
        anchor: DateTime<Utc>,
        step_days: i64,
    },
}

impl RecurrenceRule {
    /// Resolve the slot for an obligation created at `created`.
    ///
    /// In fixed mode the slot is pinned by the creation moment alone:
    /// weekly lands on the weekday after the creation weekday, monthly
    /// lands on the 1st of the month after the creation month every year
    /// (created in March fires every April 1), bi-weekly is the 1st and
    /// 15th, yearly is January 1. Rolling mode steps from the anchor
    /// instead.
    pub fn resolve(kind: RecurrenceKind, mode: RecurrenceMode, created: DateTime<Utc>) -> Self {
        match mode {
            RecurrenceMode::FixedAtCreation => match kind {
                RecurrenceKind::Weekly => Self::WeeklyOn(created.weekday().succ()),
                RecurrenceKind::BiWeekly => Self::SemiMonthly,
                RecurrenceKind::Monthly => Self::YearlyOn {
                    month: created.month() % 12 + 1,
                    day: 1,
                },
                RecurrenceKind::Yearly => Self::YearlyOn { month: 1, day: 1 },
            },
            RecurrenceMode::Rolling => match kind {
                RecurrenceKind::Weekly => Self::EveryDays {
                    anchor: created,
                    step_days: 7,
                },
                RecurrenceKind::BiWeekly => Self::EveryDays {
                    anchor: created,
                    step_days: 14,
                },
                RecurrenceKind::Monthly => Self::MonthlyOn { day: created.day() },
                RecurrenceKind::Yearly => Self::YearlyOn {
                    month: created.month(),
                    day: created.day(),
                },
            },
        }
    }

    /// The next occurrence strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::WeeklyOn(weekday) => {
                let date = after.date_naive();
                let ahead = (weekday.num_days_from_monday() + 7
                    - date.weekday().num_days_from_monday())
                    % 7;
                let candidate = midnight_utc(date + Duration::days(i64::from(ahead)))?;
                if candidate > after {
                    Some(candidate)
                } else {
                    midnight_utc(date + Duration::days(i64::from(ahead) + 7))
                }
            }
            Self::SemiMonthly => {
                let date = after.date_naive();
                let fifteenth =
                    midnight_utc(NaiveDate::from_ymd_opt(date.year(), date.month(), 15)?)?;
                if fifteenth > after {
                    return Some(fifteenth);
                }
                let (year, month) = roll_month(date.year(), date.month());
                midnight_utc(NaiveDate::from_ymd_opt(year, month, 1)?)
            }
            Self::MonthlyOn { day } => {
                let date = after.date_naive();
                let candidate = clamped_midnight(date.year(), date.month(), day)?;
                if candidate > after {
                    return Some(candidate);
                }
                let (year, month) = roll_month(date.year(), date.month());
                clamped_midnight(year, month, day)
            }
            Self::YearlyOn { month, day } => {
                let year = after.date_naive().year();
                let candidate = clamped_midnight(year, month, day)?;
                if candidate > after {
                    return Some(candidate);
                }
                clamped_midnight(year + 1, month, day)
            }
            Self::EveryDays { anchor, step_days } => {
                if anchor > after {
                    return Some(anchor);
                }
                let step_secs = step_days.checked_mul(86_400)?;
                let elapsed = after.signed_duration_since(anchor).num_seconds();
                let steps = elapsed / step_secs + 1;
                let candidate = anchor + Duration::seconds(steps.checked_mul(step_secs)?);
                Some(candidate)
            }
        }
    }
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

fn roll_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = roll_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn clamped_midnight(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).and_then(midnight_utc)
}

/// One registered obligation with its resolved slot and pending fire time
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub key: ObligationKey,
    pub amount: Decimal,
    pub category: String,
    pub interval: RecurrenceKind,
    pub rule: RecurrenceRule,
    pub next_fire_at: DateTime<Utc>,
}

/// Background scheduler that turns obligations into ledger transactions
pub struct RecurringScheduler {
    jobs: RwLock<HashMap<ObligationKey, ScheduledJob>>,
    profiles: Arc<ProfileRepository>,
    reconciliation: Arc<ReconciliationService>,
    config: SchedulerConfig,
}

impl RecurringScheduler {
    pub fn new(
        profiles: Arc<ProfileRepository>,
        reconciliation: Arc<ReconciliationService>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            profiles,
            reconciliation,
            config,
        }
    }

    /// Upsert one job per obligation currently on either of the profile's
    /// accounts. Callers re-register the whole profile on every obligation
    /// append; keyed upserts make that harmless. An existing job with an
    /// unchanged slot keeps its pending fire time.
    pub async fn register_profile(&self, profile: &StudentProfile) {
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        for account_type in [AccountType::Checking, AccountType::Savings] {
            let account = profile.account(account_type);
            for (kind, obligation) in account.obligations() {
                let key = ObligationKey {
                    member_name: profile.member_name.clone(),
                    account_type,
                    kind,
                    name: obligation.name.clone(),
                };
                let rule = RecurrenceRule::resolve(
                    obligation.interval,
                    self.config.recurrence_mode,
                    obligation.date,
                );
                if let Some(existing) = jobs.get_mut(&key) {
                    if existing.rule == rule {
                        existing.amount = obligation.amount;
                        existing.category = obligation.category.clone();
                        existing.interval = obligation.interval;
                        continue;
                    }
                }
                let Some(next_fire_at) = rule.next_after(now) else {
                    warn!(
                        "Could not resolve next fire for '{}' on {}",
                        obligation.name, profile.member_name
                    );
                    continue;
                };
                jobs.insert(
                    key.clone(),
                    ScheduledJob {
                        key,
                        amount: obligation.amount,
                        category: obligation.category.clone(),
                        interval: obligation.interval,
                        rule,
                        next_fire_at,
                    },
                );
            }
        }
    }

    /// Register every live profile's obligations (startup path)
    pub async fn register_all(&self) -> AppResult<usize> {
        let profiles = self.profiles.list_all().await?;
        for profile in &profiles {
            self.register_profile(profile).await;
        }
        Ok(profiles.len())
    }

    /// Run the tick loop forever
    pub async fn start(&self) {
        let mut interval = time::interval(self.config.tick_interval());
        info!(
            "Recurring scheduler started ({} mode, {:?} tick)",
            self.config.recurrence_mode.as_str(),
            self.config.tick_interval()
        );

        loop {
            interval.tick().await;
            self.tick_once().await;
        }
    }

    /// Fire everything due right now; returns how many jobs fired
    pub async fn tick_once(&self) -> usize {
        self.run_due(Utc::now()).await
    }

    /// Fire every job whose pending time is at or before `now`.
    ///
    /// A job that fails keeps its fire time and is retried next tick.
    pub async fn run_due(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<ScheduledJob> = {
            let jobs = self.jobs.read().await;
            jobs.values()
                .filter(|job| job.next_fire_at <= now)
                .cloned()
                .collect()
        };

        let mut fired = 0;
        for job in due {
            match self.fire(&job, now).await {
                Ok(()) => {
                    fired += 1;
                    let mut jobs = self.jobs.write().await;
                    if let Some(slot) = jobs.get_mut(&job.key) {
                        match job.rule.next_after(now) {
                            Some(next) => slot.next_fire_at = next,
                            None => {
                                warn!(
                                    "Retiring job '{}' for {}: no further occurrences",
                                    job.key.name, job.key.member_name
                                );
                                jobs.remove(&job.key);
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(
                        "Failed to fire '{}' for {}: {}",
                        job.key.name, job.key.member_name, e
                    );
                }
            }
        }

        if fired > 0 {
            info!("Fired {} recurring obligations", fired);
        }
        fired
    }

    /// Append the obligation's transaction and reconcile the account
    async fn fire(&self, job: &ScheduledJob, now: DateTime<Utc>) -> AppResult<()> {
        let transaction = Transaction {
            amount: job.amount,
            interval: job.interval.as_str().to_string(),
            name: job.key.name.clone(),
            category: job.category.clone(),
            date: Some(now),
        };
        let account_type = job.key.account_type;
        self.profiles
            .update(&job.key.member_name, move |profile| {
                profile
                    .account_mut(account_type)
                    .append_transaction(transaction.clone(), now);
            })
            .await?;
        self.reconciliation
            .reconcile(&job.key.member_name, account_type)
            .await?;
        Ok(())
    }

    /// Empty the job table
    pub async fn clear(&self) {
        self.jobs.write().await.clear();
    }

    /// Number of registered jobs
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// The pending fire time for a job, if registered
    pub async fn next_fire_at(&self, key: &ObligationKey) -> Option<DateTime<Utc>> {
        self.jobs.read().await.get(key).map(|job| job.next_fire_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn fixed_monthly_created_march_fires_april_first() {
        let created = at(2024, 3, 12, 9);
        let rule = RecurrenceRule::resolve(
            RecurrenceKind::Monthly,
            RecurrenceMode::FixedAtCreation,
            created,
        );
        assert_eq!(rule, RecurrenceRule::YearlyOn { month: 4, day: 1 });
        assert_eq!(rule.next_after(created), Some(at(2024, 4, 1, 0)));
        // Already past this year's slot: next year
        assert_eq!(rule.next_after(at(2024, 6, 1, 0)), Some(at(2025, 4, 1, 0)));
        // Exactly on the slot still means strictly after
        assert_eq!(rule.next_after(at(2024, 4, 1, 0)), Some(at(2025, 4, 1, 0)));
    }

    #[test]
    fn fixed_monthly_created_december_wraps_to_january() {
        let created = at(2024, 12, 3, 9);
        let rule = RecurrenceRule::resolve(
            RecurrenceKind::Monthly,
            RecurrenceMode::FixedAtCreation,
            created,
        );
        assert_eq!(rule, RecurrenceRule::YearlyOn { month: 1, day: 1 });
        assert_eq!(rule.next_after(created), Some(at(2025, 1, 1, 0)));
    }

    #[test]
    fn fixed_weekly_created_tuesday_fires_wednesdays() {
        // 2024-03-05 is a Tuesday
        let created = at(2024, 3, 5, 14);
        let rule = RecurrenceRule::resolve(
            RecurrenceKind::Weekly,
            RecurrenceMode::FixedAtCreation,
            created,
        );
        assert_eq!(rule, RecurrenceRule::WeeklyOn(Weekday::Wed));
        assert_eq!(rule.next_after(created), Some(at(2024, 3, 6, 0)));
        assert_eq!(rule.next_after(at(2024, 3, 6, 0)), Some(at(2024, 3, 13, 0)));
    }

    #[test]
    fn fixed_biweekly_fires_first_and_fifteenth() {
        let rule = RecurrenceRule::SemiMonthly;
        assert_eq!(rule.next_after(at(2024, 3, 2, 0)), Some(at(2024, 3, 15, 0)));
        assert_eq!(rule.next_after(at(2024, 3, 15, 0)), Some(at(2024, 4, 1, 0)));
        assert_eq!(rule.next_after(at(2024, 12, 20, 0)), Some(at(2025, 1, 1, 0)));
    }

    #[test]
    fn fixed_yearly_fires_january_first() {
        let created = at(2024, 7, 4, 12);
        let rule = RecurrenceRule::resolve(
            RecurrenceKind::Yearly,
            RecurrenceMode::FixedAtCreation,
            created,
        );
        assert_eq!(rule, RecurrenceRule::YearlyOn { month: 1, day: 1 });
        assert_eq!(rule.next_after(created), Some(at(2025, 1, 1, 0)));
    }

    #[test]
    fn rolling_weekly_steps_from_anchor() {
        let anchor = at(2024, 3, 5, 14);
        let rule =
            RecurrenceRule::resolve(RecurrenceKind::Weekly, RecurrenceMode::Rolling, anchor);
        assert_eq!(rule.next_after(anchor), Some(at(2024, 3, 12, 14)));
        assert_eq!(rule.next_after(at(2024, 3, 12, 14)), Some(at(2024, 3, 19, 14)));
        // Before the anchor, the anchor itself is the first occurrence
        assert_eq!(rule.next_after(at(2024, 3, 1, 0)), Some(anchor));
    }

    #[test]
    fn rolling_biweekly_steps_fourteen_days() {
        let anchor = at(2024, 1, 10, 8);
        let rule =
            RecurrenceRule::resolve(RecurrenceKind::BiWeekly, RecurrenceMode::Rolling, anchor);
        assert_eq!(rule.next_after(anchor), Some(at(2024, 1, 24, 8)));
    }

    #[test]
    fn rolling_monthly_clamps_to_month_length() {
        let anchor = at(2024, 1, 31, 10);
        let rule =
            RecurrenceRule::resolve(RecurrenceKind::Monthly, RecurrenceMode::Rolling, anchor);
        // February 2024 has 29 days
        assert_eq!(rule.next_after(at(2024, 2, 1, 0)), Some(at(2024, 2, 29, 0)));
        assert_eq!(rule.next_after(at(2024, 2, 29, 0)), Some(at(2024, 3, 31, 0)));
    }

    #[test]
    fn rolling_yearly_clamps_leap_day() {
        let anchor = at(2024, 2, 29, 10);
        let rule =
            RecurrenceRule::resolve(RecurrenceKind::Yearly, RecurrenceMode::Rolling, anchor);
        assert_eq!(rule.next_after(at(2025, 1, 1, 0)), Some(at(2025, 2, 28, 0)));
    }
}
