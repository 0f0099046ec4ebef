pub mod ledger;
pub mod messaging;
pub mod reconciliation;
pub mod scheduler;
pub mod time_travel;

pub use ledger::LedgerService;
pub use messaging::MessagingService;
pub use reconciliation::ReconciliationService;
pub use scheduler::{ObligationKey, RecurrenceRule, RecurringScheduler, ScheduledJob};
pub use time_travel::TimeTravelService;
