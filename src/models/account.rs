//! Student profile and account documents for fund tracking

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account types carried by every student profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "Checking",
            Self::Savings => "Savings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Checking" | "checking" => Some(Self::Checking),
            "Savings" | "savings" => Some(Self::Savings),
            _ => None,
        }
    }

    /// The profile's other account (transfers always move between the pair)
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Checking => Self::Savings,
            Self::Savings => Self::Checking,
        }
    }
}

/// Recurrence intervals accepted for bills and payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceKind {
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "bi-weekly")]
    BiWeekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "yearly")]
    Yearly,
}

impl RecurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::BiWeekly => "bi-weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(Self::Weekly),
            "bi-weekly" | "biweekly" => Some(Self::BiWeekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Interval length in whole days, as used by the day-stepped simulator
    pub fn period_days(&self) -> u32 {
        match self {
            Self::Weekly => 7,
            Self::BiWeekly => 14,
            Self::Monthly => 30,
            Self::Yearly => 365,
        }
    }
}

/// Whether an obligation debits (bill) or credits (payment) the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObligationKind {
    Bill,
    Payment,
}

impl ObligationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bill => "bill",
            Self::Payment => "payment",
        }
    }

    /// Force the amount's sign to match the kind (bills negative, payments positive)
    pub fn normalize_amount(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Bill => -amount.abs(),
            Self::Payment => amount.abs(),
        }
    }
}

/// A single ledger movement. Immutable once appended; append order is
/// chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: Decimal,
    /// `"once"` for direct movements, or the recurrence interval that fired
    pub interval: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Date", skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl Transaction {
    /// A one-off movement (deposit, transfer leg, loan)
    pub fn once(amount: Decimal, name: &str, category: &str, date: DateTime<Utc>) -> Self {
        Self {
            amount,
            interval: "once".to_string(),
            name: name.to_string(),
            category: category.to_string(),
            date: Some(date),
        }
    }
}

/// A recurring bill or payment template. `date` is the creation moment and
/// anchors recurrence resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub amount: Decimal,
    pub interval: RecurrenceKind,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Date")]
    pub date: DateTime<Utc>,
}

impl Obligation {
    /// The transaction appended when this obligation fires
    pub fn fire(&self, at: DateTime<Utc>) -> Transaction {
        Transaction {
            amount: self.amount,
            interval: self.interval.as_str().to_string(),
            name: self.name.clone(),
            category: self.category.clone(),
            date: Some(at),
        }
    }
}

/// One account document embedded in a student profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_holder: String,
    pub account_type: AccountType,
    pub balance_total: Decimal,
    pub transactions: Vec<Transaction>,
    pub bills: Vec<Obligation>,
    pub payments: Vec<Obligation>,
    pub movements_dates: Vec<DateTime<Utc>>,
}

impl Account {
    /// Create an empty account for a holder
    pub fn new(account_holder: &str, account_type: AccountType) -> Self {
        Self {
            account_holder: account_holder.to_string(),
            account_type,
            balance_total: Decimal::ZERO,
            transactions: Vec::new(),
            bills: Vec::new(),
            payments: Vec::new(),
            movements_dates: Vec::new(),
        }
    }

    /// Exact sum of all transaction amounts
    pub fn computed_balance(&self) -> Decimal {
        self.transactions.iter().map(|t| t.amount).sum()
    }

    /// Append a movement together with its timestamp entry
    pub fn append_transaction(&mut self, transaction: Transaction, at: DateTime<Utc>) {
        self.transactions.push(transaction);
        self.movements_dates.push(at);
    }

    /// All obligations on this account, bills first
    pub fn obligations(&self) -> impl Iterator<Item = (ObligationKind, &Obligation)> {
        self.bills
            .iter()
            .map(|o| (ObligationKind::Bill, o))
            .chain(self.payments.iter().map(|o| (ObligationKind::Payment, o)))
    }

    /// The obligation list for a kind
    pub fn obligations_mut(&mut self, kind: ObligationKind) -> &mut Vec<Obligation> {
        match kind {
            ObligationKind::Bill => &mut self.bills,
            ObligationKind::Payment => &mut self.payments,
        }
    }
}

/// The root student document: identity plus the Checking/Savings pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub member_name: String,
    pub teacher: String,
    pub class_period: i32,
    pub checking_account: Account,
    pub savings_account: Account,
}

impl StudentProfile {
    /// Create a fresh profile with two empty accounts
    pub fn new(member_name: &str, teacher: &str, class_period: i32) -> Self {
        Self {
            member_name: member_name.to_string(),
            teacher: teacher.to_string(),
            class_period,
            checking_account: Account::new(member_name, AccountType::Checking),
            savings_account: Account::new(member_name, AccountType::Savings),
        }
    }

    pub fn account(&self, account_type: AccountType) -> &Account {
        match account_type {
            AccountType::Checking => &self.checking_account,
            AccountType::Savings => &self.savings_account,
        }
    }

    pub fn account_mut(&mut self, account_type: AccountType) -> &mut Account {
        match account_type {
            AccountType::Checking => &mut self.checking_account,
            AccountType::Savings => &mut self.savings_account,
        }
    }

    /// Clone this profile into its time-travel shadow: balances zeroed,
    /// histories emptied, obligation templates carried over.
    pub fn as_shadow(&self) -> Self {
        let mut shadow = self.clone();
        for account_type in [AccountType::Checking, AccountType::Savings] {
            let account = shadow.account_mut(account_type);
            account.balance_total = Decimal::ZERO;
            account.transactions.clear();
            account.movements_dates.clear();
        }
        shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn computed_balance_sums_exactly() {
        let mut account = Account::new("amy", AccountType::Checking);
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        account.append_transaction(
            Transaction::once(Decimal::from(100), "Paycheck", "Income", at),
            at,
        );
        account.append_transaction(
            Transaction::once(Decimal::from(-30), "Groceries", "Food", at),
            at,
        );
        assert_eq!(account.computed_balance(), Decimal::from(70));
        assert_eq!(account.transactions.len(), account.movements_dates.len());
    }

    #[test]
    fn shadow_zeroes_history_but_keeps_obligations() {
        let mut profile = StudentProfile::new("amy", "Ms. Frizzle", 2);
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        profile.checking_account.append_transaction(
            Transaction::once(Decimal::from(500), "Paycheck", "Income", at),
            at,
        );
        profile.checking_account.bills.push(Obligation {
            amount: Decimal::from(-40),
            interval: RecurrenceKind::Monthly,
            name: "Rent".to_string(),
            category: "Housing".to_string(),
            date: at,
        });

        let shadow = profile.as_shadow();
        assert_eq!(shadow.checking_account.balance_total, Decimal::ZERO);
        assert!(shadow.checking_account.transactions.is_empty());
        assert!(shadow.checking_account.movements_dates.is_empty());
        assert_eq!(shadow.checking_account.bills.len(), 1);
        assert_eq!(shadow.member_name, "amy");
    }

    #[test]
    fn obligation_sign_normalization() {
        assert_eq!(
            ObligationKind::Bill.normalize_amount(Decimal::from(25)),
            Decimal::from(-25)
        );
        assert_eq!(
            ObligationKind::Bill.normalize_amount(Decimal::from(-25)),
            Decimal::from(-25)
        );
        assert_eq!(
            ObligationKind::Payment.normalize_amount(Decimal::from(-90)),
            Decimal::from(90)
        );
    }

    #[test]
    fn profile_serializes_camel_case() {
        let profile = StudentProfile::new("amy", "Ms. Frizzle", 2);
        let value = serde_json::to_value(&profile).unwrap();
        assert!(value.get("memberName").is_some());
        assert!(value.get("checkingAccount").is_some());
        let checking = value.get("checkingAccount").unwrap();
        assert!(checking.get("balanceTotal").is_some());
        assert!(checking.get("movementsDates").is_some());
    }

    #[test]
    fn interval_round_trip() {
        assert_eq!(
            RecurrenceKind::from_str("bi-weekly"),
            Some(RecurrenceKind::BiWeekly)
        );
        assert_eq!(
            serde_json::to_string(&RecurrenceKind::BiWeekly).unwrap(),
            "\"bi-weekly\""
        );
        assert_eq!(RecurrenceKind::Monthly.period_days(), 30);
    }
}
