//! Rent-due computation.
//!
//! Everything here is a pure function of the lease start, the transaction ledger for the
//! (tenant, property) pair and the evaluation instant. Only completed `Rent` and
//! `Lease Activation` entries move the paid-through date; pending ones only gate new payments.

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

use super::domain::{Transaction, TransactionStatus};

/// Derived rent position of a lease at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentStatus {
    pub total_months_paid: u32,
    pub next_rent_due_date: Option<DateTime<Utc>>,
    pub is_rent_due: bool,
    pub has_pending_payments: bool,
    pub can_pay_rent: bool,
}

impl RentStatus {
    pub fn evaluate(
        lease_start: Option<DateTime<Utc>>,
        transactions: &[Transaction],
        now: DateTime<Utc>,
    ) -> Self {
        let total_months_paid = total_months_paid(transactions);
        let has_pending_payments = has_pending_payments(transactions);
        let next_rent_due_date = lease_start.and_then(|start| add_months(start, total_months_paid));
        let is_rent_due = next_rent_due_date.is_some_and(|due| is_rent_due(due, now));

        Self {
            total_months_paid,
            next_rent_due_date,
            is_rent_due,
            has_pending_payments,
            can_pay_rent: is_rent_due && !has_pending_payments,
        }
    }
}

pub fn total_months_paid(transactions: &[Transaction]) -> u32 {
    transactions
        .iter()
        .filter(|txn| txn.kind.pays_rent() && txn.status == TransactionStatus::Completed)
        .map(|txn| txn.months)
        .sum()
}

pub fn has_pending_payments(transactions: &[Transaction]) -> bool {
    transactions
        .iter()
        .any(|txn| txn.kind.pays_rent() && txn.status.is_pending())
}

/// Calendar-month addition; days past the end of a shorter month clamp to its last day.
pub fn add_months(start: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    start.checked_add_months(Months::new(months))
}

/// Strict: rent is not due at the paid-through instant itself.
pub fn is_rent_due(next_rent_due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > next_rent_due_date
}

/// Whole months between `from` and `until`, counting a month only when it fits entirely.
pub fn whole_months_between(from: DateTime<Utc>, until: DateTime<Utc>) -> u32 {
    if until <= from {
        return 0;
    }

    let mut months = 0u32;
    while let Some(next) = add_months(from, months + 1) {
        if next > until {
            break;
        }
        months += 1;
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::leasing::domain::{
        LeaseId, PaymentMethod, PropertyId, TransactionId, TransactionStatus, TransactionType,
        UserId,
    };
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn txn(kind: TransactionType, status: TransactionStatus, months: u32) -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            tenant_id: UserId::from("tenant-1"),
            property_id: PropertyId::from("prop-1"),
            lease_id: LeaseId::from("lease-1"),
            kind,
            status,
            amount: 120_000 * u64::from(months),
            currency: "USD".to_string(),
            months,
            method: PaymentMethod::Card,
            date: at(2024, 1, 1),
        }
    }

    #[test]
    fn two_paid_months_push_due_date_to_march() {
        let ledger = vec![txn(TransactionType::Rent, TransactionStatus::Completed, 2)];

        let status = RentStatus::evaluate(Some(at(2024, 1, 1)), &ledger, at(2024, 3, 2));

        assert_eq!(status.total_months_paid, 2);
        assert_eq!(status.next_rent_due_date, Some(at(2024, 3, 1)));
        assert!(status.is_rent_due);
        assert!(status.can_pay_rent);
    }

    #[test]
    fn due_date_sums_every_completed_rent_month() {
        let ledger = vec![
            txn(TransactionType::LeaseActivation, TransactionStatus::Completed, 1),
            txn(TransactionType::Rent, TransactionStatus::Completed, 3),
            txn(TransactionType::Rent, TransactionStatus::Completed, 2),
            txn(TransactionType::Rent, TransactionStatus::Failed, 4),
            txn(TransactionType::Deposit, TransactionStatus::Completed, 1),
        ];

        let status = RentStatus::evaluate(Some(at(2024, 1, 15)), &ledger, at(2024, 2, 1));

        assert_eq!(status.total_months_paid, 6);
        assert_eq!(status.next_rent_due_date, Some(at(2024, 7, 15)));
        assert!(!status.is_rent_due);
    }

    #[test]
    fn empty_ledger_is_due_right_after_start() {
        let start = at(2024, 5, 1);

        let at_start = RentStatus::evaluate(Some(start), &[], start);
        assert_eq!(at_start.next_rent_due_date, Some(start));
        assert!(!at_start.is_rent_due, "boundary instant is not yet due");

        let later = RentStatus::evaluate(Some(start), &[], start + chrono::Duration::seconds(1));
        assert!(later.is_rent_due);
    }

    #[test]
    fn pending_payment_suppresses_pay_action() {
        let ledger = vec![
            txn(TransactionType::Rent, TransactionStatus::Completed, 1),
            txn(TransactionType::Rent, TransactionStatus::PendingVerification, 1),
        ];

        let status = RentStatus::evaluate(Some(at(2024, 1, 1)), &ledger, at(2024, 6, 1));

        assert!(status.is_rent_due);
        assert!(status.has_pending_payments);
        assert!(!status.can_pay_rent);
    }

    #[test]
    fn pending_non_rent_entries_do_not_block() {
        let ledger = vec![txn(TransactionType::Deposit, TransactionStatus::Pending, 1)];

        assert!(!has_pending_payments(&ledger));
    }

    #[test]
    fn inactive_lease_has_no_due_date() {
        let ledger = vec![txn(TransactionType::Rent, TransactionStatus::Pending, 1)];

        let status = RentStatus::evaluate(None, &ledger, at(2024, 1, 1));

        assert_eq!(status.next_rent_due_date, None);
        assert!(!status.is_rent_due);
        assert!(status.has_pending_payments);
    }

    #[test]
    fn month_end_starts_clamp_to_shorter_months() {
        assert_eq!(add_months(at(2024, 1, 31), 1), Some(at(2024, 2, 29)));
        assert_eq!(add_months(at(2023, 1, 31), 1), Some(at(2023, 2, 28)));
    }

    #[test]
    fn whole_months_ignore_partial_tail() {
        assert_eq!(whole_months_between(at(2024, 3, 10), at(2024, 6, 1)), 2);
        assert_eq!(whole_months_between(at(2024, 3, 10), at(2024, 6, 10)), 3);
        assert_eq!(whole_months_between(at(2024, 6, 1), at(2024, 3, 1)), 0);
    }
}
