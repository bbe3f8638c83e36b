//! Lease state machine: `pending → active → terminating → expired`.
//!
//! Transitions mutate the lease and its property together so callers can persist both in a
//! single write batch. Nothing here touches storage or the clock; `now` is always passed in.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{
    LeaseAgreement, LeaseStatus, PaymentMethod, Property, PropertyStatus, UserId,
};
use super::rent::{add_months, whole_months_between};

/// Longest grace period a termination may carry.
pub const MAX_GRACE_PERIOD_DAYS: u32 = 365;

/// Tunable lease rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    pub term_months: u32,
    pub grace_period_days: u32,
    /// Off by default: payment alone activates a pending lease.
    pub activation_requires_signatures: bool,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            term_months: 12,
            grace_period_days: 14,
            activation_requires_signatures: false,
        }
    }
}

impl LeasePolicy {
    pub fn term_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        add_months(start, self.term_months).unwrap_or(start)
    }

    pub fn grace_period_end(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>, LifecycleError> {
        let days = self.grace_period_days;
        if days > MAX_GRACE_PERIOD_DAYS {
            return Err(LifecycleError::GracePeriodTooLong { days });
        }
        from.checked_add_signed(Duration::days(i64::from(days)))
            .ok_or(LifecycleError::GracePeriodTooLong { days })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("lease cannot move from {from} to {to}")]
    InvalidTransition { from: LeaseStatus, to: LeaseStatus },
    #[error("lease must be signed by both parties before activation")]
    MissingSignatures,
    #[error("property {property} is already occupied")]
    PropertyOccupied { property: String },
    #[error("lease {lease} does not belong to property {property}")]
    PropertyMismatch { lease: String, property: String },
    #[error("a grace period of {days} days is out of range")]
    GracePeriodTooLong { days: u32 },
    #[error("grace period runs until {until}")]
    GracePeriodRunning { until: DateTime<Utc> },
}

/// Why a terminating lease was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    GracePeriodElapsed,
    CompensationReceived,
}

/// Terms fixed when termination begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationTerms {
    pub grace_period_end: DateTime<Utc>,
    pub calculated_refund: u64,
}

fn ensure_transition(lease: &LeaseAgreement, to: LeaseStatus) -> Result<(), LifecycleError> {
    if lease.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            from: lease.status,
            to,
        })
    }
}

fn ensure_same_property(
    lease: &LeaseAgreement,
    property: &Property,
) -> Result<(), LifecycleError> {
    if lease.property_id == property.id {
        Ok(())
    } else {
        Err(LifecycleError::PropertyMismatch {
            lease: lease.id.to_string(),
            property: property.id.to_string(),
        })
    }
}

/// `pending → active` once the first payment settles.
pub fn activate(
    lease: &mut LeaseAgreement,
    property: &mut Property,
    method: PaymentMethod,
    now: DateTime<Utc>,
    policy: &LeasePolicy,
) -> Result<(), LifecycleError> {
    ensure_transition(lease, LeaseStatus::Active)?;
    ensure_same_property(lease, property)?;
    if policy.activation_requires_signatures && !lease.fully_signed() {
        return Err(LifecycleError::MissingSignatures);
    }
    let occupied_by_other = property.status == PropertyStatus::Occupied
        && property.current_tenant_id.as_ref() != Some(&lease.tenant_id);
    if occupied_by_other {
        return Err(LifecycleError::PropertyOccupied {
            property: property.id.to_string(),
        });
    }

    lease.status = LeaseStatus::Active;
    lease.payment_method = Some(method);
    lease.payment_confirmed = true;
    lease.start_date = now;
    lease.end_date = policy.term_end(now);

    property.status = PropertyStatus::Occupied;
    property.current_tenant_id = Some(lease.tenant_id.clone());
    property.lease_start_date = Some(now);
    Ok(())
}

/// `active → terminating`.
pub fn begin_termination(
    lease: &mut LeaseAgreement,
    terms: TerminationTerms,
) -> Result<(), LifecycleError> {
    ensure_transition(lease, LeaseStatus::Terminating)?;
    lease.status = LeaseStatus::Terminating;
    lease.termination_grace_period_end = Some(terms.grace_period_end);
    lease.calculated_refund = Some(terms.calculated_refund);
    Ok(())
}

/// `terminating → expired`, releasing the property.
pub fn expire(
    lease: &mut LeaseAgreement,
    property: &mut Property,
    reason: ExpiryReason,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    ensure_transition(lease, LeaseStatus::Expired)?;
    ensure_same_property(lease, property)?;
    if reason == ExpiryReason::GracePeriodElapsed {
        if let Some(until) = lease.termination_grace_period_end {
            if now <= until {
                return Err(LifecycleError::GracePeriodRunning { until });
            }
        }
    }

    lease.status = LeaseStatus::Expired;
    lease.end_date = now;

    if property.current_tenant_id.as_ref() == Some(&lease.tenant_id) {
        release_property(property);
    }
    Ok(())
}

fn release_property(property: &mut Property) {
    property.status = PropertyStatus::Available;
    property.current_tenant_id = None;
    property.lease_start_date = None;
}

/// Refund for whole months prepaid beyond `terminated_at`.
pub fn calculate_refund(
    monthly_rent: u64,
    paid_through: Option<DateTime<Utc>>,
    terminated_at: DateTime<Utc>,
) -> u64 {
    let Some(paid_through) = paid_through else {
        return 0;
    };
    let unused = whole_months_between(terminated_at, paid_through);
    monthly_rent.saturating_mul(u64::from(unused))
}

/// Display flags derived from a lease at an instant. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseStanding {
    pub status: LeaseStatus,
    pub is_lease_expired: bool,
    pub fully_signed: bool,
    pub grace_period_elapsed: bool,
    pub awaiting_reconciliation: bool,
    pub term_ends_on: DateTime<Utc>,
}

impl LeaseStanding {
    pub fn evaluate(lease: &LeaseAgreement, now: DateTime<Utc>, policy: &LeasePolicy) -> Self {
        let term_ends_on = policy.term_end(lease.start_date);
        let grace_period_elapsed = lease
            .termination_grace_period_end
            .is_some_and(|until| now > until);

        Self {
            status: lease.status,
            is_lease_expired: lease.status == LeaseStatus::Expired || now > term_ends_on,
            fully_signed: lease.fully_signed(),
            grace_period_elapsed,
            awaiting_reconciliation: lease.status == LeaseStatus::Terminating
                && grace_period_elapsed,
            term_ends_on,
        }
    }
}

/// Terminating leases whose grace period has run out.
pub fn due_for_expiry(lease: &LeaseAgreement, now: DateTime<Utc>) -> bool {
    lease.status == LeaseStatus::Terminating
        && lease
            .termination_grace_period_end
            .is_some_and(|until| until < now)
}

/// Either party may end an active tenancy.
pub fn may_initiate_termination(lease: &LeaseAgreement, actor: &UserId) -> bool {
    lease.is_party(actor)
}
