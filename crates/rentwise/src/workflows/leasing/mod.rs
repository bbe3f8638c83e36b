//! Property leasing: applications, lease agreements, payments and rent tracking.
//!
//! Pure rules live in `lifecycle`, `rent`, `template` and `draft`; `service` sequences them
//! over a [`LeasingStore`] and pushes every multi-record change through one write batch.

pub mod domain;
pub mod draft;
pub mod lifecycle;
pub mod media;
pub mod memory;
pub mod notify;
pub mod payments;
pub mod rent;
pub mod router;
pub mod service;
pub mod store;
pub mod template;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationStatus, LeaseAgreement, LeaseId, LeaseStatus, Location,
    PaymentMethod, Property, PropertyId, PropertyStatus, PropertyType, RentalApplication,
    Transaction, TransactionId, TransactionStatus, TransactionType, UserId,
};
pub use draft::{DraftError, DraftEvent, PropertyDraft, WizardStep};
pub use lifecycle::{ExpiryReason, LeasePolicy, LeaseStanding, LifecycleError};
pub use media::{MediaKind, MediaUpload};
pub use memory::MemoryLeasingStore;
pub use notify::{Notification, NotificationKind, Notifier, NotifyError};
pub use payments::{
    AccountStatus, AccountStatusReport, ConnectRequest, DashboardLink, OnboardingLink,
    PaymentProcessor, PaymentProcessorError,
};
pub use rent::RentStatus;
pub use router::{leasing_router, USER_HEADER};
pub use service::{
    ApplicationRequest, LeaseOverview, LeasingError, LeasingService, NewProperty,
    PaymentOutcome, PaymentRequest, PropertyUpdate, ReconcileReport, TenantLeaseSummary,
    TerminationRequest,
};
pub use store::{LeasingStore, StoreError, Versioned, WriteBatch, MAX_IDS_PER_QUERY};
pub use template::{generate_lease_text_for_template, SigningParty};
