use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{:06}"), next_sequence()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

document_id!(
    /// Identifier of a landlord or tenant account.
    UserId,
    "user"
);
document_id!(PropertyId, "prop");
document_id!(ApplicationId, "app");
document_id!(LeaseId, "lease");
document_id!(TransactionId, "txn");

/// Whether a unit can take a new tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Available,
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Studio,
    Room,
    Townhouse,
}

impl PropertyType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Apartment => "Apartment",
            Self::House => "House",
            Self::Studio => "Studio",
            Self::Room => "Room",
            Self::Townhouse => "Townhouse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
}

/// A rental unit as stored in the `properties` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: PropertyId,
    pub landlord_id: UserId,
    pub current_tenant_id: Option<UserId>,
    /// Monthly rent in minor currency units.
    pub price: u64,
    pub currency: String,
    pub status: PropertyStatus,
    pub lease_start_date: Option<DateTime<Utc>>,
    pub location: Location,
    pub property_type: PropertyType,
    pub bedrooms: u8,
    pub amenities: Vec<String>,
    pub rules: Vec<String>,
    pub lease_template: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Declined,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A tenant's request against a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalApplication {
    pub id: ApplicationId,
    pub property_id: PropertyId,
    pub tenant_id: UserId,
    pub landlord_id: UserId,
    pub status: ApplicationStatus,
    pub message_to_landlord: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Pending,
    Active,
    Terminating,
    Expired,
}

impl LeaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Terminating => "terminating",
            Self::Expired => "expired",
        }
    }

    /// Legal edges of the lease state machine.
    pub const fn can_transition_to(self, next: LeaseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Active, Self::Terminating)
                | (Self::Terminating, Self::Expired)
        )
    }
}

impl fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
}

impl PaymentMethod {
    /// Card charges wait on the processor, bank transfers on a manual check.
    pub const fn initial_status(self) -> TransactionStatus {
        match self {
            Self::Card => TransactionStatus::Pending,
            Self::BankTransfer => TransactionStatus::PendingVerification,
        }
    }
}

/// The record governing a tenancy, stored in `leaseAgreements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseAgreement {
    pub id: LeaseId,
    pub property_id: PropertyId,
    pub landlord_id: UserId,
    pub tenant_id: UserId,
    pub application_id: ApplicationId,
    pub lease_text: String,
    pub landlord_signed: bool,
    pub tenant_signed: bool,
    pub status: LeaseStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_confirmed: bool,
    pub calculated_refund: Option<u64>,
    pub termination_grace_period_end: Option<DateTime<Utc>>,
}

impl LeaseAgreement {
    pub fn fully_signed(&self) -> bool {
        self.landlord_signed && self.tenant_signed
    }

    pub fn is_party(&self, user: &UserId) -> bool {
        &self.landlord_id == user || &self.tenant_id == user
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Rent,
    #[serde(rename = "Lease Activation")]
    LeaseActivation,
    Deposit,
    Refund,
}

impl TransactionType {
    /// Only these types count towards months of rent paid.
    pub const fn pays_rent(self) -> bool {
        matches!(self, Self::Rent | Self::LeaseActivation)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Rent => "Rent",
            Self::LeaseActivation => "Lease Activation",
            Self::Deposit => "Deposit",
            Self::Refund => "Refund",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Completed,
    Pending,
    #[serde(rename = "Pending Verification")]
    PendingVerification,
    Failed,
}

impl TransactionStatus {
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending | Self::PendingVerification)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Pending => "Pending",
            Self::PendingVerification => "Pending Verification",
            Self::Failed => "Failed",
        }
    }
}

/// Append-only ledger entry stored in `transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub tenant_id: UserId,
    pub property_id: PropertyId,
    pub lease_id: LeaseId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub amount: u64,
    pub currency: String,
    pub months: u32,
    pub method: PaymentMethod,
    pub date: DateTime<Utc>,
}
