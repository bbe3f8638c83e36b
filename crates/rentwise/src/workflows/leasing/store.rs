use serde::Serialize;

use super::domain::{
    ApplicationId, LeaseAgreement, LeaseId, LeaseStatus, Property, PropertyId, RentalApplication,
    Transaction, TransactionId, UserId,
};

/// Largest id list a single multi-get may carry.
pub const MAX_IDS_PER_QUERY: usize = 30;

/// Monotonic per-document revision, bumped on every write.
pub type Revision = u64;

/// A document read together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Versioned<T> {
    pub revision: Revision,
    pub record: T,
}

impl<T> Versioned<T> {
    pub fn into_record(self) -> T {
        self.record
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Properties,
    RentalApplications,
    LeaseAgreements,
    Transactions,
}

impl Collection {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::RentalApplications => "rentalApplications",
            Self::LeaseAgreements => "leaseAgreements",
            Self::Transactions => "transactions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Property(Property),
    Application(RentalApplication),
    Lease(LeaseAgreement),
    Transaction(Transaction),
}

impl Document {
    pub fn collection(&self) -> Collection {
        match self {
            Self::Property(_) => Collection::Properties,
            Self::Application(_) => Collection::RentalApplications,
            Self::Lease(_) => Collection::LeaseAgreements,
            Self::Transaction(_) => Collection::Transactions,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Property(record) => record.id.as_str(),
            Self::Application(record) => record.id.as_str(),
            Self::Lease(record) => record.id.as_str(),
            Self::Transaction(record) => record.id.as_str(),
        }
    }
}

/// What must hold for a write in a batch to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Absent,
    Revision(Revision),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub document: Document,
    pub precondition: Precondition,
}

/// Writes applied all together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, document: Document) -> Self {
        self.writes.push(Write {
            document,
            precondition: Precondition::Absent,
        });
        self
    }

    pub fn update(mut self, document: Document, revision: Revision) -> Self {
        self.writes.push(Write {
            document,
            precondition: Precondition::Revision(revision),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{collection}/{id} changed since it was read")]
    Conflict { collection: &'static str, id: String },
    #[error("{collection}/{id} already exists")]
    AlreadyExists { collection: &'static str, id: String },
    #[error("{collection}/{id} not found")]
    Missing { collection: &'static str, id: String },
    #[error("multi-get of {requested} ids exceeds the limit of {limit}")]
    TooManyIds { requested: usize, limit: usize },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Document-store seam for the leasing collections.
///
/// Reads are query-by-field; there are no joins. Every write goes through [`WriteBatch`].
pub trait LeasingStore: Send + Sync {
    fn property(&self, id: &PropertyId) -> Result<Option<Versioned<Property>>, StoreError>;
    /// At most [`MAX_IDS_PER_QUERY`] ids; unknown ids are skipped.
    fn properties(&self, ids: &[PropertyId]) -> Result<Vec<Versioned<Property>>, StoreError>;

    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Versioned<RentalApplication>>, StoreError>;
    fn applications_for_property(
        &self,
        property: &PropertyId,
    ) -> Result<Vec<Versioned<RentalApplication>>, StoreError>;

    fn lease(&self, id: &LeaseId) -> Result<Option<Versioned<LeaseAgreement>>, StoreError>;
    fn leases_for_property(
        &self,
        property: &PropertyId,
    ) -> Result<Vec<Versioned<LeaseAgreement>>, StoreError>;
    fn leases_for_tenant(
        &self,
        tenant: &UserId,
    ) -> Result<Vec<Versioned<LeaseAgreement>>, StoreError>;
    fn leases_with_status(
        &self,
        status: LeaseStatus,
    ) -> Result<Vec<Versioned<LeaseAgreement>>, StoreError>;

    fn transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Versioned<Transaction>>, StoreError>;
    /// Ledger for one (tenant, property) pair, oldest first.
    fn transactions_for(
        &self,
        tenant: &UserId,
        property: &PropertyId,
    ) -> Result<Vec<Transaction>, StoreError>;

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

/// Splits an id list into query-sized chunks.
pub fn query_chunks<T>(ids: &[T]) -> impl Iterator<Item = &[T]> {
    ids.chunks(MAX_IDS_PER_QUERY)
}
