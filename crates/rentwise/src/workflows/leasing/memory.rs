use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    ApplicationId, LeaseAgreement, LeaseId, LeaseStatus, Property, PropertyId, RentalApplication,
    Transaction, TransactionId, UserId,
};
use super::store::{
    Collection, Document, LeasingStore, Precondition, Revision, StoreError, Versioned,
    WriteBatch, MAX_IDS_PER_QUERY,
};

#[derive(Debug, Clone)]
struct Stored {
    revision: Revision,
    sequence: u64,
    document: Document,
}

#[derive(Debug, Default)]
struct Documents {
    entries: HashMap<(Collection, String), Stored>,
    next_sequence: u64,
}

/// Process-local store used by the API service and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryLeasingStore {
    documents: Arc<Mutex<Documents>>,
    offline: Arc<AtomicBool>,
}

impl MemoryLeasingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, StoreError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("document store offline".to_string()));
        }
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("document store lock poisoned".to_string()))
    }

    fn select<T>(
        &self,
        collection: Collection,
        project: impl Fn(&Document) -> Option<&T>,
        keep: impl Fn(&T) -> bool,
    ) -> Result<Vec<Versioned<T>>, StoreError>
    where
        T: Clone,
    {
        let guard = self.lock()?;
        let mut rows: Vec<(u64, Versioned<T>)> = guard
            .entries
            .iter()
            .filter(|((kind, _), _)| *kind == collection)
            .filter_map(|(_, stored)| {
                project(&stored.document)
                    .filter(|record| keep(record))
                    .map(|record| {
                        (
                            stored.sequence,
                            Versioned {
                                revision: stored.revision,
                                record: record.clone(),
                            },
                        )
                    })
            })
            .collect();
        rows.sort_by_key(|(sequence, _)| *sequence);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    fn get<T>(
        &self,
        collection: Collection,
        id: &str,
        project: impl Fn(&Document) -> Option<&T>,
    ) -> Result<Option<Versioned<T>>, StoreError>
    where
        T: Clone,
    {
        let guard = self.lock()?;
        Ok(guard
            .entries
            .get(&(collection, id.to_string()))
            .and_then(|stored| {
                project(&stored.document).map(|record| Versioned {
                    revision: stored.revision,
                    record: record.clone(),
                })
            }))
    }
}

fn as_property(document: &Document) -> Option<&Property> {
    match document {
        Document::Property(record) => Some(record),
        _ => None,
    }
}

fn as_application(document: &Document) -> Option<&RentalApplication> {
    match document {
        Document::Application(record) => Some(record),
        _ => None,
    }
}

fn as_lease(document: &Document) -> Option<&LeaseAgreement> {
    match document {
        Document::Lease(record) => Some(record),
        _ => None,
    }
}

fn as_transaction(document: &Document) -> Option<&Transaction> {
    match document {
        Document::Transaction(record) => Some(record),
        _ => None,
    }
}

impl LeasingStore for MemoryLeasingStore {
    fn property(&self, id: &PropertyId) -> Result<Option<Versioned<Property>>, StoreError> {
        self.get(Collection::Properties, id.as_str(), as_property)
    }

    fn properties(&self, ids: &[PropertyId]) -> Result<Vec<Versioned<Property>>, StoreError> {
        if ids.len() > MAX_IDS_PER_QUERY {
            return Err(StoreError::TooManyIds {
                requested: ids.len(),
                limit: MAX_IDS_PER_QUERY,
            });
        }
        self.select(Collection::Properties, as_property, |record| {
            ids.contains(&record.id)
        })
    }

    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Versioned<RentalApplication>>, StoreError> {
        self.get(Collection::RentalApplications, id.as_str(), as_application)
    }

    fn applications_for_property(
        &self,
        property: &PropertyId,
    ) -> Result<Vec<Versioned<RentalApplication>>, StoreError> {
        self.select(Collection::RentalApplications, as_application, |record| {
            &record.property_id == property
        })
    }

    fn lease(&self, id: &LeaseId) -> Result<Option<Versioned<LeaseAgreement>>, StoreError> {
        self.get(Collection::LeaseAgreements, id.as_str(), as_lease)
    }

    fn leases_for_property(
        &self,
        property: &PropertyId,
    ) -> Result<Vec<Versioned<LeaseAgreement>>, StoreError> {
        self.select(Collection::LeaseAgreements, as_lease, |record| {
            &record.property_id == property
        })
    }

    fn leases_for_tenant(
        &self,
        tenant: &UserId,
    ) -> Result<Vec<Versioned<LeaseAgreement>>, StoreError> {
        self.select(Collection::LeaseAgreements, as_lease, |record| {
            &record.tenant_id == tenant
        })
    }

    fn leases_with_status(
        &self,
        status: LeaseStatus,
    ) -> Result<Vec<Versioned<LeaseAgreement>>, StoreError> {
        self.select(Collection::LeaseAgreements, as_lease, |record| {
            record.status == status
        })
    }

    fn transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Versioned<Transaction>>, StoreError> {
        self.get(Collection::Transactions, id.as_str(), as_transaction)
    }

    fn transactions_for(
        &self,
        tenant: &UserId,
        property: &PropertyId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = self.select(Collection::Transactions, as_transaction, |record| {
            &record.tenant_id == tenant && &record.property_id == property
        })?;
        Ok(rows.into_iter().map(Versioned::into_record).collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut guard = self.lock()?;

        for write in batch.writes() {
            let collection = write.document.collection();
            let key = (collection, write.document.id().to_string());
            let current = guard.entries.get(&key).map(|stored| stored.revision);
            match (write.precondition, current) {
                (Precondition::Absent, None) => {}
                (Precondition::Absent, Some(_)) => {
                    return Err(StoreError::AlreadyExists {
                        collection: collection.name(),
                        id: key.1,
                    })
                }
                (Precondition::Revision(_), None) => {
                    return Err(StoreError::Missing {
                        collection: collection.name(),
                        id: key.1,
                    })
                }
                (Precondition::Revision(expected), Some(actual)) if expected != actual => {
                    return Err(StoreError::Conflict {
                        collection: collection.name(),
                        id: key.1,
                    })
                }
                (Precondition::Revision(_), Some(_)) => {}
            }
        }

        for write in batch.into_writes() {
            let key = (write.document.collection(), write.document.id().to_string());
            let sequence = guard.next_sequence;
            let documents = &mut *guard;
            match documents.entries.get_mut(&key) {
                Some(stored) => {
                    stored.revision += 1;
                    stored.document = write.document;
                }
                None => {
                    documents.entries.insert(
                        key,
                        Stored {
                            revision: 1,
                            sequence,
                            document: write.document,
                        },
                    );
                    documents.next_sequence += 1;
                }
            }
        }
        Ok(())
    }
}
