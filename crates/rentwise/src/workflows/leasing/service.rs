use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    ApplicationId, ApplicationStatus, LeaseAgreement, LeaseId, LeaseStatus, Location,
    PaymentMethod, Property, PropertyId, PropertyStatus, PropertyType, RentalApplication,
    Transaction, TransactionId, TransactionStatus, TransactionType, UserId,
};
use super::draft::is_currency_code;
use super::lifecycle::{
    self, ExpiryReason, LeasePolicy, LeaseStanding, LifecycleError, TerminationTerms,
    MAX_GRACE_PERIOD_DAYS,
};
use super::media::{storage_path, MediaKind, MediaUpload};
use super::notify::{Notification, NotificationKind, Notifier};
use super::rent::RentStatus;
use super::store::{query_chunks, Document, LeasingStore, StoreError, Versioned, WriteBatch};
use super::template::{append_signature, generate_lease_text_for_template, SigningParty};

const MAX_MESSAGE_CHARS: usize = 2_000;

/// Listing details supplied by a landlord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub price: u64,
    pub currency: String,
    pub location: Location,
    pub property_type: PropertyType,
    pub bedrooms: u8,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub lease_template: String,
}

/// Landlord edits. Occupancy fields are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyUpdate {
    pub price: Option<u64>,
    pub currency: Option<String>,
    pub location: Option<Location>,
    pub property_type: Option<PropertyType>,
    pub bedrooms: Option<u8>,
    pub amenities: Option<Vec<String>>,
    pub rules: Option<Vec<String>>,
    pub lease_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    pub property_id: PropertyId,
    #[serde(default)]
    pub message_to_landlord: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub months: u32,
    pub amount: u64,
    pub currency: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminationRequest {
    /// Overrides the computed refund of unused prepaid months.
    pub refund: Option<u64>,
    pub grace_period_days: Option<u32>,
}

/// Result of settling a pending payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub transaction: Transaction,
    pub lease: LeaseAgreement,
    pub activated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseOverview {
    pub lease: LeaseAgreement,
    pub standing: LeaseStanding,
    pub rent: RentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantLeaseSummary {
    pub lease: LeaseAgreement,
    pub property: Option<Property>,
    pub standing: LeaseStanding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub expired: Vec<LeaseId>,
    /// Leases that changed underneath the sweep; retried on the next run.
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LeasingError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("user {actor} may not {action}")]
    Forbidden { actor: String, action: &'static str },
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("property {0} is not accepting applications")]
    PropertyUnavailable(String),
    #[error("a pending application from this tenant already exists")]
    DuplicateApplication,
    #[error("application {id} is already {status}")]
    ApplicationClosed { id: String, status: &'static str },
    #[error("property {0} already has an open lease")]
    LeaseAlreadyOpen(String),
    #[error("lease {id} is {status}; only pending leases can be signed")]
    NotSignable { id: String, status: LeaseStatus },
    #[error("lease already signed by the {0}")]
    AlreadySigned(SigningParty),
    #[error("lease {id} is {status}; payments are not accepted")]
    NotPayable { id: String, status: LeaseStatus },
    #[error("a payment for this lease is already being processed")]
    PaymentInFlight,
    #[error("transaction {id} is already {status}")]
    TransactionSettled { id: String, status: &'static str },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn not_found(kind: &'static str, id: impl ToString) -> LeasingError {
    LeasingError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn forbidden(actor: &UserId, action: &'static str) -> LeasingError {
    LeasingError::Forbidden {
        actor: actor.to_string(),
        action,
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> LeasingError {
    LeasingError::Validation {
        field,
        reason: reason.into(),
    }
}

/// Leasing operations over a document store.
pub struct LeasingService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    policy: LeasePolicy,
}

impl<S, N> LeasingService<S, N>
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: LeasePolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &LeasePolicy {
        &self.policy
    }

    pub fn create_property(
        &self,
        landlord: &UserId,
        listing: NewProperty,
    ) -> Result<Property, LeasingError> {
        let property = Property {
            id: PropertyId::generate(),
            landlord_id: landlord.clone(),
            current_tenant_id: None,
            price: listing.price,
            currency: listing.currency.trim().to_ascii_uppercase(),
            status: PropertyStatus::Available,
            lease_start_date: None,
            location: listing.location,
            property_type: listing.property_type,
            bedrooms: listing.bedrooms,
            amenities: listing.amenities,
            rules: listing.rules,
            lease_template: listing.lease_template,
            images: Vec::new(),
            videos: Vec::new(),
        };
        validate_listing(&property)?;

        self.store
            .commit(WriteBatch::new().insert(Document::Property(property.clone())))?;
        info!(property_id = %property.id, landlord_id = %landlord, "property listed");
        Ok(property)
    }

    pub fn property(&self, id: &PropertyId) -> Result<Property, LeasingError> {
        Ok(self.load_property(id)?.record)
    }

    pub fn update_property(
        &self,
        landlord: &UserId,
        id: &PropertyId,
        update: PropertyUpdate,
    ) -> Result<Property, LeasingError> {
        let Versioned {
            revision,
            record: mut property,
        } = self.load_property(id)?;
        if &property.landlord_id != landlord {
            return Err(forbidden(landlord, "edit this property"));
        }

        if let Some(price) = update.price {
            property.price = price;
        }
        if let Some(currency) = update.currency {
            property.currency = currency.trim().to_ascii_uppercase();
        }
        if let Some(location) = update.location {
            property.location = location;
        }
        if let Some(property_type) = update.property_type {
            property.property_type = property_type;
        }
        if let Some(bedrooms) = update.bedrooms {
            property.bedrooms = bedrooms;
        }
        if let Some(amenities) = update.amenities {
            property.amenities = amenities;
        }
        if let Some(rules) = update.rules {
            property.rules = rules;
        }
        if let Some(template) = update.lease_template {
            property.lease_template = template;
        }
        validate_listing(&property)?;

        self.store.commit(
            WriteBatch::new().update(Document::Property(property.clone()), revision),
        )?;
        Ok(property)
    }

    /// Records an uploaded file on the property and returns its storage path.
    pub fn register_media(
        &self,
        landlord: &UserId,
        id: &PropertyId,
        upload: MediaUpload,
        now: DateTime<Utc>,
    ) -> Result<String, LeasingError> {
        let Versioned {
            revision,
            record: mut property,
        } = self.load_property(id)?;
        if &property.landlord_id != landlord {
            return Err(forbidden(landlord, "upload media for this property"));
        }

        let path = storage_path(upload.kind, landlord.as_str(), now, &upload.file_name);
        match upload.kind {
            MediaKind::PropertyImage => property.images.push(path.clone()),
            MediaKind::PropertyVideo => property.videos.push(path.clone()),
            MediaKind::ProfileImage => {
                return Err(invalid("kind", "profile images do not belong to a property"))
            }
        }

        self.store
            .commit(WriteBatch::new().update(Document::Property(property), revision))?;
        Ok(path)
    }

    pub fn remove_media(
        &self,
        landlord: &UserId,
        id: &PropertyId,
        url: &str,
    ) -> Result<Property, LeasingError> {
        let Versioned {
            revision,
            record: mut property,
        } = self.load_property(id)?;
        if &property.landlord_id != landlord {
            return Err(forbidden(landlord, "remove media from this property"));
        }

        let before = property.images.len() + property.videos.len();
        property.images.retain(|existing| existing != url);
        property.videos.retain(|existing| existing != url);
        if property.images.len() + property.videos.len() == before {
            return Err(not_found("media", url));
        }

        self.store.commit(
            WriteBatch::new().update(Document::Property(property.clone()), revision),
        )?;
        Ok(property)
    }

    pub fn submit_application(
        &self,
        tenant: &UserId,
        request: ApplicationRequest,
        now: DateTime<Utc>,
    ) -> Result<RentalApplication, LeasingError> {
        let property = self.load_property(&request.property_id)?.record;
        if property.status != PropertyStatus::Available {
            return Err(LeasingError::PropertyUnavailable(property.id.to_string()));
        }
        if &property.landlord_id == tenant {
            return Err(forbidden(tenant, "apply to their own property"));
        }
        let message = request.message_to_landlord.trim().to_string();
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(invalid(
                "messageToLandlord",
                format!("must be at most {MAX_MESSAGE_CHARS} characters"),
            ));
        }

        let duplicate = self
            .store
            .applications_for_property(&property.id)?
            .iter()
            .any(|existing| {
                &existing.record.tenant_id == tenant
                    && existing.record.status == ApplicationStatus::Pending
            });
        if duplicate {
            return Err(LeasingError::DuplicateApplication);
        }

        let application = RentalApplication {
            id: ApplicationId::generate(),
            property_id: property.id.clone(),
            tenant_id: tenant.clone(),
            landlord_id: property.landlord_id.clone(),
            status: ApplicationStatus::Pending,
            message_to_landlord: message,
            created_at: now,
        };
        self.store
            .commit(WriteBatch::new().insert(Document::Application(application.clone())))?;

        info!(application_id = %application.id, property_id = %property.id, "application submitted");
        self.notify(
            Notification::new(
                property.landlord_id,
                NotificationKind::ApplicationReceived,
                application.id.as_str(),
            )
            .with_detail("propertyId", property.id.as_str()),
        );
        Ok(application)
    }

    /// Approves the application and drafts a pending lease in one batch.
    pub fn accept_application(
        &self,
        landlord: &UserId,
        id: &ApplicationId,
        now: DateTime<Utc>,
    ) -> Result<LeaseAgreement, LeasingError> {
        let Versioned {
            revision: application_revision,
            record: mut application,
        } = self.load_application(id)?;
        if &application.landlord_id != landlord {
            return Err(forbidden(landlord, "accept this application"));
        }
        if application.status.is_terminal() {
            return Err(LeasingError::ApplicationClosed {
                id: id.to_string(),
                status: application.status.label(),
            });
        }

        let property = self.load_property(&application.property_id)?;
        if property.record.status != PropertyStatus::Available {
            return Err(LeasingError::PropertyUnavailable(property.record.id.to_string()));
        }
        let has_open_lease = self
            .store
            .leases_for_property(&property.record.id)?
            .iter()
            .any(|lease| lease.record.status != LeaseStatus::Expired);
        if has_open_lease {
            return Err(LeasingError::LeaseAlreadyOpen(property.record.id.to_string()));
        }

        let lease = LeaseAgreement {
            id: LeaseId::generate(),
            property_id: property.record.id.clone(),
            landlord_id: application.landlord_id.clone(),
            tenant_id: application.tenant_id.clone(),
            application_id: application.id.clone(),
            lease_text: generate_lease_text_for_template(
                &property.record.lease_template,
                &property.record,
            ),
            landlord_signed: false,
            tenant_signed: false,
            status: LeaseStatus::Pending,
            start_date: now,
            end_date: self.policy.term_end(now),
            payment_method: None,
            payment_confirmed: false,
            calculated_refund: None,
            termination_grace_period_end: None,
        };

        application.status = ApplicationStatus::Approved;
        let mut declined = Vec::new();
        // The unchanged property rides along so racing acceptances for it conflict.
        let mut batch = WriteBatch::new()
            .update(Document::Application(application.clone()), application_revision)
            .insert(Document::Lease(lease.clone()))
            .update(
                Document::Property(property.record.clone()),
                property.revision,
            );
        for competing in self.store.applications_for_property(&property.record.id)? {
            if competing.record.id == application.id
                || competing.record.status != ApplicationStatus::Pending
            {
                continue;
            }
            let mut record = competing.record;
            record.status = ApplicationStatus::Declined;
            declined.push((record.tenant_id.clone(), record.id.clone()));
            batch = batch.update(Document::Application(record), competing.revision);
        }
        self.store.commit(batch)?;

        info!(
            application_id = %application.id,
            lease_id = %lease.id,
            declined = declined.len(),
            "application accepted"
        );
        self.notify(Notification::new(
            lease.tenant_id.clone(),
            NotificationKind::ApplicationAccepted,
            lease.id.as_str(),
        ));
        for (tenant, application_id) in declined {
            self.notify(
                Notification::new(
                    tenant,
                    NotificationKind::ApplicationDeclined,
                    application_id.as_str(),
                )
                .with_detail("propertyId", property.record.id.as_str()),
            );
        }
        Ok(lease)
    }

    pub fn decline_application(
        &self,
        landlord: &UserId,
        id: &ApplicationId,
    ) -> Result<RentalApplication, LeasingError> {
        let Versioned {
            revision,
            record: mut application,
        } = self.load_application(id)?;
        if &application.landlord_id != landlord {
            return Err(forbidden(landlord, "decline this application"));
        }
        if application.status.is_terminal() {
            return Err(LeasingError::ApplicationClosed {
                id: id.to_string(),
                status: application.status.label(),
            });
        }

        application.status = ApplicationStatus::Declined;
        self.store.commit(
            WriteBatch::new().update(Document::Application(application.clone()), revision),
        )?;
        self.notify(
            Notification::new(
                application.tenant_id.clone(),
                NotificationKind::ApplicationDeclined,
                application.id.as_str(),
            )
            .with_detail("propertyId", application.property_id.as_str()),
        );
        Ok(application)
    }

    /// Appends the actor's signature line to a pending lease.
    pub fn sign_lease(
        &self,
        actor: &UserId,
        id: &LeaseId,
        signer_name: &str,
        now: DateTime<Utc>,
    ) -> Result<LeaseAgreement, LeasingError> {
        let Versioned {
            revision,
            record: mut lease,
        } = self.load_lease(id)?;
        let party = if &lease.landlord_id == actor {
            SigningParty::Landlord
        } else if &lease.tenant_id == actor {
            SigningParty::Tenant
        } else {
            return Err(forbidden(actor, "sign this lease"));
        };
        if lease.status != LeaseStatus::Pending {
            return Err(LeasingError::NotSignable {
                id: id.to_string(),
                status: lease.status,
            });
        }
        if signer_name.trim().is_empty() {
            return Err(invalid("name", "a signer name is required"));
        }

        let already = match party {
            SigningParty::Landlord => lease.landlord_signed,
            SigningParty::Tenant => lease.tenant_signed,
        };
        if already {
            return Err(LeasingError::AlreadySigned(party));
        }

        lease.lease_text = append_signature(&lease.lease_text, party, signer_name, now);
        match party {
            SigningParty::Landlord => lease.landlord_signed = true,
            SigningParty::Tenant => lease.tenant_signed = true,
        }
        self.store
            .commit(WriteBatch::new().update(Document::Lease(lease.clone()), revision))?;

        info!(lease_id = %lease.id, %party, "lease signed");
        let counterpart = match party {
            SigningParty::Landlord => lease.tenant_id.clone(),
            SigningParty::Tenant => lease.landlord_id.clone(),
        };
        self.notify(
            Notification::new(counterpart, NotificationKind::LeaseSigned, lease.id.as_str())
                .with_detail("party", party.to_string()),
        );
        Ok(lease)
    }

    /// Opens a pending transaction; at most one may be in flight per lease.
    pub fn record_payment(
        &self,
        tenant: &UserId,
        id: &LeaseId,
        request: PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LeasingError> {
        let Versioned {
            revision,
            record: lease,
        } = self.load_lease(id)?;
        if &lease.tenant_id != tenant {
            return Err(forbidden(tenant, "pay for this lease"));
        }
        let kind = match lease.status {
            LeaseStatus::Pending => TransactionType::LeaseActivation,
            LeaseStatus::Active => TransactionType::Rent,
            status => {
                return Err(LeasingError::NotPayable {
                    id: id.to_string(),
                    status,
                })
            }
        };
        if kind == TransactionType::LeaseActivation
            && self.policy.activation_requires_signatures
            && !lease.fully_signed()
        {
            return Err(LifecycleError::MissingSignatures.into());
        }

        if request.months == 0 || request.months > self.policy.term_months {
            return Err(invalid(
                "months",
                format!("must be between 1 and {}", self.policy.term_months),
            ));
        }
        let property = self.load_property(&lease.property_id)?.record;
        let currency = request.currency.trim().to_ascii_uppercase();
        if currency != property.currency {
            return Err(invalid(
                "currency",
                format!("expected {}, got {currency}", property.currency),
            ));
        }
        let expected = property.price.saturating_mul(u64::from(request.months));
        if request.amount != expected {
            return Err(invalid(
                "amount",
                format!("{} month(s) cost {expected}", request.months),
            ));
        }

        let ledger = self.lease_ledger(&lease)?;
        if super::rent::has_pending_payments(&ledger) {
            return Err(LeasingError::PaymentInFlight);
        }

        let transaction = Transaction {
            id: TransactionId::generate(),
            tenant_id: lease.tenant_id.clone(),
            property_id: lease.property_id.clone(),
            lease_id: lease.id.clone(),
            kind,
            status: request.method.initial_status(),
            amount: request.amount,
            currency,
            months: request.months,
            method: request.method,
            date: now,
        };
        // Rewriting the lease bumps its revision, which serializes racing payments.
        let batch = WriteBatch::new()
            .insert(Document::Transaction(transaction.clone()))
            .update(Document::Lease(lease.clone()), revision);
        match self.store.commit(batch) {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => return Err(LeasingError::PaymentInFlight),
            Err(other) => return Err(other.into()),
        }

        info!(
            transaction_id = %transaction.id,
            lease_id = %lease.id,
            kind = transaction.kind.label(),
            months = transaction.months,
            "payment recorded"
        );
        self.notify(
            Notification::new(
                lease.landlord_id.clone(),
                NotificationKind::PaymentSubmitted,
                transaction.id.as_str(),
            )
            .with_detail("leaseId", lease.id.as_str())
            .with_detail("status", transaction.status.label()),
        );
        Ok(transaction)
    }

    /// Settles a pending transaction; a first payment activates its pending lease.
    pub fn confirm_payment(
        &self,
        id: &TransactionId,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, LeasingError> {
        let Versioned {
            revision: transaction_revision,
            record: mut transaction,
        } = self.load_transaction(id)?;
        if !transaction.status.is_pending() {
            return Err(LeasingError::TransactionSettled {
                id: id.to_string(),
                status: transaction.status.label(),
            });
        }
        transaction.status = TransactionStatus::Completed;

        let Versioned {
            revision: lease_revision,
            record: mut lease,
        } = self.load_lease(&transaction.lease_id)?;
        let mut batch = WriteBatch::new().update(
            Document::Transaction(transaction.clone()),
            transaction_revision,
        );

        let activates = transaction.kind == TransactionType::LeaseActivation
            && lease.status == LeaseStatus::Pending;
        if activates {
            let Versioned {
                revision: property_revision,
                record: mut property,
            } = self.load_property(&lease.property_id)?;
            lifecycle::activate(
                &mut lease,
                &mut property,
                transaction.method,
                now,
                &self.policy,
            )?;
            batch = batch
                .update(Document::Lease(lease.clone()), lease_revision)
                .update(Document::Property(property), property_revision);
        }
        self.store.commit(batch)?;

        if activates {
            info!(lease_id = %lease.id, property_id = %lease.property_id, "lease activated");
            self.notify(Notification::new(
                lease.landlord_id.clone(),
                NotificationKind::LeaseActivated,
                lease.id.as_str(),
            ));
        } else {
            info!(transaction_id = %transaction.id, "payment confirmed");
        }

        Ok(PaymentOutcome {
            transaction,
            lease,
            activated: activates,
        })
    }

    pub fn fail_payment(&self, id: &TransactionId) -> Result<Transaction, LeasingError> {
        let Versioned {
            revision,
            record: mut transaction,
        } = self.load_transaction(id)?;
        if !transaction.status.is_pending() {
            return Err(LeasingError::TransactionSettled {
                id: id.to_string(),
                status: transaction.status.label(),
            });
        }

        transaction.status = TransactionStatus::Failed;
        self.store.commit(
            WriteBatch::new().update(Document::Transaction(transaction.clone()), revision),
        )?;
        warn!(transaction_id = %transaction.id, lease_id = %transaction.lease_id, "payment failed");
        self.notify(Notification::new(
            transaction.tenant_id.clone(),
            NotificationKind::PaymentFailed,
            transaction.id.as_str(),
        ));
        Ok(transaction)
    }

    /// `active → terminating`, fixing the grace period and refund.
    pub fn begin_termination(
        &self,
        actor: &UserId,
        id: &LeaseId,
        request: TerminationRequest,
        now: DateTime<Utc>,
    ) -> Result<LeaseAgreement, LeasingError> {
        let Versioned {
            revision,
            record: mut lease,
        } = self.load_lease(id)?;
        if !lifecycle::may_initiate_termination(&lease, actor) {
            return Err(forbidden(actor, "terminate this lease"));
        }

        // The landlord pays the refund, so only they may fix its amount.
        if request.refund.is_some() && &lease.landlord_id != actor {
            return Err(forbidden(actor, "set the termination refund"));
        }

        let property = self.load_property(&lease.property_id)?.record;
        let rent = self.rent_for(&lease, now)?;
        let calculated_refund = request.refund.unwrap_or_else(|| {
            lifecycle::calculate_refund(property.price, rent.next_rent_due_date, now)
        });
        let grace_policy = LeasePolicy {
            grace_period_days: request
                .grace_period_days
                .unwrap_or(self.policy.grace_period_days),
            ..self.policy
        };
        let grace_period_end = grace_policy.grace_period_end(now).map_err(|err| {
            invalid(
                "gracePeriodDays",
                format!("{err}; at most {MAX_GRACE_PERIOD_DAYS} days"),
            )
        })?;

        lifecycle::begin_termination(
            &mut lease,
            TerminationTerms {
                grace_period_end,
                calculated_refund,
            },
        )?;
        self.store
            .commit(WriteBatch::new().update(Document::Lease(lease.clone()), revision))?;

        info!(
            lease_id = %lease.id,
            refund = calculated_refund,
            grace_period_end = %grace_period_end,
            "lease termination started"
        );
        let counterpart = if &lease.tenant_id == actor {
            lease.landlord_id.clone()
        } else {
            lease.tenant_id.clone()
        };
        self.notify(
            Notification::new(
                counterpart,
                NotificationKind::TerminationStarted,
                lease.id.as_str(),
            )
            .with_detail("calculatedRefund", calculated_refund.to_string())
            .with_detail("gracePeriodEnd", grace_period_end.to_rfc3339()),
        );
        Ok(lease)
    }

    /// Tenant acknowledges the refund, closing the lease before the grace period ends.
    pub fn confirm_compensation_received(
        &self,
        tenant: &UserId,
        id: &LeaseId,
        now: DateTime<Utc>,
    ) -> Result<LeaseAgreement, LeasingError> {
        let lease = self.load_lease(id)?;
        if &lease.record.tenant_id != tenant {
            return Err(forbidden(tenant, "confirm compensation for this lease"));
        }
        self.expire_lease(lease, ExpiryReason::CompensationReceived, now)
    }

    /// Expires every terminating lease whose grace period ended before `now`.
    pub fn reconcile_expired(&self, now: DateTime<Utc>) -> Result<ReconcileReport, LeasingError> {
        let mut report = ReconcileReport::default();
        for lease in self.store.leases_with_status(LeaseStatus::Terminating)? {
            if !lifecycle::due_for_expiry(&lease.record, now) {
                continue;
            }
            let lease_id = lease.record.id.clone();
            match self.expire_lease(lease, ExpiryReason::GracePeriodElapsed, now) {
                Ok(_) => report.expired.push(lease_id),
                Err(LeasingError::Store(StoreError::Conflict { .. })) => {
                    warn!(lease_id = %lease_id, "lease changed during reconciliation; retrying next sweep");
                    report.skipped += 1;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(report)
    }

    pub fn rent_status(&self, id: &LeaseId, now: DateTime<Utc>) -> Result<RentStatus, LeasingError> {
        let lease = self.load_lease(id)?.record;
        self.rent_for(&lease, now)
    }

    pub fn lease_overview(
        &self,
        id: &LeaseId,
        now: DateTime<Utc>,
    ) -> Result<LeaseOverview, LeasingError> {
        let lease = self.load_lease(id)?.record;
        let rent = self.rent_for(&lease, now)?;
        let standing = LeaseStanding::evaluate(&lease, now, &self.policy);
        Ok(LeaseOverview {
            lease,
            standing,
            rent,
        })
    }

    /// A tenant's leases joined with their properties via chunked multi-gets.
    pub fn tenant_leases(
        &self,
        tenant: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TenantLeaseSummary>, LeasingError> {
        let leases = self.store.leases_for_tenant(tenant)?;
        let property_ids: Vec<PropertyId> = leases
            .iter()
            .map(|lease| lease.record.property_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut properties = HashMap::new();
        for chunk in query_chunks(&property_ids) {
            for property in self.store.properties(chunk)? {
                properties.insert(property.record.id.clone(), property.record);
            }
        }

        Ok(leases
            .into_iter()
            .map(|lease| {
                let lease = lease.record;
                TenantLeaseSummary {
                    property: properties.get(&lease.property_id).cloned(),
                    standing: LeaseStanding::evaluate(&lease, now, &self.policy),
                    lease,
                }
            })
            .collect())
    }
}

impl<S, N> LeasingService<S, N>
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    fn expire_lease(
        &self,
        lease: Versioned<LeaseAgreement>,
        reason: ExpiryReason,
        now: DateTime<Utc>,
    ) -> Result<LeaseAgreement, LeasingError> {
        let Versioned {
            revision: lease_revision,
            record: mut lease,
        } = lease;
        let Versioned {
            revision: property_revision,
            record: mut property,
        } = self.load_property(&lease.property_id)?;

        lifecycle::expire(&mut lease, &mut property, reason, now)?;
        self.store.commit(
            WriteBatch::new()
                .update(Document::Lease(lease.clone()), lease_revision)
                .update(Document::Property(property), property_revision),
        )?;

        info!(lease_id = %lease.id, ?reason, "lease expired");
        for recipient in [lease.landlord_id.clone(), lease.tenant_id.clone()] {
            self.notify(Notification::new(
                recipient,
                NotificationKind::LeaseExpired,
                lease.id.as_str(),
            ));
        }
        Ok(lease)
    }

    fn rent_for(
        &self,
        lease: &LeaseAgreement,
        now: DateTime<Utc>,
    ) -> Result<RentStatus, LeasingError> {
        let lease_start = match lease.status {
            LeaseStatus::Active | LeaseStatus::Terminating => Some(lease.start_date),
            LeaseStatus::Pending | LeaseStatus::Expired => None,
        };
        let ledger = self.lease_ledger(lease)?;
        Ok(RentStatus::evaluate(lease_start, &ledger, now))
    }

    fn lease_ledger(&self, lease: &LeaseAgreement) -> Result<Vec<Transaction>, LeasingError> {
        Ok(self
            .store
            .transactions_for(&lease.tenant_id, &lease.property_id)?
            .into_iter()
            .filter(|transaction| transaction.lease_id == lease.id)
            .collect())
    }

    fn notify(&self, notification: Notification) {
        let kind = notification.kind;
        if let Err(err) = self.notifier.send(notification) {
            warn!(?kind, error = %err, "notification dropped");
        }
    }

    fn load_property(&self, id: &PropertyId) -> Result<Versioned<Property>, LeasingError> {
        self.store
            .property(id)?
            .ok_or_else(|| not_found("property", id))
    }

    fn load_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Versioned<RentalApplication>, LeasingError> {
        self.store
            .application(id)?
            .ok_or_else(|| not_found("application", id))
    }

    fn load_lease(&self, id: &LeaseId) -> Result<Versioned<LeaseAgreement>, LeasingError> {
        self.store.lease(id)?.ok_or_else(|| not_found("lease", id))
    }

    fn load_transaction(&self, id: &TransactionId) -> Result<Versioned<Transaction>, LeasingError> {
        self.store
            .transaction(id)?
            .ok_or_else(|| not_found("transaction", id))
    }
}

fn validate_listing(property: &Property) -> Result<(), LeasingError> {
    if property.price == 0 {
        return Err(invalid("price", "monthly rent must be greater than zero"));
    }
    if !is_currency_code(&property.currency) {
        return Err(invalid(
            "currency",
            format!("'{}' is not a three-letter code", property.currency),
        ));
    }
    if property.location.address.trim().is_empty() || property.location.city.trim().is_empty() {
        return Err(invalid("location", "address and city are required"));
    }
    if property.property_type == PropertyType::Studio && property.bedrooms != 0 {
        return Err(invalid("bedrooms", "a studio has no separate bedrooms"));
    }
    Ok(())
}
