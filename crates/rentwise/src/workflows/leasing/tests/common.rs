use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::leasing::domain::{
    LeaseAgreement, Location, PaymentMethod, Property, PropertyType, Transaction, UserId,
};
use crate::workflows::leasing::memory::MemoryLeasingStore;
use crate::workflows::leasing::notify::{Notification, NotificationKind, Notifier, NotifyError};
use crate::workflows::leasing::service::{
    ApplicationRequest, LeasingService, NewProperty, PaymentRequest,
};
use crate::workflows::leasing::LeasePolicy;

pub(super) type TestService = LeasingService<MemoryLeasingStore, RecordingNotifier>;

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn landlord() -> UserId {
    UserId::from("landlord-ada")
}

pub(super) fn tenant() -> UserId {
    UserId::from("tenant-bo")
}

pub(super) fn listing() -> NewProperty {
    NewProperty {
        price: 150_000,
        currency: "USD".to_string(),
        location: Location {
            address: "123 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
            postal_code: "62701".to_string(),
        },
        property_type: PropertyType::Apartment,
        bedrooms: 2,
        amenities: vec!["Parking".to_string()],
        rules: vec!["No smoking".to_string()],
        lease_template: String::new(),
    }
}

pub(super) fn payment(months: u32, method: PaymentMethod) -> PaymentRequest {
    PaymentRequest {
        months,
        amount: 150_000 * u64::from(months),
        currency: "USD".to_string(),
        method,
    }
}

pub(super) fn build_service() -> (TestService, Arc<MemoryLeasingStore>, Arc<RecordingNotifier>) {
    build_service_with_policy(LeasePolicy::default())
}

pub(super) fn build_service_with_policy(
    policy: LeasePolicy,
) -> (TestService, Arc<MemoryLeasingStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(MemoryLeasingStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = LeasingService::new(store.clone(), notifier.clone(), policy);
    (service, store, notifier)
}

/// Listed property with an accepted application and its pending lease.
pub(super) fn pending_lease(service: &TestService) -> (Property, LeaseAgreement) {
    let property = service
        .create_property(&landlord(), listing())
        .expect("listing is valid");
    let application = service
        .submit_application(
            &tenant(),
            ApplicationRequest {
                property_id: property.id.clone(),
                message_to_landlord: "Quiet professional, no pets.".to_string(),
            },
            at(2023, 12, 10),
        )
        .expect("application accepted for review");
    let lease = service
        .accept_application(&landlord(), &application.id, at(2023, 12, 12))
        .expect("landlord accepts");
    (property, lease)
}

/// Pending lease activated by a confirmed card payment of `months` at `activated_at`.
pub(super) fn active_lease(
    service: &TestService,
    months: u32,
    activated_at: DateTime<Utc>,
) -> (Property, LeaseAgreement, Transaction) {
    let (property, lease) = pending_lease(service);
    let transaction = service
        .record_payment(&tenant(), &lease.id, payment(months, PaymentMethod::Card), activated_at)
        .expect("activation payment recorded");
    let outcome = service
        .confirm_payment(&transaction.id, activated_at)
        .expect("processor confirms");
    (property, outcome.lease, outcome.transaction)
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn kinds_for(&self, user: &UserId) -> Vec<NotificationKind> {
        self.sent()
            .into_iter()
            .filter(|notification| &notification.to_user_id == user)
            .map(|notification| notification.kind)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay refused".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
