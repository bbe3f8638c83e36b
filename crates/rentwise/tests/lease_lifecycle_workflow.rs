use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rentwise::workflows::leasing::{
    ApplicationRequest, DraftEvent, LeasePolicy, LeaseStatus, LeasingService, Location,
    MemoryLeasingStore, Notification, NotificationKind, Notifier, NotifyError, PaymentMethod,
    PaymentRequest, PropertyDraft, PropertyStatus, PropertyType, TerminationRequest, UserId,
};

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 30, 0)
        .single()
        .expect("valid instant")
}

#[derive(Default)]
struct Inbox {
    delivered: Mutex<Vec<Notification>>,
}

impl Notifier for Inbox {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .expect("inbox mutex poisoned")
            .push(notification);
        Ok(())
    }
}

#[test]
fn listing_to_expiry_follows_the_lease_state_machine() {
    let store = Arc::new(MemoryLeasingStore::new());
    let inbox = Arc::new(Inbox::default());
    let service = LeasingService::new(store, inbox.clone(), LeasePolicy::default());
    let landlord = UserId::from("landlord-workflow");
    let tenant = UserId::from("tenant-workflow");

    let draft = [
        DraftEvent::SetPropertyType(PropertyType::Studio),
        DraftEvent::SetLocation(Location {
            address: "42 Quay Street".to_string(),
            city: "Portsmouth".to_string(),
            state: String::new(),
            country: "GB".to_string(),
            postal_code: "PO1 2AB".to_string(),
        }),
        DraftEvent::SetPrice {
            price: 95_000,
            currency: "gbp".to_string(),
        },
        DraftEvent::AddAmenity("Bike store".to_string()),
    ]
    .into_iter()
    .try_fold(PropertyDraft::default(), PropertyDraft::apply)
    .expect("draft edits apply");
    let property = service
        .create_property(
            &landlord,
            draft.into_new_property().expect("draft is complete"),
        )
        .expect("studio listed");
    assert_eq!(property.bedrooms, 0);
    assert_eq!(property.currency, "GBP");

    let application = service
        .submit_application(
            &tenant,
            ApplicationRequest {
                property_id: property.id.clone(),
                message_to_landlord: "Available from March.".to_string(),
            },
            at(2024, 2, 1),
        )
        .expect("application submitted");
    let lease = service
        .accept_application(&landlord, &application.id, at(2024, 2, 3))
        .expect("application accepted");
    assert_eq!(lease.status, LeaseStatus::Pending);
    assert!(lease.lease_text.contains("42 Quay Street, Portsmouth"));
    assert!(lease.lease_text.contains("950.00 GBP"));

    service
        .sign_lease(&landlord, &lease.id, "Lee Landlord", at(2024, 2, 4))
        .expect("landlord signs");
    service
        .sign_lease(&tenant, &lease.id, "Tam Tenant", at(2024, 2, 5))
        .expect("tenant signs");

    let activation = service
        .record_payment(
            &tenant,
            &lease.id,
            PaymentRequest {
                months: 3,
                amount: 285_000,
                currency: "GBP".to_string(),
                method: PaymentMethod::BankTransfer,
            },
            at(2024, 3, 1),
        )
        .expect("activation payment recorded");
    let outcome = service
        .confirm_payment(&activation.id, at(2024, 3, 2))
        .expect("transfer verified");
    assert!(outcome.activated);
    assert_eq!(outcome.lease.start_date, at(2024, 3, 2));

    let occupied = service.property(&property.id).expect("property stored");
    assert_eq!(occupied.status, PropertyStatus::Occupied);
    assert_eq!(occupied.current_tenant_id.as_ref(), Some(&tenant));

    let overview = service
        .lease_overview(&lease.id, at(2024, 4, 15))
        .expect("overview");
    assert_eq!(overview.rent.next_rent_due_date, Some(at(2024, 6, 2)));
    assert!(!overview.rent.is_rent_due);
    assert!(overview.standing.fully_signed);

    let terminating = service
        .begin_termination(
            &tenant,
            &lease.id,
            TerminationRequest::default(),
            at(2024, 4, 15),
        )
        .expect("termination starts");
    assert_eq!(terminating.calculated_refund, Some(95_000));

    let report = service
        .reconcile_expired(at(2024, 5, 1))
        .expect("sweep runs");
    assert_eq!(report.expired, vec![lease.id.clone()]);

    let released = service.property(&property.id).expect("property stored");
    assert_eq!(released.status, PropertyStatus::Available);
    assert_eq!(released.current_tenant_id, None);

    let delivered = inbox.delivered.lock().expect("inbox mutex poisoned");
    assert!(delivered
        .iter()
        .any(|notice| notice.kind == NotificationKind::LeaseActivated && notice.to_user_id == landlord));
    assert_eq!(
        delivered
            .iter()
            .filter(|notice| notice.kind == NotificationKind::LeaseExpired)
            .count(),
        2
    );
}
