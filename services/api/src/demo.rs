use crate::infra::{parse_instant, LoggingNotifier};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, ValueEnum};
use rentwise::error::AppError;
use rentwise::workflows::leasing::{
    ApplicationRequest, LeasePolicy, LeaseStanding, LeasingService, Location, MemoryLeasingStore,
    NewProperty, PaymentMethod, PaymentRequest, PropertyType, RentStatus, TerminationRequest,
    Transaction, TransactionId, TransactionStatus, TransactionType, UserId,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum DemoPaymentMethod {
    #[default]
    Card,
    BankTransfer,
}

impl From<DemoPaymentMethod> for PaymentMethod {
    fn from(value: DemoPaymentMethod) -> Self {
        match value {
            DemoPaymentMethod::Card => PaymentMethod::Card,
            DemoPaymentMethod::BankTransfer => PaymentMethod::BankTransfer,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Activation instant (YYYY-MM-DD or RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Months covered by the activation payment.
    #[arg(long, default_value_t = 2)]
    pub(crate) months: u32,
    /// How the tenant pays.
    #[arg(long, value_enum, default_value_t = DemoPaymentMethod::Card)]
    pub(crate) method: DemoPaymentMethod,
    /// Stop after activation instead of walking through termination.
    #[arg(long)]
    pub(crate) skip_termination: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RentStatusArgs {
    /// Lease start (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) lease_start: Option<DateTime<Utc>>,
    /// Months covered by each completed payment; repeat for several payments
    #[arg(long = "months")]
    pub(crate) months: Vec<u32>,
    /// Treat one further payment as still awaiting settlement
    #[arg(long)]
    pub(crate) pending: bool,
    /// Evaluation instant (defaults to now)
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

pub(crate) fn run_rent_status(args: RentStatusArgs) -> Result<(), AppError> {
    let RentStatusArgs {
        lease_start,
        months,
        pending,
        as_of,
    } = args;
    let now = as_of.unwrap_or_else(Utc::now);

    let mut ledger: Vec<Transaction> = months
        .iter()
        .map(|months| ledger_entry(*months, TransactionStatus::Completed, now))
        .collect();
    if pending {
        ledger.push(ledger_entry(1, TransactionStatus::Pending, now));
    }

    let status = RentStatus::evaluate(lease_start, &ledger, now);
    render_rent_status(&status, now);
    Ok(())
}

fn ledger_entry(months: u32, status: TransactionStatus, date: DateTime<Utc>) -> Transaction {
    Transaction {
        id: TransactionId::generate(),
        tenant_id: UserId::from("cli-tenant"),
        property_id: "cli-property".into(),
        lease_id: "cli-lease".into(),
        kind: TransactionType::Rent,
        status,
        amount: 0,
        currency: "USD".to_string(),
        months,
        method: PaymentMethod::Card,
        date,
    }
}

fn render_rent_status(status: &RentStatus, now: DateTime<Utc>) {
    println!("Rent status as of {}", now.format("%Y-%m-%d %H:%M UTC"));
    println!("- months paid: {}", status.total_months_paid);
    match status.next_rent_due_date {
        Some(due) => println!("- next rent due: {}", due.format("%Y-%m-%d %H:%M UTC")),
        None => println!("- next rent due: n/a (lease not started)"),
    }
    println!("- rent due now: {}", yes_no(status.is_rent_due));
    println!("- payment in flight: {}", yes_no(status.has_pending_payments));
    println!("- can pay rent: {}", yes_no(status.can_pay_rent));
}

fn render_standing(standing: &LeaseStanding) {
    println!(
        "- lease {} | signed by both: {} | term ends {}",
        standing.status,
        yes_no(standing.fully_signed),
        standing.term_ends_on.format("%Y-%m-%d")
    );
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        months,
        method,
        skip_termination,
    } = args;
    let start = start.unwrap_or_else(Utc::now);
    let policy = LeasePolicy::default();
    let service = LeasingService::new(
        Arc::new(MemoryLeasingStore::new()),
        Arc::new(LoggingNotifier),
        policy,
    );
    let landlord = UserId::from("demo-landlord");
    let tenant = UserId::from("demo-tenant");

    println!("Rental marketplace lease demo");
    let property = service.create_property(&landlord, demo_listing())?;
    println!(
        "\nListed {} at {}, {} for {} {} / month",
        property.id,
        property.location.address,
        property.location.city,
        rentwise::workflows::leasing::template::format_minor_units(property.price),
        property.currency
    );

    let application = service.submit_application(
        &tenant,
        ApplicationRequest {
            property_id: property.id.clone(),
            message_to_landlord: "Hoping to move in soon.".to_string(),
        },
        start - Duration::days(7),
    )?;
    let lease = service.accept_application(&landlord, &application.id, start - Duration::days(5))?;
    println!("Application {} approved; lease {} drafted", application.id, lease.id);

    service.sign_lease(&landlord, &lease.id, "Demo Landlord", start - Duration::days(4))?;
    service.sign_lease(&tenant, &lease.id, "Demo Tenant", start - Duration::days(3))?;

    let payment = service.record_payment(
        &tenant,
        &lease.id,
        PaymentRequest {
            months,
            amount: property.price.saturating_mul(u64::from(months)),
            currency: property.currency.clone(),
            method: method.into(),
        },
        start,
    )?;
    println!(
        "Payment {} recorded as {} ({})",
        payment.id,
        payment.kind.label(),
        payment.status.label()
    );
    let outcome = service.confirm_payment(&payment.id, start)?;
    println!(
        "Payment settled; lease activated: {}",
        yes_no(outcome.activated)
    );

    let overview = service.lease_overview(&lease.id, start)?;
    render_standing(&overview.standing);
    render_rent_status(&overview.rent, start);

    if skip_termination {
        return Ok(());
    }

    let terminate_at = start + Duration::days(10);
    let terminating = service.begin_termination(
        &landlord,
        &lease.id,
        TerminationRequest::default(),
        terminate_at,
    )?;
    println!(
        "\nTermination started; refund {} {} within the grace period ending {}",
        rentwise::workflows::leasing::template::format_minor_units(
            terminating.calculated_refund.unwrap_or_default()
        ),
        property.currency,
        terminating
            .termination_grace_period_end
            .map(|end| end.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    );

    let sweep_at = terminate_at + Duration::days(i64::from(policy.grace_period_days) + 1);
    let report = service.reconcile_expired(sweep_at)?;
    println!(
        "Reconciliation on {} expired {} lease(s)",
        sweep_at.format("%Y-%m-%d"),
        report.expired.len()
    );
    let property = service.property(&property.id)?;
    println!(
        "Property {} is {:?} again",
        property.id, property.status
    );
    Ok(())
}

fn demo_listing() -> NewProperty {
    NewProperty {
        price: 125_000,
        currency: "USD".to_string(),
        location: Location {
            address: "77 Orchard Lane".to_string(),
            city: "Madison".to_string(),
            state: "WI".to_string(),
            country: "US".to_string(),
            postal_code: "53703".to_string(),
        },
        property_type: PropertyType::Townhouse,
        bedrooms: 3,
        amenities: vec!["Garage".to_string(), "In-unit laundry".to_string()],
        rules: vec!["No smoking".to_string()],
        lease_template: String::new(),
    }
}
