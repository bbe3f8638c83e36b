use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ApplicationId, LeaseId, PropertyId, TransactionId, UserId};
use super::media::MediaUpload;
use super::notify::Notifier;
use super::service::{
    ApplicationRequest, LeasingError, LeasingService, NewProperty, PaymentRequest,
    PropertyUpdate, TerminationRequest,
};
use super::store::{LeasingStore, StoreError};

/// Header carrying the authenticated user's id.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AsOf {
    pub(crate) as_of: Option<DateTime<Utc>>,
}

impl AsOf {
    fn instant(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignatureBody {
    name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaRemoval {
    url: String,
}

/// Router exposing property, application, lease and transaction endpoints.
pub fn leasing_router<S, N>(service: Arc<LeasingService<S, N>>) -> Router
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/properties", post(create_property_handler::<S, N>))
        .route(
            "/api/v1/properties/:property_id",
            get(property_handler::<S, N>).patch(update_property_handler::<S, N>),
        )
        .route(
            "/api/v1/properties/:property_id/media",
            post(register_media_handler::<S, N>).delete(remove_media_handler::<S, N>),
        )
        .route("/api/v1/applications", post(submit_application_handler::<S, N>))
        .route(
            "/api/v1/applications/:application_id/accept",
            post(accept_application_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/decline",
            post(decline_application_handler::<S, N>),
        )
        .route("/api/v1/leases/:lease_id", get(lease_handler::<S, N>))
        .route("/api/v1/leases/:lease_id/sign", post(sign_handler::<S, N>))
        .route(
            "/api/v1/leases/:lease_id/payments",
            post(payment_handler::<S, N>),
        )
        .route("/api/v1/leases/:lease_id/rent", get(rent_handler::<S, N>))
        .route(
            "/api/v1/leases/:lease_id/termination",
            post(termination_handler::<S, N>),
        )
        .route(
            "/api/v1/leases/:lease_id/compensation-received",
            post(compensation_handler::<S, N>),
        )
        .route(
            "/api/v1/transactions/:transaction_id/confirm",
            post(confirm_transaction_handler::<S, N>),
        )
        .route(
            "/api/v1/transactions/:transaction_id/fail",
            post(fail_transaction_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/leases",
            get(tenant_leases_handler::<S, N>),
        )
        .with_state(service)
}

/// HTTP status for a service failure.
pub fn status_for(error: &LeasingError) -> StatusCode {
    match error {
        LeasingError::NotFound { .. } | LeasingError::Store(StoreError::Missing { .. }) => {
            StatusCode::NOT_FOUND
        }
        LeasingError::Forbidden { .. } => StatusCode::FORBIDDEN,
        LeasingError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LeasingError::PropertyUnavailable(_)
        | LeasingError::DuplicateApplication
        | LeasingError::ApplicationClosed { .. }
        | LeasingError::LeaseAlreadyOpen(_)
        | LeasingError::NotSignable { .. }
        | LeasingError::AlreadySigned(_)
        | LeasingError::NotPayable { .. }
        | LeasingError::PaymentInFlight
        | LeasingError::TransactionSettled { .. }
        | LeasingError::Lifecycle(_)
        | LeasingError::Store(StoreError::Conflict { .. })
        | LeasingError::Store(StoreError::AlreadyExists { .. }) => StatusCode::CONFLICT,
        LeasingError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        LeasingError::Store(StoreError::TooManyIds { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: LeasingError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!(error = %error, "leasing request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, LeasingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn acting_user(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
        .ok_or_else(|| {
            let payload = json!({
                "error": format!("missing {USER_HEADER} header"),
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

fn not_a_party(actor: &UserId) -> Response {
    error_response(LeasingError::Forbidden {
        actor: actor.to_string(),
        action: "view this lease",
    })
}

pub(crate) async fn create_property_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Json(listing): Json<NewProperty>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let landlord = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.create_property(&landlord, listing),
    )
}

pub(crate) async fn property_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(property_id): Path<String>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.property(&PropertyId(property_id)),
    )
}

pub(crate) async fn update_property_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<PropertyUpdate>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let landlord = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.update_property(&landlord, &PropertyId(property_id), update),
    )
}

pub(crate) async fn register_media_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
    Json(upload): Json<MediaUpload>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let landlord = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let result = service
        .register_media(&landlord, &PropertyId(property_id), upload, Utc::now())
        .map(|path| json!({ "path": path }));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn remove_media_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(property_id): Path<String>,
    headers: HeaderMap,
    Json(removal): Json<MediaRemoval>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let landlord = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.remove_media(&landlord, &PropertyId(property_id), &removal.url),
    )
}

pub(crate) async fn submit_application_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Json(request): Json<ApplicationRequest>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let tenant = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.submit_application(&tenant, request, Utc::now()),
    )
}

pub(crate) async fn accept_application_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let landlord = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::CREATED,
        service.accept_application(&landlord, &ApplicationId(application_id), Utc::now()),
    )
}

pub(crate) async fn decline_application_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let landlord = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.decline_application(&landlord, &ApplicationId(application_id)),
    )
}

pub(crate) async fn lease_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(lease_id): Path<String>,
    Query(as_of): Query<AsOf>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let actor = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match service.lease_overview(&LeaseId(lease_id), as_of.instant()) {
        Ok(overview) if overview.lease.is_party(&actor) => {
            (StatusCode::OK, Json(overview)).into_response()
        }
        Ok(_) => not_a_party(&actor),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rent_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(lease_id): Path<String>,
    Query(as_of): Query<AsOf>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let actor = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match service.lease_overview(&LeaseId(lease_id), as_of.instant()) {
        Ok(overview) if overview.lease.is_party(&actor) => {
            (StatusCode::OK, Json(overview.rent)).into_response()
        }
        Ok(_) => not_a_party(&actor),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn sign_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(lease_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SignatureBody>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let actor = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.sign_lease(&actor, &LeaseId(lease_id), &body.name, Utc::now()),
    )
}

pub(crate) async fn payment_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(lease_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let tenant = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::ACCEPTED,
        service.record_payment(&tenant, &LeaseId(lease_id), request, Utc::now()),
    )
}

pub(crate) async fn termination_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(lease_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<TerminationRequest>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let actor = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.begin_termination(&actor, &LeaseId(lease_id), request, Utc::now()),
    )
}

pub(crate) async fn compensation_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(lease_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let tenant = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.confirm_compensation_received(&tenant, &LeaseId(lease_id), Utc::now()),
    )
}

// Settlement callbacks come from the payment processor or a back-office check, not a party.
pub(crate) async fn confirm_transaction_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(transaction_id): Path<String>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.confirm_payment(&TransactionId(transaction_id), Utc::now()),
    )
}

pub(crate) async fn fail_transaction_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(transaction_id): Path<String>,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.fail_payment(&TransactionId(transaction_id)),
    )
}

pub(crate) async fn tenant_leases_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    Path(tenant_id): Path<String>,
    Query(as_of): Query<AsOf>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    let actor = match acting_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let tenant = UserId(tenant_id);
    if actor != tenant {
        return error_response(LeasingError::Forbidden {
            actor: actor.to_string(),
            action: "list another tenant's leases",
        });
    }
    respond(
        StatusCode::OK,
        service.tenant_leases(&tenant, as_of.instant()),
    )
}
