use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingNotifier, SandboxPaymentProcessor};
use crate::jobs::spawn_reconciliation;
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rentwise::config::AppConfig;
use rentwise::error::AppError;
use rentwise::workflows::leasing::{LeasingService, MemoryLeasingStore};
use rentwise::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(MemoryLeasingStore::new());
    let notifier = Arc::new(LoggingNotifier);
    let leasing_service = Arc::new(LeasingService::new(
        store,
        notifier,
        config.leasing.policy,
    ));
    let processor = Arc::new(SandboxPaymentProcessor::new(
        config.payments.base_url.clone(),
    ));

    let reconciliation = spawn_reconciliation(
        leasing_service.clone(),
        config.leasing.reconcile_interval,
    );

    let app = with_service_routes(leasing_service, processor)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        reconcile_every_secs = config.leasing.reconcile_interval.as_secs(),
        "leasing service ready"
    );

    let served = axum::serve(listener, app).await;
    reconciliation.abort();
    served?;
    Ok(())
}
