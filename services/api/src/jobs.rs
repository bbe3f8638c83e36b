use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rentwise::workflows::leasing::{LeasingService, LeasingStore, Notifier, ReconcileReport};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Expires terminating leases whose grace period has run out, once per tick.
pub(crate) fn spawn_reconciliation<S, N>(
    service: Arc<LeasingService<S, N>>,
    every: Duration,
) -> JoinHandle<()>
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            run_sweep(&service, Utc::now());
        }
    })
}

pub(crate) fn run_sweep<S, N>(
    service: &LeasingService<S, N>,
    now: DateTime<Utc>,
) -> Option<ReconcileReport>
where
    S: LeasingStore + 'static,
    N: Notifier + 'static,
{
    match service.reconcile_expired(now) {
        Ok(report) if report.expired.is_empty() && report.skipped == 0 => {
            debug!(%now, "lease reconciliation found nothing to expire");
            Some(report)
        }
        Ok(report) => {
            info!(
                %now,
                expired = report.expired.len(),
                skipped = report.skipped,
                "lease reconciliation completed"
            );
            Some(report)
        }
        Err(err) => {
            error!(error = %err, "lease reconciliation failed; retrying next tick");
            None
        }
    }
}
