use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use rentwise::workflows::leasing::{
    AccountStatus, AccountStatusReport, ConnectRequest, DashboardLink, Notification, Notifier,
    NotifyError, OnboardingLink, PaymentProcessor, PaymentProcessorError,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Writes notifications to the log instead of a delivery service.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            to = %notification.to_user_id,
            kind = ?notification.kind,
            subject = %notification.subject_id,
            "notification queued"
        );
        Ok(())
    }
}

/// Processor stand-in that hands out deterministic links under a base URL.
#[derive(Debug, Default)]
pub(crate) struct SandboxPaymentProcessor {
    base_url: String,
    accounts: Mutex<HashMap<String, AccountStatus>>,
}

impl SandboxPaymentProcessor {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Marks onboarding finished, as the processor's webhook would.
    #[cfg(test)]
    pub(crate) fn complete_onboarding(&self, account_id: &str) -> Result<(), PaymentProcessorError> {
        let mut accounts = self.accounts()?;
        let status = accounts
            .get_mut(account_id)
            .ok_or_else(|| PaymentProcessorError::UnknownAccount(account_id.to_string()))?;
        *status = AccountStatus::Active;
        Ok(())
    }

    fn accounts(&self) -> Result<MutexGuard<'_, HashMap<String, AccountStatus>>, PaymentProcessorError> {
        self.accounts
            .lock()
            .map_err(|_| PaymentProcessorError::Unavailable("account registry poisoned".to_string()))
    }
}

impl PaymentProcessor for SandboxPaymentProcessor {
    fn connect(&self, request: ConnectRequest) -> Result<OnboardingLink, PaymentProcessorError> {
        if !request.email.contains('@') {
            return Err(PaymentProcessorError::InvalidRequest(format!(
                "'{}' is not an email address",
                request.email
            )));
        }
        if request.return_url.trim().is_empty() || request.refresh_url.trim().is_empty() {
            return Err(PaymentProcessorError::InvalidRequest(
                "return and refresh urls are required".to_string(),
            ));
        }

        let account_id = request
            .account_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("acct_{}", request.user_id));
        let mut accounts = self.accounts()?;
        let status = *accounts
            .entry(account_id.clone())
            .or_insert(AccountStatus::Incomplete);
        if status == AccountStatus::Error {
            return Err(PaymentProcessorError::InvalidRequest(format!(
                "account {account_id} is disabled"
            )));
        }

        info!(%account_id, user_id = %request.user_id, "onboarding link issued");
        Ok(OnboardingLink {
            url: format!("{}/connect/onboarding/{account_id}", self.base_url),
            account_id,
        })
    }

    fn account_status(
        &self,
        account_id: &str,
    ) -> Result<AccountStatusReport, PaymentProcessorError> {
        let accounts = self.accounts()?;
        let status = accounts
            .get(account_id)
            .copied()
            .ok_or_else(|| PaymentProcessorError::UnknownAccount(account_id.to_string()))?;
        Ok(AccountStatusReport {
            account_id: account_id.to_string(),
            status,
        })
    }

    fn dashboard(&self, account_id: &str) -> Result<DashboardLink, PaymentProcessorError> {
        let report = self.account_status(account_id)?;
        if !report.status.can_receive_payouts() {
            return Err(PaymentProcessorError::OnboardingIncomplete(
                account_id.to_string(),
            ));
        }
        Ok(DashboardLink {
            url: format!("{}/dashboard/{account_id}", self.base_url),
            account_id: report.account_id,
        })
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD or RFC 3339 ({err})"))
        .and_then(|date| {
            date.and_hms_opt(0, 0, 0)
                .map(|midnight| Utc.from_utc_datetime(&midnight))
                .ok_or_else(|| format!("'{raw}' has no midnight"))
        })
}
