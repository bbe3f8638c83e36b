//! Boundary to the payment processor's connected-account API.

use serde::{Deserialize, Serialize};

use super::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub user_id: UserId,
    pub email: String,
    #[serde(default)]
    pub account_id: Option<String>,
    pub return_url: String,
    pub refresh_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingLink {
    pub account_id: String,
    pub url: String,
}

/// Verification state of a landlord's payout account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Incomplete,
    Pending,
    Active,
    Error,
}

impl AccountStatus {
    pub const fn can_receive_payouts(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusReport {
    pub account_id: String,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLink {
    pub account_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentProcessorError {
    #[error("unknown payment account {0}")]
    UnknownAccount(String),
    #[error("payment account {0} has not finished onboarding")]
    OnboardingIncomplete(String),
    #[error("invalid onboarding request: {0}")]
    InvalidRequest(String),
    #[error("payment processor unavailable: {0}")]
    Unavailable(String),
}

/// The three request/response calls the marketplace makes to the processor.
pub trait PaymentProcessor: Send + Sync {
    fn connect(&self, request: ConnectRequest) -> Result<OnboardingLink, PaymentProcessorError>;
    fn account_status(
        &self,
        account_id: &str,
    ) -> Result<AccountStatusReport, PaymentProcessorError>;
    fn dashboard(&self, account_id: &str) -> Result<DashboardLink, PaymentProcessorError>;
}
