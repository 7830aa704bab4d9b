//! Quota polling: fetch, normalize, and watch connection health.

pub mod parser;
pub mod poller;
pub mod types;

use std::future::Future;

use crate::client::UserStatusResponse;
use crate::error::QuotaError;

pub use parser::{format_time, parse_user_status};
pub use poller::{FailureTracker, FetchOutcome, PollerEvent, PollerOptions, PollerPhase, QuotaPoller};
pub use types::{ModelQuota, PromptCredits, QuotaSnapshot};

/// Anything that can produce a raw user status.
///
/// Implemented by [`LanguageServerClient`](crate::client::LanguageServerClient);
/// tests substitute scripted sources.
pub trait QuotaSource: Send + Sync + 'static {
    fn fetch_user_status(
        &self,
    ) -> impl Future<Output = Result<UserStatusResponse, QuotaError>> + Send;
}
