//! agquota-core: find the Antigravity language server and keep a live quota feed.
//!
//! Discovery runs in three phases (process lookup, port lookup, port
//! verification) behind a per-OS [`platform::PlatformStrategy`]. The
//! resulting [`discovery::ConnectionParameters`] are handed to a
//! [`quota::QuotaPoller`], which fetches the user status on a fixed period
//! and asks its owner to re-run discovery after sustained failure.
//!
//! ```ignore
//! use agquota_core::discovery::ProcessResolver;
//! use agquota_core::quota::{QuotaPoller, PollerEvent};
//!
//! let resolver = ProcessResolver::for_current_platform("antigravity")?;
//! if let Some(params) = resolver.resolve(3).await {
//!     let poller = QuotaPoller::connect(params, Language::En)?;
//!     let mut events = poller.subscribe();
//!     poller.start(Duration::from_secs(120));
//! }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod i18n;
pub mod platform;
pub mod quota;
