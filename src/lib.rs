//! agquota: terminal monitor for Antigravity model quotas.
//!
//! Discovery and polling live in `agquota-core`; this crate adds the CLI,
//! config reloading, the reconnect loop and terminal output.

pub mod app;
pub mod config;
pub mod display;
