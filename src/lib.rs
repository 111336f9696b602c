//! Core of the Optimizely SDK: audience evaluation and the ODP (Optimizely Data Platform)
//! integration.
//!
//! # Overview
//!
//! [`audience::AudienceEvaluator`] decides whether a [`UserContext`] matches the audiences that
//! target an experiment or a rollout rule. Audience conditions form trees that are evaluated with
//! three-valued logic, so that missing or mistyped attributes don't silently turn into a "no".
//!
//! [`odp::OdpManager`] connects the SDK to ODP: it fetches the segments a user qualifies for (used
//! by `third_party_dimension` conditions) and sends identify and custom events in batches.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Audience evaluation never fails: errors are logged and turn into an unknown result. ODP
//! operations are best-effort and report failures through logs and empty results.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with the `"optimizely"`
//! target. Consider integrating a `log`-compatible logger implementation for better visibility
//! into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod audience;
pub mod odp;
pub mod request_handler;

mod attributes;
mod error;
mod user_context;

#[cfg(test)]
mod test_common;

pub use attributes::{AttributeValue, Attributes};
pub use error::{Error, Result};
pub use user_context::UserContext;
