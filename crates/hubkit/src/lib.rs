//! # Hubkit
//!
//! A blocking GitHub REST implementation of the
//! [`reconcile::Gateway`] trait.
//!
//! ## Features
//!
//! - Personal access token or GitHub App authentication
//! - `Link` header pagination
//! - Exponential backoff for network failures and rate limiting
//! - Pacing when the rate-limit budget runs low
//! - Cancellation through [`reconcile::CancelToken`]

pub mod auth;
pub mod client;
pub mod error;
pub mod rate;
pub mod retry;

pub use auth::Credentials;
pub use client::{ClientConfig, GitHubGateway};
pub use error::{Error, Result};
pub use retry::{RetryCallback, RetryConfig, with_retry, with_retry_if};
