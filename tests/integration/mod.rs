//! Integration test suite for rideping.
//!
//! These tests drive a whole engine against the in-memory store: membership
//! subscriptions, tail watchers, the filter and the presenter together.
//!
//! # Test Categories
//!
//! - `notifications`: what gets surfaced and what is suppressed
//! - `presenter_lifecycle`: auto-dismiss, replacement, activation, dismissal
//! - `resilience`: store failures, membership churn and teardown
//!
//! Timer-sensitive tests run on tokio's paused clock, so they are exact and
//! fast.

mod fixtures;

mod notifications;
mod presenter_lifecycle;
