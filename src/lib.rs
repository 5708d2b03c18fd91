//! Billing Reconciler - Payment-provider webhook reconciliation engine
//!
//! This crate ingests asynchronous billing events from the Creem payment
//! provider, verifies and deduplicates them, normalizes their heterogeneous
//! payload shapes into canonical subscription/invoice state, and applies
//! idempotent upserts that converge under duplicate and out-of-order delivery.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
