//! # Parley Shared Library
//!
//! Identity engine, storage and outbound collaborators used by the Parley API
//! server and the background worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and queries
//! - `db`: Connection pool and migrations
//! - `auth`: Password hashing, session tokens, OAuth state tokens
//! - `identity`: The identity reconciliation engine and its storage trait
//! - `mail`: Verification-code email delivery
//! - `oauth`: Google and GitHub authorization-code clients

pub mod auth;
pub mod db;
pub mod identity;
pub mod mail;
pub mod models;
pub mod oauth;

/// Current version of the Parley shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
