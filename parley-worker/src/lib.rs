//! # Parley Worker Library
//!
//! Background housekeeping for the identity store.
//!
//! ## Modules
//!
//! - `config`: Environment configuration
//! - `sweeper`: Periodic purge of expired sessions and verification codes

pub mod config;
pub mod sweeper;
