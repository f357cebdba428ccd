//! # Parley API Server Library
//!
//! HTTP surface of the Parley identity engine.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `cookies`: Session and OAuth state cookies
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Identity extractors
//! - `middleware`: Security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
