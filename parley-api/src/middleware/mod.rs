/// Middleware modules for the API server
///
/// - Security and cache-control headers

pub mod security;
