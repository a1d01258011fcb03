/// Router Module Index
///
/// Splits the routes by access level. Access control is applied per module (Axum layers
/// for authentication, service-level checks for admin and module permissions).

/// Routes accessible to all clients (read-only projections).
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
pub mod authenticated;

/// Routes restricted to administrators.
pub mod admin;
