/// Router Module Index
///
/// Splits the API into access-segregated routers. The gate is attached at the router level
/// in `create_router`, so a handler cannot end up unprotected by being registered in the
/// wrong place.

/// Routes reachable without a token: signup, signin and profile lookup.
/// Also the read-only listings, whose gating is a configuration policy.
pub mod public;

/// Routes behind the auth gate. Every content and profile mutation lives here.
pub mod authenticated;
