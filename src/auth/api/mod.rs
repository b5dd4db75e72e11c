//! HTTP layer of the auth module

pub mod handlers;
pub mod routes;

pub use routes::create_auth_routes;
