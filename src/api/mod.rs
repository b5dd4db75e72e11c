//! HTTP server

pub mod cookie_config;
pub mod server;
pub mod server_config;

pub use server::GatewayServer;
