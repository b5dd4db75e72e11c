//! Social login
//!
//! ```text
//! auth/
//! ├── types.rs          # identities, users, sessions
//! ├── errors.rs         # AuthError
//! ├── config.rs         # AuthConfig
//! ├── service.rs        # AuthService (facade)
//! ├── flow_store.rs     # pending login flows
//! ├── core/             # resolver, session lookup, display names
//! ├── providers/        # Google (OIDC), Twitter (OAuth 1.0a)
//! ├── storage/          # bucketed key-value store
//! └── api/              # axum routes and handlers
//! ```
//!
//! Request path: API → service → provider / resolver → storage

pub mod api;
pub mod config;
pub mod core;
pub mod errors;
pub mod flow_store;
pub mod providers;
pub mod service;
pub mod storage;
pub mod types;

pub use api::create_auth_routes;
pub use config::AuthConfig;
pub use errors::AuthError;
pub use service::AuthService;
pub use storage::{Bucket, KvStore, MemoryStore, SqliteStore};
pub use types::{ExternalIdentity, ProviderKind, User, UserId};
