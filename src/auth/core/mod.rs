//! Login core: identity resolution, sessions and display names

pub mod display_name;
pub mod locks;
pub mod random;
pub mod resolver;
pub mod session_lookup;

pub use display_name::{DisplayNameSource, DisplayNames, PhraseService};
pub use locks::KeyedLocks;
pub use resolver::IdentityResolver;
pub use session_lookup::SessionLookup;
