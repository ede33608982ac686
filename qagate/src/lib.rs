//! qagate - access control for a contact-center quality-audit platform.
//!
//! This facade crate re-exports the qagate sub-crates through a single
//! dependency:
//!
//! | Module                   | Crate             |
//! |--------------------------|-------------------|
//! | [`qagate_core`]          | rule model, resolver, catalog, config |
//! | [`qagate_security`]      | identity verification, fail-closed data client, audit |
//! | [`qagate_rules`]         | rule backends and the rule store |
//! | [`qagate_admin`]         | access simulator and admin HTTP router |
//!
//! ```ignore
//! use qagate::prelude::*;
//!
//! let config = qagate::config::load("dev")?;
//! qagate::init_tracing(config.server.log_format);
//!
//! let client = qagate::connect(&config, my_data_client).await;
//! let app = qagate::admin_router(&config, client)?;
//! ```

pub use qagate_admin;
pub use qagate_core;
pub use qagate_rules;
pub use qagate_security;

pub mod app;
pub mod config;
mod tracing_setup;

pub use app::{admin_router, connect};
pub use tracing_setup::init_tracing;

pub mod prelude {
    //! The types most callers need.
    pub use qagate_admin::{
        router, AccessSimulator, AdminState, MemoryDirectory, PrincipalDirectory, TableDirectory,
    };
    pub use qagate_core::prelude::*;
    pub use qagate_rules::{MemoryRuleBackend, RuleBackend, RuleStore, TableRuleBackend};
    pub use qagate_security::prelude::*;
}
