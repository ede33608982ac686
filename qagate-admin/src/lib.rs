//! Access simulator and administrative HTTP surface for qagate.
//!
//! [`AccessSimulator`] answers "what can this user see, and why?" for every
//! cataloged resource, and turns an admin's allow/deny switch into the
//! smallest possible change of user overrides. [`router`] exposes it, along
//! with rule CRUD, over axum:
//!
//! ```ignore
//! use qagate_admin::{router, AccessSimulator, AdminState, MemoryDirectory};
//!
//! let simulator = AccessSimulator::new(store, ResourceCatalog::standard(), MemoryDirectory::new());
//! let app = router(AdminState::new(simulator));
//! axum::serve(listener, app).await?;
//! ```

pub mod directory;
pub mod error;
pub mod routes;
pub mod simulator;

pub use directory::{MemoryDirectory, PrincipalDirectory, TableDirectory, USERS_TABLE};
pub use error::ApiError;
pub use routes::{router, AdminState, BASE_PATH};
pub use simulator::{
    AccessReport, AccessSimulator, AccessTestResult, CategoryAccess, OverrideState,
    ResourceAccess, ToggleOutcome,
};
