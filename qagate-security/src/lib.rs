//! Identity verification and fail-closed data access for qagate.
//!
//! # Overview
//!
//! - **[`IdentityVerifier`]** resolves the caller's [`AuthStatus`] through a
//!   [`SessionProvider`], caches it, and collapses concurrent lookups into a
//!   single round trip. Provider outages resolve to "not authenticated" with
//!   the failure detail attached, never to an error.
//! - **[`EnforcingDataClient`]** wraps any [`DataClient`] and refuses every
//!   table or bucket operation unless the verifier reports an authenticated
//!   caller. Operations that do go through are recorded in an [`AuditTrail`].
//!
//! ```ignore
//! use qagate_security::prelude::*;
//!
//! let provider = MockSessionProvider::signed_in("u-1", "jane@example.com");
//! let client = EnforcingDataClient::connect(MemoryDataClient::with_session(provider.clone())).await;
//!
//! let rows = client.table("audit_scores")?.select("*").await?;
//!
//! provider.sign_out();
//! client.verifier().invalidate();
//! assert!(client.table("audit_scores").is_err());
//! ```

pub mod audit;
pub mod client;
pub mod enforce;
pub mod error;
pub mod identity;
pub mod memory;
pub mod session;

pub use audit::{AuditEntry, AuditSink, AuditTrail, MemoryAuditLog, TracingAuditSink};
pub use client::{
    BucketClient, Command, DataClient, DataResponse, Filter, Operation, QueryBuilder, QuerySpec,
    StoredObject,
};
pub use enforce::{EnforcingDataClient, GuardedBucket, GuardedQuery};
pub use error::DataError;
pub use identity::{AuthStatus, IdentityVerifier};
pub use memory::{MemoryBucket, MemoryDataClient, MemoryQuery};
pub use session::{AuthEvent, MockSessionProvider, Session, SessionError, SessionProvider};

pub mod prelude {
    //! Re-exports of the most commonly used security types.
    pub use crate::{
        AuthStatus, BucketClient, DataClient, DataError, EnforcingDataClient, IdentityVerifier,
        MemoryDataClient, MockSessionProvider, QueryBuilder, SessionProvider,
    };
}
