//! Fail-closed enforcement around any [`DataClient`].
//!
//! [`EnforcingDataClient`] exposes the same surface as the client it wraps.
//! Two checks guard every operation:
//!
//! 1. `table()` / `bucket()` consult the verifier's cached status and refuse
//!    to hand out a builder when nobody is verified. The wrapped client is
//!    not touched at all in that case. The check is synchronous, so it reads
//!    [`IdentityVerifier::current`] without regard to the TTL: a cached
//!    signed-out status keeps blocking until something calls `verify()` or
//!    an auth event arrives.
//! 2. Executing a [`GuardedQuery`] re-verifies (from cache when fresh), so a
//!    builder created before a sign-out cannot run after it.
//!
//! Chain methods are forwarded one-to-one, so a guarded builder behaves like
//! the unwrapped one at any chain depth.

use std::future::IntoFuture;
use std::sync::Arc;

use bytes::Bytes;
use qagate_core::{AuditConfig, BoxFuture, IdentityConfig};
use serde_json::Value;

use crate::audit::{AuditEntry, AuditTrail};
use crate::client::{
    BucketClient, DataClient, DataResponse, Filter, Operation, QueryBuilder, QuerySpec,
    StoredObject,
};
use crate::error::DataError;
use crate::identity::{AuthStatus, IdentityVerifier};
use crate::session::SessionProvider;

/// A [`DataClient`] that blocks every operation lacking a verified identity.
///
/// ```ignore
/// let client = EnforcingDataClient::connect(MemoryDataClient::with_session(provider)).await;
///
/// let rows = client.table("audit_scores")?.select("*").eq("agent", "ana").await?;
/// ```
pub struct EnforcingDataClient<C: DataClient> {
    inner: Arc<C>,
    verifier: IdentityVerifier,
    audit: AuditTrail,
}

impl<C: DataClient> EnforcingDataClient<C> {
    /// Wrap `client`, verifying identity through the client's own session provider.
    ///
    /// Nothing is verified yet: until the first [`verify`](IdentityVerifier::verify)
    /// every accessor call fails with [`DataError::AuthRequired`]. Use
    /// [`connect`](Self::connect) to verify up front.
    pub fn wrap(client: C) -> Self {
        let verifier = IdentityVerifier::with_config(client.session(), &IdentityConfig::default());
        Self::with_verifier(client, verifier)
    }

    /// Wrap `client` with an existing verifier, sharing its cache.
    pub fn with_verifier(client: C, verifier: IdentityVerifier) -> Self {
        Self {
            inner: Arc::new(client),
            verifier,
            audit: AuditTrail::from_config(&AuditConfig::default()),
        }
    }

    /// Wrap `client` and resolve the caller's identity once.
    pub async fn connect(client: C) -> Self {
        let wrapped = Self::wrap(client);
        let status = wrapped.verifier.verify().await;
        tracing::debug!(
            authenticated = status.is_authenticated,
            "enforcing data client connected"
        );
        wrapped
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    pub fn verifier(&self) -> &IdentityVerifier {
        &self.verifier
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// The wrapped client. Operations on it bypass enforcement.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn admit(&self, target: &str, kind: &'static str) -> Result<String, DataError> {
        match self.verifier.current() {
            Some(status) => principal_of(status, target, kind),
            None => {
                tracing::warn!(target_name = %target, kind, reason = "identity not verified yet", "blocked data operation");
                Err(DataError::AuthRequired("identity not verified yet".into()))
            }
        }
    }
}

impl<C: DataClient> Clone for EnforcingDataClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            verifier: self.verifier.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<C: DataClient> DataClient for EnforcingDataClient<C> {
    type Query = GuardedQuery<C::Query>;
    type Bucket = GuardedBucket<C::Bucket>;

    /// A guarded builder for `table`.
    ///
    /// Admission uses the cached status as is, even past its TTL. Keep it
    /// current with [`IdentityVerifier::listen_and_refresh`], or call
    /// [`verify`](IdentityVerifier::verify) before retrying after a denial.
    fn table(&self, table: &str) -> Result<Self::Query, DataError> {
        self.admit(table, "table")?;
        Ok(GuardedQuery {
            query: self.inner.table(table)?,
            verifier: self.verifier.clone(),
            audit: self.audit.clone(),
        })
    }

    fn bucket(&self, name: &str) -> Result<Self::Bucket, DataError> {
        let principal_id = self.admit(name, "bucket")?;
        Ok(GuardedBucket {
            bucket: self.inner.bucket(name)?,
            principal_id,
            audit: self.audit.clone(),
        })
    }

    fn session(&self) -> Arc<dyn SessionProvider> {
        self.inner.session()
    }
}

fn principal_of(status: AuthStatus, target: &str, kind: &'static str) -> Result<String, DataError> {
    let reason = status.denial_reason();
    match status.principal_id {
        Some(id) if status.is_authenticated => Ok(id),
        _ => {
            tracing::warn!(target_name = %target, kind, %reason, "blocked data operation");
            Err(DataError::AuthRequired(reason))
        }
    }
}

// ── GuardedQuery ───────────────────────────────────────────────────────

/// Query builder returned by [`EnforcingDataClient::table`].
pub struct GuardedQuery<Q> {
    query: Q,
    verifier: IdentityVerifier,
    audit: AuditTrail,
}

impl<Q: QueryBuilder> GuardedQuery<Q> {
    fn map(self, f: impl FnOnce(Q) -> Q) -> Self {
        Self {
            query: f(self.query),
            ..self
        }
    }
}

impl<Q: QueryBuilder> QueryBuilder for GuardedQuery<Q> {
    fn spec(&self) -> &QuerySpec {
        self.query.spec()
    }

    fn select(self, columns: &str) -> Self {
        self.map(|q| q.select(columns))
    }

    fn insert(self, rows: Vec<Value>) -> Self {
        self.map(|q| q.insert(rows))
    }

    fn update(self, patch: Value) -> Self {
        self.map(|q| q.update(patch))
    }

    fn upsert(self, rows: Vec<Value>, on_conflict: &str) -> Self {
        self.map(|q| q.upsert(rows, on_conflict))
    }

    fn delete(self) -> Self {
        self.map(|q| q.delete())
    }

    fn filter(self, filter: Filter) -> Self {
        self.map(|q| q.filter(filter))
    }

    fn order(self, column: &str, ascending: bool) -> Self {
        self.map(|q| q.order(column, ascending))
    }

    fn limit(self, count: usize) -> Self {
        self.map(|q| q.limit(count))
    }

    fn range(self, from: usize, to: usize) -> Self {
        self.map(|q| q.range(from, to))
    }

    fn single(self) -> Self {
        self.map(|q| q.single())
    }

    fn execute(self) -> BoxFuture<'static, Result<DataResponse, DataError>> {
        let GuardedQuery {
            query,
            verifier,
            audit,
        } = self;
        Box::pin(async move {
            let status = verifier.verify().await;
            let spec = query.spec();
            let principal_id = principal_of(status, &spec.table, "table")?;
            audit.record(AuditEntry::new(
                spec.table.clone(),
                spec.command.operation(),
                principal_id,
            ));
            query.execute().await
        })
    }
}

impl<Q: QueryBuilder> IntoFuture for GuardedQuery<Q> {
    type Output = Result<DataResponse, DataError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.execute()
    }
}

// ── GuardedBucket ──────────────────────────────────────────────────────

/// Bucket returned by [`EnforcingDataClient::bucket`].
///
/// Identity is checked once, when the bucket is selected; every operation
/// on it is recorded against that principal.
pub struct GuardedBucket<B> {
    bucket: B,
    principal_id: String,
    audit: AuditTrail,
}

impl<B: BucketClient> GuardedBucket<B> {
    fn record(&self, operation: Operation) {
        self.audit.record(AuditEntry::new(
            self.bucket.name(),
            operation,
            self.principal_id.clone(),
        ));
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }
}

impl<B: BucketClient> BucketClient for GuardedBucket<B> {
    fn name(&self) -> &str {
        self.bucket.name()
    }

    fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> BoxFuture<'_, Result<StoredObject, DataError>> {
        let op = self.bucket.upload(path, data, content_type);
        Box::pin(async move {
            self.record(Operation::Upload);
            op.await
        })
    }

    fn download(&self, path: &str) -> BoxFuture<'_, Result<Bytes, DataError>> {
        let op = self.bucket.download(path);
        Box::pin(async move {
            self.record(Operation::Download);
            op.await
        })
    }

    fn remove(&self, paths: Vec<String>) -> BoxFuture<'_, Result<usize, DataError>> {
        let op = self.bucket.remove(paths);
        Box::pin(async move {
            self.record(Operation::Remove);
            op.await
        })
    }

    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<StoredObject>, DataError>> {
        let op = self.bucket.list(prefix);
        Box::pin(async move {
            self.record(Operation::List);
            op.await
        })
    }

    fn public_url(&self, path: &str) -> String {
        self.bucket.public_url(path)
    }
}
