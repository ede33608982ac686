//! In-memory [`DataClient`] for tests and local development.

use std::collections::BTreeMap;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use qagate_core::BoxFuture;
use serde_json::Value;

use crate::client::{
    compare_values, BucketClient, Command, DataClient, DataResponse, Filter, QueryBuilder,
    QuerySpec, StoredObject,
};
use crate::error::DataError;
use crate::session::{MockSessionProvider, SessionProvider};

#[derive(Clone)]
struct Blob {
    data: Bytes,
    content_type: String,
}

struct Inner {
    tables: DashMap<String, Vec<Value>>,
    buckets: DashMap<String, BTreeMap<String, Blob>>,
    session: Arc<dyn SessionProvider>,
    calls: AtomicUsize,
    executions: AtomicUsize,
    offline: AtomicBool,
}

/// A data client backed by `DashMap`s of JSON rows and blobs.
///
/// Tables spring into existence on first use; buckets must be created with
/// [`create_bucket`](Self::create_bucket). Clones share storage.
///
/// [`calls`](Self::calls) counts accessor calls (`table`, `bucket`) and
/// [`executions`](Self::executions) counts operations that actually reached
/// storage, which is what the enforcement tests assert on.
#[derive(Clone)]
pub struct MemoryDataClient {
    inner: Arc<Inner>,
}

impl MemoryDataClient {
    /// An empty store whose session provider has nobody signed in.
    pub fn new() -> Self {
        Self::with_session(MockSessionProvider::new())
    }

    /// An empty store authenticating through `session`.
    pub fn with_session(session: impl SessionProvider) -> Self {
        Self::with_shared_session(Arc::new(session))
    }

    pub fn with_shared_session(session: Arc<dyn SessionProvider>) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: DashMap::new(),
                buckets: DashMap::new(),
                session,
                calls: AtomicUsize::new(0),
                executions: AtomicUsize::new(0),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Append rows to a table, bypassing any guard.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Current contents of a table.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner
            .tables
            .get(table)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    pub fn create_bucket(&self, name: &str) {
        self.inner.buckets.entry(name.to_string()).or_default();
    }

    /// Simulate a storage outage: every execution fails with
    /// [`DataError::Transport`] until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `table`/`bucket` accessor calls.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Number of operations that reached storage.
    pub fn executions(&self) -> usize {
        self.inner.executions.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDataClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DataClient for MemoryDataClient {
    type Query = MemoryQuery;
    type Bucket = MemoryBucket;

    fn table(&self, table: &str) -> Result<MemoryQuery, DataError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if table.trim().is_empty() {
            return Err(DataError::NotFound("table name cannot be empty".into()));
        }
        Ok(MemoryQuery {
            inner: self.inner.clone(),
            spec: QuerySpec::new(table),
        })
    }

    fn bucket(&self, name: &str) -> Result<MemoryBucket, DataError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if !self.inner.buckets.contains_key(name) {
            return Err(DataError::NotFound(format!("bucket '{name}'")));
        }
        Ok(MemoryBucket {
            inner: self.inner.clone(),
            name: name.to_string(),
        })
    }

    fn session(&self) -> Arc<dyn SessionProvider> {
        self.inner.session.clone()
    }
}

// ── MemoryQuery ────────────────────────────────────────────────────────

/// Query builder of [`MemoryDataClient`].
pub struct MemoryQuery {
    inner: Arc<Inner>,
    spec: QuerySpec,
}

impl QueryBuilder for MemoryQuery {
    fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    fn select(mut self, columns: &str) -> Self {
        let columns: Vec<String> = columns
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.spec.columns = if columns.iter().any(|c| c == "*") || columns.is_empty() {
            None
        } else {
            Some(columns)
        };
        self
    }

    fn insert(mut self, rows: Vec<Value>) -> Self {
        self.spec.command = Command::Insert(rows);
        self
    }

    fn update(mut self, patch: Value) -> Self {
        self.spec.command = Command::Update(patch);
        self
    }

    fn upsert(mut self, rows: Vec<Value>, on_conflict: &str) -> Self {
        self.spec.command = Command::Upsert {
            rows,
            on_conflict: on_conflict.to_string(),
        };
        self
    }

    fn delete(mut self) -> Self {
        self.spec.command = Command::Delete;
        self
    }

    fn filter(mut self, filter: Filter) -> Self {
        self.spec.filters.push(filter);
        self
    }

    fn order(mut self, column: &str, ascending: bool) -> Self {
        self.spec.order.push((column.to_string(), ascending));
        self
    }

    fn limit(mut self, count: usize) -> Self {
        self.spec.limit = Some(count);
        self
    }

    fn range(mut self, from: usize, to: usize) -> Self {
        self.spec.offset = Some(from);
        // an inverted range selects nothing
        self.spec.limit = Some(if to < from { 0 } else { to - from + 1 });
        self
    }

    fn single(mut self) -> Self {
        self.spec.single = true;
        self
    }

    fn execute(self) -> BoxFuture<'static, Result<DataResponse, DataError>> {
        let MemoryQuery { inner, spec } = self;
        Box::pin(async move {
            inner.executions.fetch_add(1, Ordering::SeqCst);
            if inner.offline.load(Ordering::SeqCst) {
                return Err(DataError::Transport("memory store is offline".into()));
            }
            run(&inner, spec)
        })
    }
}

impl IntoFuture for MemoryQuery {
    type Output = Result<DataResponse, DataError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.execute()
    }
}

fn run(inner: &Inner, spec: QuerySpec) -> Result<DataResponse, DataError> {
    let mut table = inner.tables.entry(spec.table.clone()).or_default();
    let matches = |row: &Value| spec.filters.iter().all(|f| f.matches(row));

    let affected = match &spec.command {
        Command::Select => table.iter().filter(|r| matches(*r)).cloned().collect(),
        Command::Insert(rows) => {
            if let Some(bad) = rows.iter().find(|r| !r.is_object()) {
                return Err(DataError::Rejected(format!("row is not an object: {bad}")));
            }
            table.extend(rows.iter().cloned());
            rows.clone()
        }
        Command::Update(patch) => {
            let Some(fields) = patch.as_object() else {
                return Err(DataError::Rejected("update patch must be an object".into()));
            };
            let mut updated = Vec::new();
            for row in table.iter_mut().filter(|r| matches(&**r)) {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in fields {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
            updated
        }
        Command::Upsert { rows, on_conflict } => {
            let mut written = Vec::with_capacity(rows.len());
            for row in rows {
                let key = row.get(on_conflict).cloned().unwrap_or(Value::Null);
                if key.is_null() {
                    return Err(DataError::Rejected(format!(
                        "upsert row has no '{on_conflict}' value"
                    )));
                }
                match table
                    .iter_mut()
                    .find(|existing| existing.get(on_conflict) == Some(&key))
                {
                    Some(existing) => *existing = row.clone(),
                    None => table.push(row.clone()),
                }
                written.push(row.clone());
            }
            written
        }
        Command::Delete => {
            let mut removed = Vec::new();
            table.retain(|row| {
                if matches(row) {
                    removed.push(row.clone());
                    false
                } else {
                    true
                }
            });
            removed
        }
    };
    drop(table);

    shape(&spec, affected)
}

fn shape(spec: &QuerySpec, mut rows: Vec<Value>) -> Result<DataResponse, DataError> {
    if !spec.order.is_empty() {
        rows.sort_by(|a, b| {
            spec.order
                .iter()
                .map(|(col, asc)| {
                    let ord = compare_values(
                        a.get(col).unwrap_or(&Value::Null),
                        b.get(col).unwrap_or(&Value::Null),
                    );
                    if *asc {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let rows: Vec<Value> = rows
        .into_iter()
        .skip(spec.offset.unwrap_or(0))
        .take(spec.limit.unwrap_or(usize::MAX))
        .map(|row| project(row, spec.columns.as_deref()))
        .collect();

    if spec.single && rows.len() != 1 {
        return Err(match rows.len() {
            0 => DataError::NotFound(format!("no row in '{}'", spec.table)),
            n => DataError::Rejected(format!("expected one row in '{}', got {n}", spec.table)),
        });
    }
    Ok(DataResponse::new(rows))
}

fn project(row: Value, columns: Option<&[String]>) -> Value {
    match (columns, row) {
        (Some(cols), Value::Object(obj)) => Value::Object(
            obj.into_iter()
                .filter(|(k, _)| cols.iter().any(|c| c == k))
                .collect(),
        ),
        (_, row) => row,
    }
}

// ── MemoryBucket ───────────────────────────────────────────────────────

/// Storage bucket of [`MemoryDataClient`].
pub struct MemoryBucket {
    inner: Arc<Inner>,
    name: String,
}

impl MemoryBucket {
    fn begin(&self) -> Result<(), DataError> {
        self.inner.executions.fetch_add(1, Ordering::SeqCst);
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(DataError::Transport("memory store is offline".into()));
        }
        Ok(())
    }

    fn objects(
        &self,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, BTreeMap<String, Blob>>, DataError> {
        self.inner
            .buckets
            .get_mut(&self.name)
            .ok_or_else(|| DataError::NotFound(format!("bucket '{}'", self.name)))
    }
}

impl BucketClient for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> BoxFuture<'_, Result<StoredObject, DataError>> {
        let path = path.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            self.begin()?;
            let stored = StoredObject {
                path: path.clone(),
                size: data.len(),
                content_type: content_type.clone(),
            };
            self.objects()?.insert(path, Blob { data, content_type });
            Ok(stored)
        })
    }

    fn download(&self, path: &str) -> BoxFuture<'_, Result<Bytes, DataError>> {
        let path = path.to_string();
        Box::pin(async move {
            self.begin()?;
            self.objects()?
                .get(&path)
                .map(|blob| blob.data.clone())
                .ok_or_else(|| DataError::NotFound(format!("object '{path}'")))
        })
    }

    fn remove(&self, paths: Vec<String>) -> BoxFuture<'_, Result<usize, DataError>> {
        Box::pin(async move {
            self.begin()?;
            let mut objects = self.objects()?;
            Ok(paths.iter().filter(|p| objects.remove(*p).is_some()).count())
        })
    }

    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<StoredObject>, DataError>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            self.begin()?;
            let objects = self.objects()?;
            Ok(objects
                .iter()
                .filter(|(path, _)| path.starts_with(&prefix))
                .map(|(path, blob)| StoredObject {
                    path: path.clone(),
                    size: blob.data.len(),
                    content_type: blob.content_type.clone(),
                })
                .collect())
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/{}", self.name, path.trim_start_matches('/'))
    }
}
