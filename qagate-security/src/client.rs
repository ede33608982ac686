//! The data-client surface qagate knows how to guard.
//!
//! A data client exposes three things: a table accessor returning a
//! chainable [`QueryBuilder`], a bucket accessor returning a
//! [`BucketClient`], and the [`SessionProvider`] it authenticates with.
//! [`MemoryDataClient`](crate::MemoryDataClient) implements it in-process;
//! [`EnforcingDataClient`](crate::EnforcingDataClient) wraps any
//! implementation and exposes the same surface.

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use qagate_core::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DataError;
use crate::session::SessionProvider;

/// Kind of operation reaching storage, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
    Upload,
    Download,
    Remove,
    List,
}

/// A row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    /// SQL `LIKE` with `%` wildcards, case-sensitive.
    Like(String, String),
}

impl Filter {
    /// Evaluate the predicate against a JSON row.
    pub fn matches(&self, row: &Value) -> bool {
        let field = |col: &str| row.get(col).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(col, v) => field(col) == v,
            Filter::Neq(col, v) => field(col) != v,
            Filter::Gt(col, v) => compare_values(field(col), v) == Ordering::Greater,
            Filter::Gte(col, v) => compare_values(field(col), v) != Ordering::Less,
            Filter::Lt(col, v) => compare_values(field(col), v) == Ordering::Less,
            Filter::Lte(col, v) => compare_values(field(col), v) != Ordering::Greater,
            Filter::In(col, vs) => vs.contains(field(col)),
            Filter::IsNull(col) => field(col).is_null(),
            Filter::Like(col, pattern) => field(col)
                .as_str()
                .is_some_and(|s| like_matches(s, pattern)),
        }
    }
}

/// What a query does once executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select,
    Insert(Vec<Value>),
    Update(Value),
    Upsert { rows: Vec<Value>, on_conflict: String },
    Delete,
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::Select => Operation::Select,
            Command::Insert(_) => Operation::Insert,
            Command::Update(_) => Operation::Update,
            Command::Upsert { .. } => Operation::Upsert,
            Command::Delete => Operation::Delete,
        }
    }
}

/// Everything a builder has accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub table: String,
    pub command: Command,
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    pub order: Vec<(String, bool)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub single: bool,
}

impl QuerySpec {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            command: Command::Select,
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            single: false,
        }
    }
}

/// Rows returned by an executed query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataResponse {
    pub rows: Vec<Value>,
}

impl DataResponse {
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Deserialize every row.
    pub fn into_rows<T: DeserializeOwned>(self) -> Result<Vec<T>, DataError> {
        self.rows
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DataError::Decode(e.to_string())))
            .collect()
    }

    /// Deserialize the first row, if any.
    pub fn into_first<T: DeserializeOwned>(self) -> Result<Option<T>, DataError> {
        match self.rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| DataError::Decode(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Chainable query/command builder.
///
/// Chain methods consume the builder and return it; nothing reaches storage
/// until [`execute`](Self::execute) is called and the returned future is
/// awaited. Implementors also implement `IntoFuture`, so a builder can be
/// awaited directly.
pub trait QueryBuilder: Sized + Send + 'static {
    /// The accumulated query.
    fn spec(&self) -> &QuerySpec;

    fn select(self, columns: &str) -> Self;
    fn insert(self, rows: Vec<Value>) -> Self;
    fn update(self, patch: Value) -> Self;
    fn upsert(self, rows: Vec<Value>, on_conflict: &str) -> Self;
    fn delete(self) -> Self;
    fn filter(self, filter: Filter) -> Self;
    fn order(self, column: &str, ascending: bool) -> Self;
    fn limit(self, count: usize) -> Self;
    /// Inclusive row range, `from..=to`. Empty when `to < from`.
    fn range(self, from: usize, to: usize) -> Self;
    /// Expect exactly one row.
    fn single(self) -> Self;

    /// Build the future that runs the query. The future does nothing until polled.
    fn execute(self) -> BoxFuture<'static, Result<DataResponse, DataError>>;

    fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.to_string(), value.into()))
    }

    fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Neq(column.to_string(), value.into()))
    }

    fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(column.to_string(), value.into()))
    }

    fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(column.to_string(), value.into()))
    }

    fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(column.to_string(), value.into()))
    }

    fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(column.to_string(), value.into()))
    }

    fn in_list<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ))
    }

    fn is_null(self, column: &str) -> Self {
        self.filter(Filter::IsNull(column.to_string()))
    }

    fn like(self, column: &str, pattern: &str) -> Self {
        self.filter(Filter::Like(column.to_string(), pattern.to_string()))
    }
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
    pub size: usize,
    pub content_type: String,
}

/// Object storage inside one selected bucket.
pub trait BucketClient: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> BoxFuture<'_, Result<StoredObject, DataError>>;
    fn download(&self, path: &str) -> BoxFuture<'_, Result<Bytes, DataError>>;
    fn remove(&self, paths: Vec<String>) -> BoxFuture<'_, Result<usize, DataError>>;
    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<StoredObject>, DataError>>;
    fn public_url(&self, path: &str) -> String;
}

/// A data-access client: tables, buckets and the session behind them.
pub trait DataClient: Send + Sync + 'static {
    type Query: QueryBuilder;
    type Bucket: BucketClient;

    /// Start a query against `table`.
    fn table(&self, table: &str) -> Result<Self::Query, DataError>;

    /// Select a storage bucket.
    fn bucket(&self, name: &str) -> Result<Self::Bucket, DataError>;

    /// The session provider this client authenticates with.
    fn session(&self) -> Arc<dyn SessionProvider>;
}

/// Total order over JSON values: null < bool < number < string < other.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn like_matches(value: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return value == pattern;
    }
    let mut rest = value;
    for (idx, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if idx == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if idx == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}
