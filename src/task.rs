//! How body and query data are supplied for a request.

use crate::codec::Timestamp;
use crate::progress::UploadProgress;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Query string parameters.
pub type Parameters = Map<String, Value>;

/// Entries of a raw JSON object body. Values are serialized when the request is
/// built, under the endpoint's key and date rules.
pub type Fields = BTreeMap<String, Body>;

/// Callback invoked with cumulative progress while an upload is streamed.
pub type ProgressHandler = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// A type-erased serializable request body.
///
/// The value is serialized lazily, when the request is built, so that the
/// endpoint's key and date rules apply to it.
#[derive(Clone)]
pub struct Body {
    serialize: Arc<dyn Fn() -> serde_json::Result<Value> + Send + Sync>,
}

impl Body {
    /// Wraps any serializable value.
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self {
            serialize: Arc::new(move || serde_json::to_value(&value)),
        }
    }

    pub(crate) fn to_value(&self) -> serde_json::Result<Value> {
        (self.serialize)()
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::new(value)
    }
}

impl From<Timestamp> for Body {
    fn from(value: Timestamp) -> Self {
        Body::new(value)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body(..)")
    }
}

/// Describes how data is attached to a request.
///
/// Exactly one variant is active per request. Query-bearing variants combine
/// with a body; an upload carries neither.
///
/// # Examples
///
/// ```
/// use netpoint::Task;
/// use serde_json::json;
///
/// let task = Task::query([("q", json!("cats")), ("page", json!(2))]);
/// assert!(!task.has_body());
///
/// let task = Task::raw_body([("name", json!("lamp"))]);
/// assert!(task.has_body());
/// ```
#[derive(Clone, Default)]
pub enum Task {
    /// No body and no query string.
    #[default]
    None,
    /// Query parameters appended to the location.
    QueryParameters(Parameters),
    /// A JSON object body built from heterogeneous values.
    RawBody(Fields),
    /// Any serializable value as the body.
    EncodableBody(Body),
    /// A raw body plus query parameters.
    RawBodyAndQuery {
        /// Body entries.
        body: Fields,
        /// Query parameters.
        query: Parameters,
    },
    /// A serializable body plus query parameters.
    EncodableBodyAndQuery {
        /// The body value.
        body: Body,
        /// Query parameters.
        query: Parameters,
    },
    /// Streams a file as the body, reporting progress along the way.
    UploadFile {
        /// The file to upload.
        file: PathBuf,
        /// Receives progress updates for each attempt.
        progress: ProgressHandler,
    },
}

impl Task {
    /// Builds a [`Task::QueryParameters`] from key/value pairs.
    pub fn query<K, I>(params: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Task::QueryParameters(collect(params))
    }

    /// Builds a [`Task::RawBody`] from key/value pairs.
    ///
    /// Values are JSON values, [`Timestamp`]s or any [`Body`]; mix them by
    /// converting each entry with `Body::from` or [`Body::new`].
    pub fn raw_body<K, V, I>(body: I) -> Self
    where
        K: Into<String>,
        V: Into<Body>,
        I: IntoIterator<Item = (K, V)>,
    {
        Task::RawBody(fields(body))
    }

    /// Builds a [`Task::RawBodyAndQuery`].
    pub fn raw_body_with_query<K, V, I, Q, QK>(body: I, query: Q) -> Self
    where
        K: Into<String>,
        V: Into<Body>,
        I: IntoIterator<Item = (K, V)>,
        QK: Into<String>,
        Q: IntoIterator<Item = (QK, Value)>,
    {
        Task::RawBodyAndQuery {
            body: fields(body),
            query: collect(query),
        }
    }

    /// Builds a [`Task::EncodableBody`].
    pub fn encodable<T>(body: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Task::EncodableBody(Body::new(body))
    }

    /// Builds a [`Task::EncodableBodyAndQuery`].
    pub fn encodable_with_query<T, K, I>(body: T, query: I) -> Self
    where
        T: Serialize + Send + Sync + 'static,
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Task::EncodableBodyAndQuery {
            body: Body::new(body),
            query: collect(query),
        }
    }

    /// Builds a [`Task::UploadFile`].
    pub fn upload<F>(file: impl Into<PathBuf>, progress: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        Task::UploadFile {
            file: file.into(),
            progress: Arc::new(progress),
        }
    }

    /// Returns `true` if this task carries a JSON body.
    pub fn has_body(&self) -> bool {
        matches!(
            self,
            Task::RawBody(_)
                | Task::EncodableBody(_)
                | Task::RawBodyAndQuery { .. }
                | Task::EncodableBodyAndQuery { .. }
        )
    }

    /// Returns `true` for file uploads.
    pub fn is_upload(&self) -> bool {
        matches!(self, Task::UploadFile { .. })
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::None => f.write_str("None"),
            Task::QueryParameters(query) => f.debug_tuple("QueryParameters").field(query).finish(),
            Task::RawBody(body) => f.debug_tuple("RawBody").field(body).finish(),
            Task::EncodableBody(body) => f.debug_tuple("EncodableBody").field(body).finish(),
            Task::RawBodyAndQuery { body, query } => f
                .debug_struct("RawBodyAndQuery")
                .field("body", body)
                .field("query", query)
                .finish(),
            Task::EncodableBodyAndQuery { body, query } => f
                .debug_struct("EncodableBodyAndQuery")
                .field("body", body)
                .field("query", query)
                .finish(),
            Task::UploadFile { file, .. } => f
                .debug_struct("UploadFile")
                .field("file", file)
                .finish_non_exhaustive(),
        }
    }
}

fn collect<K, I>(pairs: I) -> Parameters
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

fn fields<K, V, I>(pairs: I) -> Fields
where
    K: Into<String>,
    V: Into<Body>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
