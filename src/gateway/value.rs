//! Values exchanged with the remote service.

use crate::error::{Error, ErrorContext, RemoteError};
use crate::Result;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::fmt;
use std::io::{self, Cursor, Read};

/// Bind parameters, in declaration order.
pub type Params = Map<String, Value>;

/// A large object handle. Must be drained before its content is usable.
///
/// Blocking drivers hand out a [`Read`]; asynchronous drivers hand out a byte
/// stream. Both are consumed by [`LargeObject::read_to_string`].
pub struct LargeObject {
    source: LobSource,
}

enum LobSource {
    Reader(Box<dyn Read + Send>),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl LargeObject {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            source: LobSource::Reader(Box::new(reader)),
        }
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            source: LobSource::Stream(stream.boxed()),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_reader(Cursor::new(text.into().into_bytes()))
    }

    /// Reads the object to completion. `chunk_size` bounds each read from a
    /// blocking source; stream sources yield chunks of the driver's choosing.
    pub async fn read_to_bytes(self, chunk_size: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self.source {
            LobSource::Reader(mut reader) => {
                let mut buf = vec![0u8; chunk_size.max(1)];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => out.extend_from_slice(&buf[..n]),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            LobSource::Stream(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    out.extend_from_slice(&chunk?);
                }
            }
        }
        Ok(out)
    }

    pub async fn read_to_string(self, chunk_size: usize) -> Result<String> {
        let bytes = self.read_to_bytes(chunk_size).await?;
        String::from_utf8(bytes).map_err(|e| {
            Error::runtime_with_context(
                "large object is not valid UTF-8",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("gateway.lob"),
            )
        })
    }
}

impl fmt::Debug for LargeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            LobSource::Reader(_) => "reader",
            LobSource::Stream(_) => "stream",
        };
        f.debug_struct("LargeObject").field("source", &kind).finish()
    }
}

/// A scalar or large object returned by a function call or query column.
#[derive(Debug)]
pub enum RemoteValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Lob(LargeObject),
}

impl RemoteValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RemoteValue::Null)
    }

    /// Text form of the value, draining large objects. `Null` maps to `None`.
    pub async fn into_text(self, chunk_size: usize) -> Result<Option<String>> {
        let text = match self {
            RemoteValue::Null => return Ok(None),
            RemoteValue::Bool(b) => b.to_string(),
            RemoteValue::Int(i) => i.to_string(),
            RemoteValue::Float(f) => f.to_string(),
            RemoteValue::Text(s) => s,
            RemoteValue::Lob(lob) => lob.read_to_string(chunk_size).await?,
        };
        Ok(Some(text))
    }

    /// JSON form of the value. Large objects become strings; no parsing is attempted.
    pub async fn into_json(self, chunk_size: usize) -> Result<Value> {
        let value = match self {
            RemoteValue::Null => Value::Null,
            RemoteValue::Bool(b) => Value::Bool(b),
            RemoteValue::Int(i) => Value::from(i),
            RemoteValue::Float(f) => Value::from(f),
            RemoteValue::Text(s) => Value::String(s),
            RemoteValue::Lob(lob) => Value::String(lob.read_to_string(chunk_size).await?),
        };
        Ok(value)
    }
}

impl From<&str> for RemoteValue {
    fn from(value: &str) -> Self {
        RemoteValue::Text(value.to_string())
    }
}

impl From<String> for RemoteValue {
    fn from(value: String) -> Self {
        RemoteValue::Text(value)
    }
}

impl From<i64> for RemoteValue {
    fn from(value: i64) -> Self {
        RemoteValue::Int(value)
    }
}

impl From<f64> for RemoteValue {
    fn from(value: f64) -> Self {
        RemoteValue::Float(value)
    }
}

impl From<bool> for RemoteValue {
    fn from(value: bool) -> Self {
        RemoteValue::Bool(value)
    }
}

impl From<LargeObject> for RemoteValue {
    fn from(value: LargeObject) -> Self {
        RemoteValue::Lob(value)
    }
}

impl<T: Into<RemoteValue>> From<Option<T>> for RemoteValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RemoteValue::Null)
    }
}

/// One result row, columns in select-list order.
#[derive(Debug, Default)]
pub struct Row {
    values: Vec<RemoteValue>,
}

impl Row {
    pub fn new(values: Vec<RemoteValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<RemoteValue> {
        self.values
    }

    /// Splits a two-column `(name, value)` row.
    pub fn into_pair(self) -> Result<(RemoteValue, RemoteValue)> {
        let width = self.values.len();
        let mut values = self.values.into_iter();
        match (values.next(), values.next(), values.next()) {
            (Some(first), Some(second), None) => Ok((first, second)),
            _ => Err(Error::runtime_with_context(
                "expected a two-column row",
                ErrorContext::new()
                    .with_details(format!("got {} columns", width))
                    .with_source("gateway.row"),
            )),
        }
    }
}

/// Declared return type of a remote function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Varchar,
    Number,
    Clob,
}

/// A function invocation queued into a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub return_type: ReturnType,
    pub params: Params,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, return_type: ReturnType, params: Params) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
        }
    }
}

/// Per-call result reported by a pipeline run. `index` is the position of the
/// call in the submitted list; outcomes may arrive in any order.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub index: usize,
    pub result: std::result::Result<RemoteValue, RemoteError>,
}

impl PipelineOutcome {
    pub fn ok(index: usize, value: impl Into<RemoteValue>) -> Self {
        Self {
            index,
            result: Ok(value.into()),
        }
    }

    pub fn err(index: usize, error: RemoteError) -> Self {
        Self {
            index,
            result: Err(error),
        }
    }
}
