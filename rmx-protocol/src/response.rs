//! Response model
//!
//! Replies arrive as envelopes (`value`, `status`, `timestamp`, and on
//! failure `error` / `error_type`). The value is decoded into the shape the
//! originating request calls for. Nothing here falls back to a default on an
//! unexpected shape.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::InstanceDescriptor;
use crate::error::{ProtocolError, ProtocolResult};
use crate::name::ObjectName;
use crate::request::{ListRequest, ReadRequest, Request, RequestType};

/// Status code of a successful reply
pub const STATUS_OK: u16 = 200;

/// Status code the agent uses for missing objects and attributes
pub const STATUS_NOT_FOUND: u16 = 404;

/// Named attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

pub type AttributeList = Vec<Attribute>;

/// Successful reply envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub timestamp: Option<DateTime<Utc>>,
    pub value: Value,
}

impl Reply {
    /// Unpack an envelope
    ///
    /// A non-200 status becomes `RemoteFailure`. A successful envelope must
    /// carry a `value` key; a present `null` is a valid value.
    pub fn from_envelope(envelope: &Value) -> ProtocolResult<Self> {
        let map = envelope
            .as_object()
            .ok_or_else(|| ProtocolError::decode("reply envelope", envelope))?;

        let status = map
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .ok_or_else(|| ProtocolError::decode("reply without a status", envelope))?;

        if status != STATUS_OK {
            let text = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            return Err(ProtocolError::RemoteFailure {
                status,
                error_type: text("error_type"),
                message: text("error"),
            });
        }

        let value = map
            .get("value")
            .cloned()
            .ok_or_else(|| ProtocolError::decode("reply without a value", envelope))?;

        let timestamp = map
            .get("timestamp")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        Ok(Self {
            status,
            timestamp,
            value,
        })
    }
}

/// Decoded value of a read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadValue {
    /// Single-attribute (or fetch-all) read of one object
    Single(Value),
    /// Multi-attribute read of one object, in request order
    Attributes(AttributeList),
    /// Read through a name pattern: attributes per matched object
    Objects(Vec<(ObjectName, AttributeList)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub value: ReadValue,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    /// Value the attribute held before the write
    pub previous: Value,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecResponse {
    pub value: Value,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListResponse {
    pub instances: Vec<InstanceDescriptor>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    /// Matched names, deduplicated, in the order the agent sent them
    pub names: Vec<ObjectName>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Any decoded response
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Read(ReadResponse),
    Write(WriteResponse),
    Exec(ExecResponse),
    List(ListResponse),
    Search(SearchResponse),
}

impl Response {
    /// Decode the envelope answering `request`
    pub fn decode(request: &Request, envelope: &Value) -> ProtocolResult<Self> {
        let reply = Reply::from_envelope(envelope).map_err(|e| not_found(request, e))?;
        let timestamp = reply.timestamp;

        let response = match request {
            Request::Read(r) => Response::Read(ReadResponse {
                value: decode_read(r, reply.value)?,
                timestamp,
            }),
            Request::Write(_) => Response::Write(WriteResponse {
                previous: reply.value,
                timestamp,
            }),
            Request::Exec(_) => Response::Exec(ExecResponse {
                value: reply.value,
                timestamp,
            }),
            Request::List(r) => Response::List(ListResponse {
                instances: decode_list(r, &reply.value)?,
                timestamp,
            }),
            Request::Search(_) => Response::Search(SearchResponse {
                names: decode_search(&reply.value)?,
                timestamp,
            }),
        };

        Ok(response)
    }

    /// Decode a batch of envelopes answering `requests` in order
    pub fn decode_batch(requests: &[Request], envelopes: &[Value]) -> ProtocolResult<Vec<Self>> {
        if requests.len() != envelopes.len() {
            return Err(ProtocolError::decode(
                format!(
                    "batch reply with {} entries for {} requests",
                    envelopes.len(),
                    requests.len()
                ),
                &Value::Array(envelopes.to_vec()),
            ));
        }
        requests
            .iter()
            .zip(envelopes)
            .map(|(request, envelope)| Self::decode(request, envelope))
            .collect()
    }

    pub fn response_type(&self) -> RequestType {
        match self {
            Response::Read(_) => RequestType::Read,
            Response::Write(_) => RequestType::Write,
            Response::Exec(_) => RequestType::Exec,
            Response::List(_) => RequestType::List,
            Response::Search(_) => RequestType::Search,
        }
    }

    pub fn into_read(self) -> ProtocolResult<ReadResponse> {
        match self {
            Response::Read(r) => Ok(r),
            other => Err(mismatch(RequestType::Read, &other)),
        }
    }

    pub fn into_write(self) -> ProtocolResult<WriteResponse> {
        match self {
            Response::Write(r) => Ok(r),
            other => Err(mismatch(RequestType::Write, &other)),
        }
    }

    pub fn into_exec(self) -> ProtocolResult<ExecResponse> {
        match self {
            Response::Exec(r) => Ok(r),
            other => Err(mismatch(RequestType::Exec, &other)),
        }
    }

    pub fn into_list(self) -> ProtocolResult<ListResponse> {
        match self {
            Response::List(r) => Ok(r),
            other => Err(mismatch(RequestType::List, &other)),
        }
    }

    pub fn into_search(self) -> ProtocolResult<SearchResponse> {
        match self {
            Response::Search(r) => Ok(r),
            other => Err(mismatch(RequestType::Search, &other)),
        }
    }
}

fn mismatch(expected: RequestType, actual: &Response) -> ProtocolError {
    ProtocolError::InvalidState {
        reason: format!(
            "expected a {} response, got a {} response",
            expected,
            actual.response_type()
        ),
    }
}

/// Turn a 404 naming a missing instance into `InstanceNotFound`
fn not_found(request: &Request, err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::RemoteFailure {
            status: STATUS_NOT_FOUND,
            ref error_type,
            ..
        } if error_type.contains("InstanceNotFound") => ProtocolError::InstanceNotFound {
            name: request
                .name()
                .map(ObjectName::canonical_string)
                .unwrap_or_default(),
        },
        other => other,
    }
}

fn decode_attributes(value: &Value, context: &str) -> ProtocolResult<AttributeList> {
    let map = value
        .as_object()
        .ok_or_else(|| ProtocolError::decode(context.to_string(), value))?;
    Ok(map
        .iter()
        .map(|(name, v)| Attribute::new(name.clone(), v.clone()))
        .collect())
}

fn decode_read(request: &ReadRequest, value: Value) -> ProtocolResult<ReadValue> {
    if request.name().is_pattern() {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::decode("pattern read reply", &value))?;
        let mut objects = Vec::with_capacity(map.len());
        for (name, attributes) in map {
            let name = ObjectName::parse(name).map_err(|e| {
                ProtocolError::decode(format!("object name in pattern read ({})", e), &value)
            })?;
            objects.push((name, decode_attributes(attributes, "attributes in pattern read")?));
        }
        return Ok(ReadValue::Objects(objects));
    }

    if !request.is_multi_attribute_mode() {
        return Ok(ReadValue::Single(value));
    }

    let order = request.attribute_names();

    // One name goes out as a bare string, so the agent may answer with the bare value
    if let [Some(only)] = order.as_slice() {
        let keyed = value
            .as_object()
            .is_some_and(|map| map.len() == 1 && map.contains_key(*only));
        if !keyed {
            return Ok(ReadValue::Attributes(vec![Attribute::new(*only, value)]));
        }
    }

    let mut attributes = decode_attributes(&value, "multi-attribute read reply")?;
    for name in order.iter().flatten() {
        if !attributes.iter().any(|a| a.name == *name) {
            return Err(ProtocolError::decode(
                format!("multi-attribute read reply without '{}'", name),
                &value,
            ));
        }
    }
    attributes.sort_by_key(|a| {
        order
            .iter()
            .position(|n| *n == Some(a.name.as_str()))
            .unwrap_or(order.len())
    });
    Ok(ReadValue::Attributes(attributes))
}

fn decode_list(request: &ListRequest, value: &Value) -> ProtocolResult<Vec<InstanceDescriptor>> {
    let map = value
        .as_object()
        .ok_or_else(|| ProtocolError::decode("list reply", value))?;

    // A single object may be listed as its bare info map
    if let Some(name) = request.specific_name() {
        if map.get("class").is_some_and(Value::is_string) {
            return Ok(vec![InstanceDescriptor::decode(name.clone(), value)?]);
        }
    }

    let mut instances = Vec::new();
    for (domain, entries) in map {
        let entries = entries.as_object().ok_or_else(|| {
            ProtocolError::decode(format!("list entries of domain '{}'", domain), entries)
        })?;
        for (properties, entry) in entries {
            let full = format!("{}:{}", domain, properties);
            let name = ObjectName::parse(&full).map_err(|e| {
                ProtocolError::decode(format!("listed object name ({})", e), &Value::String(full.clone()))
            })?;
            if let Some(pattern) = request.name() {
                if !pattern.apply(&name) {
                    tracing::trace!(name = %name, pattern = %pattern, "dropping unrequested list entry");
                    continue;
                }
            }
            instances.push(InstanceDescriptor::decode(name, entry)?);
        }
    }

    if instances.is_empty() {
        if let Some(name) = request.specific_name() {
            return Err(ProtocolError::InstanceNotFound {
                name: name.canonical_string(),
            });
        }
    }

    Ok(instances)
}

fn decode_search(value: &Value) -> ProtocolResult<Vec<ObjectName>> {
    let items = value
        .as_array()
        .ok_or_else(|| ProtocolError::decode("search reply", value))?;

    let mut seen = HashSet::with_capacity(items.len());
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let raw = item
            .as_str()
            .ok_or_else(|| ProtocolError::decode("search reply entry", item))?;
        let name = ObjectName::parse(raw)
            .map_err(|e| ProtocolError::decode(format!("search reply name ({})", e), item))?;
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    Ok(names)
}
