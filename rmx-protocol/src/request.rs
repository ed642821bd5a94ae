//! Request model
//!
//! One variant per operation. Every request renders to the canonical map
//! sent on the wire and parses back from such a map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};
use crate::name::ObjectName;
use crate::path::AttributePath;

/// Operation carried by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Read,
    Write,
    Exec,
    List,
    Search,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Read => "read",
            RequestType::Write => "write",
            RequestType::Exec => "exec",
            RequestType::List => "list",
            RequestType::Search => "search",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(RequestType::Read),
            "write" => Ok(RequestType::Write),
            "exec" => Ok(RequestType::Exec),
            "list" => Ok(RequestType::List),
            "search" => Ok(RequestType::Search),
            _ => Err(format!("Unknown request type: {}", s)),
        }
    }
}

/// Which attributes a read request asks for
///
/// `Single(None)` is an explicitly requested attribute whose name is null,
/// which is not the same as `Absent` (fetch every attribute).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum AttributeSelector {
    #[default]
    Absent,
    Single(Option<String>),
    Multiple(Vec<String>),
}

impl AttributeSelector {
    /// Selector for a collection of names
    ///
    /// Any collection, empty or of one name included, is multi-attribute mode.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeSelector::Multiple(names.into_iter().map(Into::into).collect())
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, AttributeSelector::Multiple(_))
    }

    fn parse(attribute: Option<&Value>, request: &Value) -> ProtocolResult<Self> {
        match attribute {
            None | Some(Value::Null) => Ok(AttributeSelector::Absent),
            Some(Value::String(name)) => Ok(AttributeSelector::Single(Some(name.clone()))),
            Some(Value::Array(items)) if items.len() == 1 && items[0].is_null() => {
                Ok(AttributeSelector::Single(None))
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ProtocolError::decode("multi-attribute read with a non-string name", request)
                    })
                })
                .collect::<ProtocolResult<Vec<_>>>()
                .map(AttributeSelector::Multiple),
            Some(_) => Err(ProtocolError::decode("read request attribute", request)),
        }
    }

    /// Wire form of the selector
    ///
    /// Two states do not survive a round trip: `Single(None)` renders as
    /// `null` and parses back as `Absent`, and a one-name `Multiple` renders
    /// as a bare string and parses back as `Single`.
    fn render(&self) -> Option<Value> {
        match self {
            AttributeSelector::Absent => None,
            AttributeSelector::Single(Some(name)) => Some(Value::String(name.clone())),
            AttributeSelector::Single(None) => Some(Value::Null),
            AttributeSelector::Multiple(names) if names.len() == 1 => {
                Some(Value::String(names[0].clone()))
            }
            AttributeSelector::Multiple(names) => Some(Value::Array(
                names.iter().cloned().map(Value::String).collect(),
            )),
        }
    }
}

impl From<&str> for AttributeSelector {
    fn from(name: &str) -> Self {
        AttributeSelector::Single(Some(name.to_string()))
    }
}

impl From<String> for AttributeSelector {
    fn from(name: String) -> Self {
        AttributeSelector::Single(Some(name))
    }
}

impl From<Option<&str>> for AttributeSelector {
    fn from(name: Option<&str>) -> Self {
        match name {
            Some(name) => name.into(),
            None => AttributeSelector::Absent,
        }
    }
}

impl From<Vec<String>> for AttributeSelector {
    fn from(names: Vec<String>) -> Self {
        AttributeSelector::from_names(names)
    }
}

impl From<&[&str]> for AttributeSelector {
    fn from(names: &[&str]) -> Self {
        AttributeSelector::from_names(names.iter().copied())
    }
}

/// Processing options the agent honours while serializing a read result
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// Maximum nesting depth of the serialized value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    /// Maximum number of collection elements serialized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_collection_size: Option<u32>,

    /// Maximum number of objects serialized in total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_objects: Option<u32>,

    /// Report per-attribute errors inline instead of failing the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_errors: Option<bool>,
}

impl ProcessingOptions {
    pub fn is_empty(&self) -> bool {
        self.max_depth.is_none()
            && self.max_collection_size.is_none()
            && self.max_objects.is_none()
            && self.ignore_errors.is_none()
    }

    /// Fill every unset option from `defaults`
    pub fn or(&self, defaults: &ProcessingOptions) -> ProcessingOptions {
        ProcessingOptions {
            max_depth: self.max_depth.or(defaults.max_depth),
            max_collection_size: self.max_collection_size.or(defaults.max_collection_size),
            max_objects: self.max_objects.or(defaults.max_objects),
            ignore_errors: self.ignore_errors.or(defaults.ignore_errors),
        }
    }

    fn render(&self) -> Value {
        let mut map = Map::new();
        if let Some(v) = self.max_depth {
            map.insert("maxDepth".into(), v.into());
        }
        if let Some(v) = self.max_collection_size {
            map.insert("maxCollectionSize".into(), v.into());
        }
        if let Some(v) = self.max_objects {
            map.insert("maxObjects".into(), v.into());
        }
        if let Some(v) = self.ignore_errors {
            map.insert("ignoreErrors".into(), v.into());
        }
        Value::Object(map)
    }
}

/// Read one, several or all attributes
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    name: ObjectName,
    selector: AttributeSelector,
    path: Option<AttributePath>,
    options: ProcessingOptions,
}

impl ReadRequest {
    pub fn new(name: ObjectName, selector: impl Into<AttributeSelector>) -> Self {
        Self {
            name,
            selector: selector.into(),
            path: None,
            options: ProcessingOptions::default(),
        }
    }

    /// Read every attribute of `name`
    pub fn all(name: ObjectName) -> Self {
        Self::new(name, AttributeSelector::Absent)
    }

    /// Attach a path; the empty path is the same as none
    pub fn with_path(mut self, path: AttributePath) -> Self {
        self.path = (!path.is_empty()).then_some(path);
        self
    }

    pub fn with_options(mut self, options: ProcessingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn selector(&self) -> &AttributeSelector {
        &self.selector
    }

    pub fn path(&self) -> Option<&AttributePath> {
        self.path.as_ref()
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn is_multi_attribute_mode(&self) -> bool {
        self.selector.is_multi()
    }

    /// The single requested attribute name
    ///
    /// Fails with `InvalidState` in multi-attribute mode; check
    /// [`is_multi_attribute_mode`](Self::is_multi_attribute_mode) first.
    pub fn attribute_name(&self) -> ProtocolResult<Option<&str>> {
        match &self.selector {
            AttributeSelector::Absent => Ok(None),
            AttributeSelector::Single(name) => Ok(name.as_deref()),
            AttributeSelector::Multiple(names) => Err(ProtocolError::InvalidState {
                reason: format!(
                    "request contains more than one attribute (attrs = {:?}), use attribute_names()",
                    names
                ),
            }),
        }
    }

    /// Every requested name, in request order
    pub fn attribute_names(&self) -> Vec<Option<&str>> {
        match &self.selector {
            AttributeSelector::Absent => Vec::new(),
            AttributeSelector::Single(name) => vec![name.as_deref()],
            AttributeSelector::Multiple(names) => names.iter().map(|n| Some(n.as_str())).collect(),
        }
    }

    /// Whether any attribute name is stored (false means "fetch all")
    pub fn has_attribute(&self) -> bool {
        match &self.selector {
            AttributeSelector::Absent | AttributeSelector::Single(None) => false,
            AttributeSelector::Single(Some(_)) | AttributeSelector::Multiple(_) => true,
        }
    }
}

impl fmt::Display for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadRequest[attribute=")?;
        match &self.selector {
            AttributeSelector::Multiple(names) => write!(f, "[{}]", names.join(","))?,
            AttributeSelector::Single(Some(name)) => write!(f, "{}", name)?,
            AttributeSelector::Single(None) | AttributeSelector::Absent => write!(f, "null")?,
        }
        write!(f, ", mbean={}", self.name)?;
        if let Some(path) = &self.path {
            write!(f, ", path={}", path)?;
        }
        write!(f, "]")
    }
}

/// Set one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub name: ObjectName,
    pub attribute: String,
    pub value: Value,
}

impl WriteRequest {
    pub fn new(name: ObjectName, attribute: impl Into<String>, value: Value) -> Self {
        Self {
            name,
            attribute: attribute.into(),
            value,
        }
    }
}

/// Invoke an operation
///
/// `arguments: None` omits the key on the wire, which differs from an
/// explicit empty argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecRequest {
    pub name: ObjectName,
    pub operation: String,
    pub arguments: Option<Vec<Value>>,
}

impl ExecRequest {
    pub fn new(name: ObjectName, operation: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            name,
            operation: operation.into(),
            arguments: Some(arguments),
        }
    }

    pub fn without_arguments(name: ObjectName, operation: impl Into<String>) -> Self {
        Self {
            name,
            operation: operation.into(),
            arguments: None,
        }
    }
}

/// Describe registered objects; no name lists the whole registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    pub name: Option<ObjectName>,
}

impl ListRequest {
    pub fn new(name: Option<ObjectName>) -> Self {
        Self { name }
    }

    pub fn name(&self) -> Option<&ObjectName> {
        self.name.as_ref()
    }

    /// The one object this request names, if it names a single object
    pub fn specific_name(&self) -> Option<&ObjectName> {
        self.name.as_ref().filter(|n| !n.is_pattern())
    }
}

/// Find registered names matching a pattern
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub pattern: ObjectName,
}

impl SearchRequest {
    pub fn new(pattern: ObjectName) -> Self {
        Self { pattern }
    }
}

/// Any protocol request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Read(ReadRequest),
    Write(WriteRequest),
    Exec(ExecRequest),
    List(ListRequest),
    Search(SearchRequest),
}

impl Request {
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Read(_) => RequestType::Read,
            Request::Write(_) => RequestType::Write,
            Request::Exec(_) => RequestType::Exec,
            Request::List(_) => RequestType::List,
            Request::Search(_) => RequestType::Search,
        }
    }

    /// Object name or pattern the request addresses
    pub fn name(&self) -> Option<&ObjectName> {
        match self {
            Request::Read(r) => Some(&r.name),
            Request::Write(r) => Some(&r.name),
            Request::Exec(r) => Some(&r.name),
            Request::List(r) => r.name.as_ref(),
            Request::Search(r) => Some(&r.pattern),
        }
    }

    /// Render the canonical wire map
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), self.request_type().as_str().into());

        match self {
            Request::Read(r) => {
                map.insert("mbean".into(), r.name.canonical_string().into());
                if let Some(attribute) = r.selector.render() {
                    map.insert("attribute".into(), attribute);
                }
                if let Some(path) = &r.path {
                    map.insert("path".into(), path.to_string().into());
                }
                if !r.options.is_empty() {
                    map.insert("config".into(), r.options.render());
                }
            }
            Request::Write(r) => {
                map.insert("mbean".into(), r.name.canonical_string().into());
                map.insert("attribute".into(), r.attribute.clone().into());
                map.insert("value".into(), r.value.clone());
            }
            Request::Exec(r) => {
                map.insert("mbean".into(), r.name.canonical_string().into());
                map.insert("operation".into(), r.operation.clone().into());
                if let Some(args) = &r.arguments {
                    map.insert("arguments".into(), Value::Array(args.clone()));
                }
            }
            Request::List(r) => {
                if let Some(name) = &r.name {
                    map.insert("mbean".into(), name.canonical_string().into());
                }
            }
            Request::Search(r) => {
                map.insert("mbean".into(), r.pattern.canonical_string().into());
            }
        }

        Value::Object(map)
    }

    /// Parse a request from its wire map
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::decode("request", value))?;

        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::decode("request without a type", value))?;
        let kind: RequestType = kind
            .parse()
            .map_err(|e: String| ProtocolError::decode(format!("request ({})", e), value))?;

        let request = match kind {
            RequestType::Read => {
                let path = match map.get("path") {
                    None | Some(Value::Null) => None,
                    // The empty path is never rendered, so "" is one empty segment
                    Some(Value::String(p)) if p.is_empty() => {
                        Some(AttributePath::from_segments([""]))
                    }
                    Some(Value::String(p)) => Some(AttributePath::parse(p)?),
                    Some(_) => return Err(ProtocolError::decode("read request path", value)),
                };
                let options = match map.get("config") {
                    None | Some(Value::Null) => ProcessingOptions::default(),
                    Some(config) => serde_json::from_value(config.clone()).map_err(|e| {
                        ProtocolError::decode(format!("processing options ({})", e), value)
                    })?,
                };
                let mut read = ReadRequest::new(
                    required_name(map, value)?,
                    AttributeSelector::parse(map.get("attribute"), value)?,
                )
                .with_options(options);
                if let Some(path) = path {
                    read = read.with_path(path);
                }
                Request::Read(read)
            }
            RequestType::Write => {
                let attribute = required_str(map, "attribute", value)?;
                let new_value = map
                    .get("value")
                    .cloned()
                    .ok_or_else(|| ProtocolError::decode("write request without a value", value))?;
                Request::Write(WriteRequest::new(
                    required_name(map, value)?,
                    attribute,
                    new_value,
                ))
            }
            RequestType::Exec => {
                let operation = required_str(map, "operation", value)?;
                let arguments = match map.get("arguments") {
                    None | Some(Value::Null) => None,
                    Some(Value::Array(args)) => Some(args.clone()),
                    Some(_) => return Err(ProtocolError::decode("exec request arguments", value)),
                };
                Request::Exec(ExecRequest {
                    name: required_name(map, value)?,
                    operation,
                    arguments,
                })
            }
            RequestType::List => {
                let name = match map.get("mbean") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(n)) => Some(ObjectName::parse(n)?),
                    Some(_) => return Err(ProtocolError::decode("list request mbean", value)),
                };
                Request::List(ListRequest::new(name))
            }
            RequestType::Search => Request::Search(SearchRequest::new(required_name(map, value)?)),
        };

        Ok(request)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Read(r) => fmt::Display::fmt(r, f),
            Request::Write(r) => write!(
                f,
                "WriteRequest[attribute={}, mbean={}]",
                r.attribute, r.name
            ),
            Request::Exec(r) => write!(
                f,
                "ExecRequest[operation={}, mbean={}]",
                r.operation, r.name
            ),
            Request::List(r) => match &r.name {
                Some(name) => write!(f, "ListRequest[mbean={}]", name),
                None => write!(f, "ListRequest[]"),
            },
            Request::Search(r) => write!(f, "SearchRequest[mbean={}]", r.pattern),
        }
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Request::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl From<ReadRequest> for Request {
    fn from(r: ReadRequest) -> Self {
        Request::Read(r)
    }
}

impl From<WriteRequest> for Request {
    fn from(r: WriteRequest) -> Self {
        Request::Write(r)
    }
}

impl From<ExecRequest> for Request {
    fn from(r: ExecRequest) -> Self {
        Request::Exec(r)
    }
}

impl From<ListRequest> for Request {
    fn from(r: ListRequest) -> Self {
        Request::List(r)
    }
}

impl From<SearchRequest> for Request {
    fn from(r: SearchRequest) -> Self {
        Request::Search(r)
    }
}

fn required_name(map: &Map<String, Value>, request: &Value) -> ProtocolResult<ObjectName> {
    let name = map
        .get("mbean")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::decode("request without an mbean", request))?;
    ObjectName::parse(name)
}

fn required_str(map: &Map<String, Value>, key: &str, request: &Value) -> ProtocolResult<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProtocolError::decode(format!("request without '{}'", key), request))
}
