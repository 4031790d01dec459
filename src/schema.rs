//! # Schema Module
//!
//! The schema layer is the boundary between the dispatch engine and whatever library
//! actually validates values. The engine only ever talks to two traits:
//!
//! - [`Schema`] - a single schema: validate a value (returning the validated value or a
//!   list of [`Issue`]s), expose metadata, and describe itself as JSON Schema.
//! - [`SchemaAdapter`] - application-wide translation used for metadata lookup and for
//!   flattening object-shaped params/query/headers schemas into named parameters.
//!
//! [`JsonSchema`] and [`JsonSchemaAdapter`] implement both on top of the `jsonschema`
//! crate. Validation is synchronous: a schema cannot defer its verdict.
//!
//! ## Route definitions
//!
//! A [`RouteDef`] attaches schemas and documentation to a route:
//!
//! ```rust
//! use hookline::schema::{JsonSchema, RouteDef};
//! use serde_json::json;
//!
//! let def = RouteDef::new()
//!     .params(JsonSchema::new(json!({
//!         "type": "object",
//!         "properties": { "id": { "type": "integer" } },
//!         "required": ["id"]
//!     })).unwrap())
//!     .response(JsonSchema::new(json!({ "type": "object" })).unwrap())
//!     .summary("Fetch one item");
//! assert!(def.has_input_schemas());
//! ```

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One reason a schema rejected a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    /// JSON pointer to the offending value, when the validator reports one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) if !path.is_empty() => write!(f, "{}: {}", path, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Machine-readable metadata attached to a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMeta {
    /// Content type the response body is sent with; wins over the codec's choice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A validator for one value.
pub trait Schema: Send + Sync + fmt::Debug {
    /// Validate `input`, returning the (possibly normalized) value or the issues found.
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>>;

    fn meta(&self) -> SchemaMeta {
        SchemaMeta::default()
    }

    /// JSON Schema description of this schema.
    fn to_json_schema(&self) -> Value;
}

impl<S: Schema + ?Sized> Schema for Arc<S> {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        (**self).validate(input)
    }

    fn meta(&self) -> SchemaMeta {
        (**self).meta()
    }

    fn to_json_schema(&self) -> Value {
        (**self).to_json_schema()
    }
}

/// Shared handle to a schema; route definitions hold these.
pub type SchemaRef = Arc<dyn Schema>;

/// The schema document could not be compiled.
#[derive(Debug, Clone)]
pub struct SchemaError {
    message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid JSON schema: {}", self.message)
    }
}

impl std::error::Error for SchemaError {}

/// A compiled JSON Schema document.
pub struct JsonSchema {
    raw: Value,
    validator: jsonschema::Validator,
    meta: SchemaMeta,
}

impl JsonSchema {
    /// Compile `raw` once; the compiled validator is reused for every request.
    pub fn new(raw: Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&raw).map_err(|e| SchemaError {
            message: e.to_string(),
        })?;
        Ok(Self {
            raw,
            validator,
            meta: SchemaMeta::default(),
        })
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.meta.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn response_description(mut self, description: impl Into<String>) -> Self {
        self.meta.response_description = Some(description.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("raw", &self.raw)
            .field("meta", &self.meta)
            .finish()
    }
}

impl Schema for JsonSchema {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        let issues: Vec<Issue> = self
            .validator
            .iter_errors(input)
            .map(|e| Issue::new(e.instance_path().to_string(), e.to_string()))
            .collect();
        if issues.is_empty() {
            Ok(input.clone())
        } else {
            Err(issues)
        }
    }

    fn meta(&self) -> SchemaMeta {
        self.meta.clone()
    }

    fn to_json_schema(&self) -> Value {
        self.raw.clone()
    }
}

/// One named parameter flattened out of an object schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamRecord {
    pub name: String,
    pub schema: Value,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Application-wide translation between [`Schema`]s and the engine.
pub trait SchemaAdapter: Send + Sync {
    fn to_json_schema(&self, schema: &dyn Schema) -> Value;

    fn get_meta(&self, schema: &dyn Schema) -> SchemaMeta;

    /// Flatten an object-shaped schema into its named properties.
    fn parse_params_record(&self, schema: &dyn Schema) -> Vec<ParamRecord>;
}

/// Default adapter: trusts each schema's own JSON Schema description.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaAdapter;

impl SchemaAdapter for JsonSchemaAdapter {
    fn to_json_schema(&self, schema: &dyn Schema) -> Value {
        schema.to_json_schema()
    }

    fn get_meta(&self, schema: &dyn Schema) -> SchemaMeta {
        schema.meta()
    }

    fn parse_params_record(&self, schema: &dyn Schema) -> Vec<ParamRecord> {
        params_from_json_schema(&self.to_json_schema(schema))
    }
}

/// Flatten `{"type":"object","properties":{..},"required":[..]}` into records.
///
/// Non-object schemas yield no records.
#[must_use]
pub fn params_from_json_schema(json_schema: &Value) -> Vec<ParamRecord> {
    let Some(properties) = json_schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = json_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, schema)| ParamRecord {
            name: name.clone(),
            schema: schema.clone(),
            optional: !required.contains(&name.as_str()),
            description: schema
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
        })
        .collect()
}

/// Output definition of a route.
#[derive(Debug, Clone)]
pub enum Responses {
    /// One schema regardless of status.
    Single(SchemaRef),
    /// Schema per status code; the handler must answer with
    /// [`RequestContext::status`](crate::context::RequestContext::status).
    ByStatus(BTreeMap<u16, SchemaRef>),
}

impl Responses {
    /// Schema that applies to a response sent with `status`.
    #[must_use]
    pub fn for_status(&self, status: StatusCode) -> Option<&SchemaRef> {
        match self {
            Responses::Single(schema) => Some(schema),
            Responses::ByStatus(map) => map.get(&status.as_u16()),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_status_map(&self) -> bool {
        matches!(self, Responses::ByStatus(_))
    }
}

/// Documentation attached to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDocs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// Schemas and documentation for one route.
#[derive(Debug, Clone, Default)]
pub struct RouteDef {
    pub headers: Option<SchemaRef>,
    pub params: Option<SchemaRef>,
    pub query: Option<SchemaRef>,
    pub body: Option<SchemaRef>,
    pub responses: Option<Responses>,
    pub docs: RouteDocs,
}

impl RouteDef {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn headers<S: Schema + 'static>(mut self, schema: S) -> Self {
        self.headers = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn params<S: Schema + 'static>(mut self, schema: S) -> Self {
        self.params = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn query<S: Schema + 'static>(mut self, schema: S) -> Self {
        self.query = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn body<S: Schema + 'static>(mut self, schema: S) -> Self {
        self.body = Some(Arc::new(schema));
        self
    }

    /// Single response schema used for every status.
    #[must_use]
    pub fn response<S: Schema + 'static>(mut self, schema: S) -> Self {
        self.responses = Some(Responses::Single(Arc::new(schema)));
        self
    }

    /// Add the schema for one status code, turning the output into a status map.
    #[must_use]
    pub fn response_for<S: Schema + 'static>(mut self, status: u16, schema: S) -> Self {
        let mut map = match self.responses.take() {
            Some(Responses::ByStatus(map)) => map,
            _ => BTreeMap::new(),
        };
        map.insert(status, Arc::new(schema));
        self.responses = Some(Responses::ByStatus(map));
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.docs.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.docs.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.docs.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.docs.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.docs.deprecated = true;
        self
    }

    #[must_use]
    pub fn has_input_schemas(&self) -> bool {
        self.headers.is_some() || self.params.is_some() || self.query.is_some() || self.body.is_some()
    }
}

/// Ready-made output schema for the JSON error body.
pub fn error_response_schema() -> Result<JsonSchema, SchemaError> {
    JsonSchema::new(json!({
        "type": "object",
        "properties": {
            "status": { "type": "integer" },
            "name": { "type": "string" },
            "message": { "type": "string" },
            "stack": { "type": "array", "items": { "type": "string" } },
            "cause": { "type": "object" }
        },
        "required": ["status", "name", "message"]
    }))
    .map(|s| s.response_description("Error response").content_type("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> JsonSchema {
        JsonSchema::new(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Display name" },
                "age": { "type": "integer", "minimum": 0 }
            },
            "required": ["name"]
        }))
        .unwrap()
    }

    #[test]
    fn valid_input_is_returned() {
        let schema = user_schema();
        let input = json!({"name": "ada", "age": 36});
        assert_eq!(schema.validate(&input).unwrap(), input);
    }

    #[test]
    fn invalid_input_reports_issues() {
        let schema = user_schema();
        let issues = schema.validate(&json!({"age": -1})).unwrap_err();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn invalid_document_is_rejected() {
        assert!(JsonSchema::new(json!({"type": 12})).is_err());
    }

    #[test]
    fn meta_round_trips_through_adapter() {
        let schema = user_schema().content_type("application/vnd.user+json");
        let meta = JsonSchemaAdapter.get_meta(&schema);
        assert_eq!(meta.content_type.as_deref(), Some("application/vnd.user+json"));
    }

    #[test]
    fn params_record_flattens_object_schema() {
        let records = JsonSchemaAdapter.parse_params_record(&user_schema());
        let name = records.iter().find(|r| r.name == "name").unwrap();
        let age = records.iter().find(|r| r.name == "age").unwrap();
        assert!(!name.optional);
        assert_eq!(name.description.as_deref(), Some("Display name"));
        assert!(age.optional);
    }

    #[test]
    fn status_map_selects_by_status() {
        let def = RouteDef::new()
            .response_for(200, user_schema())
            .response_for(404, error_response_schema().unwrap());
        let responses = def.responses.unwrap();
        assert!(responses.is_status_map());
        assert!(responses.for_status(StatusCode::OK).is_some());
        assert!(responses.for_status(StatusCode::NOT_FOUND).is_some());
        assert!(responses.for_status(StatusCode::CREATED).is_none());
    }

    #[test]
    fn error_schema_accepts_error_bodies() {
        let schema = error_response_schema().unwrap();
        let body = json!({"status": 404, "name": "NotFoundHttpError", "message": "Not Found"});
        assert!(schema.validate(&body).is_ok());
        assert!(schema.validate(&json!({"status": 404})).is_err());
    }
}
