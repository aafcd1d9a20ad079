//! Response schema nodes.
//!
//! The `response` role of a template declares the shape of the model's reply
//! using a small, closed vocabulary of node types. Validation is a single
//! recursive pass keyed on that vocabulary and stops at the first violation,
//! reporting a dotted path such as `response.profile.properties.age`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FormError, Result};

/// Name reserved for extracted reasoning output.
pub const THINKING_KEY: &str = "thinking";

/// Name given to the schema in the `response_format` contract.
pub const RESPONSE_SCHEMA_NAME: &str = "response";

/// The closed set of node types a response schema may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON integer.
    Integer,
    /// Nested object with named properties.
    Object,
    /// Homogeneous array.
    Array,
    /// JSON boolean.
    Boolean,
    /// Free text reply; no structured output is requested.
    Text,
}

impl SchemaType {
    /// All types, sorted by name.
    pub const ALL: [SchemaType; 7] = [
        Self::Array,
        Self::Boolean,
        Self::Integer,
        Self::Number,
        Self::Object,
        Self::String,
        Self::Text,
    ];

    /// The name used in templates and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Object => "object",
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Text => "text",
        }
    }

    /// Look a type up by its template name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-dependent shape of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// `string`
    String,
    /// `number`
    Number,
    /// `integer`
    Integer,
    /// `boolean`
    Boolean,
    /// `text`
    Text,
    /// `object` with properties in declaration order.
    Object {
        /// Declared properties.
        properties: Vec<(String, SchemaNode)>,
        /// Optional list of required property names, as declared.
        required: Option<Vec<String>>,
    },
    /// `array` of `items`.
    Array {
        /// Element schema.
        items: Box<SchemaNode>,
    },
}

/// One validated node of a response schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    /// Shape of the node.
    pub kind: SchemaKind,
    /// Optional human description forwarded to the model.
    pub description: Option<String>,
}

impl SchemaNode {
    /// Validate `value` as a schema node located at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidTemplate`] naming the offending path.
    pub fn from_value(value: &Value, path: &str) -> Result<Self> {
        let Value::Object(node) = value else {
            return Err(invalid(format!("the schema at '{path}' must be a mapping")));
        };

        let type_name = match node.get("type") {
            None => return Err(invalid(format!("the schema at '{path}' must include a 'type' key"))),
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                return Err(invalid(format!("the 'type' at '{path}' must be a string, got {other}")));
            }
        };
        let Some(schema_type) = SchemaType::from_name(type_name) else {
            let valid: Vec<&str> = SchemaType::ALL.iter().map(|t| t.as_str()).collect();
            return Err(invalid(format!(
                "invalid response type '{type_name}' at '{path}'; valid types are: {}",
                valid.join(", ")
            )));
        };

        let description = match node.get("description") {
            None => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(_) => return Err(invalid(format!("'description' at '{path}' must be a string"))),
        };

        let kind = match schema_type {
            SchemaType::String => SchemaKind::String,
            SchemaType::Number => SchemaKind::Number,
            SchemaType::Integer => SchemaKind::Integer,
            SchemaType::Boolean => SchemaKind::Boolean,
            SchemaType::Text => SchemaKind::Text,
            SchemaType::Object => parse_object(node, path)?,
            SchemaType::Array => {
                let Some(items) = node.get("items").filter(|v| v.is_object()) else {
                    return Err(invalid(format!("array schema '{path}' needs an 'items' mapping")));
                };
                SchemaKind::Array {
                    items: Box::new(Self::from_value(items, &format!("{path}.items"))?),
                }
            }
        };

        Ok(Self { kind, description })
    }

    /// The node's type.
    #[must_use]
    pub fn schema_type(&self) -> SchemaType {
        match self.kind {
            SchemaKind::String => SchemaType::String,
            SchemaKind::Number => SchemaType::Number,
            SchemaKind::Integer => SchemaType::Integer,
            SchemaKind::Boolean => SchemaType::Boolean,
            SchemaKind::Text => SchemaType::Text,
            SchemaKind::Object { .. } => SchemaType::Object,
            SchemaKind::Array { .. } => SchemaType::Array,
        }
    }

    /// Project the node into its minimal JSON-Schema form.
    ///
    /// Only `type` and `description` survive per node; nested `required`
    /// lists are de-duplicated and sorted.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.schema_type().as_str().into()));
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::String(description.clone()));
        }
        match &self.kind {
            SchemaKind::Object { properties, required } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_json_schema()))
                    .collect();
                out.insert("properties".into(), Value::Object(props));
                if let Some(required) = required {
                    let mut names = required.clone();
                    names.sort();
                    names.dedup();
                    out.insert("required".into(), names.into());
                }
            }
            SchemaKind::Array { items } => {
                out.insert("items".into(), items.to_json_schema());
            }
            _ => {}
        }
        Value::Object(out)
    }
}

fn parse_object(node: &Map<String, Value>, path: &str) -> Result<SchemaKind> {
    let Some(Value::Object(raw_props)) = node.get("properties") else {
        return Err(invalid(format!("object schema '{path}' needs a 'properties' mapping")));
    };

    let mut properties = Vec::with_capacity(raw_props.len());
    for (name, prop) in raw_props {
        let node = SchemaNode::from_value(prop, &format!("{path}.properties.{name}"))?;
        properties.push((name.clone(), node));
    }

    let required = match node.get("required") {
        None => None,
        Some(Value::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(name) = item else {
                    return Err(invalid(format!("'required' at '{path}' must be a list of strings")));
                };
                if !raw_props.contains_key(name) {
                    return Err(invalid(format!(
                        "'required' at '{path}' names undeclared property '{name}'"
                    )));
                }
                names.push(name.clone());
            }
            Some(names)
        }
        Some(_) => return Err(invalid(format!("'required' at '{path}' must be a list of strings"))),
    };

    Ok(SchemaKind::Object { properties, required })
}

fn invalid(message: String) -> FormError {
    FormError::InvalidTemplate(message)
}

/// The `response_format` contract sent to the completion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Always `json_schema` for contracts built from a template.
    #[serde(rename = "type")]
    pub format_type: String,
    /// Named schema the reply must conform to.
    pub json_schema: JsonSchemaFormat,
}

/// Named JSON schema inside a [`ResponseFormat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchemaFormat {
    /// Schema name.
    pub name: String,
    /// The schema itself.
    pub schema: Value,
}

impl ResponseFormat {
    /// Wrap `schema` in a `json_schema` contract.
    #[must_use]
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        Self {
            format_type: "json_schema".into(),
            json_schema: JsonSchemaFormat {
                name: name.into(),
                schema,
            },
        }
    }

    /// The schema the reply must conform to.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.json_schema.schema
    }
}

/// The validated `response` role of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    fields: Vec<(String, SchemaNode)>,
    raw: Value,
}

impl ResponseSchema {
    /// Validate the `response` role.
    ///
    /// # Errors
    ///
    /// [`FormError::ReservedKey`] when a field is named `thinking`;
    /// [`FormError::InvalidTemplate`] when the role is not a non-empty
    /// mapping, mixes a `text` field with others, or any node is malformed.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(invalid("the 'response' must be a non-empty mapping".into()));
        };
        if entries.contains_key(THINKING_KEY) {
            return Err(FormError::ReservedKey(format!(
                "'{THINKING_KEY}' is reserved in the response schema"
            )));
        }
        if entries.is_empty() {
            return Err(invalid("the 'response' must be a non-empty mapping".into()));
        }

        let has_text = entries
            .values()
            .any(|node| node.get("type").and_then(Value::as_str) == Some(SchemaType::Text.as_str()));
        if has_text && entries.len() > 1 {
            return Err(invalid("a 'text' response cannot be mixed with other fields".into()));
        }

        let mut fields = Vec::with_capacity(entries.len());
        for (name, node) in entries {
            fields.push((name.clone(), SchemaNode::from_value(node, &format!("response.{name}"))?));
        }

        Ok(Self {
            fields,
            raw: value.clone(),
        })
    }

    /// Validated fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[(String, SchemaNode)] {
        &self.fields
    }

    /// The `response` role exactly as written in the template.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether the reply is free text rather than a JSON object.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.structured_fields().next().is_none()
            || self.fields.iter().any(|(_, node)| matches!(node.kind, SchemaKind::Text))
    }

    /// Field a free-text reply binds to.
    #[must_use]
    pub fn text_field(&self) -> Option<&str> {
        self.structured_fields().next().map(|(name, _)| name.as_str())
    }

    /// Build the `response_format` contract, or `None` for free-text replies.
    ///
    /// The root `required` list holds every top-level field, sorted.
    #[must_use]
    pub fn response_format(&self) -> Option<ResponseFormat> {
        if self.is_text() {
            return None;
        }

        let properties: Map<String, Value> = self
            .structured_fields()
            .map(|(name, node)| (name.clone(), node.to_json_schema()))
            .collect();
        let mut required: Vec<String> = properties.keys().cloned().collect();
        required.sort();

        let mut schema = Map::new();
        schema.insert("type".into(), Value::String("object".into()));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), required.into());

        Some(ResponseFormat::json_schema(RESPONSE_SCHEMA_NAME, Value::Object(schema)))
    }

    fn structured_fields(&self) -> impl Iterator<Item = &(String, SchemaNode)> {
        self.fields.iter().filter(|(name, _)| name != THINKING_KEY)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn template_error(value: Value) -> String {
        match ResponseSchema::from_value(&value) {
            Err(FormError::InvalidTemplate(msg)) => msg,
            other => panic!("expected InvalidTemplate, got {other:?}"),
        }
    }

    #[test]
    fn type_names_round_trip() {
        for t in SchemaType::ALL {
            assert_eq!(SchemaType::from_name(t.as_str()), Some(t));
        }
        assert_eq!(SchemaType::from_name("date"), None);
    }

    #[test]
    fn nested_error_reports_dotted_path() {
        let msg = template_error(json!({
            "profile": {
                "type": "object",
                "properties": { "age": { "type": "float" } }
            }
        }));
        assert!(msg.contains("response.profile.properties.age"), "{msg}");
        assert!(msg.contains("'float'"), "{msg}");
    }

    #[test]
    fn array_items_path() {
        let msg = template_error(json!({
            "tags": { "type": "array", "items": { "description": "no type" } }
        }));
        assert!(msg.contains("response.tags.items"), "{msg}");
    }

    #[test]
    fn object_without_properties_rejected() {
        let msg = template_error(json!({ "profile": { "type": "object" } }));
        assert!(msg.contains("'properties'"), "{msg}");
    }

    #[test]
    fn array_without_items_rejected() {
        let msg = template_error(json!({ "tags": { "type": "array", "items": "string" } }));
        assert!(msg.contains("'items'"), "{msg}");
    }

    #[test]
    fn required_must_name_declared_strings() {
        let msg = template_error(json!({
            "p": { "type": "object", "properties": { "a": { "type": "string" } }, "required": "a" }
        }));
        assert!(msg.contains("list of strings"), "{msg}");

        let msg = template_error(json!({
            "p": { "type": "object", "properties": { "a": { "type": "string" } }, "required": ["b"] }
        }));
        assert!(msg.contains("undeclared property 'b'"), "{msg}");
    }

    #[test]
    fn text_mixed_with_other_fields_rejected() {
        let msg = template_error(json!({
            "summary": { "type": "text" },
            "score": { "type": "number" }
        }));
        assert!(msg.contains("cannot be mixed"), "{msg}");
    }

    #[test]
    fn thinking_field_is_reserved_even_when_schema_is_otherwise_bad() {
        let result = ResponseSchema::from_value(&json!({
            "thinking": { "type": "text" },
            "answer": { "type": "nope" }
        }));
        assert!(matches!(result, Err(FormError::ReservedKey(_))));
    }

    #[test]
    fn text_schema_has_no_format() {
        let schema = ResponseSchema::from_value(&json!({ "summary": { "type": "text" } })).expect("valid");
        assert!(schema.is_text());
        assert_eq!(schema.text_field(), Some("summary"));
        assert!(schema.response_format().is_none());
    }

    #[test]
    fn projection_keeps_type_and_description_only() {
        let schema = ResponseSchema::from_value(&json!({
            "name": { "type": "string", "description": "Name.", "example": "Ann" },
            "profile": {
                "type": "object",
                "properties": {
                    "zip": { "type": "string" },
                    "age": { "type": "integer" }
                },
                "required": ["zip", "age", "zip"]
            },
            "tags": { "type": "array", "items": { "type": "string", "format": "x" } }
        }))
        .expect("valid");

        let format = schema.response_format().expect("structured");
        assert_eq!(format.format_type, "json_schema");
        assert_eq!(format.json_schema.name, "response");
        assert_eq!(
            format.schema(),
            &json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Name." },
                    "profile": {
                        "type": "object",
                        "properties": {
                            "zip": { "type": "string" },
                            "age": { "type": "integer" }
                        },
                        "required": ["age", "zip"]
                    },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["name", "profile", "tags"]
            })
        );
    }

    #[test]
    fn response_format_serializes_to_wire_shape() {
        let format = ResponseFormat::json_schema("response", json!({ "type": "object" }));
        assert_eq!(
            serde_json::to_value(&format).expect("serialize"),
            json!({ "type": "json_schema", "json_schema": { "name": "response", "schema": { "type": "object" } } })
        );
    }
}
