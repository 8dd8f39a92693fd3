use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// $ref chains deeper than this are treated as opaque objects
const MAX_REF_DEPTH: usize = 8;

/// The coarse kind of a tool parameter, shared by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl FieldKind {
    /// Map a JSON schema `type` name onto a kind, falling back to string
    pub fn from_json_type(name: &str) -> Self {
        match name {
            "boolean" => FieldKind::Boolean,
            "integer" | "number" => FieldKind::Number,
            "string" => FieldKind::String,
            "array" => FieldKind::Array,
            "object" => FieldKind::Object,
            _ => FieldKind::String,
        }
    }

    /// The JSON schema `type` name for this kind
    pub fn as_json_type(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterField {
    /// The name the field has on the wire (after serde renames)
    pub name: String,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Element kind, for arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<FieldKind>,
}

/// The generic description of a tool's input fields.
///
/// Derived once from the tool's input type, so every provider sees the same
/// field names, kinds and descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    fields: Vec<ParameterField>,
}

impl ParameterSchema {
    pub fn new(fields: Vec<ParameterField>) -> Self {
        Self { fields }
    }

    /// Derive the schema of `T` from its `JsonSchema` implementation.
    ///
    /// Doc comments (or `#[schemars(description = ...)]`) become descriptions and
    /// `#[serde(rename = ...)]` decides the visible field name. A `T` that is not a
    /// record yields an empty schema.
    pub fn for_type<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        match serde_json::to_value(&schema) {
            Ok(root) => Self::from_json_schema(&root),
            Err(e) => {
                tracing::warn!("could not serialize schema of {}: {}", T::schema_name(), e);
                Self::default()
            }
        }
    }

    /// Build the schema from an already generated JSON schema document
    pub fn from_json_schema(root: &Value) -> Self {
        let Some(properties) = root.get("properties").and_then(Value::as_object) else {
            return Self::default();
        };

        let required: Vec<&str> = root
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = properties
            .iter()
            .map(|(name, property)| {
                let kind = kind_of(property, root, 0);
                let items = match kind {
                    FieldKind::Array => property.get("items").map(|items| kind_of(items, root, 0)),
                    _ => None,
                };
                ParameterField {
                    name: name.clone(),
                    kind,
                    description: property
                        .get("description")
                        .and_then(Value::as_str)
                        .map(String::from),
                    required: required.contains(&name.as_str()),
                    items,
                }
            })
            .collect();

        Self { fields }
    }

    pub fn fields(&self) -> &[ParameterField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a JSON schema object; `with_required` adds the `required` list
    pub fn to_json_schema(&self, with_required: bool) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({ "type": field.kind.as_json_type() });
            if let Some(description) = &field.description {
                property["description"] = json!(description);
            }
            if let Some(items) = field.items {
                property["items"] = json!({ "type": items.as_json_type() });
            }
            properties.insert(field.name.clone(), property);
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if with_required {
            let required: Vec<&str> = self
                .fields
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.as_str())
                .collect();
            if !required.is_empty() {
                schema["required"] = json!(required);
            }
        }
        schema
    }
}

fn kind_of(property: &Value, root: &Value, depth: usize) -> FieldKind {
    if let Some(reference) = property.get("$ref").and_then(Value::as_str) {
        return match resolve_ref(reference, root) {
            Some(target) if depth < MAX_REF_DEPTH => kind_of(target, root, depth + 1),
            _ => FieldKind::Object,
        };
    }

    match property.get("type") {
        Some(Value::String(name)) => return FieldKind::from_json_type(name),
        Some(Value::Array(names)) => {
            // Option<T> shows up as ["T", "null"]
            let non_null: Vec<&str> = names
                .iter()
                .filter_map(Value::as_str)
                .filter(|n| *n != "null")
                .collect();
            return match non_null.as_slice() {
                [single] => FieldKind::from_json_type(single),
                _ => FieldKind::String,
            };
        }
        _ => {}
    }

    for combinator in ["anyOf", "oneOf", "allOf"] {
        if let Some(variants) = property.get(combinator).and_then(Value::as_array) {
            let non_null: Vec<&Value> = variants
                .iter()
                .filter(|v| v.get("type").and_then(Value::as_str) != Some("null"))
                .collect();
            if let [single] = non_null.as_slice() {
                return kind_of(single, root, depth + 1);
            }
            return FieldKind::String;
        }
    }

    FieldKind::String
}

fn resolve_ref<'a>(reference: &str, root: &'a Value) -> Option<&'a Value> {
    let name = reference.rsplit('/').next()?;
    root.get("$defs")
        .or_else(|| root.get("definitions"))
        .and_then(|defs| defs.get(name))
}
