use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::{Error, Result};

pub mod registry;
pub mod schema;

pub use registry::ToolRegistry;
pub use schema::{FieldKind, ParameterField, ParameterSchema};

type Handler = dyn Fn(Value) -> Result<String> + Send + Sync;

/// A tool that can be used by a model.
///
/// A tool wraps a callback over one strongly typed input record. The parameter
/// schema shown to the model is derived from that record when the tool is built.
#[derive(Clone)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Parameters that the tool accepts
    pub parameters: ParameterSchema,
    handler: Arc<Handler>,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<I, F, N, D>(name: N, description: D, callback: F) -> Self
    where
        I: DeserializeOwned + JsonSchema + 'static,
        F: Fn(I) -> String + Send + Sync + 'static,
        N: Into<String>,
        D: Into<String>,
    {
        let name = name.into();
        let tool_name = name.clone();
        let handler = move |arguments: Value| -> Result<String> {
            let input: I =
                serde_json::from_value(arguments).map_err(|e| Error::schema(&tool_name, e))?;
            Ok(callback(input))
        };

        Tool {
            name,
            description: description.into(),
            parameters: ParameterSchema::for_type::<I>(),
            handler: Arc::new(handler),
        }
    }

    /// Run the tool with the raw argument blob the model sent.
    ///
    /// The blob must be a JSON object matching the input record; anything else is
    /// a schema error. An empty blob counts as an empty object.
    pub fn call(&self, raw_arguments: &str) -> Result<String> {
        let arguments = if raw_arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str::<Value>(raw_arguments)
                .map_err(|e| Error::schema(&self.name, e))?
        };

        if !arguments.is_object() {
            return Err(Error::schema(
                &self.name,
                format!("expected a JSON object, got {}", arguments),
            ));
        }

        (self.handler)(arguments)
    }
}

impl Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
