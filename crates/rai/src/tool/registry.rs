use std::collections::HashSet;

use super::Tool;
use crate::errors::{Error, Result};

/// The fixed set of tools offered to the model, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    /// Build the registry, rejecting duplicate tool names
    pub fn new(tools: Vec<Tool>) -> Result<Self> {
        let mut names = HashSet::new();
        for tool in &tools {
            if !names.insert(tool.name.as_str()) {
                return Err(Error::config(format!("Duplicate tool name: {}", tool.name)));
            }
        }
        Ok(Self { tools })
    }

    pub fn resolve(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
