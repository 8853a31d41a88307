//! Module specifications parsed from `module_list`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validation::ConfigWarning;

/// One opaque `name -> value` pair handed to a module untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleParameter {
    pub name: String,
    pub value: Value,
}

/// A module declared in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Name the resolver looks the module up by.
    pub name: String,

    /// Parameters in configuration order.
    pub parameters: Vec<ModuleParameter>,
}

impl ModuleSpec {
    /// Create a module specification with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.push(ModuleParameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// First parameter with the given name.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// First parameter with the given name, if it is a string.
    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(Value::as_str)
    }
}

/// Validate one `module_list` entry.
///
/// Returns `None` when the entry must be dropped; the reason is pushed onto
/// `warnings`. Unknown attributes are warned about but do not drop the entry.
pub(crate) fn parse_module_entry(
    index: usize,
    entry: &Value,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<ModuleSpec> {
    let Some(object) = entry.as_object() else {
        warnings.push(ConfigWarning::ModuleInvalid {
            index,
            reason: "entry is not an object".to_string(),
        });
        return None;
    };

    let mut name = None;
    let mut parameters = None;

    for (key, value) in object {
        match key.as_str() {
            "name" => name = Some(value),
            "parameters" => parameters = Some(value),
            _ => warnings.push(ConfigWarning::UnknownModuleKey {
                index,
                key: key.clone(),
            }),
        }
    }

    let (Some(name), Some(parameters)) = (name, parameters) else {
        let missing = [("name", name.is_none()), ("parameters", parameters.is_none())]
            .into_iter()
            .filter_map(|(field, absent)| absent.then(|| field.to_string()))
            .collect();
        warnings.push(ConfigWarning::ModuleDropped { index, missing });
        return None;
    };

    let name = match name.as_str() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => {
            warnings.push(ConfigWarning::ModuleInvalid {
                index,
                reason: "name must be a non-empty string".to_string(),
            });
            return None;
        }
    };

    match parse_parameters(parameters) {
        Ok(parameters) => Some(ModuleSpec { name, parameters }),
        Err(reason) => {
            warnings.push(ConfigWarning::ModuleInvalid {
                index,
                reason: format!("module '{name}': {reason}"),
            });
            None
        }
    }
}

/// Flatten `[{"a": 1}, {"b": 2}]` into ordered pairs.
fn parse_parameters(value: &Value) -> Result<Vec<ModuleParameter>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| "parameters must be an array of objects".to_string())?;

    let mut parameters = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let pairs = item
            .as_object()
            .ok_or_else(|| format!("parameters[{i}] must be an object"))?;
        parameters.extend(pairs.iter().map(|(name, value)| ModuleParameter {
            name: name.clone(),
            value: value.clone(),
        }));
    }
    Ok(parameters)
}
