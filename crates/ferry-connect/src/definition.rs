//! Connector definition metadata
//!
//! A [`Definition`] names a connector class and lists the [`SettingDef`]s it
//! recognizes. Hosts use it to render forms and to validate raw string
//! settings before a task starts; the task itself only reads the resolved
//! values.
//!
//! The JSON form uses `className` and `definitions` as top-level keys and
//! round-trips losslessly.

use crate::error::{ConnectorError, ConnectorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Value type of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    /// Free-form string
    String,
    /// `true` / `false`
    Boolean,
    /// Signed integer
    Int,
    /// Integer ≥ 0
    NonNegativeInt,
    /// Integer ≥ 1
    PositiveInt,
    /// Comma-separated list or JSON array of strings
    Array,
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::NonNegativeInt => "non_negative_int",
            Self::PositiveInt => "positive_int",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// Declaration of one recognized setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingDef {
    /// Setting key
    pub key: String,
    /// Expected value type
    pub value_type: SettingType,
    /// Whether a value must be supplied
    #[serde(default)]
    pub required: bool,
    /// Raw default applied when no value is supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub documentation: String,
}

impl SettingDef {
    /// Create a builder for a setting
    pub fn builder(key: impl Into<String>, value_type: SettingType) -> SettingDefBuilder {
        SettingDefBuilder::new(key, value_type)
    }

    /// Type-check a raw value, falling back to the default
    ///
    /// Returns `Ok(None)` for an optional setting with neither value nor
    /// default.
    pub fn check(&self, raw: Option<&str>) -> ConnectorResult<Option<serde_json::Value>> {
        let Some(raw) = raw.or(self.default_value.as_deref()) else {
            if self.required {
                return Err(ConnectorError::config(format!(
                    "missing required setting '{}'",
                    self.key
                )));
            }
            return Ok(None);
        };

        let value = match self.value_type {
            SettingType::String => serde_json::Value::String(raw.to_string()),
            SettingType::Boolean => raw
                .trim()
                .parse::<bool>()
                .map(serde_json::Value::Bool)
                .map_err(|_| self.invalid(raw))?,
            SettingType::Int => self.parse_int(raw)?.into(),
            SettingType::NonNegativeInt => {
                let n = self.parse_int(raw)?;
                if n < 0 {
                    return Err(self.invalid(raw));
                }
                n.into()
            }
            SettingType::PositiveInt => {
                let n = self.parse_int(raw)?;
                if n < 1 {
                    return Err(self.invalid(raw));
                }
                n.into()
            }
            SettingType::Array => parse_array(raw).map_err(|_| self.invalid(raw))?,
        };
        Ok(Some(value))
    }

    fn parse_int(&self, raw: &str) -> ConnectorResult<i64> {
        raw.trim().parse::<i64>().map_err(|_| self.invalid(raw))
    }

    fn invalid(&self, raw: &str) -> ConnectorError {
        ConnectorError::config(format!(
            "setting '{}' expects {} but got '{}'",
            self.key, self.value_type, raw
        ))
    }
}

fn parse_array(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        let items: Vec<String> = serde_json::from_str(trimmed)?;
        return Ok(items.into());
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::Value::String(s.to_string()))
        .collect())
}

/// Builder for [`SettingDef`]
#[derive(Debug)]
pub struct SettingDefBuilder {
    def: SettingDef,
}

impl SettingDefBuilder {
    /// Create a builder for an optional setting
    pub fn new(key: impl Into<String>, value_type: SettingType) -> Self {
        Self {
            def: SettingDef {
                key: key.into(),
                value_type,
                required: false,
                default_value: None,
                documentation: String::new(),
            },
        }
    }

    /// Mark the setting as required
    pub fn required(mut self) -> Self {
        self.def.required = true;
        self
    }

    /// Set the raw default value
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.def.default_value = Some(value.into());
        self
    }

    /// Set the documentation
    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.def.documentation = doc.into();
        self
    }

    /// Build the definition
    pub fn build(self) -> SettingDef {
        self.def
    }
}

/// Metadata of a connector class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Connector class identifier
    #[serde(rename = "className")]
    pub class_name: String,
    /// Recognized settings
    pub definitions: Vec<SettingDef>,
}

impl Definition {
    /// Create a definition
    pub fn of(class_name: impl Into<String>, definitions: Vec<SettingDef>) -> Self {
        Self {
            class_name: class_name.into(),
            definitions,
        }
    }

    /// Look up a setting by key
    pub fn get(&self, key: &str) -> Option<&SettingDef> {
        self.definitions.iter().find(|d| d.key == key)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> ConnectorResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> ConnectorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> ConnectorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Type-check raw settings against every declared setting
    ///
    /// Keys that are not declared are ignored, so hosts can pass their own
    /// settings along.
    pub fn resolve(
        &self,
        settings: &HashMap<String, String>,
    ) -> ConnectorResult<serde_json::Map<String, serde_json::Value>> {
        let mut resolved = serde_json::Map::new();
        for def in &self.definitions {
            if let Some(value) = def.check(settings.get(&def.key).map(String::as_str))? {
                resolved.insert(def.key.clone(), value);
            }
        }
        Ok(resolved)
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "Definition({})", self.class_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let definition = Definition::of(
            "fake_class",
            vec![
                SettingDef::builder("name", SettingType::String).build(),
                SettingDef::builder("tags", SettingType::Array)
                    .required()
                    .documentation("list of tags")
                    .build(),
            ],
        );

        let json = definition.to_json().unwrap();
        assert_eq!(Definition::from_json(&json).unwrap(), definition);
        assert_eq!(Definition::from_json(&definition.to_string()).unwrap(), definition);
    }

    #[test]
    fn test_json_keys() {
        let definition = Definition::of(
            "csv",
            vec![SettingDef::builder("batch_size", SettingType::PositiveInt)
                .default_value("1000")
                .build()],
        );
        let value: serde_json::Value =
            serde_json::from_str(&definition.to_json().unwrap()).unwrap();

        assert_eq!(value["className"], "csv");
        assert_eq!(value["definitions"][0]["valueType"], "positive_int");
        assert_eq!(value["definitions"][0]["defaultValue"], "1000");
    }

    #[test]
    fn test_check_types() {
        let int = SettingDef::builder("n", SettingType::Int).build();
        assert_eq!(int.check(Some("-3")).unwrap(), Some((-3).into()));
        assert!(int.check(Some("abc")).is_err());

        let positive = SettingDef::builder("n", SettingType::PositiveInt).build();
        assert!(positive.check(Some("0")).is_err());

        let non_negative = SettingDef::builder("n", SettingType::NonNegativeInt).build();
        assert_eq!(non_negative.check(Some("0")).unwrap(), Some(0.into()));
        assert!(non_negative.check(Some("-1")).is_err());

        let flag = SettingDef::builder("b", SettingType::Boolean).build();
        assert_eq!(flag.check(Some("true")).unwrap(), Some(true.into()));

        let array = SettingDef::builder("a", SettingType::Array).build();
        assert_eq!(
            array.check(Some("x, y")).unwrap(),
            Some(serde_json::json!(["x", "y"]))
        );
        assert_eq!(
            array.check(Some(r#"["x","y"]"#)).unwrap(),
            Some(serde_json::json!(["x", "y"]))
        );
    }

    #[test]
    fn test_required_and_defaults() {
        let required = SettingDef::builder("topic", SettingType::String)
            .required()
            .build();
        let err = required.check(None).unwrap_err();
        assert!(err.to_string().contains("topic"));

        let defaulted = SettingDef::builder("size", SettingType::PositiveInt)
            .default_value("1000")
            .build();
        assert_eq!(defaulted.check(None).unwrap(), Some(1000.into()));

        let optional = SettingDef::builder("folder", SettingType::String).build();
        assert_eq!(optional.check(None).unwrap(), None);
    }

    #[test]
    fn test_resolve_ignores_unknown_keys() {
        let definition = Definition::of(
            "csv",
            vec![SettingDef::builder("topic", SettingType::String)
                .required()
                .build()],
        );
        let settings = HashMap::from([
            ("topic".to_string(), "rows".to_string()),
            ("host.only".to_string(), "x".to_string()),
        ]);

        let resolved = definition.resolve(&settings).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["topic"], "rows");
    }
}
