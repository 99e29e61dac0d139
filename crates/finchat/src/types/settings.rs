//! Dynamic configuration setting types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A typed configuration value.
///
/// Settings are a tagged variant over the four supported data types rather
/// than an untyped value bag; validation happens before any write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SettingValue {
    /// Data type tag for this value
    pub fn data_type(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
        }
    }

    /// Coerce a raw JSON value into this setting's data type.
    ///
    /// Integers are accepted for float settings; everything else must match
    /// exactly.
    pub fn from_json(data_type: &str, value: &serde_json::Value) -> Result<Self> {
        match data_type {
            "int" => value
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| Error::validation("Value must be an integer")),
            "float" => value
                .as_f64()
                .map(Self::Float)
                .ok_or_else(|| Error::validation("Value must be a number")),
            "string" => value
                .as_str()
                .map(|s| Self::Str(s.to_string()))
                .ok_or_else(|| Error::validation("Value must be a string")),
            "bool" => value
                .as_bool()
                .map(Self::Bool)
                .ok_or_else(|| Error::validation("Value must be a boolean (true/false)")),
            other => Err(Error::validation(format!("Unknown data type: {other}"))),
        }
    }

    /// Serialize for storage
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::json!(v),
            Self::Float(v) => serde_json::json!(v),
            Self::Str(v) => serde_json::json!(v),
            Self::Bool(v) => serde_json::json!(v),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// A configuration setting with its constraints and audit fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSetting {
    /// Unique setting name
    pub name: String,
    /// Current value
    pub value: SettingValue,
    /// Value the setting resets to
    pub default_value: SettingValue,
    /// One of int, float, string, bool
    pub data_type: String,
    /// Minimum value (numeric) or minimum length (string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum value (numeric) or maximum length (string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Grouping category (rag, document, llm, api)
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl ConfigSetting {
    /// Validate a candidate value against this setting's type and range.
    ///
    /// Returns the coerced value on success.
    pub fn validate_value(&self, raw: &serde_json::Value) -> Result<SettingValue> {
        let value = SettingValue::from_json(&self.data_type, raw)?;

        match &value {
            SettingValue::Int(v) => self.check_range(*v as f64)?,
            SettingValue::Float(v) => self.check_range(*v)?,
            SettingValue::Str(s) => self.check_range(s.len() as f64)?,
            SettingValue::Bool(_) => {}
        }

        Ok(value)
    }

    fn check_range(&self, v: f64) -> Result<()> {
        if let Some(min) = self.min {
            if v < min {
                return Err(Error::validation(format!(
                    "Value for '{}' must be at least {min}",
                    self.name
                )));
            }
        }
        if let Some(max) = self.max {
            if v > max {
                return Err(Error::validation(format!(
                    "Value for '{}' must be at most {max}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
