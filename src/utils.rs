//! Output formatting shared by the command line

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text and tables (default)
    #[default]
    Table,
    /// Compact JSON on a single line
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
}

impl OutputFormat {
    /// Check if this is a JSON variant
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }

    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &["table", "json", "json-pretty"]
    }

    /// Serialize a value as JSON in this format
    ///
    /// `Table` falls back to compact JSON; callers print tables themselves.
    pub fn to_json<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            Self::JsonPretty => serde_json::to_string_pretty(value),
            Self::Json | Self::Table => serde_json::to_string(value),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_format() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!(
            "json-pretty".parse::<OutputFormat>(),
            Ok(OutputFormat::JsonPretty)
        );
        assert!("psv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_display_round_trips_names() {
        for name in OutputFormat::all_names() {
            let format: OutputFormat = name.parse().unwrap();
            assert_eq!(&format.to_string(), name);
        }
    }

    #[test]
    fn test_to_json() {
        let value = serde_json::json!({"version": 13});
        assert_eq!(
            OutputFormat::Json.to_json(&value).unwrap(),
            r#"{"version":13}"#
        );
        assert!(OutputFormat::JsonPretty
            .to_json(&value)
            .unwrap()
            .contains('\n'));
    }
}
