use crate::{Error, Result};
use log::trace;
use serde::Deserialize;

/// The declarative options of a [crate::JsonLogger].
///
/// The options can be loaded from a JSON document, e.g.
/// `{"level": "WARNING", "init": {"service": "auth"}, "throwOnError": true}`.
/// The output sink can't be expressed within a document and is set on the builder instead.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerOptions {
    /// The name of the minimum level of the logger.
    #[serde(default)]
    pub level: Option<String>,
    /// The fields inherited by every record of the logger.
    #[serde(default, alias = "prefix")]
    pub init: Option<serde_json::Value>,
    /// Fail the construction on an invalid level instead of falling back to `INFO`.
    #[serde(default)]
    pub throw_on_error: bool,
}

impl LoggerOptions {
    /// Parse the options from the given JSON document.
    pub fn from_json(value: &str) -> Result<Self> {
        trace!("Parsing logger options \"{}\"", value);
        serde_json::from_str(value).map_err(|e| Error::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value = r#"{"level":"WARNING","init":{"service":"auth"},"throwOnError":true}"#;
        let expected_result = LoggerOptions {
            level: Some("WARNING".to_string()),
            init: Some(json!({"service": "auth"})),
            throw_on_error: true,
        };

        let result = LoggerOptions::from_json(value).unwrap();

        assert_eq!(expected_result, result);
    }

    #[test]
    fn test_from_json_prefix_alias() {
        let result = LoggerOptions::from_json(r#"{"prefix":{"layer":"parent"}}"#).unwrap();

        assert_eq!(Some(json!({"layer": "parent"})), result.init);
        assert_eq!(None, result.level);
        assert!(!result.throw_on_error);
    }

    #[test]
    fn test_from_json_invalid() {
        let result = LoggerOptions::from_json("{\"level\":");

        assert_eq!(Err(Error::InvalidOptions(String::new())), result);
    }
}
