//! Declarations for installing forwarding methods.
//!
//! A bulk declaration is either a list of method names, or an ordered map
//! from source method name to a [`MethodSpec`]. The JSON shape mirrors this:
//!
//! ```json
//! ["a", "b"]
//! {"a": "x", "b": true, "c": {"destName": "y", "modelIsThis": true, "canReplace": true}}
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options for one forwarding method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HandledMethodOptions {
    /// Name on the host; defaults to the source method name.
    #[serde(alias = "dest_name")]
    pub dest_name: Option<String>,
    /// Call the method with the host as receiver instead of the extension.
    #[serde(alias = "model_is_this")]
    pub model_is_this: bool,
    /// Allow replacing a method the host already has.
    #[serde(alias = "can_replace")]
    pub can_replace: bool,
}

impl HandledMethodOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dest_name(mut self, dest_name: impl Into<String>) -> Self {
        self.dest_name = Some(dest_name.into());
        self
    }

    pub fn model_is_this(mut self, model_is_this: bool) -> Self {
        self.model_is_this = model_is_this;
        self
    }

    pub fn can_replace(mut self, can_replace: bool) -> Self {
        self.can_replace = can_replace;
        self
    }
}

/// Per-method entry of a mapped bulk declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodSpec {
    /// Install under a different name on the host.
    DestName(String),
    /// Keep the name; choose the receiver.
    ModelIsThis(bool),
    /// Full options.
    Options(HandledMethodOptions),
}

impl MethodSpec {
    pub fn into_options(self) -> HandledMethodOptions {
        match self {
            Self::DestName(dest_name) => HandledMethodOptions::new().dest_name(dest_name),
            Self::ModelIsThis(model_is_this) => {
                HandledMethodOptions::new().model_is_this(model_is_this)
            }
            Self::Options(options) => options,
        }
    }
}

impl From<&str> for MethodSpec {
    fn from(value: &str) -> Self {
        Self::DestName(value.to_string())
    }
}

impl From<String> for MethodSpec {
    fn from(value: String) -> Self {
        Self::DestName(value)
    }
}

impl From<bool> for MethodSpec {
    fn from(value: bool) -> Self {
        Self::ModelIsThis(value)
    }
}

impl From<HandledMethodOptions> for MethodSpec {
    fn from(value: HandledMethodOptions) -> Self {
        Self::Options(value)
    }
}

/// Bulk forwarding declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandledMethods {
    /// Source names installed with default options, in order.
    Names(Vec<String>),
    /// Source name to spec, in insertion order.
    Mapped(IndexMap<String, MethodSpec>),
}

impl HandledMethods {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn mapped<I, K, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<MethodSpec>,
    {
        Self::Mapped(
            entries
                .into_iter()
                .map(|(name, spec)| (name.into(), spec.into()))
                .collect(),
        )
    }

    /// Parses a JSON declaration.
    ///
    /// Returns a description of the problem when `value` is neither a list
    /// of names nor a map of well-formed specs.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Array(_) | Value::Object(_) => {
                serde_json::from_value(value.clone()).map_err(|err| err.to_string())
            }
            other => Err(format!(
                "expected a list of method names or a map of method specs, got `{other}`"
            )),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Names(names) => names.len(),
            Self::Mapped(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the declaration into `(source, options)` pairs, in order.
    pub fn into_entries(self) -> Vec<(String, HandledMethodOptions)> {
        match self {
            Self::Names(names) => names
                .into_iter()
                .map(|name| (name, HandledMethodOptions::default()))
                .collect(),
            Self::Mapped(entries) => entries
                .into_iter()
                .map(|(name, spec)| (name, spec.into_options()))
                .collect(),
        }
    }
}

impl Default for HandledMethods {
    fn default() -> Self {
        Self::Names(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::{HandledMethodOptions, HandledMethods, MethodSpec};
    use serde_json::json;

    #[test]
    fn parses_name_list_in_order() {
        let methods = HandledMethods::from_value(&json!(["connect", "send"]))
            .expect("name list should parse");
        assert_eq!(methods, HandledMethods::names(["connect", "send"]));
    }

    #[test]
    fn parses_each_mapped_spec_form() {
        let methods = HandledMethods::from_value(&json!({
            "a": "x",
            "b": true,
            "c": {"destName": "y", "modelIsThis": true, "canReplace": true}
        }))
        .expect("mapped spec should parse");

        let entries = methods.into_entries();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), HandledMethodOptions::new().dest_name("x")),
                ("b".to_string(), HandledMethodOptions::new().model_is_this(true)),
                (
                    "c".to_string(),
                    HandledMethodOptions::new()
                        .dest_name("y")
                        .model_is_this(true)
                        .can_replace(true)
                ),
            ]
        );
    }

    #[test]
    fn structured_spec_defaults_missing_fields() {
        let methods = HandledMethods::from_value(&json!({"a": {"canReplace": true}}))
            .expect("partial options should parse");
        assert_eq!(
            methods.into_entries(),
            vec![("a".to_string(), HandledMethodOptions::new().can_replace(true))]
        );
    }

    #[test]
    fn accepts_snake_case_option_fields() {
        let methods = HandledMethods::from_value(&json!({"a": {"dest_name": "b"}}))
            .expect("snake case aliases should parse");
        assert_eq!(
            methods,
            HandledMethods::mapped([(
                "a",
                MethodSpec::from(HandledMethodOptions::new().dest_name("b"))
            )])
        );
    }

    #[test]
    fn rejects_malformed_declarations() {
        for value in [
            json!("connect"),
            json!(42),
            json!(null),
            json!([1, 2]),
            json!({"a": 1}),
            json!({"a": {"unknown": true}}),
        ] {
            assert!(
                HandledMethods::from_value(&value).is_err(),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn default_declaration_is_empty() {
        let methods = HandledMethods::default();
        assert!(methods.is_empty());
        assert!(methods.into_entries().is_empty());
    }
}
