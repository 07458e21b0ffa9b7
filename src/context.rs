use crate::request::Parameters;
use serde::Serialize;
use serde_json::{Map, Value};

/// Flat key/value namespace handed to a template.
///
/// Typed fields are stored first; [`Context::overlay`] then copies the free-form parameters on top, so a parameter
/// named like a built-in field replaces it. That shadowing is part of the rendering contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Context { values: Map::new() }
    }

    pub fn store(&mut self, key: &str, value: Value) -> Option<Value> {
        self.values.insert(key.to_string(), value)
    }

    /// Stores `value` unless the key already holds something other than null.
    pub fn store_default(&mut self, key: &str, value: Value) {
        match self.values.get(key) {
            Some(existing) if !existing.is_null() => {}
            _ => {
                self.values.insert(key.to_string(), value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn overlay(&mut self, parameters: &Parameters) {
        for (key, value) in parameters {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Copies the non-null entries of `other` over this context.
    pub fn merge(&mut self, other: &Context) {
        for (key, value) in &other.values {
            if !value.is_null() {
                self.values.insert(key.clone(), value.clone());
            }
        }
    }

    /// A new context holding only `keys`, missing ones set to null.
    pub fn pick(&self, keys: &[&str]) -> Context {
        let values = keys
            .iter()
            .map(|&key| (key.to_string(), self.values.get(key).cloned().unwrap_or(Value::Null)))
            .collect();
        Context { values }
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Context {
    fn from(entries: [(&str, Value); N]) -> Self {
        let values = entries.into_iter().map(|(key, value)| (key.to_string(), value)).collect();
        Context { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parameters_shadow_built_in_fields() {
        let mut context = Context::from([("kernel", json!("https://example.com/Image")), ("arch", json!("arm64"))]);
        let parameters = Parameters::from([("kernel".to_string(), json!("https://override.com/Image")), ("EXTRA".to_string(), json!(1))]);

        context.overlay(&parameters);

        assert_eq!(context.get_str("kernel"), Some("https://override.com/Image"));
        assert_eq!(context.get_str("arch"), Some("arm64"));
        assert_eq!(context.get("EXTRA"), Some(&json!(1)));
    }

    #[test]
    fn store_default_only_fills_missing_or_null_values() {
        let mut context = Context::from([("connection_command", Value::Null), ("boot_method", json!("grub"))]);

        context.store_default("connection_command", json!("telnet localhost 2000"));
        context.store_default("boot_method", json!("u-boot"));
        context.store_default("console_device", json!("ttyS0"));

        assert_eq!(context.get_str("connection_command"), Some("telnet localhost 2000"));
        assert_eq!(context.get_str("boot_method"), Some("grub"));
        assert_eq!(context.get_str("console_device"), Some("ttyS0"));
    }

    #[test]
    fn merge_skips_null_values() {
        let mut context = Context::from([("hard_reset_command", json!("pdu reboot"))]);
        context.merge(&Context::from([("hard_reset_command", Value::Null), ("power_on_command", json!("pdu on"))]));

        assert_eq!(context.get_str("hard_reset_command"), Some("pdu reboot"));
        assert_eq!(context.get_str("power_on_command"), Some("pdu on"));
    }

    #[test]
    fn pick_fills_missing_keys_with_null() {
        let context = Context::from([("arch", json!("arm64")), ("kernel", json!("Image"))]);
        let picked = context.pick(&["arch", "device"]);

        assert_eq!(serde_json::to_value(&picked).unwrap(), json!({"arch": "arm64", "device": null}));
    }
}
