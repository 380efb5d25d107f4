use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be requested as structured provider output.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a provider-compatible JSON schema for this type.
    ///
    /// Strict-mode providers require `additionalProperties: false` on every
    /// object, all properties listed in `required`, and no `$ref` indirection.
    fn provider_schema() -> serde_json::Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = value.get("definitions").cloned();
        normalize(&mut value, definitions.as_ref());

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Recursively inline `$ref`s, collapse single-entry `allOf`, mark objects
/// closed, and require every declared property.
fn normalize(value: &mut serde_json::Value, definitions: Option<&serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(path)) = map.get("$ref").cloned() {
                if let Some(name) = path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.and_then(|d| d.get(name)) {
                        *value = def.clone();
                        normalize(value, definitions);
                        return;
                    }
                }
            }

            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    normalize(value, definitions);
                    return;
                }
            }

            if map.get("type") == Some(&serde_json::Value::String("object".into())) {
                map.insert("additionalProperties".into(), serde_json::Value::Bool(false));
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".into(), serde_json::Value::Array(keys));
                }
            }

            for (_, v) in map.iter_mut() {
                normalize(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                normalize(item, definitions);
            }
        }
        _ => {}
    }
}
