use serde_json::{Map, Value};

/// Opaque key-value bag attached to users, conversations and messages.
///
/// Stored as serialized JSON text; values are whatever JSON can represent.
pub type Metadata = Map<String, Value>;

/// Decode a stored metadata column.
///
/// A missing, empty or corrupt bag decodes to an empty map — reads never
/// fail on metadata.
pub fn decode_metadata(raw: Option<&str>) -> Metadata {
    match raw {
        Some(text) if !text.is_empty() => {
            serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|value| match value {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .unwrap_or_default()
        }
        _ => Metadata::new(),
    }
}

pub fn encode_metadata(metadata: &Metadata) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_arbitrary_json_values() {
        let mut bag = Metadata::new();
        bag.insert("theme".into(), json!("green"));
        bag.insert("depth".into(), json!(3));
        bag.insert("flags".into(), json!({"beta": true, "tags": ["a", null]}));

        let decoded = decode_metadata(Some(&encode_metadata(&bag)));
        assert_eq!(decoded, bag);
    }

    #[test]
    fn corrupt_text_decodes_to_empty() {
        assert!(decode_metadata(Some("{not json")).is_empty());
        assert!(decode_metadata(Some("[1, 2]")).is_empty());
        assert!(decode_metadata(Some("")).is_empty());
        assert!(decode_metadata(None).is_empty());
    }
}
