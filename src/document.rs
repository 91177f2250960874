//! Response body decoding.
//!
//! A response body is parsed into a [`Document`]: a flat mapping from each
//! top-level JSON key to a dynamically typed [`FieldValue`]. Nested
//! structures are kept verbatim and never recursively flattened. An empty
//! body decodes to "no document" (`Ok(None)`), which downstream checkers
//! treat differently from a document with zero keys.

use indexmap::IndexMap;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to parse response body as JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("top-level JSON value is not an object")]
    NotAnObject,
}

/// A dynamically typed top-level value of a decoded response body.
///
/// Comparisons against expected strings go through [`FieldValue::render`],
/// which coerces each variant to its canonical string form.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Number(serde_json::Number),
    /// Nested array/object or null, preserved as-is.
    Composite(serde_json::Value),
}

impl FieldValue {
    fn from_json(value: serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::String(s) => FieldValue::String(s),
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Number(n) => FieldValue::Number(n),
            other => FieldValue::Composite(other),
        }
    }

    /// Canonical string form used by the key/value checker.
    ///
    /// Booleans render as `true`/`false`. Integers render as plain decimals.
    /// Floats render via `f64`'s shortest round-trip `Display`, so `1.0`
    /// becomes `1` and `1.5` stays `1.5`, with no separators and no forced
    /// decimal point. Composites render as compact JSON text.
    pub fn render(&self) -> String {
        match self {
            FieldValue::String(s) => s.clone(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else if let Some(u) = n.as_u64() {
                    u.to_string()
                } else {
                    n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
                }
            }
            FieldValue::Composite(v) => v.to_string(),
        }
    }
}

/// Flat key-to-value mapping extracted from a response body.
///
/// Insertion order follows the source payload, so failure messages come out
/// in a stable, human-meaningful order. A key that does not exist in the
/// payload is absent from the map; there is no null placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: IndexMap<String, FieldValue>,
}

impl Document {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode a raw response body into a [`Document`].
///
/// An empty body yields `Ok(None)`. A body that is not a JSON object yields
/// an error; the caller records it as a failing check and continues with no
/// document.
pub fn decode(body: &[u8]) -> Result<Option<Document>, DecodeError> {
    if body.is_empty() {
        return Ok(None);
    }

    let parsed: serde_json::Value = serde_json::from_slice(body)?;
    let serde_json::Value::Object(map) = parsed else {
        return Err(DecodeError::NotAnObject);
    };

    let fields = map
        .into_iter()
        .map(|(key, value)| (key, FieldValue::from_json(value)))
        .collect();

    Ok(Some(Document { fields }))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn empty_body_decodes_to_no_document() {
        assert!(decode(b"").unwrap().is_none());
    }

    #[test]
    fn object_body_decodes_to_first_level_keys() {
        let doc = decode(br#"{"hello":"world","ok":true,"count":3}"#)
            .unwrap()
            .unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(
            doc.get("hello"),
            Some(&FieldValue::String("world".into()))
        );
        assert_eq!(doc.get("ok"), Some(&FieldValue::Bool(true)));
        assert!(doc.contains("count"));
        assert!(doc.get("missing").is_none());
    }

    #[test]
    fn nested_structures_are_not_flattened() {
        let doc = decode(br#"{"outer":{"inner":1},"list":[1,2]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(doc.len(), 2);
        assert!(matches!(doc.get("outer"), Some(FieldValue::Composite(_))));
        assert!(doc.get("inner").is_none());
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        assert!(matches!(decode(b"{not json"), Err(DecodeError::Parse(_))));
    }

    #[test]
    fn non_object_top_level_is_an_error() {
        assert!(matches!(decode(b"[1,2,3]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode(b"42"), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn key_order_follows_the_payload() {
        let doc = decode(br#"{"b":1,"a":2,"c":3}"#).unwrap().unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test_case(r#"{"v":true}"#, "true"; "bool true")]
    #[test_case(r#"{"v":false}"#, "false"; "bool false")]
    #[test_case(r#"{"v":42}"#, "42"; "integer")]
    #[test_case(r#"{"v":-7}"#, "-7"; "negative integer")]
    #[test_case(r#"{"v":1.5}"#, "1.5"; "float")]
    #[test_case(r#"{"v":1.0}"#, "1"; "float without fraction")]
    #[test_case(r#"{"v":"text"}"#, "text"; "string verbatim")]
    #[test_case(r#"{"v":null}"#, "null"; "null composite")]
    fn render_canonical_form(body: &str, expected: &str) {
        let doc = decode(body.as_bytes()).unwrap().unwrap();
        assert_eq!(doc.get("v").unwrap().render(), expected);
    }
}
