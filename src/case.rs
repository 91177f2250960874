//! Declarative test case definitions.
//!
//! A [`TestCase`] pairs one [`RequestSpec`] with one [`ExpectedOutcome`].
//! Both are plain data, built once with struct literals plus
//! `..Default::default()` and never mutated afterwards:
//!
//! ```rust,no_run
//! use kensa::{ExpectedOutcome, Method, RequestSpec, TestCase};
//!
//! let case = TestCase {
//!     request: RequestSpec {
//!         label: "hello".into(),
//!         case_id: "USER-001".into(),
//!         method: Method::POST,
//!         url: "http://localhost:3333/test".into(),
//!         body: r#"{"hello":"hello back at you !"}"#.into(),
//!         headers: [("content-type".into(), "application/json".into())].into(),
//!         ..Default::default()
//!     },
//!     expect: ExpectedOutcome {
//!         status_line: Some("200 OK".into()),
//!         key_values: [("hello".into(), "hello back at you !".into())].into(),
//!         present_keys: Some(vec!["hello".into()]),
//!         ..Default::default()
//!     },
//! };
//! ```

use bytes::Bytes;
use indexmap::IndexMap;
use reqwest::Method;

/// Immutable description of one HTTP call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Human-readable label shown in reports.
    pub label: String,
    /// Identifier the decoded document is recorded under; later cases may
    /// look the document up through [`crate::Harness::document`].
    pub case_id: String,
    /// Optional diagnostic note printed before execution. Has no effect on
    /// the pass/fail outcome.
    pub note: Option<String>,
    pub method: Method,
    pub url: String,
    /// Raw request body; may be empty.
    pub body: Bytes,
    /// Headers applied to the outgoing request, overwriting any default.
    pub headers: IndexMap<String, String>,
}

impl Default for RequestSpec {
    fn default() -> RequestSpec {
        RequestSpec {
            label: String::new(),
            case_id: String::new(),
            note: None,
            method: Method::GET,
            url: String::new(),
            body: Bytes::new(),
            headers: IndexMap::new(),
        }
    }
}

/// Immutable description of what a correct response must look like.
///
/// Every field describes one sub-expectation evaluated by its own checker;
/// unset fields are simply not checked. `raw_body` is meant for cases that
/// assert the full body verbatim and should not be combined with
/// `key_values`/`present_keys` on the same case.
#[derive(Debug, Clone)]
pub struct ExpectedOutcome {
    /// Expected status line, e.g. `"200 OK"`.
    pub status_line: Option<String>,
    /// Expected numeric status code.
    pub status_code: u16,
    /// Exact raw body match; both sides are right-trimmed of a single
    /// trailing line terminator before comparison.
    pub raw_body: Option<Bytes>,
    /// Expected header name to value. Lookup is case-insensitive, the value
    /// compare is case-sensitive. Headers not mentioned here are not
    /// checked.
    pub headers: IndexMap<String, String>,
    /// Header names exempt from the header check, unioned with the harness
    /// config ignore-list.
    pub ignored_headers: Vec<String>,
    /// Expected decoded key to canonical string value.
    pub key_values: IndexMap<String, String>,
    /// Keys that must be present in the decoded body. In strict mode the
    /// check is two-directional: keys outside this list fail too.
    pub present_keys: Option<Vec<String>>,
    /// Overrides the harness config's strict key-presence default.
    pub strict_keys: Option<bool>,
}

impl Default for ExpectedOutcome {
    fn default() -> ExpectedOutcome {
        ExpectedOutcome {
            status_line: None,
            status_code: 200,
            raw_body: None,
            headers: IndexMap::new(),
            ignored_headers: Vec::new(),
            key_values: IndexMap::new(),
            present_keys: None,
            strict_keys: None,
        }
    }
}

/// One Request Specification paired with one Expected Outcome; the unit of
/// execution.
#[derive(Debug, Clone, Default)]
pub struct TestCase {
    pub request: RequestSpec,
    pub expect: ExpectedOutcome,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_describe_a_plain_get() {
        let spec = RequestSpec::default();
        assert_eq!(spec.method, Method::GET);
        assert!(spec.body.is_empty());
        assert!(spec.note.is_none());
    }

    #[test]
    fn default_outcome_expects_only_a_200() {
        let expect = ExpectedOutcome::default();
        assert_eq!(expect.status_code, 200);
        assert!(expect.status_line.is_none());
        assert!(expect.key_values.is_empty());
        assert!(expect.present_keys.is_none());
        assert!(expect.strict_keys.is_none());
    }
}
