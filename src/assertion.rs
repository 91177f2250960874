//! kensa's assertion engine.
//!
//! Each sub-expectation of an [`ExpectedOutcome`] is evaluated by its own
//! independent checker. Checkers never short-circuit: every applicable
//! checker runs even when an earlier one has already failed, so a single
//! case can report multiple distinct mismatches. Checkers are pure over
//! their inputs; evaluating the same expectation against the same response
//! twice yields the same outcomes.

use std::fmt;

use crate::{case::ExpectedOutcome, document::Document, http::Response};

/// Which checker produced a [`Check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Transport,
    Decode,
    StatusLine,
    StatusCode,
    Header,
    RawBody,
    KeyValue,
    KeyPresence,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckKind::Transport => "transport",
            CheckKind::Decode => "decode",
            CheckKind::StatusLine => "status line",
            CheckKind::StatusCode => "status code",
            CheckKind::Header => "header",
            CheckKind::RawBody => "raw body",
            CheckKind::KeyValue => "key value",
            CheckKind::KeyPresence => "key presence",
        };
        f.write_str(name)
    }
}

/// Outcome of one checker evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub kind: CheckKind,
    pub passed: bool,
    pub message: String,
}

impl Check {
    pub fn success(kind: CheckKind, message: impl Into<String>) -> Check {
        Check {
            kind,
            passed: true,
            message: message.into(),
        }
    }

    pub fn error(kind: CheckKind, message: impl Into<String>) -> Check {
        Check {
            kind,
            passed: false,
            message: message.into(),
        }
    }
}

/// Run every applicable checker for `expect` against the executed response.
///
/// `document` is the decoded body, or `None` when the response carried no
/// decodable document; key/value and key-presence checks against "no
/// document" fail with a count mismatch instead of per-key noise.
/// `ignored_headers` is the merged harness + per-case ignore-list and
/// `strict_keys` the resolved presence mode.
pub fn evaluate(
    expect: &ExpectedOutcome,
    response: &Response,
    document: Option<&Document>,
    ignored_headers: &[String],
    strict_keys: bool,
) -> Vec<Check> {
    let mut checks = Vec::new();

    check_status_line(expect, response, &mut checks);
    check_status_code(expect, response, &mut checks);
    check_headers(expect, response, ignored_headers, &mut checks);
    check_raw_body(expect, response, &mut checks);
    check_key_values(expect, document, &mut checks);
    check_key_presence(expect, document, strict_keys, &mut checks);

    checks
}

fn check_status_line(expect: &ExpectedOutcome, response: &Response, checks: &mut Vec<Check>) {
    let Some(expected) = &expect.status_line else {
        return;
    };

    let actual = response.status_line();
    if &actual == expected {
        checks.push(Check::success(
            CheckKind::StatusLine,
            format!("status \"{expected}\""),
        ));
    } else {
        checks.push(Check::error(
            CheckKind::StatusLine,
            format!("expected status \"{expected}\" but got \"{actual}\""),
        ));
    }
}

fn check_status_code(expect: &ExpectedOutcome, response: &Response, checks: &mut Vec<Check>) {
    let actual = response.status.as_u16();
    if actual == expect.status_code {
        checks.push(Check::success(
            CheckKind::StatusCode,
            format!("status code {actual}"),
        ));
    } else {
        checks.push(Check::error(
            CheckKind::StatusCode,
            format!("expected status code {} but got {actual}", expect.status_code),
        ));
    }
}

fn check_headers(
    expect: &ExpectedOutcome,
    response: &Response,
    ignored_headers: &[String],
    checks: &mut Vec<Check>,
) {
    for (name, expected) in &expect.headers {
        let ignored = ignored_headers
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(name));
        if ignored {
            continue;
        }

        // HeaderMap lookup is case-insensitive; the value compare is not.
        let Some(value) = response.headers.get(name.as_str()) else {
            checks.push(Check::error(
                CheckKind::Header,
                format!("header \"{name}\" not found in response"),
            ));
            continue;
        };

        let actual = String::from_utf8_lossy(value.as_bytes());
        if actual == expected.as_str() {
            checks.push(Check::success(
                CheckKind::Header,
                format!("header \"{name}\" == \"{expected}\""),
            ));
        } else {
            checks.push(Check::error(
                CheckKind::Header,
                format!("expected header \"{name}\" to be \"{expected}\" but got \"{actual}\""),
            ));
        }
    }
}

/// Strip one trailing line terminator, `\r\n` or `\n`.
fn trim_line_terminator(body: &[u8]) -> &[u8] {
    body.strip_suffix(b"\r\n")
        .or_else(|| body.strip_suffix(b"\n"))
        .unwrap_or(body)
}

fn check_raw_body(expect: &ExpectedOutcome, response: &Response, checks: &mut Vec<Check>) {
    let Some(expected) = &expect.raw_body else {
        return;
    };

    let expected = trim_line_terminator(expected);
    let actual = trim_line_terminator(&response.body);
    if expected == actual {
        checks.push(Check::success(CheckKind::RawBody, "body matches"));
    } else {
        checks.push(Check::error(
            CheckKind::RawBody,
            format!(
                "expected body \"{}\" but got \"{}\"",
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(actual),
            ),
        ));
    }
}

fn check_key_values(expect: &ExpectedOutcome, document: Option<&Document>, checks: &mut Vec<Check>) {
    if expect.key_values.is_empty() {
        return;
    }

    let document = document.filter(|doc| !doc.is_empty());
    let Some(document) = document else {
        checks.push(Check::error(
            CheckKind::KeyValue,
            format!(
                "expected {} key(s) in response body but found none",
                expect.key_values.len()
            ),
        ));
        return;
    };

    for (key, expected) in &expect.key_values {
        let Some(value) = document.get(key) else {
            checks.push(Check::error(
                CheckKind::KeyValue,
                format!("key \"{key}\" not found in response"),
            ));
            continue;
        };

        let actual = value.render();
        if &actual == expected {
            checks.push(Check::success(
                CheckKind::KeyValue,
                format!("key \"{key}\" == \"{expected}\""),
            ));
        } else {
            checks.push(Check::error(
                CheckKind::KeyValue,
                format!("expected \"{expected}\" in key \"{key}\" but got \"{actual}\""),
            ));
        }
    }
}

fn check_key_presence(
    expect: &ExpectedOutcome,
    document: Option<&Document>,
    strict: bool,
    checks: &mut Vec<Check>,
) {
    let Some(expected_keys) = &expect.present_keys else {
        return;
    };

    let document = document.filter(|doc| !doc.is_empty());
    let Some(document) = document else {
        if expected_keys.is_empty() {
            checks.push(Check::success(CheckKind::KeyPresence, "no keys expected"));
        } else {
            checks.push(Check::error(
                CheckKind::KeyPresence,
                format!(
                    "expected {} key(s) in response body but found none",
                    expected_keys.len()
                ),
            ));
        }
        return;
    };

    for key in expected_keys {
        if document.contains(key) {
            checks.push(Check::success(
                CheckKind::KeyPresence,
                format!("key \"{key}\" present"),
            ));
        } else {
            checks.push(Check::error(
                CheckKind::KeyPresence,
                format!("key \"{key}\" not found in response"),
            ));
        }
    }

    if strict {
        for key in document.keys() {
            if !expected_keys.iter().any(|expected| expected == key) {
                checks.push(Check::error(
                    CheckKind::KeyPresence,
                    format!("key \"{key}\" present but not expected"),
                ));
            }
        }
    }
}
