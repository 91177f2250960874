//! # Kensa
//!
//! Declarative HTTP integration-test harness.
//!
//! A test case pairs a request description with an expected outcome; the
//! harness executes the request, carries cookies across calls, decodes the
//! response body into a flat dynamically-typed document and reports every
//! mismatch between expectation and reality, never stopping at the first.
//!
//! ## Architecture (block diagram)
//!
//! ```text
//! +---------------------+      +---------------------+      +---------------------+
//! | test cases          | ---> | harness (runner)    | ---> | reporter (output)   |
//! | RequestSpec/Expected|      | + event channel     |      | List/Null/custom    |
//! +---------------------+      +---------------------+      +---------------------+
//!                                   |           ^
//!                                   v           |
//!                         +---------------------+---+
//!                         | request executor        | --- session store (cookies)
//!                         | reqwest + cookie merge  |
//!                         +-------------------------+
//!                                   |
//!                                   v
//!                         +-------------------------+      +---------------------+
//!                         | document decoder        | ---> | assertion engine    |
//!                         | flat key -> FieldValue  |      | accumulating checks |
//!                         +-------------------------+      +---------------------+
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kensa::{ExpectedOutcome, Harness, Method, RequestSpec, TestCase};
//!
//! #[tokio::main]
//! async fn main() {
//!     let harness = Harness::new();
//!     let report = harness
//!         .run(&TestCase {
//!             request: RequestSpec {
//!                 label: "hello".into(),
//!                 case_id: "USER-001".into(),
//!                 method: Method::POST,
//!                 url: "http://localhost:3333/test".into(),
//!                 body: r#"{"hello":"hello back at you !"}"#.into(),
//!                 headers: [("content-type".into(), "application/json".into())].into(),
//!                 ..Default::default()
//!             },
//!             expect: ExpectedOutcome {
//!                 status_line: Some("200 OK".into()),
//!                 key_values: [("hello".into(), "hello back at you !".into())].into(),
//!                 present_keys: Some(vec!["hello".into()]),
//!                 ..Default::default()
//!             },
//!         })
//!         .await;
//!
//!     for failure in report.failures() {
//!         eprintln!("{}: {}", failure.kind, failure.message);
//!     }
//!     assert!(report.passed());
//! }
//! ```

pub mod assertion;
pub mod case;
pub mod config;
pub mod document;
pub mod error;
pub mod http;
pub mod reporter;
pub mod runner;
pub mod session;

// Re-export error handling crate used at the orchestration edges.
pub use eyre;

/// Type alias for test-case identifiers.
///
/// A case identifier groups a request/expectation pairing and keys the
/// decoded document recorded for it, so sequential flows can reference an
/// earlier case's response.
pub type CaseId = String;

// Re-export key functionality
pub use case::{ExpectedOutcome, RequestSpec, TestCase};
pub use config::{get_config, Config};
pub use document::{Document, FieldValue};
pub use error::{Error, Result};
pub use reporter::{ListReporter, NullReporter, Reporter};
pub use reqwest::Method;
pub use runner::{CaseReport, CaseState, Harness, Message};
pub use session::SessionStore;
