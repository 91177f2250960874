//! kensa's scenario runner.
//!
//! [`Harness`] owns the one mutable state of a test run (session cookies and
//! the per-case result record) and drives each [`TestCase`] through its
//! state machine:
//!
//! ```text
//! Pending -> Executing -> Decoding -> Asserting -> { Passed | Failed }
//! ```
//!
//! A transport failure at `Executing` transitions straight to `Failed` and
//! skips the remaining phases. Every other failure accumulates: decode and
//! assertion mismatches are collected as checks, never early returns, so one
//! case can report several distinct problems. Nothing unwinds past the
//! runner boundary; a sibling case is never aborted by a failing one.

use futures::{stream::FuturesUnordered, FutureExt, StreamExt};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::broadcast;
use tracing::*;

use crate::{
    assertion::{self, Check, CheckKind},
    case::TestCase,
    config::{get_config, Config},
    document::{self, Document},
    http::{self, Executor},
    session::SessionStore,
    CaseId,
};

/// Execution phase of one test case. `Passed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Pending,
    Executing,
    Decoding,
    Asserting,
    Passed,
    Failed,
}

/// Event published on the harness channel while cases run. Reporters
/// subscribe through [`Harness::subscribe`]; publishing with no subscribers
/// is a no-op, so reporting never affects outcomes.
#[derive(Debug, Clone)]
pub enum Message {
    CaseStarted {
        case_id: CaseId,
        label: String,
        /// Diagnostic note carried from the request spec, for display only.
        note: Option<String>,
    },
    HttpExchange {
        case_id: CaseId,
        log: Box<http::Log>,
    },
    Check {
        case_id: CaseId,
        check: Check,
    },
    CaseFinished(CaseReport),
}

/// Pass/fail report of one executed test case.
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub case_id: CaseId,
    pub label: String,
    /// Terminal state, `Passed` or `Failed`.
    pub state: CaseState,
    /// Every check outcome in evaluation order.
    pub checks: Vec<Check>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.state == CaseState::Passed
    }

    /// The failing subset of [`CaseReport::checks`], in evaluation order.
    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// A harness instance: executes test cases, carries cookies across them and
/// records each case's decoded document under its identifier.
///
/// All mutable state lives on the instance, so independent harnesses never
/// interfere and one instance is safe to share across concurrently running
/// cases behind an [`Arc`].
pub struct Harness {
    config: Config,
    executor: Executor,
    session: SessionStore,
    results: Mutex<HashMap<CaseId, Option<Document>>>,
    events: broadcast::Sender<Message>,
}

impl Default for Harness {
    fn default() -> Harness {
        Harness::new()
    }
}

impl Harness {
    /// Construct a harness with the process-wide configuration.
    pub fn new() -> Harness {
        Harness::with_config(get_config().clone())
    }

    pub fn with_config(config: Config) -> Harness {
        Harness {
            config,
            executor: Executor::new(),
            session: SessionStore::new(),
            results: Mutex::new(HashMap::new()),
            events: broadcast::channel(1000).0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Subscribe to the event channel to observe the run in real time.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    /// The most recently recorded decoded document for a case identifier,
    /// for cross-case reference in sequential flows.
    pub fn document(&self, case_id: &str) -> Option<Document> {
        self.results
            .lock()
            .expect("result record lock poisoned")
            .get(case_id)
            .cloned()
            .flatten()
    }

    /// Run one test case through its state machine and report the outcome.
    pub async fn run(&self, case: &TestCase) -> CaseReport {
        let request = &case.request;
        let expect = &case.expect;

        self.publish(Message::CaseStarted {
            case_id: request.case_id.clone(),
            label: request.label.clone(),
            note: request.note.clone(),
        });

        debug!("case {}: executing", request.case_id);
        let (response, log) = match self.executor.execute(request, &self.session).await {
            Ok(pair) => pair,
            Err(e) => {
                let check =
                    Check::error(CheckKind::Transport, format!("failed to execute request: {e}"));
                return self.finish(request, CaseState::Failed, vec![check]);
            }
        };

        if self.config.logging {
            self.publish(Message::HttpExchange {
                case_id: request.case_id.clone(),
                log,
            });
        }

        debug!("case {}: decoding", request.case_id);
        let mut checks = Vec::new();
        let document = match document::decode(&response.body) {
            Ok(document) => document,
            Err(e) => {
                checks.push(Check::error(
                    CheckKind::Decode,
                    format!("failed to decode response body: {e}"),
                ));
                None
            }
        };

        self.results
            .lock()
            .expect("result record lock poisoned")
            .insert(request.case_id.clone(), document.clone());

        debug!("case {}: asserting", request.case_id);
        let ignored_headers = self.merged_ignored_headers(&expect.ignored_headers);
        let strict_keys = expect.strict_keys.unwrap_or(self.config.strict_keys);
        checks.extend(assertion::evaluate(
            expect,
            &response,
            document.as_ref(),
            &ignored_headers,
            strict_keys,
        ));

        let state = if checks.iter().all(|check| check.passed) {
            CaseState::Passed
        } else {
            CaseState::Failed
        };
        self.finish(request, state, checks)
    }

    /// Run every case on its own tokio task against this shared harness.
    ///
    /// Reports come back in completion order. A case that panics is turned
    /// into a failed report instead of unwinding past the runner.
    pub async fn run_all(self: Arc<Self>, cases: Vec<TestCase>) -> Vec<CaseReport> {
        let handles: FuturesUnordered<_> = cases
            .into_iter()
            .map(|case| {
                let harness = Arc::clone(&self);
                let case_id = case.request.case_id.clone();
                let label = case.request.label.clone();
                tokio::spawn(async move { harness.run(&case).await }).map(move |joined| {
                    joined.unwrap_or_else(|e| {
                        error!("case {case_id} aborted: {e}");
                        CaseReport {
                            case_id,
                            label,
                            state: CaseState::Failed,
                            checks: vec![Check::error(
                                CheckKind::Transport,
                                format!("case aborted: {e}"),
                            )],
                        }
                    })
                })
            })
            .collect();

        handles.collect().await
    }

    fn finish(
        &self,
        request: &crate::case::RequestSpec,
        state: CaseState,
        checks: Vec<Check>,
    ) -> CaseReport {
        if self.config.logging {
            for check in &checks {
                self.publish(Message::Check {
                    case_id: request.case_id.clone(),
                    check: check.clone(),
                });
            }
        }

        let report = CaseReport {
            case_id: request.case_id.clone(),
            label: request.label.clone(),
            state,
            checks,
        };
        debug!("case {}: {:?}", report.case_id, report.state);
        self.publish(Message::CaseFinished(report.clone()));
        report
    }

    fn merged_ignored_headers(&self, case_ignored: &[String]) -> Vec<String> {
        let mut merged = self.config.ignored_headers.clone();
        merged.extend(case_ignored.iter().cloned());
        merged
    }

    fn publish(&self, message: Message) {
        // An Err here only means nobody subscribed.
        let _ = self.events.send(message);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::case::{ExpectedOutcome, RequestSpec};
    use pretty_assertions::assert_eq;
    use reqwest::Method;

    fn hello_case(url: String) -> TestCase {
        TestCase {
            request: RequestSpec {
                label: "hello".into(),
                case_id: "RUNNER-001".into(),
                method: Method::POST,
                url,
                body: r#"{"hello":"hello back at you !"}"#.into(),
                headers: [("content-type".into(), "application/json".into())].into(),
                ..Default::default()
            },
            expect: ExpectedOutcome {
                status_line: Some("200 OK".into()),
                key_values: [("hello".into(), "hello back at you !".into())].into(),
                present_keys: Some(vec!["hello".into()]),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn passing_case_records_its_document() -> eyre::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/test")
            .with_body(r#"{"hello":"hello back at you !"}"#)
            .create_async()
            .await;

        let harness = Harness::with_config(Config::default());
        let report = harness.run(&hello_case(format!("{}/test", server.url()))).await;
        mock.assert_async().await;

        assert!(report.passed(), "failures: {:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.state, CaseState::Passed);

        let document = harness.document("RUNNER-001").unwrap();
        assert_eq!(
            document.get("hello").unwrap().render(),
            "hello back at you !"
        );
        Ok(())
    }

    #[tokio::test]
    async fn transport_failure_skips_decode_and_assert() {
        let harness = Harness::with_config(Config::default());
        let mut case = hello_case("http://127.0.0.1:1/test".into());
        case.request.case_id = "RUNNER-002".into();

        let report = harness.run(&case).await;

        assert_eq!(report.state, CaseState::Failed);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].kind, CheckKind::Transport);
        assert!(harness.document("RUNNER-002").is_none());
    }

    #[tokio::test]
    async fn decode_failure_still_runs_remaining_checks() -> eyre::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/test")
            .with_body("{not json")
            .create_async()
            .await;

        let harness = Harness::with_config(Config::default());
        let report = harness.run(&hello_case(format!("{}/test", server.url()))).await;

        assert_eq!(report.state, CaseState::Failed);
        let kinds: Vec<_> = report.failures().map(|check| check.kind).collect();
        assert!(kinds.contains(&CheckKind::Decode));
        assert!(kinds.contains(&CheckKind::KeyValue));
        assert!(kinds.contains(&CheckKind::KeyPresence));
        // The status checks still ran and passed.
        assert!(report
            .checks
            .iter()
            .any(|check| check.kind == CheckKind::StatusCode && check.passed));
        Ok(())
    }

    #[tokio::test]
    async fn rerunning_a_case_overwrites_its_record() -> eyre::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/first")
            .with_body(r#"{"hello":"first"}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/second")
            .with_body(r#"{"hello":"second"}"#)
            .expect(1)
            .create_async()
            .await;

        let harness = Harness::with_config(Config::default());
        let mut case = hello_case(format!("{}/first", server.url()));
        case.expect = ExpectedOutcome::default();

        harness.run(&case).await;
        first.assert_async().await;
        assert_eq!(
            harness.document("RUNNER-001").unwrap().get("hello").unwrap().render(),
            "first"
        );

        // Same identifier, different endpoint: the record is replaced.
        case.request.url = format!("{}/second", server.url());
        harness.run(&case).await;
        second.assert_async().await;
        assert_eq!(
            harness.document("RUNNER-001").unwrap().get("hello").unwrap().render(),
            "second"
        );
        Ok(())
    }

    #[tokio::test]
    async fn one_failing_case_never_aborts_a_sibling() -> eyre::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/test")
            .with_body(r#"{"hello":"hello back at you !"}"#)
            .create_async()
            .await;

        let harness = Arc::new(Harness::with_config(Config::default()));
        let ok = hello_case(format!("{}/test", server.url()));
        let mut broken = hello_case("http://127.0.0.1:1/test".into());
        broken.request.case_id = "RUNNER-BROKEN".into();

        let reports = Arc::clone(&harness).run_all(vec![ok, broken]).await;

        assert_eq!(reports.len(), 2);
        let ok_report = reports.iter().find(|r| r.case_id == "RUNNER-001").unwrap();
        let broken_report = reports.iter().find(|r| r.case_id == "RUNNER-BROKEN").unwrap();
        assert!(ok_report.passed());
        assert!(!broken_report.passed());
        Ok(())
    }

    #[tokio::test]
    async fn events_are_published_in_case_order() -> eyre::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/test")
            .with_body(r#"{"hello":"hello back at you !"}"#)
            .create_async()
            .await;

        let harness = Harness::with_config(Config::default());
        let mut rx = harness.subscribe();

        let mut case = hello_case(format!("{}/test", server.url()));
        case.request.note = Some("first contact".into());
        harness.run(&case).await;

        let Ok(Message::CaseStarted { note, .. }) = rx.try_recv() else {
            panic!("expected CaseStarted first");
        };
        assert_eq!(note.as_deref(), Some("first contact"));

        let Ok(Message::HttpExchange { log, .. }) = rx.try_recv() else {
            panic!("expected HttpExchange after CaseStarted");
        };
        assert_eq!(log.response.status_line, "200 OK");

        let mut finished = false;
        while let Ok(message) = rx.try_recv() {
            if let Message::CaseFinished(report) = message {
                assert!(report.passed());
                finished = true;
            }
        }
        assert!(finished, "expected CaseFinished last");
        Ok(())
    }

    #[tokio::test]
    async fn logging_off_suppresses_exchange_events_only() -> eyre::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/test")
            .with_body(r#"{"hello":"hello back at you !"}"#)
            .create_async()
            .await;

        let harness = Harness::with_config(Config {
            logging: false,
            ..Default::default()
        });
        let mut rx = harness.subscribe();

        let report = harness.run(&hello_case(format!("{}/test", server.url()))).await;
        assert!(report.passed());

        while let Ok(message) = rx.try_recv() {
            assert!(
                !matches!(message, Message::HttpExchange { .. } | Message::Check { .. }),
                "logging disabled, got {message:?}"
            );
        }
        Ok(())
    }
}
