use console::{style, Term};
use eyre::WrapErr;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::*;

use crate::{
    assertion::Check,
    http,
    runner::{CaseReport, Message},
    CaseId,
};

/// Reporter trait. The trait is based on the "template method" pattern.
/// You can implement on_xxx methods to hook into the harness events. This way
/// is enough for most usecases. If you need more control, you can override
/// the "run" method.
///
/// Reporters are pure observers: they consume the event channel obtained from
/// [`crate::Harness::subscribe`] and can never change a case's outcome.
#[async_trait::async_trait]
pub trait Reporter {
    async fn run(&mut self, mut rx: broadcast::Receiver<Message>) -> eyre::Result<()> {
        loop {
            match rx.recv().await {
                Ok(Message::CaseStarted {
                    case_id,
                    label,
                    note,
                }) => {
                    self.on_case_start(case_id, label, note).await?;
                }
                Ok(Message::HttpExchange { case_id, log }) => {
                    self.on_http_exchange(case_id, log).await?;
                }
                Ok(Message::Check { case_id, check }) => {
                    self.on_check(case_id, check).await?;
                }
                Ok(Message::CaseFinished(report)) => {
                    self.on_case_end(report).await?;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("harness channel has been closed");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    debug!("harness channel recv lagged");
                    continue;
                }
            }
        }

        Ok(())
    }

    /// Called when a test case starts.
    async fn on_case_start(
        &mut self,
        _case_id: CaseId,
        _label: String,
        _note: Option<String>,
    ) -> eyre::Result<()> {
        Ok(())
    }

    /// Called when an HTTP exchange completes.
    async fn on_http_exchange(&mut self, _case_id: CaseId, _log: Box<http::Log>) -> eyre::Result<()> {
        Ok(())
    }

    /// Called per check outcome.
    async fn on_check(&mut self, _case_id: CaseId, _check: Check) -> eyre::Result<()> {
        Ok(())
    }

    /// Called when a test case ends.
    async fn on_case_end(&mut self, _report: CaseReport) -> eyre::Result<()> {
        Ok(())
    }
}

pub struct NullReporter;

#[async_trait::async_trait]
impl Reporter for NullReporter {}

/// Colorized per-case console output: the diagnostic note and HTTP exchange
/// dimmed, one `✓`/`✘` line per case, every failure message listed.
#[allow(clippy::vec_box)]
pub struct ListReporter {
    terminal: Term,
    buffer: HashMap<CaseId, Vec<Box<http::Log>>>,
}

impl Default for ListReporter {
    fn default() -> ListReporter {
        ListReporter::new()
    }
}

impl ListReporter {
    pub fn new() -> ListReporter {
        ListReporter {
            terminal: Term::stdout(),
            buffer: HashMap::new(),
        }
    }
}

#[async_trait::async_trait]
impl Reporter for ListReporter {
    async fn on_case_start(
        &mut self,
        case_id: CaseId,
        _label: String,
        note: Option<String>,
    ) -> eyre::Result<()> {
        if let Some(note) = note {
            write(&self.terminal, format!("· [{case_id}] {note}"))?;
        }
        self.buffer.insert(case_id, Vec::new());
        Ok(())
    }

    async fn on_http_exchange(&mut self, case_id: CaseId, log: Box<http::Log>) -> eyre::Result<()> {
        self.buffer
            .get_mut(&case_id)
            .ok_or_else(|| eyre::eyre!("case \"{case_id}\" not found in the buffer"))?
            .push(log);
        Ok(())
    }

    async fn on_case_end(&mut self, report: CaseReport) -> eyre::Result<()> {
        let logs = self.buffer.remove(&report.case_id).unwrap_or_default();

        for log in logs {
            write(
                &self.terminal,
                format!(" => {} {}", log.request.method, log.request.url),
            )?;
            write(&self.terminal, "  > request:")?;
            write(&self.terminal, "    > headers:")?;
            for (key, value) in &log.request.headers {
                write(
                    &self.terminal,
                    format!("       > {key}: {}", String::from_utf8_lossy(value.as_bytes())),
                )?;
            }
            write(
                &self.terminal,
                format!("  < response ({})", log.response.status_line),
            )?;
            write(&self.terminal, "    < headers:")?;
            for (key, value) in &log.response.headers {
                write(
                    &self.terminal,
                    format!("       < {key}: {}", String::from_utf8_lossy(value.as_bytes())),
                )?;
            }
            for cookie in &log.response.cookies {
                write(&self.terminal, format!("    < cookie: {cookie}"))?;
            }
            write(&self.terminal, format!("    < body: {}", log.response.body))?;
        }

        if report.passed() {
            let status = style("✓").green();
            self.terminal
                .write_line(&format!("{status} [{}] {}", report.case_id, report.label))?;
        } else {
            let status = style("✘").red();
            self.terminal
                .write_line(&format!("{status} [{}] {}", report.case_id, report.label))?;
            for failure in report.failures() {
                self.terminal
                    .write_line(&format!("    {} {}: {}", style("✘").red(), failure.kind, failure.message))?;
            }
        }

        Ok(())
    }
}

fn write(term: &Term, s: impl AsRef<str>) -> eyre::Result<()> {
    let colored = style(s.as_ref()).dim();
    term.write_line(&format!("{colored}"))
        .wrap_err("failed to write character on terminal")
}
