//! Background runner: one arduino-cli process per invocation.
//!
//! Runs on its own OS thread. Stdout is read incrementally and each JSON
//! document becomes one message; stderr is collected on a helper thread so
//! neither pipe can fill up and stall the child. After exit, exactly one
//! terminal message closes the queue.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info, warn};

use super::error::ToolchainError;
use super::message::{Message, MessageSender};
use super::output::{classify_line, DocumentAssembler, OutputLine};

/// One process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunJob {
    /// Topic stamped on every message of this invocation.
    pub topic: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RunJob {
    pub fn new(topic: impl Into<String>, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            program: program.into(),
            args,
        }
    }
}

/// Runs `job` to completion, reporting through `queue`.
///
/// Blocks the calling thread until the process exits.
pub fn run(job: RunJob, queue: MessageSender) {
    info!(
        topic = %job.topic,
        program = %job.program.display(),
        args = ?job.args,
        "Starting arduino-cli"
    );

    let mut child = match Command::new(&job.program)
        .args(&job.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("NO_COLOR", "1")
        .spawn()
    {
        Ok(child) => child,
        Err(source) => {
            let err = ToolchainError::ProcessLaunch {
                path: job.program.clone(),
                source,
            };
            warn!(topic = %job.topic, "{}", err);
            queue.finish_error(&job.topic, err.to_string());
            return;
        }
    };

    let stderr_reader = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut buf) {
                debug!("Failed to read stderr: {}", e);
            }
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    let mut collector = OutputCollector::new(&job.topic);
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => collector.push_line(&String::from_utf8_lossy(&buf), &queue),
                Err(e) => {
                    warn!(topic = %job.topic, "Failed to read stdout: {}", e);
                    collector.record_error(format!("Failed to read arduino-cli output: {}", e));
                    break;
                }
            }
        }
    }

    let exit = child.wait();
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    match exit {
        Ok(status) => collector.finish(status.code(), &stderr, queue),
        Err(e) => queue.finish_error(&job.topic, format!("Failed to wait for arduino-cli: {}", e)),
    }
}

// =============================================================================
// Output Collection
// =============================================================================

/// Turns stdout into messages and decides the terminal outcome.
#[derive(Debug)]
pub struct OutputCollector {
    topic: String,
    documents: DocumentAssembler,
    last_record: Option<String>,
    first_error: Option<String>,
}

impl OutputCollector {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            documents: DocumentAssembler::new(),
            last_record: None,
            first_error: None,
        }
    }

    /// Feeds one raw stdout line.
    pub fn push_line(&mut self, line: &str, queue: &MessageSender) {
        if let Some(document) = self.documents.push(line) {
            self.emit(&document, queue);
        }
    }

    /// Records a failure that did not come from stdout, such as a broken
    /// pipe. The first failure wins.
    pub fn record_error(&mut self, text: impl Into<String>) {
        if self.first_error.is_none() {
            self.first_error = Some(text.into());
        }
    }

    fn emit(&mut self, document: &str, queue: &MessageSender) {
        let line = classify_line(document);
        let mut status = line.status();

        match &line {
            OutputLine::Success(raw) | OutputLine::Record(raw) => {
                self.last_record = Some(raw.clone());
            }
            OutputLine::Failure(text) => self.record_error(text.clone()),
            OutputLine::Unparsed(_) => {
                if let Some(err) = line.parse_error() {
                    debug!(topic = %self.topic, "{}", err);
                    status = err.status();
                }
            }
        }

        queue.send(Message::new(status, &self.topic, line.data()));
    }

    /// Emits the terminal message for a process that exited with `code`
    /// (`None` when killed by a signal).
    ///
    /// Success requires exit code zero and no failure record on stdout.
    pub fn finish(mut self, code: Option<i32>, stderr: &str, queue: MessageSender) {
        if let Some(document) = self.documents.finish() {
            self.emit(&document, &queue);
        }

        match (code, self.first_error) {
            (Some(0), None) => {
                info!(topic = %self.topic, "arduino-cli finished");
                queue.finish_success(&self.topic, self.last_record.unwrap_or_default());
            }
            (code, Some(error)) => {
                warn!(topic = %self.topic, ?code, "arduino-cli reported an error");
                queue.finish_error(&self.topic, error);
            }
            (code, None) => {
                let err = ToolchainError::NonZeroExit {
                    code,
                    stderr: stderr.to_string(),
                };
                warn!(topic = %self.topic, ?code, "{}", err);
                queue.finish_error(&self.topic, err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::message::{message_channel, Status};

    fn collect(lines: &[&str], code: Option<i32>, stderr: &str) -> Vec<Message> {
        let (tx, mut rx) = message_channel();
        let mut collector = OutputCollector::new("compile");
        for line in lines {
            collector.push_line(line, &tx);
        }
        collector.finish(code, stderr, tx);
        rx.drain_until_terminal()
    }

    #[test]
    fn test_clean_success() {
        let line = r#"{"compiler_out":"ok","success":true}"#;
        let messages = collect(&[line], Some(0), "");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].status, Status::Success);
        assert!(!messages[0].is_terminal());
        assert!(messages[1].is_terminal());
        assert!(messages[1].is_success());
        assert_eq!(messages[1].data, line);
    }

    #[test]
    fn test_garbage_line_does_not_abort() {
        let messages = collect(&["not json", r#"{"success":true}"#], Some(0), "");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].status, Status::Warning);
        assert_eq!(messages[0].data, "not json");
        assert!(messages[2].is_success());
    }

    #[test]
    fn test_non_zero_exit_uses_stderr() {
        let messages = collect(&[], Some(1), "Error: board not found\n");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_terminal());
        assert!(messages[0].is_error());
        assert_eq!(messages[0].data, "Error: board not found");
    }

    #[test]
    fn test_non_zero_exit_generic_text() {
        let messages = collect(&[], Some(3), "   ");
        assert_eq!(messages[0].data, "arduino-cli exited with code 3");
    }

    #[test]
    fn test_structured_error_is_not_duplicated() {
        let messages = collect(
            &[r#"{"success":false,"error":"Compilation failed"}"#],
            Some(1),
            "exit status 1",
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].status, Status::Error);
        assert!(!messages[0].is_terminal());
        assert!(messages[1].is_terminal());
        assert_eq!(messages[1].data, "Compilation failed");
        assert_eq!(messages.iter().filter(|m| m.is_terminal()).count(), 1);
    }

    #[test]
    fn test_error_record_with_zero_exit_is_failure() {
        let messages = collect(&[r#"{"error":"lib not found"}"#], Some(0), "");
        let last = messages.last().unwrap();
        assert!(last.is_terminal());
        assert!(last.is_error());
        assert_eq!(last.data, "lib not found");
    }

    #[test]
    fn test_pretty_printed_output_is_one_message() {
        let messages = collect(
            &["{\n", "  \"VersionString\": \"0.35.3\"\n", "}\n"],
            Some(0),
            "",
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].status, Status::Info);
        assert!(messages[1].data.contains("0.35.3"));
    }

    #[test]
    fn test_lost_output_with_zero_exit_is_failure() {
        let (tx, mut rx) = message_channel();
        let mut collector = OutputCollector::new("compile");
        collector.push_line(r#"{"phase":"preparing"}"#, &tx);
        collector.record_error("Failed to read arduino-cli output: broken pipe");
        collector.finish(Some(0), "", tx);

        let messages = rx.drain_until_terminal();
        assert_eq!(messages.len(), 2);
        let last = messages.last().unwrap();
        assert!(last.is_error());
        assert_eq!(last.data, "Failed to read arduino-cli output: broken pipe");
    }

    #[test]
    fn test_stdout_error_record_wins_over_later_failure() {
        let (tx, mut rx) = message_channel();
        let mut collector = OutputCollector::new("compile");
        collector.push_line(r#"{"success":false,"error":"Compilation failed"}"#, &tx);
        collector.record_error("Failed to read arduino-cli output: broken pipe");
        collector.finish(Some(1), "", tx);

        let messages = rx.drain_until_terminal();
        assert_eq!(messages.last().unwrap().data, "Compilation failed");
    }

    #[test]
    fn test_signal_without_output() {
        let messages = collect(&[], None, "");
        assert!(messages[0].is_error());
        assert!(messages[0].data.contains("signal"));
    }

    #[test]
    fn test_missing_program_is_launch_failure() {
        let (tx, mut rx) = message_channel();
        run(
            RunJob::new("upload", "/nonexistent/arduino-cli", vec!["version".into()]),
            tx,
        );
        let messages = rx.drain_until_terminal();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_terminal());
        assert!(messages[0].is_error());
        assert_eq!(messages[0].topic, "upload");
        assert!(messages[0].data.contains("Failed to launch"));
    }
}
