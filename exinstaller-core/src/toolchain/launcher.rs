//! Starting background workers.
//!
//! The facade never spawns threads itself; it hands jobs to a [`Launcher`].
//! [`ThreadLauncher`] gives every job a dedicated OS thread. Tests substitute
//! a launcher that records jobs instead of running them.

use std::thread;

use tracing::{debug, error};

use super::downloader::{self, DownloadJob};
use super::message::MessageSender;
use super::runner::{self, RunJob};

/// Starts workers for the facade.
///
/// Implementations take ownership of the queue. Whatever happens, the worker
/// (or the queue's `Drop`) must produce exactly one terminal message.
pub trait Launcher: Send + Sync {
    fn launch_runner(&self, job: RunJob, queue: MessageSender);

    fn launch_downloader(&self, job: DownloadJob, queue: MessageSender);
}

/// One OS thread per invocation. Threads are detached; callers observe them
/// only through their queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLauncher;

impl ThreadLauncher {
    fn spawn<F>(name: String, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        debug!(thread = %name, "Spawning worker");
        // On failure the closure is dropped with its queue, whose Drop
        // reports the terminal error.
        if let Err(e) = thread::Builder::new().name(name.clone()).spawn(work) {
            error!(thread = %name, "Failed to spawn worker thread: {}", e);
        }
    }
}

impl Launcher for ThreadLauncher {
    fn launch_runner(&self, job: RunJob, queue: MessageSender) {
        let name = format!("arduino-cli-{}", job.topic);
        Self::spawn(name, move || runner::run(job, queue));
    }

    fn launch_downloader(&self, job: DownloadJob, queue: MessageSender) {
        Self::spawn("arduino-cli-download".to_string(), move || {
            downloader::run(job, queue)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::message::message_channel;

    #[test]
    fn test_runner_thread_reports_terminal_message() {
        let (tx, mut rx) = message_channel();
        ThreadLauncher.launch_runner(
            RunJob::new("compile", "/nonexistent/arduino-cli", vec!["compile".into()]),
            tx,
        );

        let messages = rx.drain_until_terminal();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_error());
        assert_eq!(messages[0].topic, "compile");
    }
}
