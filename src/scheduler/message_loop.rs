//! Message loop
//!
//! Runs a current-thread tokio runtime on a dedicated OS thread. Tasks are
//! executed in the order they were posted; timers are spawned onto the same
//! runtime so every callback runs on the loop thread.

use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

use super::{Scheduler, Task};

enum Command {
    Run(Task),
    Timer(Duration, Task),
    Stop,
}

/// Dedicated-thread [`Scheduler`]
pub struct MessageLoop {
    tx: mpsc::UnboundedSender<Command>,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MessageLoop {
    /// Start a message loop on a new thread
    pub fn spawn(name: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let loop_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(command) = rx.recv().await {
                        match command {
                            Command::Run(task) => task(),
                            Command::Timer(delay, task) => {
                                tokio::spawn(async move {
                                    tokio::time::sleep(delay).await;
                                    task();
                                });
                            }
                            Command::Stop => break,
                        }
                    }
                });

                tracing::debug!(name = %loop_name, "Message loop exited");
            })?;

        tracing::debug!(name = name, "Message loop started");

        Ok(Self {
            tx,
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Whether the caller is running on the loop thread
    pub fn is_loop_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Block until every task posted before this call has run
    pub fn flush(&self) -> Result<()> {
        self.send(Box::new(|| {}))
    }

    /// Stop the loop and join its thread
    ///
    /// Tasks and timers still pending are dropped. Calling this from the
    /// loop thread only requests the stop.
    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);

        if self.is_loop_thread() {
            return;
        }

        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                tracing::warn!("Message loop thread panicked");
            }
        }
    }

    fn enqueue(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| {
            tracing::debug!("Task dropped, message loop stopped");
            Error::SchedulerStopped
        })
    }
}

impl Scheduler for MessageLoop {
    fn post(&self, task: Task) {
        let _ = self.enqueue(Command::Run(task));
    }

    fn send(&self, task: Task) -> Result<()> {
        if self.is_loop_thread() {
            task();
            return Ok(());
        }

        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(Command::Run(Box::new(move || {
            task();
            let _ = done_tx.send(());
        })))?;

        done_rx.blocking_recv().map_err(|_| Error::SchedulerStopped)
    }

    fn timer(&self, delay: Duration, task: Task) {
        let _ = self.enqueue(Command::Timer(delay, task));
    }
}

impl Drop for MessageLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
