//! Feature worker
//!
//! A single thread draining a FIFO queue of closures. Every mutation of a
//! feature's directories runs here, which makes the worker the only writer.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Sender};

use crate::error::{Result, SpoolError};
use crate::telemetry::Telemetry;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Serial execution context of one feature
pub struct Worker {
    name: String,
    sender: Option<Sender<Task>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Worker {
    /// Spawn the worker thread
    pub fn spawn(name: &str, telemetry: Arc<dyn Telemetry>) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Task>();

        let handle = thread::Builder::new()
            .name(format!("batchspool-{}", name))
            .spawn(move || {
                // Runs until every sender is dropped and the queue is drained.
                for task in receiver {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                        let error = SpoolError::Storage(format!(
                            "worker task panicked: {}",
                            panic_message(payload.as_ref())
                        ));
                        telemetry.error("Storage operation failed", &error);
                    }
                }
            })?;

        Ok(Self {
            name: name.to_string(),
            thread_id: handle.thread().id(),
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `task` without waiting for it
    pub fn run_async(&self, task: impl FnOnce() + Send + 'static) {
        if self.send(Box::new(task)).is_err() {
            tracing::warn!(worker = %self.name, "Dropped task queued on stopped worker");
        }
    }

    /// Queue `task` and block until it has run.
    ///
    /// Runs inline when called from the worker itself.
    pub fn run_sync<R: Send + 'static>(
        &self,
        task: impl FnOnce() -> R + Send + 'static,
    ) -> Result<R> {
        if thread::current().id() == self.thread_id {
            return Ok(task());
        }

        let (reply_tx, reply_rx) = channel::bounded(1);
        self.send(Box::new(move || {
            let _ = reply_tx.send(task());
        }))?;
        reply_rx.recv().map_err(|_| SpoolError::WorkerStopped)
    }

    /// Wait for every task queued so far
    pub fn flush(&self) -> Result<()> {
        self.run_sync(|| ())
    }

    fn send(&self, task: Task) -> Result<()> {
        match &self.sender {
            Some(sender) => sender.send(task).map_err(|_| SpoolError::WorkerStopped),
            None => Err(SpoolError::WorkerStopped),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel lets the thread finish the queue and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!(worker = %self.name, "Worker thread panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
