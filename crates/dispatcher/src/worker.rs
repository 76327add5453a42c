//! EventLoop - a dedicated worker thread driving a single-threaded runtime
//!
//! Sinks hand futures to the loop and return immediately. Shutdown closes
//! the job channel, waits for every spawned job to finish and joins the
//! thread.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

use crate::error::DispatcherError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to a running worker thread
pub struct EventLoop {
    name: String,
    /// `None` once shutdown has begun
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Spawn the worker thread
    pub fn start(name: impl Into<String>) -> Result<Self, DispatcherError> {
        let name = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| DispatcherError::EventLoop {
                name: name.clone(),
                source,
            })?;
        let (tx, rx) = mpsc::unbounded_channel::<Job>();

        let worker_name = name.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || runtime.block_on(run_jobs(rx, worker_name)))
            .map_err(|source| DispatcherError::EventLoop {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            tx: Mutex::new(Some(tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job; returns false when the loop is shutting down
    pub fn spawn<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(guard) = self.tx.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(tx) => tx.send(Box::pin(job)).is_ok(),
            None => {
                warn!(event_loop = %self.name, "Job submitted after shutdown, dropped");
                false
            }
        }
    }

    /// Stop accepting jobs, drain in-flight work and join the thread
    ///
    /// Idempotent; later calls return immediately.
    #[instrument(name = "event_loop_shutdown", skip(self), fields(event_loop = %self.name))]
    pub fn shutdown(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        let thread = self.thread.lock().ok().and_then(|mut t| t.take());
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!(event_loop = %self.name, "Worker thread panicked");
            }
        }
        debug!(event_loop = %self.name, "EventLoop shutdown complete");
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_jobs(mut rx: mpsc::UnboundedReceiver<Job>, name: String) {
    debug!(event_loop = %name, "EventLoop started");
    let mut jobs = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    jobs.spawn(job);
                }
                None => break,
            },
            Some(done) = jobs.join_next(), if !jobs.is_empty() => {
                if let Err(e) = done {
                    error!(event_loop = %name, error = %e, "Job failed");
                }
            }
        }
    }

    while let Some(done) = jobs.join_next().await {
        if let Err(e) = done {
            error!(event_loop = %name, error = %e, "Job failed");
        }
    }
    debug!(event_loop = %name, "EventLoop drained");
}
