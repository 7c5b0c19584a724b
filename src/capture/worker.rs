//! Dedicated worker thread for blocking camera work
//!
//! All device I/O and frame decoding runs on a single background thread.
//! The thread is torn down (shutdown message + join) when the worker is
//! dropped, which happens when the capture session ends.

use crossbeam_channel::{unbounded, Sender};
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Shutdown,
}

/// Single-thread executor for blocking capture work
pub struct CaptureWorker {
    tx: Sender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Spawn the worker thread
    pub fn spawn() -> Self {
        let (tx, rx) = unbounded::<WorkerMessage>();

        let handle = std::thread::spawn(move || {
            debug!("Capture worker starting");
            while let Ok(message) = rx.recv() {
                match message {
                    WorkerMessage::Run(job) => job(),
                    WorkerMessage::Shutdown => break,
                }
            }
            debug!("Capture worker exiting");
        });

        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Run a job on the worker thread
    ///
    /// The returned receiver resolves with the job's result, or with an
    /// error if the worker shut down before running it.
    pub fn run<T, F>(&self, job: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(WorkerMessage::Run(Box::new(move || {
            let _ = tx.send(job());
        })));
        rx
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        // Signal the worker to stop and wait for it
        let _ = self.tx.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
