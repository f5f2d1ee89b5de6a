//! Background write worker.
//!
//! One thread per handler drains batches of pending buffers into the chunk
//! cache under the data-file lock, then flushes the file. After every batch
//! the handler's flush size is retuned so a batch takes about
//! [`TARGET_BATCH_MS`].
//!
//! ```text
//! handler ──batch──► channel ──► cube-write thread ──lock──► IoState::synchronous_write
//!    ▲                                   │
//!    └──── in-flight count / Condvar ◄───┘
//! ```

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use cube_core::{Buffer, Error, Result};
use tracing::{debug, error};

use crate::handler::{Shared, MAX_FLUSH_SIZE, MIN_FLUSH_SIZE};

/// Batch duration the flush size is tuned towards.
pub const TARGET_BATCH_MS: f64 = 100.0;

pub(crate) struct WriteWorker {
    sender: Option<Sender<Vec<Buffer>>>,
    handle: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl WriteWorker {
    pub(crate) fn spawn(shared: Arc<Shared>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let task_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("cube-write".into())
            .spawn(move || run(task_shared, receiver))?;
        debug!("cube write worker started");
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            shared,
        })
    }

    /// Queues a batch. Counts as in flight until the worker finishes it.
    pub(crate) fn submit(&self, batch: Vec<Buffer>) -> Result<()> {
        let Some(sender) = &self.sender else {
            return Err(Error::programmer("cube write worker already stopped"));
        };
        self.shared.begin_task()?;
        if sender.send(batch).is_err() {
            self.shared.end_task();
            return Err(Error::programmer("cube write worker exited unexpectedly"));
        }
        Ok(())
    }

    /// Closes the queue and joins the thread after it drains what was
    /// submitted.
    pub(crate) fn shutdown(&mut self) -> Result<()> {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| Error::programmer("cube write worker panicked"))?;
            debug!("cube write worker stopped");
        }
        Ok(())
    }
}

impl Drop for WriteWorker {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!(error = %err, "stopping cube write worker failed");
        }
    }
}

fn run(shared: Arc<Shared>, batches: Receiver<Vec<Buffer>>) {
    for batch in batches {
        let started = Instant::now();
        if let Err(err) = write_batch(&shared, &batch) {
            shared.defer_error(err);
        }
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let ideal = shared.ideal_flush_size.load(Ordering::Relaxed);
        let tuned = tune_flush_size(ideal, elapsed_ms);
        shared.ideal_flush_size.store(tuned, Ordering::Relaxed);
        debug!(buffers = batch.len(), elapsed_ms, ideal = tuned, "write batch done");

        drop(batch);
        shared.end_task();
    }
}

fn write_batch(shared: &Shared, batch: &[Buffer]) -> Result<()> {
    let mut state = shared.lock()?;
    for buffer in batch {
        state.synchronous_write(&shared.grid, buffer)?;
    }
    state.flush_file()
}

/// Scales the flush size by how far the last batch missed the target time.
pub(crate) fn tune_flush_size(current: usize, elapsed_ms: f64) -> usize {
    let current = current as f64;
    let next = current - current * (elapsed_ms - TARGET_BATCH_MS) / TARGET_BATCH_MS;
    if !next.is_finite() || next < MIN_FLUSH_SIZE as f64 {
        return MIN_FLUSH_SIZE;
    }
    (next.round() as usize).clamp(MIN_FLUSH_SIZE, MAX_FLUSH_SIZE)
}
