use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use super::task::{run_caught, InferenceTask};
use crate::error::LensError;
use crate::schedule::{PendingInference, Ticket};

/// Outcome of one executed request.
#[derive(Debug)]
pub struct Finished<O> {
    pub ticket: Ticket,
    pub outcome: Result<O, LensError>,
}

/// Runs an inference task on a dedicated thread.
///
/// Requests go in over one channel and outcomes come back over another. The
/// worker never decides what to run: the scheduler submits at most one
/// request at a time, so the job queue holds at most one entry.
pub struct InferenceWorker<O> {
    jobs: Option<Sender<PendingInference>>,
    results: Receiver<Finished<O>>,
    handle: Option<JoinHandle<()>>,
}

impl<O: Send + 'static> InferenceWorker<O> {
    pub fn spawn<T>(mut task: T) -> Result<Self>
    where
        T: InferenceTask<Output = O>,
    {
        let (job_tx, job_rx) = mpsc::channel::<PendingInference>();
        let (result_tx, result_rx) = mpsc::channel();
        let name = format!("lens-{}", task.model_name());
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let outcome = run_caught(&mut task, &job.frame);
                    let ticket = job.ticket;
                    drop(job);
                    if result_tx.send(Finished { ticket, outcome }).is_err() {
                        break;
                    }
                }
                log::debug!("inference worker exiting");
            })
            .with_context(|| format!("failed to spawn worker thread {}", name))?;
        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, job: PendingInference) -> Result<(), LensError> {
        let jobs = self.jobs.as_ref().ok_or_else(Self::stopped)?;
        jobs.send(job).map_err(|_| Self::stopped())
    }

    /// Next outcome, if one is waiting. Errors once the worker thread is gone.
    pub fn try_recv(&self) -> Result<Option<Finished<O>>, LensError> {
        match self.results.try_recv() {
            Ok(done) => Ok(Some(done)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Self::stopped()),
        }
    }

    /// Block up to `timeout` for the next outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Finished<O>>, LensError> {
        match self.results.recv_timeout(timeout) {
            Ok(done) => Ok(Some(done)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Self::stopped()),
        }
    }

    fn stopped() -> LensError {
        LensError::InferenceFailure("inference worker stopped".into())
    }
}

impl<O> Drop for InferenceWorker<O> {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("inference worker panicked");
            }
        }
    }
}
