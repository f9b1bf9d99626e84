use std::collections::VecDeque;
use std::time::Duration;

use super::task::{run_caught, InferenceTask};
use super::worker::{Finished, InferenceWorker};
use crate::error::LensError;
use crate::schedule::{Completion, FrameScheduler, PendingInference, Step, Ticket};

/// Where model calls execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// On the ticking thread; a tick that issues work also applies it.
    Inline,
    /// On a background worker thread; outcomes are applied on later ticks.
    Background,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelStatus {
    /// Not warmed up yet, or shut down.
    Loading,
    Ready,
    Failed(String),
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub issued: bool,
    /// A current-epoch result was applied.
    pub applied: bool,
    /// Stale results dropped.
    pub discarded: u32,
    /// Set when a throughput window closed during this tick.
    pub observed_rate: Option<u32>,
}

enum Runner<T: InferenceTask> {
    Unstarted(T, ExecMode),
    Inline {
        task: T,
        done: VecDeque<Finished<T::Output>>,
    },
    Background(InferenceWorker<T::Output>),
    Stopped,
}

impl<T: InferenceTask> Runner<T> {
    fn submit(&mut self, job: PendingInference) -> Result<(), LensError> {
        match self {
            Runner::Inline { task, done } => {
                let outcome = run_caught(task, &job.frame);
                done.push_back(Finished {
                    ticket: job.ticket,
                    outcome,
                });
                Ok(())
            }
            Runner::Background(worker) => worker.submit(job),
            Runner::Unstarted(..) | Runner::Stopped => {
                Err(LensError::InferenceFailure("model is not running".into()))
            }
        }
    }

    fn poll(&mut self) -> Result<Option<Finished<T::Output>>, LensError> {
        match self {
            Runner::Inline { done, .. } => Ok(done.pop_front()),
            Runner::Background(worker) => worker.try_recv(),
            Runner::Unstarted(..) | Runner::Stopped => Ok(None),
        }
    }

    fn wait(&mut self, timeout: Duration) -> Result<Option<Finished<T::Output>>, LensError> {
        match self {
            Runner::Background(worker) => worker.recv_timeout(timeout),
            _ => self.poll(),
        }
    }
}

/// Scheduler plus model execution. Shared by both session kinds.
pub struct InferenceLoop<T: InferenceTask> {
    scheduler: FrameScheduler<T::Output>,
    runner: Runner<T>,
    status: ModelStatus,
    model_name: String,
}

impl<T: InferenceTask> InferenceLoop<T> {
    pub fn new(task: T, frame_cap_hz: f32, mode: ExecMode) -> Result<Self, LensError> {
        Ok(Self {
            scheduler: FrameScheduler::new(frame_cap_hz)?,
            model_name: task.model_name(),
            runner: Runner::Unstarted(task, mode),
            status: ModelStatus::Loading,
        })
    }

    /// Warm the model up and start executing. A failure is final for this
    /// loop; calling again returns the same error without retrying.
    pub fn start(&mut self) -> Result<(), LensError> {
        match &self.status {
            ModelStatus::Ready => return Ok(()),
            ModelStatus::Failed(reason) => return Err(self.unavailable(reason.clone())),
            ModelStatus::Loading => {}
        }
        let Runner::Unstarted(mut task, mode) = std::mem::replace(&mut self.runner, Runner::Stopped)
        else {
            return Err(self.unavailable("model runner already consumed".into()));
        };

        if let Err(e) = task.warm_up() {
            let reason = format!("{:#}", e);
            log::error!("model {} failed to load: {}", self.model_name, reason);
            self.status = ModelStatus::Failed(reason.clone());
            return Err(self.unavailable(reason));
        }

        self.runner = match mode {
            ExecMode::Inline => Runner::Inline {
                task,
                done: VecDeque::new(),
            },
            ExecMode::Background => match InferenceWorker::spawn(task) {
                Ok(worker) => Runner::Background(worker),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    self.status = ModelStatus::Failed(reason.clone());
                    return Err(self.unavailable(reason));
                }
            },
        };
        self.status = ModelStatus::Ready;
        log::info!("model {} ready ({:?})", self.model_name, mode);
        Ok(())
    }

    pub fn status(&self) -> &ModelStatus {
        &self.status
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn scheduler(&self) -> &FrameScheduler<T::Output> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler<T::Output> {
        &mut self.scheduler
    }

    /// Apply finished work, then let the scheduler decide on new work.
    pub fn tick(&mut self, now: Duration) -> TickReport {
        let mut report = TickReport::default();
        if self.status != ModelStatus::Ready {
            return report;
        }
        self.drain(now, &mut report);

        if let Step::Issued(job) = self.scheduler.step(now) {
            let ticket = job.ticket;
            report.issued = true;
            if let Err(e) = self.runner.submit(job) {
                self.apply(ticket, Err(e), now, &mut report);
            }
            self.drain(now, &mut report);
        }
        report.observed_rate = self.scheduler.take_observed_rate();
        report
    }

    /// Block up to `timeout` for an outstanding request and apply it.
    pub fn wait_for_outcome(&mut self, now: Duration, timeout: Duration) -> TickReport {
        let mut report = TickReport::default();
        match self.runner.wait(timeout) {
            Ok(Some(done)) => self.apply(done.ticket, done.outcome, now, &mut report),
            Ok(None) => {}
            Err(e) => self.runner_lost(e, now, &mut report),
        }
        report.observed_rate = self.scheduler.take_observed_rate();
        report
    }

    /// Detach the source and stop the model. Late outcomes are dropped.
    pub fn shutdown(&mut self) {
        self.scheduler.detach();
        self.runner = Runner::Stopped;
        if self.status == ModelStatus::Ready {
            self.status = ModelStatus::Loading;
        }
    }

    fn drain(&mut self, now: Duration, report: &mut TickReport) {
        loop {
            match self.runner.poll() {
                Ok(Some(done)) => self.apply(done.ticket, done.outcome, now, report),
                Ok(None) => break,
                Err(e) => {
                    self.runner_lost(e, now, report);
                    break;
                }
            }
        }
    }

    /// The worker thread died. Fail the outstanding request so the scheduler
    /// is not left busy, and mark the model failed.
    fn runner_lost(&mut self, err: LensError, now: Duration, report: &mut TickReport) {
        let reason = err.to_string();
        log::error!("model {} stopped: {}", self.model_name, reason);
        if let Some(ticket) = self.scheduler.in_flight() {
            self.apply(ticket, Err(err), now, report);
        }
        self.runner = Runner::Stopped;
        self.status = ModelStatus::Failed(reason);
    }

    fn apply(
        &mut self,
        ticket: Ticket,
        outcome: Result<T::Output, LensError>,
        now: Duration,
        report: &mut TickReport,
    ) {
        match self.scheduler.complete(ticket, outcome, now) {
            Completion::Applied => report.applied = true,
            Completion::Discarded => report.discarded += 1,
        }
    }

    fn unavailable(&self, reason: String) -> LensError {
        LensError::ModelUnavailable {
            model: self.model_name.clone(),
            reason,
        }
    }
}
