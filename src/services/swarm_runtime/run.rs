//! Background optimization runs.
//!
//! A run executes on the blocking pool and owns its population. Progress is
//! sent back to the owning actor; the stop flag is read at every iteration
//! boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;

use crate::domain::models::{OptimizationResult, ProblemSpec};
use crate::optimization::{IterationSnapshot, OptimizationStrategy};

/// Message from a run back to its actor. `generation` identifies the run.
#[derive(Debug)]
pub(crate) enum RunMessage {
    Progress {
        generation: u64,
        iteration: usize,
        position: Vec<f64>,
        fitness: f64,
    },
    Finished {
        generation: u64,
        outcome: RunOutcome,
    },
}

#[derive(Debug)]
pub(crate) enum RunOutcome {
    Completed(OptimizationResult),
    Panicked(String),
}

/// Control side of a live run.
#[derive(Debug, Clone)]
pub(crate) struct ActiveRun {
    pub generation: u64,
    stop: Arc<AtomicBool>,
}

impl ActiveRun {
    /// Ask the run to exit at its next iteration boundary.
    pub fn halt(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Launch `strategy` against `problem` on the blocking pool.
///
/// Must be called from within a tokio runtime.
pub(crate) fn launch(
    strategy: Box<dyn OptimizationStrategy>,
    problem: ProblemSpec,
    generation: u64,
    pause: Duration,
    messages: mpsc::Sender<RunMessage>,
) -> ActiveRun {
    let stop = Arc::new(AtomicBool::new(false));
    let run = ActiveRun {
        generation,
        stop: stop.clone(),
    };
    let progress = messages.clone();

    let task = tokio::task::spawn_blocking(move || {
        let mut on_iteration = move |snapshot: &IterationSnapshot<'_>| -> bool {
            if stop.load(Ordering::SeqCst) {
                return false;
            }
            let message = RunMessage::Progress {
                generation,
                iteration: snapshot.iteration,
                position: snapshot.best_position.to_vec(),
                fitness: snapshot.best_fitness,
            };
            // actor gone
            if progress.blocking_send(message).is_err() {
                return false;
            }
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
            !stop.load(Ordering::SeqCst)
        };
        strategy.optimize(&problem, Some(&mut on_iteration))
    });

    tokio::spawn(async move {
        let outcome = match task.await {
            Ok(result) => RunOutcome::Completed(result),
            Err(err) => RunOutcome::Panicked(panic_message(err)),
        };
        let _ = messages
            .send(RunMessage::Finished {
                generation,
                outcome,
            })
            .await;
    });

    run
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("run aborted: {err}");
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("algorithm panicked: {detail}"),
        None => "algorithm panicked".to_string(),
    }
}
