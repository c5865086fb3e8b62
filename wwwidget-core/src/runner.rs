// wwwidget-core/src/runner.rs
use crate::{Cadence, InputEvent, OutputBatch, OutputSender, Worker, WorkerId};
use crossbeam::channel::{
    Receiver, RecvTimeoutError, Sender, after, bounded, never, select, unbounded,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{Span, debug, error, info, info_span, warn};

/// Per-worker context handed to every `produce` call.
///
/// Carries the worker's identity, the tracing span its log lines are
/// recorded under, and the stop signal raised at shutdown.
pub struct WorkerContext {
    id: WorkerId,
    span: Span,
    stop: Receiver<()>,
    input: Option<Receiver<InputEvent>>,
}

/// What ended a wait between two productions
#[derive(Debug)]
enum Wake {
    Elapsed,
    Input(InputEvent),
    Stop,
}

impl WorkerContext {
    /// Context that is never stopped and receives no input.
    /// Useful to drive a worker by hand, e.g. in tests.
    pub fn detached(id: impl Into<WorkerId>) -> Self {
        let id = id.into();
        Self {
            span: info_span!("worker", id = %id),
            id,
            stop: never(),
            input: None,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// True once shutdown was requested. Long-running productions should
    /// check this and return early.
    pub fn is_stopped(&self) -> bool {
        matches!(
            self.stop.try_recv(),
            Err(crossbeam::channel::TryRecvError::Disconnected)
        )
    }

    fn wait(&self, cadence: Cadence) -> Wake {
        let input = self.input.clone().unwrap_or_else(never);
        let timer = match cadence {
            Cadence::Every(delay) => after(delay),
            Cadence::OnInput => never(),
        };

        select! {
            recv(self.stop) -> _ => Wake::Stop,
            recv(input) -> event => match event {
                Ok(event) => Wake::Input(event),
                // Controller dropped its input sender: it is shutting down
                Err(_) => Wake::Stop,
            },
            recv(timer) -> _ => Wake::Elapsed,
        }
    }
}

/// Controller-side handle of a running worker
pub struct WorkerHandle {
    id: WorkerId,
    input: Option<Sender<InputEvent>>,
    stop: Option<Sender<()>>,
    /// Disconnects when the production loop has returned
    done: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Move `worker` onto its own thread and start its production loop
    pub fn spawn(
        id: WorkerId,
        worker: Box<dyn Worker>,
        output: OutputSender,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded(0);
        let (done_tx, done_rx) = bounded::<()>(0);
        let (input_tx, input_rx) = if worker.accepts_input() {
            let (tx, rx) = unbounded();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let ctx = WorkerContext {
            span: info_span!("worker", id = %id),
            id: id.clone(),
            stop: stop_rx,
            input: input_rx,
        };

        let thread = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || {
                let _done = done_tx;
                run(worker, ctx, output)
            })?;

        Ok(Self {
            id,
            input: input_tx,
            stop: Some(stop_tx),
            done: done_rx,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn accepts_input(&self) -> bool {
        self.input.is_some()
    }

    /// Forward an event to the worker. Returns false when the worker takes
    /// no input or has already terminated.
    pub fn send_input(&self, event: InputEvent) -> bool {
        self.input
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Raise the stop signal. The worker notices it at its next wait, or
    /// earlier if its production polls [`WorkerContext::is_stopped`].
    pub fn request_stop(&mut self) {
        self.stop.take();
        self.input.take();
    }

    /// Wait for the worker thread until `deadline`. A thread still blocked
    /// in `produce` at the deadline is left detached.
    pub fn join_until(&mut self, deadline: Instant) -> bool {
        self.request_stop();
        let Some(thread) = self.thread.take() else {
            return true;
        };
        if let Err(RecvTimeoutError::Timeout) = self.done.recv_deadline(deadline) {
            warn!(worker = %self.id, "worker did not stop in time, detaching");
            return false;
        }
        // The loop body never panics out of the thread, see `run`
        let _ = thread.join();
        true
    }
}

/// Production loop executed on the worker's thread.
///
/// Errors and panics end this loop and nothing else: the pane keeps its
/// last batch and sibling workers carry on.
fn run(mut worker: Box<dyn Worker>, ctx: WorkerContext, output: OutputSender) {
    let _entered = ctx.span.clone().entered();
    info!("worker started");

    loop {
        let produced = panic::catch_unwind(AssertUnwindSafe(|| {
            worker
                .produce(&ctx)
                .map(|batch| (worker.label(), batch, worker.cadence()))
        }));

        let (label, batch, cadence): (String, OutputBatch, Cadence) = match produced {
            Ok(Ok(produced)) => produced,
            Ok(Err(e)) => {
                error!(error = %e, "worker failed, pane frozen");
                return;
            }
            Err(payload) => {
                error!(panic = %panic_message(&*payload), "worker panicked, pane frozen");
                return;
            }
        };

        debug!(commands = batch.len(), "batch produced");
        if output.send(ctx.id.clone(), label, batch).is_err() {
            debug!("output channel closed");
            return;
        }

        match ctx.wait(cadence) {
            Wake::Elapsed => {}
            Wake::Input(event) => {
                let accepted =
                    panic::catch_unwind(AssertUnwindSafe(|| worker.accept_input(event)));
                if let Err(payload) = accepted {
                    error!(panic = %panic_message(&*payload), "worker panicked on input, pane frozen");
                    return;
                }
            }
            Wake::Stop => {
                info!("worker stopped");
                return;
            }
        }

        if ctx.is_stopped() {
            info!("worker stopped");
            return;
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
