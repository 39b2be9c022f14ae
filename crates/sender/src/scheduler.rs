//! Scheduler - fixed worker pool fed from the backend queue
//!
//! Workers announce themselves on an idle queue. The assign loop takes an
//! idle worker, pops the next message for it and hands it over; when the
//! queue is empty or failing the worker goes back and the loop backs off.
//! Every task runs on the caller's `TaskTracker`, which doubles as the
//! completion barrier for shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use contracts::{Backend, OutgoingMsg, SenderSettings};
use observability::{record_backend_poll_error, record_idle_workers};

use crate::deadline::within;
use crate::error::SenderError;
use crate::worker::MsgDispatcher;

/// Idle worker announcement
#[derive(Clone)]
struct WorkerSlot {
    id: usize,
    job_tx: mpsc::Sender<OutgoingMsg>,
}

/// Worker pool plus the loop assigning messages to it
pub struct Scheduler {
    backend: Arc<dyn Backend>,
    dispatcher: Arc<MsgDispatcher>,
    tracker: TaskTracker,
    stop_tx: watch::Sender<bool>,
    idle_tx: async_channel::Sender<WorkerSlot>,
    idle_rx: async_channel::Receiver<WorkerSlot>,
    started: AtomicBool,
}

impl Scheduler {
    pub fn new(backend: Arc<dyn Backend>, dispatcher: Arc<MsgDispatcher>, tracker: TaskTracker) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (idle_tx, idle_rx) = async_channel::unbounded();
        Self {
            backend,
            dispatcher,
            tracker,
            stop_tx,
            idle_tx,
            idle_rx,
            started: AtomicBool::new(false),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.dispatcher.settings().max_workers
    }

    /// Workers currently waiting for a message
    pub fn idle_workers(&self) -> usize {
        self.idle_rx.len()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Launch the workers, then the assign loop
    #[instrument(name = "scheduler_start", skip(self), fields(workers = self.max_workers()))]
    pub fn start(&self) -> Result<(), SenderError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SenderError::AlreadyStarted);
        }

        for id in 0..self.max_workers() {
            let (job_tx, job_rx) = mpsc::channel(1);
            let slot = WorkerSlot { id, job_tx };
            if self.idle_tx.try_send(slot.clone()).is_err() {
                // Only fails once the idle queue is closed
                break;
            }
            self.tracker.spawn(worker_loop(
                slot,
                job_rx,
                Arc::clone(&self.dispatcher),
                self.idle_tx.clone(),
                self.stop_tx.subscribe(),
            ));
        }

        let settings = self.dispatcher.settings();
        self.tracker.spawn(assign_loop(AssignLoop {
            backend: Arc::clone(&self.backend),
            dispatcher: Arc::clone(&self.dispatcher),
            idle_tx: self.idle_tx.clone(),
            idle_rx: self.idle_rx.clone(),
            stop_rx: self.stop_tx.subscribe(),
            poll_timeout: settings.poll_timeout(),
            backend_timeout: settings.backend_timeout(),
            idle_sleep: settings.idle_sleep(),
        }));

        info!(workers = self.max_workers(), "Scheduler started");
        Ok(())
    }

    /// Signal every task to stop and return immediately
    ///
    /// Workers finish their in-flight message first. Close and wait on the
    /// tracker to block until everything has drained.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
        info!("Scheduler stopping");
    }
}

/// Resolves once stop is signalled (or the scheduler is gone)
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stop| *stop).await;
}

#[instrument(name = "sender_worker_loop", skip_all, fields(worker = slot.id))]
async fn worker_loop(
    slot: WorkerSlot,
    mut job_rx: mpsc::Receiver<OutgoingMsg>,
    dispatcher: Arc<MsgDispatcher>,
    idle_tx: async_channel::Sender<WorkerSlot>,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!(worker = slot.id, "Worker started");

    loop {
        let msg = tokio::select! {
            biased;
            _ = stopped(&mut stop_rx) => break,
            job = job_rx.recv() => match job {
                Some(msg) => msg,
                None => break,
            },
        };

        // Stop is only observed between messages
        dispatcher.dispatch(msg).await;

        if idle_tx.send(slot.clone()).await.is_err() {
            break;
        }
    }

    // Refuse new jobs, then finish one already handed over
    job_rx.close();
    while let Some(msg) = job_rx.recv().await {
        debug!(worker = slot.id, msg_id = %msg.id, "Dispatching job received before stop");
        dispatcher.dispatch(msg).await;
    }

    debug!(worker = slot.id, "Worker stopped");
}

struct AssignLoop {
    backend: Arc<dyn Backend>,
    dispatcher: Arc<MsgDispatcher>,
    idle_tx: async_channel::Sender<WorkerSlot>,
    idle_rx: async_channel::Receiver<WorkerSlot>,
    stop_rx: watch::Receiver<bool>,
    poll_timeout: Duration,
    backend_timeout: Duration,
    idle_sleep: Duration,
}

/// Backend poll health, so failures are logged once per transition
#[derive(Debug)]
struct PollHealth {
    healthy: bool,
}

impl PollHealth {
    fn new() -> Self {
        Self { healthy: true }
    }

    /// Returns true when the backend just started failing
    fn failed(&mut self) -> bool {
        std::mem::replace(&mut self.healthy, false)
    }

    /// Returns true when the backend just recovered
    fn succeeded(&mut self) -> bool {
        !std::mem::replace(&mut self.healthy, true)
    }
}

#[instrument(name = "scheduler_assign_loop", skip_all)]
async fn assign_loop(mut ctx: AssignLoop) {
    let mut health = PollHealth::new();

    loop {
        let slot = tokio::select! {
            biased;
            _ = stopped(&mut ctx.stop_rx) => break,
            slot = ctx.idle_rx.recv() => match slot {
                Ok(slot) => slot,
                Err(_) => break,
            },
        };
        record_idle_workers(ctx.idle_rx.len());

        // A running pop is never cancelled; the deadline bounds how long
        // stop waits for it
        let limit = ctx.backend_timeout.max(ctx.poll_timeout);
        let popped = within(
            "pop_next_outgoing_msg",
            limit,
            ctx.backend.pop_next_outgoing_msg(ctx.poll_timeout),
        )
        .await;

        match popped {
            Ok(Some(msg)) => {
                if health.succeeded() {
                    info!("Backend queue recovered");
                }
                let worker = slot.id;
                if let Err(mpsc::error::SendError(msg)) = slot.job_tx.send(msg).await {
                    // The worker already stopped; the message is ours now
                    warn!(worker, msg_id = %msg.id, "Worker stopped, dispatching popped message inline");
                    ctx.dispatcher.dispatch(msg).await;
                }
                continue;
            }
            Ok(None) => {
                if health.succeeded() {
                    info!("Backend queue recovered");
                }
            }
            Err(e) => {
                record_backend_poll_error();
                if health.failed() {
                    error!(error = %e, "Error popping outgoing message");
                }
            }
        }

        if ctx.idle_tx.send(slot).await.is_err() {
            warn!("Idle queue closed");
            break;
        }

        tokio::select! {
            biased;
            _ = stopped(&mut ctx.stop_rx) => break,
            _ = tokio::time::sleep(ctx.idle_sleep) => {}
        }
    }

    debug!("Assign loop stopped");
}
