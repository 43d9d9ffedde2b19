use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::context::ServiceContext;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Recompute queue is closed")]
    QueueClosed,
}

/// Why a recompute was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TriggerReason {
    TransactionWritten { transaction_id: String },
    Repair,
    Manual,
}

/// Typed message crossing the boundary between request handlers and the
/// recompute workers.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeRequest {
    pub task_id: String,
    pub reason: TriggerReason,
    /// Zero on first delivery.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl RecomputeRequest {
    pub fn redelivery(&self, now: DateTime<Utc>) -> Self {
        Self {
            task_id: self.task_id.clone(),
            reason: self.reason.clone(),
            attempt: self.attempt + 1,
            enqueued_at: now,
        }
    }
}

/// Reference to scheduled work. Not a promise that it has run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRef {
    pub task_id: String,
}

/// At-least-once work queue for recompute jobs. No ordering between jobs.
pub trait TaskDispatcher: Send + Sync {
    fn enqueue(&self, request: RecomputeRequest) -> Result<(), DispatchError>;
}

/// Unbounded in-process queue drained by `worker::WorkerPool`.
#[derive(Clone)]
pub struct ChannelDispatcher {
    sender: Sender<RecomputeRequest>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, Receiver<RecomputeRequest>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }

    pub fn sender(&self) -> Sender<RecomputeRequest> {
        self.sender.clone()
    }
}

impl TaskDispatcher for ChannelDispatcher {
    fn enqueue(&self, request: RecomputeRequest) -> Result<(), DispatchError> {
        self.sender
            .send(request)
            .map_err(|_| DispatchError::QueueClosed)
    }
}

/// Fired after every successful transaction write.
#[derive(Clone)]
pub struct RecomputeTrigger {
    dispatcher: Arc<dyn TaskDispatcher>,
    ctx: ServiceContext,
}

impl RecomputeTrigger {
    pub fn new(dispatcher: Arc<dyn TaskDispatcher>, ctx: ServiceContext) -> Self {
        Self { dispatcher, ctx }
    }

    pub fn fire(&self, reason: TriggerReason) -> Result<TaskRef, DispatchError> {
        let request = RecomputeRequest {
            task_id: self.ctx.id.new_id(),
            reason,
            attempt: 0,
            enqueued_at: self.ctx.time.now(),
        };
        let task = TaskRef {
            task_id: request.task_id.clone(),
        };
        let reason = request.reason.clone();
        self.dispatcher.enqueue(request)?;
        debug!(task_id = %task.task_id, reason = ?reason, "Recompute enqueued");
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_enqueues_with_fresh_task_id() {
        let (dispatcher, receiver) = ChannelDispatcher::new();
        let trigger = RecomputeTrigger::new(Arc::new(dispatcher), ServiceContext::new_simulated(0));

        let first = trigger
            .fire(TriggerReason::TransactionWritten {
                transaction_id: "t1".into(),
            })
            .unwrap();
        let second = trigger.fire(TriggerReason::Manual).unwrap();
        assert_ne!(first, second);

        let queued = receiver.try_recv().unwrap();
        assert_eq!(queued.task_id, first.task_id);
        assert_eq!(queued.attempt, 0);
        assert_eq!(receiver.try_recv().unwrap().reason, TriggerReason::Manual);
    }

    #[test]
    fn test_closed_queue_reports_error() {
        let (dispatcher, receiver) = ChannelDispatcher::new();
        drop(receiver);
        let trigger = RecomputeTrigger::new(Arc::new(dispatcher), ServiceContext::new_simulated(0));

        assert!(matches!(
            trigger.fire(TriggerReason::Repair),
            Err(DispatchError::QueueClosed)
        ));
    }

    #[test]
    fn test_redelivery_bumps_attempt() {
        let request = RecomputeRequest {
            task_id: "task".into(),
            reason: TriggerReason::Repair,
            attempt: 0,
            enqueued_at: Utc::now(),
        };
        let next = request.redelivery(Utc::now());
        assert_eq!(next.attempt, 1);
        assert_eq!(next.task_id, "task");
    }
}
