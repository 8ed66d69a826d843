//! Wiring — binds the Producer Adapter, Scheduler Core, and Transport
//! Adapter by forwarding events, the way `connect_client` wires signals
//! and slots together in the reference client's `main.cpp`. No global
//! registry: components are constructed and handles are passed directly.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::scheduler::{Scheduled, SchedulerCore};

/// Commands the scheduler task accepts. Each one is applied to
/// `SchedulerCore` and is always followed by a `schedule()` pass, per the
/// wiring contract ("schedule() is invoked after every enqueue and every
/// backpressure_update").
enum Command {
    Enqueue {
        topic: String,
        data: Vec<u8>,
        priority: f64,
        rate_limit: Duration,
        no_drop: bool,
    },
    BackpressureUpdate {
        next_index: u64,
        last_acked_index: u64,
    },
}

/// A cheap, cloneable front for the task that owns `SchedulerCore`. The
/// Producer and Transport adapters each hold one; neither ever touches
/// `SchedulerCore` directly, which keeps it single-threaded and
/// lock-free as the concurrency model requires.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    pub fn enqueue(
        &self,
        topic: String,
        data: Vec<u8>,
        priority: f64,
        rate_limit: Duration,
        no_drop: bool,
    ) {
        let _ = self.tx.send(Command::Enqueue {
            topic,
            data,
            priority,
            rate_limit,
            no_drop,
        });
    }

    pub fn backpressure_update(&self, next_index: u64, last_acked_index: u64) {
        let _ = self.tx.send(Command::BackpressureUpdate {
            next_index,
            last_acked_index,
        });
    }
}

/// Spawns the task that owns `SchedulerCore` and drives `schedule()`
/// after every command. Returns a handle for producers/transport to post
/// events through, and a receiver the transport drains to put released
/// messages on the wire.
pub fn spawn_scheduler(
    mut core: SchedulerCore,
) -> (SchedulerHandle, mpsc::UnboundedReceiver<Scheduled>) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Scheduled>();

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Enqueue {
                    topic,
                    data,
                    priority,
                    rate_limit,
                    no_drop,
                } => {
                    core.enqueue(&topic, data, priority, rate_limit, no_drop);
                }
                Command::BackpressureUpdate {
                    next_index,
                    last_acked_index,
                } => {
                    core.backpressure_update(next_index, last_acked_index);
                }
            }

            for scheduled in core.schedule() {
                trace!(topic = %scheduled.topic, "releasing scheduled message");
                if out_tx.send(scheduled).is_err() {
                    // Transport side is gone; nothing left to drive.
                    return;
                }
            }
        }
    });

    (SchedulerHandle { tx: cmd_tx }, out_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerCore;

    #[tokio::test]
    async fn enqueue_is_scheduled_and_delivered_through_the_output_channel() {
        let (handle, mut out_rx) = spawn_scheduler(SchedulerCore::new(10));

        handle.enqueue("tel".to_string(), b"hello".to_vec(), 1.0, Duration::ZERO, false);

        let scheduled = out_rx.recv().await.expect("scheduler task is alive");
        assert_eq!(scheduled.topic, "tel");
        assert_eq!(scheduled.data, b"hello");
    }

    #[tokio::test]
    async fn dropping_the_output_receiver_ends_the_scheduler_task() {
        let (handle, out_rx) = spawn_scheduler(SchedulerCore::new(10));
        drop(out_rx);

        // The task should exit on its next send attempt rather than spin
        // forever; enqueuing after the receiver is gone must not panic.
        handle.enqueue("tel".to_string(), b"x".to_vec(), 1.0, Duration::ZERO, false);
        tokio::task::yield_now().await;
    }
}
