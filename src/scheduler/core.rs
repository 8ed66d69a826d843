//! Scheduler Core — the priority-aware, no-drop-preserving message
//! scheduler with network backpressure.
//!
//! Single-threaded, synchronous, and lock-free by construction (see the
//! concurrency model in the crate's design notes): every operation here
//! runs to completion before returning, and a host that wants to drive
//! this from more than one thread must serialize calls externally.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use super::topic::TopicState;

/// A message released by [`SchedulerCore::schedule`], ready for the
/// transport to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub topic: String,
    pub data: Vec<u8>,
}

struct NoDropEntry {
    topic: String,
    data: Vec<u8>,
}

/// In-memory priority queues, no-drop FIFO, backpressure gate, topic rate
/// limiter, and selection policy. Never blocks, never fails.
pub struct SchedulerCore {
    topics: HashMap<String, TopicState>,
    no_drop: VecDeque<NoDropEntry>,
    no_drop_cap: Option<usize>,
    next_index: u64,
    last_acked_index: u64,
    max_in_flight: u64,
    /// Releases already handed to the output callback since the last real
    /// `backpressure_update`, shadowing the `next_index` advance the
    /// transport hasn't reported back yet. Without this, `credit()` stays
    /// stuck at its pre-release value for the rest of the same `schedule()`
    /// call (and across calls, until the transport catches up), letting
    /// the scheduler release more messages than `max_in_flight` allows.
    /// Reset to 0 whenever a real `backpressure_update` lands, since
    /// `next_index` then reflects the truth and supersedes the shadow.
    provisional_releases: u64,
}

impl SchedulerCore {
    pub fn new(max_in_flight: u64) -> Self {
        Self {
            topics: HashMap::new(),
            no_drop: VecDeque::new(),
            no_drop_cap: None,
            next_index: 0,
            last_acked_index: 0,
            max_in_flight: max_in_flight.max(1),
            provisional_releases: 0,
        }
    }

    /// Bound the no-drop FIFO, dropping the oldest entry (and logging it)
    /// once the bound would be exceeded. `None` (the default) leaves it
    /// unbounded, matching the reference client's implied behavior.
    pub fn with_no_drop_cap(mut self, cap: Option<usize>) -> Self {
        self.no_drop_cap = cap;
        self
    }

    /// Never blocks, never fails. Updates the topic registry (creating the
    /// entry on first sight of `topic`), then either appends to the
    /// no-drop FIFO or replaces the topic's pending best-effort slot.
    pub fn enqueue(
        &mut self,
        topic: &str,
        data: Vec<u8>,
        priority: f64,
        rate_limit: Duration,
        no_drop: bool,
    ) {
        let entry = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(priority, rate_limit));
        entry.priority = priority;
        entry.rate_limit = rate_limit;

        if no_drop {
            if let Some(cap) = self.no_drop_cap {
                while self.no_drop.len() >= cap {
                    self.no_drop.pop_front();
                    warn!(topic, cap, "no-drop queue at capacity, dropped oldest entry");
                }
            }
            self.no_drop.push_back(NoDropEntry {
                topic: topic.to_string(),
                data,
            });
        } else {
            // Replacement: the previous pending payload, if any, is
            // silently discarded. The topic's deficit carries forward.
            entry.pending = Some(data);
        }
    }

    /// Updates the two backpressure counters. An update that would
    /// decrease either counter is ignored entirely (not applied
    /// partially), since `next_index`/`last_acked_index` are only ever
    /// supposed to move forward.
    pub fn backpressure_update(&mut self, next_index: u64, last_acked_index: u64) {
        if next_index < self.next_index || last_acked_index < self.last_acked_index {
            trace!(
                next_index,
                last_acked_index,
                "ignoring non-monotonic backpressure update"
            );
            return;
        }
        self.next_index = next_index;
        self.last_acked_index = last_acked_index;
        // The transport's report supersedes any releases we'd shadowed
        // since the last update; it already accounts for them (and for
        // anything still in flight to the transport that hasn't been
        // sent yet, which simply hasn't advanced next_index at all).
        self.provisional_releases = 0;
    }

    fn credit(&self) -> i64 {
        self.max_in_flight as i64
            - ((self.next_index + self.provisional_releases) as i64 - self.last_acked_index as i64)
    }

    /// Idempotent; releases zero or more messages. Runs to completion
    /// synchronously — this never suspends. Releases continue until no
    /// releasable message exists or credit is exhausted with the no-drop
    /// FIFO empty.
    pub fn schedule(&mut self) -> Vec<Scheduled> {
        let mut released = Vec::new();

        loop {
            // 1. No-drop first. Bypasses credit and per-topic rate limits,
            // but still counts toward the in-flight window the transport
            // will eventually report back, so it advances the shadow too.
            if let Some(entry) = self.no_drop.pop_front() {
                self.provisional_releases += 1;
                released.push(Scheduled {
                    topic: entry.topic,
                    data: entry.data,
                });
                continue;
            }

            // 2. Credit gate.
            if self.credit() <= 0 {
                break;
            }

            // 3. Priority-weighted round robin among eligible best-effort topics.
            let now = Instant::now();
            let eligible: Vec<String> = self
                .topics
                .iter()
                .filter(|(_, t)| t.eligible(now))
                .map(|(name, _)| name.clone())
                .collect();

            if eligible.is_empty() {
                break;
            }

            for name in &eligible {
                let priority = self.topics[name].priority;
                self.topics.get_mut(name).unwrap().deficit += priority;
            }

            let mut winner: Option<&String> = None;
            for name in &eligible {
                let deficit = self.topics[name].deficit;
                if deficit <= 0.0 {
                    continue;
                }
                winner = match winner {
                    None => Some(name),
                    Some(best) if deficit > self.topics[best].deficit => Some(name),
                    Some(best) if deficit == self.topics[best].deficit && name < best => {
                        Some(name)
                    }
                    Some(best) => Some(best),
                };
            }

            let Some(winner) = winner.cloned() else {
                // Every eligible topic has priority <= 0 and no leftover
                // positive deficit from an earlier round: nothing to do.
                break;
            };

            // 4. Release the winner.
            let state = self.topics.get_mut(&winner).unwrap();
            state.deficit -= 1.0;
            state.last_release = Some(now);
            let data = state
                .pending
                .take()
                .expect("winner came from the eligible set, which requires pending.is_some()");
            self.provisional_releases += 1;

            released.push(Scheduled {
                topic: winner,
                data,
            });
        }

        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rl(secs: f64) -> Duration {
        Duration::from_secs_f64(secs)
    }

    /// No-drop messages release in FIFO order even with zero credit.
    #[test]
    fn no_drop_fifo_order_under_zero_credit() {
        let mut s = SchedulerCore::new(1);
        s.enqueue("sub", b"d1".to_vec(), 0.0, rl(0.0), true);
        s.enqueue("sub", b"d2".to_vec(), 0.0, rl(0.0), true);
        s.enqueue("sub", b"d3".to_vec(), 0.0, rl(0.0), true);

        let released = s.schedule();
        let datas: Vec<&[u8]> = released.iter().map(|m| m.data.as_slice()).collect();
        assert_eq!(datas, vec![b"d1".as_slice(), b"d2", b"d3"]);
    }

    /// Enqueuing a best-effort message twice before a release replaces
    /// the pending payload instead of queueing both.
    #[test]
    fn best_effort_enqueue_replaces_pending() {
        let mut s = SchedulerCore::new(10);
        s.enqueue("tel", b"d1".to_vec(), 1.0, rl(0.0), false);
        s.enqueue("tel", b"d2".to_vec(), 1.0, rl(0.0), false);

        let released = s.schedule();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].data, b"d2");
    }

    /// Deficit round-robin splits releases proportionally to priority
    /// weight (2:1 here) rather than evenly.
    #[test]
    fn priority_weighted_fairness_over_many_releases() {
        let mut s = SchedulerCore::new(1_000_000);
        let mut counts: HashMap<&str, u32> = HashMap::new();

        for _ in 0..30 {
            s.enqueue("a", b"x".to_vec(), 2.0, rl(0.0), false);
            s.enqueue("b", b"x".to_vec(), 1.0, rl(0.0), false);
            for m in s.schedule() {
                *counts.entry(if m.topic == "a" { "a" } else { "b" }).or_insert(0) += 1;
            }
        }

        let a = *counts.get("a").unwrap_or(&0) as i64;
        let b = *counts.get("b").unwrap_or(&0) as i64;
        assert_eq!(a + b, 30);
        assert!((a - 20).abs() <= 2, "expected ~20 A releases, got {a}");
        assert!((b - 10).abs() <= 2, "expected ~10 B releases, got {b}");
    }

    /// An update that would decrease either counter is ignored entirely.
    #[test]
    fn backpressure_update_rejects_non_monotonic_counters() {
        let mut s = SchedulerCore::new(2);
        s.backpressure_update(5, 3);
        assert_eq!(s.credit(), 0);
        s.backpressure_update(4, 2); // would decrease both -> ignored
        assert_eq!(s.credit(), 0);
    }

    /// A topic's rate limit is measured from its last release time, not
    /// from when the next message was enqueued.
    #[tokio::test]
    async fn rate_limit_gates_best_effort_release() {
        let mut s = SchedulerCore::new(10);
        s.enqueue("t", b"first".to_vec(), 1.0, rl(0.1), false);
        let released = s.schedule();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].data, b"first");

        tokio::time::sleep(Duration::from_millis(50)).await;
        s.enqueue("t", b"second".to_vec(), 1.0, rl(0.1), false);
        assert!(
            s.schedule().is_empty(),
            "second release must wait out the 100ms rate limit"
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        let released = s.schedule();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].data, b"second");
    }

    /// No-drop bypasses credit entirely.
    #[test]
    fn no_drop_bypasses_exhausted_credit() {
        let mut s = SchedulerCore::new(1);
        s.enqueue("tel", b"be".to_vec(), 1.0, rl(0.0), false);
        let first = s.schedule();
        assert_eq!(first.len(), 1);

        // No ack: next_index advanced by the transport, credit now 0.
        s.backpressure_update(1, 0);
        assert_eq!(s.credit(), 0);

        s.enqueue("sub", b"nd".to_vec(), 0.0, rl(0.0), true);
        let released = s.schedule();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].data, b"nd");
    }

    /// Replacing a pending slot does not reset the topic's deficit.
    #[test]
    fn replacement_preserves_deficit() {
        let mut s = SchedulerCore::new(1);
        s.backpressure_update(1, 0); // drain credit to 0: best-effort never releases
        assert_eq!(s.credit(), 0);
        s.enqueue("t", b"d1".to_vec(), 5.0, rl(0.0), false);
        assert!(s.schedule().is_empty());
        s.enqueue("t", b"d2".to_vec(), 5.0, rl(0.0), false); // replace, priority unchanged
        assert_eq!(s.topics["t"].pending.as_deref(), Some(b"d2".as_slice()));
    }

    /// A single `schedule()` call must not release more best-effort
    /// messages than the credit available at its start — releasing one
    /// must not make the stale `next_index`/`last_acked_index` pair look
    /// like fresh credit for the next candidate in the same pass.
    #[test]
    fn credit_is_consumed_within_a_single_schedule_call() {
        let mut s = SchedulerCore::new(1);
        s.enqueue("a", b"a1".to_vec(), 1.0, rl(0.0), false);
        s.enqueue("b", b"b1".to_vec(), 1.0, rl(0.0), false);

        let released = s.schedule();
        assert_eq!(released.len(), 1, "only one release should fit in the credit window");

        // The other topic's pending slot must still be intact, waiting
        // for the transport to report the first release back.
        let pending_topic = if released[0].topic == "a" { "b" } else { "a" };
        assert!(s.topics[pending_topic].pending.is_some());
    }

    /// The same stale-credit window across two `schedule()` calls, absent
    /// a real `backpressure_update` in between — mirrors the wiring task
    /// invoking `schedule()` again (e.g. on a later enqueue) before the
    /// transport has sent the first message and reported back.
    #[test]
    fn credit_stays_consumed_across_schedule_calls_until_acked() {
        let mut s = SchedulerCore::new(1);
        s.enqueue("a", b"a1".to_vec(), 1.0, rl(0.0), false);
        assert_eq!(s.schedule().len(), 1);

        s.enqueue("b", b"b1".to_vec(), 1.0, rl(0.0), false);
        assert!(
            s.schedule().is_empty(),
            "credit already spent by the first release; no ack has arrived yet"
        );

        // The transport finally reports the first send back.
        s.backpressure_update(1, 1);
        let released = s.schedule();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].topic, "b");
    }

    /// Zero-or-negative priority topics never win on a fresh deficit.
    #[test]
    fn zero_priority_topic_never_selected_from_scratch() {
        let mut s = SchedulerCore::new(10);
        s.enqueue("quiet", b"x".to_vec(), 0.0, rl(0.0), false);
        assert!(s.schedule().is_empty());
    }

    /// A rate-limited topic is skipped but its pending slot is retained.
    #[test]
    fn rate_limited_topic_retains_pending_slot() {
        let mut s = SchedulerCore::new(10);
        s.enqueue("a", b"a1".to_vec(), 1.0, rl(0.0), false);
        assert_eq!(s.schedule().len(), 1);

        s.enqueue("a", b"a2".to_vec(), 1.0, rl(3600.0), false);
        assert!(s.schedule().is_empty(), "rate limit should gate this release");
        assert_eq!(s.topics["a"].pending.as_deref(), Some(b"a2".as_slice()));
    }
}
