//! # Concurrency
//!
//! Multithreaded tests around the bus delivery protocol:
//!
//! 1. **No loss**: late subscribers racing a live producer miss nothing
//! 2. **Single flight**: initial replay racing live drains never duplicates
//! 3. **Terminal races**: at most one terminal signal wins and is delivered
//! 4. **Cancellation races**: cancelling mid-delivery leaves a clean prefix
//!
//! Item publication is serialized onto a single producer thread throughout,
//! matching the bus contract; subscribe and cancel run from anywhere.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use rand::Rng;
    use replay_bus::{ReplayBus, Subscriber};

    use crate::support::{assert_gapless_tail, Recorder, StrayError};

    /// Small random pause so attach points spread across the producer's run.
    fn jitter() {
        let micros = rand::thread_rng().gen_range(0..800);
        thread::sleep(Duration::from_micros(micros));
    }

    /// Subscriber asserting that its callbacks never overlap: every entry
    /// must observe a delivery depth of zero.
    struct OverlapGuard {
        depth: AtomicUsize,
        overlaps: AtomicUsize,
        items: Mutex<Vec<u64>>,
    }

    impl OverlapGuard {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                depth: AtomicUsize::new(0),
                overlaps: AtomicUsize::new(0),
                items: Mutex::new(Vec::new()),
            })
        }

        fn enter(&self) {
            if self.depth.fetch_add(1, Ordering::SeqCst) != 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn exit(&self) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Subscriber<u64> for OverlapGuard {
        fn on_item(&self, item: u64) {
            self.enter();
            self.items.lock().unwrap().push(item);
            self.exit();
        }

        fn on_complete(&self) {
            self.enter();
            self.exit();
        }
    }

    // =============================================================================
    // NO LOSS
    // =============================================================================

    /// Test that subscribers attaching at arbitrary times against a live
    /// producer still observe the entire sequence on an unbounded bus.
    #[test]
    fn test_late_subscribers_lose_nothing_unbounded() {
        const TOTAL: u64 = 1_000;

        let bus = ReplayBus::<u64>::new();
        let recorders: Vec<_> = (0..6).map(|_| Recorder::new()).collect();

        let bus = &bus;
        thread::scope(|s| {
            s.spawn(move || {
                for item in 0..TOTAL {
                    bus.publish(item);
                }
            });

            for recorder in &recorders {
                s.spawn(move || {
                    jitter();
                    bus.subscribe(recorder.clone());
                });
            }
        });

        let expected: Vec<u64> = (0..TOTAL).collect();
        for recorder in &recorders {
            assert_eq!(recorder.items(), expected, "replay must close every gap");
        }
    }

    /// Test that attaching to a size-capped bus mid-stream yields a gapless,
    /// duplicate-free tail of the published sequence.
    #[test]
    fn test_size_window_attach_race_yields_gapless_tail() {
        const TOTAL: u64 = 2_000;

        let bus = ReplayBus::<u64>::with_max_len(64);
        let recorders: Vec<_> = (0..6).map(|_| Recorder::new()).collect();

        let bus = &bus;
        thread::scope(|s| {
            s.spawn(move || {
                for item in 0..TOTAL {
                    bus.publish(item);
                }
            });

            for recorder in &recorders {
                s.spawn(move || {
                    jitter();
                    bus.subscribe(recorder.clone());
                });
            }
        });

        for recorder in &recorders {
            let items = recorder.items();
            assert!(!items.is_empty(), "every subscriber sees at least the window");
            assert_eq!(items.last(), Some(&(TOTAL - 1)));
            assert_gapless_tail(&items, TOTAL);
        }
    }

    // =============================================================================
    // SINGLE FLIGHT
    // =============================================================================

    /// Test that a storm of fresh subscriptions racing both live publishes and
    /// the final completion delivers each item and the terminal exactly once.
    #[test]
    fn test_subscribe_storm_delivers_each_signal_once() {
        const TOTAL: u64 = 500;

        let bus = ReplayBus::<u64>::new();
        let recorders: Vec<_> = (0..20).map(|_| Recorder::new()).collect();

        let bus = &bus;
        thread::scope(|s| {
            s.spawn(move || {
                for item in 0..TOTAL {
                    bus.publish(item);
                }
                bus.complete();
            });

            for chunk in recorders.chunks(5) {
                s.spawn(move || {
                    for recorder in chunk {
                        jitter();
                        bus.subscribe(recorder.clone());
                    }
                });
            }
        });

        let expected: Vec<u64> = (0..TOTAL).collect();
        for recorder in &recorders {
            assert_eq!(recorder.items(), expected);
            assert_eq!(recorder.completions(), 1, "terminal arrives exactly once");
            assert_eq!(recorder.acks(), 1);
        }
    }

    /// Test that the initial replay racing live publish drains never runs
    /// two delivery loops for one subscriber at once.
    #[test]
    fn test_delivery_never_overlaps_per_subscriber() {
        const TOTAL: u64 = 2_000;

        let bus = ReplayBus::<u64>::new();
        let guards: Vec<_> = (0..4).map(|_| OverlapGuard::new()).collect();

        let bus = &bus;
        thread::scope(|s| {
            s.spawn(move || {
                for item in 0..TOTAL {
                    bus.publish(item);
                }
                bus.complete();
            });

            for guard in &guards {
                s.spawn(move || {
                    jitter();
                    bus.subscribe(guard.clone());
                });
            }
        });

        let expected: Vec<u64> = (0..TOTAL).collect();
        for guard in &guards {
            assert_eq!(guard.overlaps.load(Ordering::SeqCst), 0);
            assert_eq!(*guard.items.lock().unwrap(), expected);
        }
    }

    // =============================================================================
    // TERMINAL RACES
    // =============================================================================

    /// Test that racing completions and failures elect exactly one terminal
    /// outcome and deliver exactly one terminal callback.
    #[test]
    fn test_racing_terminals_pick_single_winner() {
        let bus = ReplayBus::<u64>::new();
        bus.publish(1);

        let recorder = Recorder::new();
        bus.subscribe(recorder.clone());

        let bus = &bus;
        let barrier = &Barrier::new(8);
        thread::scope(|s| {
            for lane in 0..4u32 {
                s.spawn(move || {
                    barrier.wait();
                    bus.complete();
                });
                s.spawn(move || {
                    barrier.wait();
                    bus.fail(StrayError(lane));
                });
            }
        });

        assert!(bus.is_terminated());
        assert_ne!(
            bus.has_completed(),
            bus.has_failed(),
            "exactly one terminal kind may win"
        );
        assert_eq!(recorder.terminations(), 1);
        assert_eq!(recorder.items(), vec![1]);
    }

    // =============================================================================
    // CANCELLATION RACES
    // =============================================================================

    /// Test that cancelling from another thread mid-delivery leaves a clean,
    /// in-order prefix of the stream.
    #[test]
    fn test_cancel_race_leaves_ordered_prefix() {
        const TOTAL: u64 = 1_000;

        let bus = ReplayBus::<u64>::new();
        let recorder = Recorder::new();
        bus.subscribe(recorder.clone());
        let subscription = recorder.subscription().expect("ack stores the handle");

        thread::scope(|s| {
            s.spawn(|| {
                for item in 0..TOTAL {
                    bus.publish(item);
                }
            });
            s.spawn(move || {
                jitter();
                subscription.cancel();
            });
        });

        let items = recorder.items();
        let expected: Vec<u64> = (0..items.len() as u64).collect();
        assert_eq!(items, expected, "delivery stops on a prefix, never tears");
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.len(), TOTAL as usize, "cancel never rewrites history");
    }
}
