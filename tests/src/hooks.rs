//! # Dropped-Error Hook Routing
//!
//! The hook is process-global state, so this suite keeps every interaction
//! with it inside a single test and filters captured failures by probe type.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use replay_bus::{
        clear_dropped_error_hook, set_dropped_error_hook, AbsentItemError, Failure, ReplayBus,
        Subscriber,
    };

    use crate::support::{ProbeError, Recorder};

    /// Subscriber leaving `on_error` at its default implementation.
    struct Mute;

    impl Subscriber<u64> for Mute {
        fn on_item(&self, _item: u64) {}
    }

    /// Probe payloads captured by the hook, ignoring failures raised by
    /// unrelated tests running in the same process.
    fn probes_in(captured: &Mutex<Vec<Failure>>) -> Vec<u32> {
        captured
            .lock()
            .unwrap()
            .iter()
            .filter_map(|failure| failure.downcast_ref::<ProbeError>())
            .map(|probe| probe.0)
            .collect()
    }

    /// Test that every terminal error nobody will deliver lands in the
    /// installed hook, and that clearing the hook restores the default.
    #[test]
    fn test_dropped_errors_route_through_installed_hook() {
        let captured = Arc::new(Mutex::new(Vec::<Failure>::new()));
        let sink = Arc::clone(&captured);
        set_dropped_error_hook(move |failure| sink.lock().unwrap().push(failure));

        // A failure losing the terminal race is re-routed, not delivered.
        let bus = ReplayBus::<u64>::new();
        let recorder = Recorder::new();
        bus.subscribe(recorder.clone());
        bus.fail(ProbeError(1));
        bus.fail(ProbeError(2));
        assert_eq!(recorder.errors().len(), 1, "only the winner is delivered");
        assert_eq!(probes_in(&captured), vec![2]);

        // The default `on_error` forwards to the hook as well.
        let quiet = ReplayBus::<u64>::new();
        quiet.subscribe(Arc::new(Mute));
        quiet.fail(ProbeError(3));
        assert_eq!(probes_in(&captured), vec![2, 3]);

        // An absent item on a terminated bus cannot be delivered either.
        bus.publish_opt(None);
        let absentees = captured
            .lock()
            .unwrap()
            .iter()
            .filter(|failure| failure.downcast_ref::<AbsentItemError>().is_some())
            .count();
        assert_eq!(absentees, 1);

        // After clearing, swallowed failures stop reaching the sink.
        clear_dropped_error_hook();
        bus.fail(ProbeError(4));
        assert_eq!(probes_in(&captured), vec![2, 3]);
    }
}
