//! Property tests: wrap-safe arithmetic, scheduling and the arbiter state machine

use lora_core::{
    elapsed, reached, Busy, Completion, DebounceMonitor, IntervalTimer, Operation, PinChannel, RadioAction,
    RadioArbiter, MAX_SPAN,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn elapsed_is_exact_within_half_range(start in any::<u32>(), span in 0..=MAX_SPAN) {
        let later = start.wrapping_add(span);
        prop_assert_eq!(elapsed(later, start), span as i32);
        prop_assert!(reached(later, start));
        if span > 0 {
            prop_assert_eq!(elapsed(start, later), -(span as i32));
            prop_assert!(!reached(start, later));
        }
    }

    #[test]
    fn deadlines_advance_by_one_period_when_polled_often(
        start in any::<u32>(),
        period in 2..10_000u32,
        step_fraction in 1..100u32,
    ) {
        let step = (period * step_fraction / 100).max(1);
        let mut timer = IntervalTimer::starting_at(start, period);
        let mut now = start;
        let mut previous = timer.deadline();

        for _ in 0..200 {
            if timer.poll(now) {
                prop_assert_eq!(timer.deadline().wrapping_sub(previous), period);
                previous = timer.deadline();
            }
            now = now.wrapping_add(step);
        }
    }

    #[test]
    fn far_behind_timer_resyncs_to_now(start in any::<u32>(), period in 1..10_000u32, behind in 1..50u32) {
        let mut timer = IntervalTimer::starting_at(start, period);
        let now = start.wrapping_add(period * behind);
        prop_assert!(timer.poll(now));
        prop_assert_eq!(timer.deadline(), now.wrapping_add(period));
    }

    #[test]
    fn no_commit_while_every_hold_is_short(
        start in any::<u32>(),
        window in 2..500u32,
        gaps in prop::collection::vec(1..500u32, 1..40),
    ) {
        let channel = PinChannel::new();
        let monitor = DebounceMonitor::new(window);
        let mut now = start;
        let mut level = true;

        for gap in gaps {
            // Every reading is an edge, so nothing has held yet
            prop_assert_eq!(monitor.sample(&channel, level, now), None);
            now = now.wrapping_add(gap % window);
            level = !level;
        }
        prop_assert!(!channel.stable_state());

        let last = !level;
        let expected = if last { Some(true) } else { None };
        prop_assert_eq!(monitor.sample(&channel, last, now.wrapping_add(window)), expected);
    }

    #[test]
    fn arbiter_matches_model(steps in prop::collection::vec(step_strategy(), 1..64)) {
        let arbiter = RadioArbiter::new();
        let mut model = Model::default();

        for step in steps {
            match step {
                Step::Acquire(op) => {
                    prop_assert_eq!(arbiter.try_acquire(op), model.acquire(op));
                }
                Step::Interrupt => {
                    prop_assert_eq!(arbiter.on_completion(), model.complete());
                }
                Step::Take(op) => {
                    let taken = take(&arbiter, op).is_some();
                    prop_assert_eq!(taken, model.take(op));
                }
                Step::TakeInterrupted(op) => match take(&arbiter, op) {
                    Some(guard) => {
                        prop_assert!(model.take(op));
                        prop_assert!(!arbiter.interrupt_enabled());
                        prop_assert_eq!(arbiter.on_completion(), Completion::Deferred);
                        drop(guard);
                        model.complete();
                    }
                    None => {
                        prop_assert!(!model.take(op));
                        prop_assert_eq!(arbiter.on_completion(), model.complete());
                    }
                },
            }

            prop_assert!(arbiter.interrupt_enabled());
            prop_assert_eq!(arbiter.action(), model.action);
            prop_assert_eq!(arbiter.is_pending(Operation::Transmit), model.transmitted);
            prop_assert_eq!(arbiter.is_pending(Operation::Receive), model.received);
            // An outstanding operation never coexists with its own unconsumed completion
            prop_assert!(!(arbiter.action() == RadioAction::Tx && model.transmitted));
            prop_assert!(!(arbiter.action() == RadioAction::Rx && model.received));
            // Nothing is transmitted over an unread packet
            prop_assert!(!(arbiter.action() == RadioAction::Tx && model.received));
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Acquire(Operation),
    Interrupt,
    Take(Operation),
    /// Completion interrupt arrives while the consumed flag's gate is closed
    TakeInterrupted(Operation),
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![Just(Operation::Transmit), Just(Operation::Receive)]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => operation_strategy().prop_map(Step::Acquire),
        3 => Just(Step::Interrupt),
        2 => operation_strategy().prop_map(Step::Take),
        2 => operation_strategy().prop_map(Step::TakeInterrupted),
    ]
}

fn take(arbiter: &RadioArbiter, op: Operation) -> Option<lora_core::GateGuard<'_>> {
    match op {
        Operation::Transmit => arbiter.take_transmitted(),
        Operation::Receive => arbiter.take_received(),
    }
}

/// Sequential reference for the arbiter
struct Model {
    action: RadioAction,
    transmitted: bool,
    received: bool,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            action: RadioAction::Off,
            transmitted: false,
            received: false,
        }
    }
}

impl Model {
    fn flag(&mut self, op: Operation) -> &mut bool {
        match op {
            Operation::Transmit => &mut self.transmitted,
            Operation::Receive => &mut self.received,
        }
    }

    fn acquire(&mut self, op: Operation) -> Result<(), Busy> {
        if *self.flag(op) {
            return Err(Busy::CompletionPending(op));
        }
        if op == Operation::Transmit && self.received {
            return Err(Busy::CompletionPending(Operation::Receive));
        }
        if self.action != RadioAction::Off {
            return Err(Busy::Outstanding(self.action));
        }
        self.action = op.action();
        Ok(())
    }

    fn complete(&mut self) -> Completion {
        let finished = core::mem::replace(&mut self.action, RadioAction::Off);
        match finished {
            RadioAction::Tx => {
                self.transmitted = true;
                Completion::Transmitted
            }
            RadioAction::Rx => {
                self.received = true;
                Completion::Received
            }
            RadioAction::Off => Completion::Spurious,
        }
    }

    fn take(&mut self, op: Operation) -> bool {
        core::mem::replace(self.flag(op), false)
    }
}
