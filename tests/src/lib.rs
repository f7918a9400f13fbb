//! Host-side harness for the LoRa link node
//!
//! Scripted inputs and helpers shared by the scenario tests, the
//! `node_simulation` binary and the benchmarks.

use lora_core::hal::mock::MockRadio;
use lora_core::Tick;

/// Every payload the mock radio accepted, as text
pub fn sent_texts(radio: &MockRadio) -> Vec<String> {
    radio
        .sent()
        .iter()
        .map(|payload| String::from_utf8_lossy(payload).into_owned())
        .collect()
}

/// Raw input level over time
///
/// Each step gives the tick from which a level applies. Before the first
/// step the input reads low.
#[derive(Clone, Debug, Default)]
pub struct InputScript {
    steps: Vec<(Tick, bool)>,
}

impl InputScript {
    /// Steps must be given in ascending tick order
    pub fn new(steps: &[(Tick, bool)]) -> Self {
        Self { steps: steps.to_vec() }
    }

    /// Contact bounce: `toggles` alternating levels every `period` ticks from
    /// `start`, settling on `settle`
    pub fn bounce(start: Tick, period: u32, toggles: u32, settle: bool) -> Self {
        let mut steps: Vec<(Tick, bool)> = (0..toggles)
            .map(|i| (start + i * period, (i % 2 == 0) == settle))
            .collect();
        steps.push((start + toggles * period, settle));
        Self { steps }
    }

    pub fn level_at(&self, now: Tick) -> bool {
        self.steps
            .iter()
            .take_while(|(at, _)| *at <= now)
            .last()
            .map_or(false, |(_, level)| *level)
    }

    /// Tick of the last level change
    pub fn settled_at(&self) -> Option<Tick> {
        self.steps.last().map(|(at, _)| *at)
    }
}

#[cfg(test)]
mod scheduler_tests;
#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod sx127x_tests;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_script_levels() {
        let script = InputScript::new(&[(100, true), (150, false)]);
        assert!(!script.level_at(0));
        assert!(script.level_at(100));
        assert!(script.level_at(149));
        assert!(!script.level_at(150));
        assert_eq!(script.settled_at(), Some(150));
    }

    #[test]
    fn test_bounce_settles() {
        let script = InputScript::bounce(200, 5, 4, true);
        assert!(script.level_at(200));
        assert!(!script.level_at(205));
        assert!(script.level_at(210));
        assert!(!script.level_at(215));
        assert!(script.level_at(220));
        assert!(script.level_at(10_000));
        assert_eq!(script.settled_at(), Some(220));
    }
}
