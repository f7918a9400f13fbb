//! Periodic task cadence, table driven

use lora_core::{next_deadline, ConfigError, IntervalTimer, NodeConfig, Scheduler, TimeAwareAction};
use rstest::rstest;

const PERIOD: u32 = 1_000;

#[rstest]
#[case::on_time(1_000, 1_000, 2_000)]
#[case::slightly_late(1_000, 1_050, 2_000)]
#[case::almost_a_period_late(1_000, 1_999, 2_000)]
#[case::exactly_a_period_late(1_000, 2_000, 3_000)]
#[case::far_behind(1_000, 10_500, 11_500)]
#[case::deadline_before_wrap(u32::MAX - 99, u32::MAX - 99, 900)]
#[case::late_across_wrap(u32::MAX - 99, 200, 900)]
#[case::far_behind_across_wrap(u32::MAX - 99, 5_000, 6_000)]
fn next_deadline_by_lateness(#[case] deadline: u32, #[case] now: u32, #[case] expected: u32) {
    assert_eq!(next_deadline(deadline, PERIOD, now), expected);
}

#[rstest]
#[case::before(999, false)]
#[case::at(1_000, true)]
#[case::after(1_001, true)]
#[case::half_range_after(1_000 + i32::MAX as u32, true)]
#[case::just_past_half_range(1_001 + i32::MAX as u32, false)]
fn timer_due(#[case] now: u32, #[case] due: bool) {
    let timer = IntervalTimer::starting_at(1_000, PERIOD);
    assert_eq!(timer.is_due(now), due);
}

#[test]
fn default_cadence_over_two_seconds() {
    println!("🕒 Polling the scheduler every 10 ms for 2 s...");
    let mut scheduler = Scheduler::new(&NodeConfig::default());
    let mut fired = [0u32; 3];

    for now in (0..2_000).step_by(10) {
        for action in scheduler.poll(now) {
            fired[action as usize] += 1;
        }
    }

    assert_eq!(fired[TimeAwareAction::Minute as usize], 1);
    assert_eq!(fired[TimeAwareAction::Second as usize], 2);
    assert_eq!(fired[TimeAwareAction::HundredMillis as usize], 20);
    println!("  ✅ minute {} / second {} / 100 ms {}", fired[0], fired[1], fired[2]);
}

#[test]
fn cadence_holds_across_wraparound() {
    let start = 0u32.wrapping_sub(250);
    let mut timer = IntervalTimer::starting_at(start, 100);
    let mut fire_times = Vec::new();

    for step in 0..100u32 {
        let now = start.wrapping_add(step * 10);
        if timer.poll(now) {
            fire_times.push(now);
        }
    }

    assert_eq!(fire_times.len(), 10);
    assert!(fire_times.windows(2).all(|pair| pair[1].wrapping_sub(pair[0]) == 100));
    assert_eq!(fire_times[3], 50);
}

#[test]
fn late_passes_keep_phase() {
    // Polled every 70 ms: fires drift late but deadlines stay on the 100 ms grid
    let mut timer = IntervalTimer::new(100);
    let mut deadlines = Vec::new();

    for now in (0..1_400).step_by(70) {
        if timer.poll(now) {
            deadlines.push(timer.deadline());
        }
    }

    assert!(deadlines.iter().all(|deadline| deadline % 100 == 0));
    assert!(deadlines.windows(2).all(|pair| pair[1] - pair[0] == 100));
}

#[test]
fn custom_intervals_drive_the_scheduler() {
    let config = NodeConfig::default().with_intervals(600, 100, 10).unwrap();
    let mut scheduler = Scheduler::new(&config);
    assert_eq!(scheduler.poll(0).len(), 3);
    assert_eq!(scheduler.poll(10).as_slice(), &[TimeAwareAction::HundredMillis]);
    assert_eq!(
        scheduler.poll(100).as_slice(),
        &[TimeAwareAction::Second, TimeAwareAction::HundredMillis]
    );
    assert_eq!(scheduler.timer(TimeAwareAction::Minute).deadline(), 600);
}

#[rstest]
#[case::low_band(433.0, 50, Ok(()))]
#[case::lowest(137.0, 0, Ok(()))]
#[case::highest(1020.0, 50, Ok(()))]
#[case::below_band(136.9, 50, Err(ConfigError::FrequencyOutOfRange))]
#[case::wifi(2400.0, 50, Err(ConfigError::FrequencyOutOfRange))]
#[case::debounce_too_long(868.0, u32::MAX, Err(ConfigError::SpanTooLong))]
fn config_validation(#[case] mhz: f32, #[case] debounce_ms: u32, #[case] expected: Result<(), ConfigError>) {
    assert_eq!(NodeConfig::new(mhz, debounce_ms).map(|_| ()), expected);
}
