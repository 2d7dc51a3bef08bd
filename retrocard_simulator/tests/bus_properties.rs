// Bus-level properties of the card firmware, checked against the simulated host

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retrocard_mcu::{BusCycleEngine, CounterSource, CycleKind, EngineState, LatchSource, configure_lines};
use retrocard_shared::{Direction, LineError, PinMap};
use retrocard_simulator::{BusEvent, HostCycle, HostScript, HostTiming, SimulatedLines, run_scripted};

fn tight() -> HostTiming {
    HostTiming { idle_polls: 0, hold_polls: 0 }
}

/// Trace slices from each HostSelect up to (not including) the next one.
fn cycles(trace: &[BusEvent]) -> Vec<&[BusEvent]> {
    let starts: Vec<usize> = trace
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, BusEvent::HostSelect { .. }))
        .map(|(i, _)| i)
        .collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(trace.len());
            &trace[start..end]
        })
        .collect()
}

fn position(events: &[BusEvent], pred: impl Fn(&BusEvent) -> bool) -> Option<usize> {
    events.iter().position(pred)
}

#[test]
fn consecutive_reads_count_up_and_wrap() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..20 {
        let start: u8 = rng.random();
        let count = rng.random_range(1..600);
        let report =
            run_scripted(PinMap::default(), HostScript::reads(count), tight(), CounterSource::new(start)).unwrap();
        let expected: Vec<u8> = (0..count).map(|i| start.wrapping_add(i as u8)).collect();
        assert_eq!(report.lines.host_observed(), expected.as_slice());
        let served: Vec<u8> = report.records.iter().map(|r| r.byte).collect();
        assert_eq!(served, expected);
        assert!(report.faults().is_empty());
    }
}

#[test]
fn read_cycles_drive_whole_lane_and_restore_before_next_select() {
    let pins = PinMap::default();
    let data = pins.data_mask();
    let report =
        run_scripted(pins.clone(), HostScript::reads(16), HostTiming::default(), CounterSource::new(0)).unwrap();
    assert!(report.faults().is_empty());

    for cycle in cycles(report.lines.trace()) {
        let enable = position(cycle, |e| *e == BusEvent::Direction { mask: data, output: true }).unwrap();
        let first_data = position(cycle, |e| matches!(e, BusEvent::DataSet { .. } | BusEvent::DataClear { .. })).unwrap();
        let sampled = position(cycle, |e| matches!(e, BusEvent::HostSampled { .. })).unwrap();
        let deselect = position(cycle, |e| matches!(e, BusEvent::HostDeselect { .. })).unwrap();
        let restore = position(cycle, |e| *e == BusEvent::Direction { mask: data, output: false }).unwrap();
        assert!(enable < first_data);
        assert!(first_data < sampled);
        assert!(deselect < restore, "lane released before the host deselected");
        // no partial-lane direction changes
        assert!(cycle.iter().all(|e| match e {
            BusEvent::Direction { mask, .. } => *mask == data,
            _ => true,
        }));
    }
    assert!(!report.lines.lane_driven());
}

#[test]
fn data_lane_is_set_then_complement_cleared() {
    let pins = PinMap::default();
    let report = run_scripted(pins.clone(), HostScript::reads(1), tight(), CounterSource::new(0b1100_1010)).unwrap();
    let writes: Vec<&BusEvent> = report
        .lines
        .trace()
        .iter()
        .filter(|e| matches!(e, BusEvent::DataSet { .. } | BusEvent::DataClear { .. }))
        .collect();
    assert_eq!(
        writes,
        vec![
            &BusEvent::DataSet { bits: pins.data_bits(0b1100_1010) },
            &BusEvent::DataClear { bits: pins.data_bits(0b0011_0101) },
        ]
    );
}

#[test]
fn write_cycles_never_touch_direction() {
    let mut rng = StdRng::seed_from_u64(3);
    let bytes: Vec<u8> = (0..64).map(|_| rng.random()).collect();
    let script = HostScript::new(bytes.iter().map(|b| HostCycle::Write(*b)));
    let report = run_scripted(PinMap::default(), script, tight(), CounterSource::new(0)).unwrap();

    let sampled: Vec<u8> = report.records.iter().map(|r| r.byte).collect();
    assert_eq!(sampled, bytes);
    assert!(report.records.iter().all(|r| r.kind == CycleKind::HostWrite));
    for cycle in cycles(report.lines.trace()) {
        assert!(!cycle.iter().any(|e| matches!(e, BusEvent::Direction { .. })));
    }
    assert!(report.faults().is_empty());
    assert_eq!(report.state.source.last_written(), bytes.last().copied());
}

#[test]
fn wait_released_once_per_cycle_after_data_action() {
    let mut rng = StdRng::seed_from_u64(11);
    let script = HostScript::random(&mut rng, 200, 0.5);
    let report = run_scripted(PinMap::default(), script, tight(), CounterSource::new(0)).unwrap();
    let trace = report.lines.trace();

    // not ready before the first cycle
    let first_select = position(trace, |e| matches!(e, BusEvent::HostSelect { .. })).unwrap();
    assert_eq!(
        trace[..first_select].iter().filter(|e| matches!(e, BusEvent::Wait { .. })).last(),
        Some(&BusEvent::Wait { released: false })
    );

    for cycle in cycles(trace) {
        let releases: Vec<usize> = cycle
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == BusEvent::Wait { released: true })
            .map(|(i, _)| i)
            .collect();
        assert_eq!(releases.len(), 1);
        let release = releases[0];
        if let Some(BusEvent::HostSelect { kind: HostCycle::Read, .. }) = cycle.first() {
            let last_data = cycle
                .iter()
                .rposition(|e| matches!(e, BusEvent::DataSet { .. } | BusEvent::DataClear { .. }))
                .unwrap();
            assert!(last_data < release);
        }
        let deselect = position(cycle, |e| matches!(e, BusEvent::HostDeselect { .. })).unwrap();
        let rearm = position(cycle, |e| *e == BusEvent::Wait { released: false }).unwrap();
        assert!(release < deselect && deselect < rearm);
    }
}

#[test]
fn write_pulse_leaves_counter_unchanged() {
    let pins = PinMap::default();
    let script = HostScript::new([HostCycle::Read, HostCycle::Read, HostCycle::Read, HostCycle::Write(0)]);
    let lines = SimulatedLines::new(pins.clone(), script).with_timing(tight());
    let mut engine = BusCycleEngine::new(configure_lines(lines, pins).unwrap());
    let mut state = EngineState::new(CounterSource::new(40));
    for _ in 0..3 {
        engine.run_cycle(&mut state);
    }
    assert_eq!(state.source.counter(), 43);

    let record = engine.run_cycle(&mut state);
    assert_eq!(record.kind, CycleKind::HostWrite);
    assert_eq!(state.source.counter(), 43);
    assert!(!state.transfer.pending_restore);
}

#[test]
fn counter_wraps_from_255_to_0() {
    let pins = PinMap::default();
    let lines = SimulatedLines::new(pins.clone(), HostScript::reads(2)).with_timing(tight());
    let mut engine = BusCycleEngine::new(configure_lines(lines, pins).unwrap());
    let mut state = EngineState::new(CounterSource::new(255));

    assert_eq!(engine.run_cycle(&mut state).byte, 255);
    assert_eq!(state.source.counter(), 0);
    assert_eq!(engine.run_cycle(&mut state).byte, 0);
    assert_eq!(engine.lines().host_observed(), &[255, 0]);
}

#[test]
fn active_low_read_direction() {
    let pins = PinMap { read_dir_active_low: true, ..PinMap::default() };
    let script = HostScript::new([HostCycle::Read, HostCycle::Write(0x11), HostCycle::Read]);
    let report = run_scripted(pins, script, HostTiming::default(), CounterSource::new(5)).unwrap();
    let kinds: Vec<CycleKind> = report.records.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![CycleKind::HostRead, CycleKind::HostWrite, CycleKind::HostRead]);
    assert_eq!(report.lines.host_observed(), &[5, 6]);
}

#[test]
fn relocated_data_lane_above_bank_boundary() {
    let pins = PinMap { data_base: 30, select: 4, read_dir: 5, wait: 6, interrupt: 7, button: 8, ..PinMap::default() };
    let report = run_scripted(pins, HostScript::reads(3), tight(), CounterSource::new(0xfe)).unwrap();
    assert_eq!(report.lines.host_observed(), &[0xfe, 0xff, 0x00]);
}

#[test]
fn long_host_holds_keep_engine_in_completing() {
    let timing = HostTiming { idle_polls: 50, hold_polls: 200 };
    let report = run_scripted(PinMap::default(), HostScript::reads(4), timing, CounterSource::new(1)).unwrap();
    assert_eq!(report.lines.host_observed(), &[1, 2, 3, 4]);
    assert!(report.lines.polls() > 4 * 250);
    assert!(report.faults().is_empty());
}

#[test]
fn latch_source_echoes_host_writes() {
    let script = HostScript::new([HostCycle::Write(0x99), HostCycle::Read, HostCycle::Write(0x01), HostCycle::Read]);
    let report = run_scripted(PinMap::default(), script, tight(), LatchSource::default()).unwrap();
    assert_eq!(report.lines.host_observed(), &[0x99, 0x01]);
    assert_eq!(report.state.source.value(), 0x01);
}

#[test]
fn configuration_failure_halts_startup() {
    let lines = SimulatedLines::new(PinMap::default(), HostScript::reads(1)).with_rejected_group("select");
    let err = configure_lines(lines, PinMap::default()).unwrap_err();
    assert!(matches!(err, LineError::Rejected { group: "select", .. }));
}

#[test]
fn configuration_leaves_lane_input_and_wait_not_ready() {
    let pins = PinMap::default();
    let lines = SimulatedLines::new(pins.clone(), HostScript::reads(1));
    let engine = BusCycleEngine::new(configure_lines(lines, pins).unwrap());
    assert_eq!(engine.direction(), Direction::Input);
    let sim = engine.lines();
    assert_eq!(sim.configured_groups(), &["data", "read_dir", "select", "wait", "interrupt", "button"]);
    assert!(!sim.lane_driven());
    assert!(!sim.wait_released());
}
