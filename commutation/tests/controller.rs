use std::cell::Cell;

use bldc_commutation::{
    commutate, AnalogSampler, BridgeConfiguration, CaptureState, ControllerConfig,
    DiagnosticSink, HallCode, HallInputs, MotorController, PowerStage, RotorSector, RunState,
    SinkError, TelemetryError, TelemetryReporter, TickCounter,
};

const PWM_PERIOD: u16 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum StageOp {
    Apply(BridgeConfiguration),
    Duty(u16),
    Enable(bool),
}

#[derive(Default)]
struct MockStage {
    ops: Vec<StageOp>,
}

impl MockStage {
    fn applied(&self) -> Vec<BridgeConfiguration> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                StageOp::Apply(cfg) => Some(*cfg),
                _ => None,
            })
            .collect()
    }

    fn last_duty(&self) -> Option<u16> {
        self.ops.iter().rev().find_map(|op| match op {
            StageOp::Duty(d) => Some(*d),
            _ => None,
        })
    }

    fn enabled(&self) -> bool {
        self.ops
            .iter()
            .rev()
            .find_map(|op| match op {
                StageOp::Enable(e) => Some(*e),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl PowerStage for MockStage {
    fn apply(&mut self, config: &BridgeConfiguration) {
        self.ops.push(StageOp::Apply(*config));
    }

    fn set_duty(&mut self, duty: u16) {
        self.ops.push(StageOp::Duty(duty));
    }

    fn set_output_enable(&mut self, enabled: bool) {
        self.ops.push(StageOp::Enable(enabled));
    }
}

struct MockHall {
    code: Cell<u8>,
}

impl HallInputs for MockHall {
    fn read(&self) -> HallCode {
        HallCode::new(self.code.get())
    }
}

#[derive(Default)]
struct MockCounter {
    count: u32,
    enabled: bool,
}

impl MockCounter {
    fn advance(&mut self, ticks: u32) {
        if self.enabled {
            self.count += ticks;
        }
    }
}

impl TickCounter for MockCounter {
    fn read(&self) -> u32 {
        self.count
    }

    fn restart(&mut self) {
        self.count = 0;
        self.enabled = true;
    }

    fn halt(&mut self) {
        self.count = 0;
        self.enabled = false;
    }
}

struct MockThrottle {
    raw: u16,
}

impl AnalogSampler for MockThrottle {
    fn latest(&self) -> u16 {
        self.raw
    }
}

type Controller = MotorController<MockHall, MockStage, MockCounter, MockThrottle>;

/// Forward Hall sequence, index = sector
const FORWARD: [u8; 6] = [0b101, 0b001, 0b011, 0b010, 0b110, 0b100];

fn controller(hall: u8, throttle: u16) -> Controller {
    let mut motor = MotorController::new(
        &ControllerConfig::default(),
        PWM_PERIOD,
        MockHall {
            code: Cell::new(hall),
        },
        MockStage::default(),
        MockCounter::default(),
        MockThrottle { raw: throttle },
    );
    motor.init();
    motor
}

fn edge(motor: &mut Controller, code: u8, ticks: u32) {
    motor.counter_mut().advance(ticks);
    motor.hall().code.set(code);
    motor.on_sector_change();
}

#[test]
fn test_init_leaves_bridge_idle() {
    let motor = controller(FORWARD[2], 0);
    let stage = motor.power_stage();

    assert_eq!(
        stage.ops,
        vec![
            StageOp::Enable(false),
            StageOp::Apply(BridgeConfiguration::ALL_DISABLED),
            StageOp::Duty(0),
        ]
    );
    assert_eq!(motor.run_state(), RunState::Stopped);
    assert_eq!(motor.sector(), RotorSector::S2);
}

#[test]
fn test_startup_closes_gate_applies_then_opens() {
    let mut motor = controller(FORWARD[3], 2_000);
    motor.power_stage_mut().ops.clear();

    motor.start();

    let ops = &motor.power_stage().ops;
    assert_eq!(ops.first(), Some(&StageOp::Enable(false)));
    assert_eq!(ops.last(), Some(&StageOp::Enable(true)));

    let apply_pos = ops
        .iter()
        .position(|op| *op == StageOp::Apply(commutate(RotorSector::S3)))
        .expect("sector configuration applied");
    let open_pos = ops.len() - 1;
    assert!(apply_pos < open_pos);
    assert!(ops[..apply_pos]
        .iter()
        .all(|op| *op != StageOp::Enable(true)));

    assert_eq!(motor.run_state(), RunState::Running);
    assert_eq!(motor.sector(), RotorSector::S3);
}

#[test]
fn test_running_follows_hall_sequence() {
    let mut motor = controller(FORWARD[0], 2_000);
    motor.start();
    motor.power_stage_mut().ops.clear();

    for step in 1..=12 {
        let sector = step % 6;
        edge(&mut motor, FORWARD[sector], 1_000);
        assert_eq!(motor.sector().index(), sector);
    }

    let applied = motor.power_stage().applied();
    assert_eq!(applied.len(), 12);
    for (i, cfg) in applied.iter().enumerate() {
        assert_eq!(*cfg, commutate(RotorSector::ALL[(i + 1) % 6]));
    }
}

#[test]
fn test_speed_capture_through_controller() {
    let mut motor = controller(FORWARD[0], 0);

    for (i, code) in FORWARD[1..4].iter().enumerate() {
        edge(&mut motor, *code, 1_000);
        let status = motor.status();
        assert_eq!(status.speed_sample, 1_000, "edge {}", i);
        assert_eq!(status.speed_rpm, 2_500);
        assert_eq!(status.capture, CaptureState::Running);
    }

    motor.on_capture_timeout();
    let status = motor.status();
    assert_eq!(status.speed_sample, 0);
    assert_eq!(status.speed_rpm, 0);
    assert_eq!(status.capture, CaptureState::Stopped);
    assert_eq!(status.capture_timeouts, 1);

    motor.counter_mut().advance(70_000);
    edge(&mut motor, FORWARD[4], 0);
    assert_eq!(motor.status().speed_sample, 0);

    edge(&mut motor, FORWARD[5], 500_000);
    assert_eq!(motor.status().speed_sample, 500_000);
    assert_eq!(motor.status().speed_rpm, 5);
}

#[test]
fn test_stopped_controller_coasts_without_touching_bridge() {
    let mut motor = controller(FORWARD[0], 4_095);
    motor.power_stage_mut().ops.clear();

    edge(&mut motor, FORWARD[1], 2_000);
    edge(&mut motor, FORWARD[2], 2_000);
    motor.on_pwm_period();

    assert_eq!(motor.sector(), RotorSector::S2);
    assert_eq!(motor.status().speed_sample, 2_000);
    assert!(motor.power_stage().applied().is_empty());
    assert_eq!(motor.power_stage().last_duty(), Some(0));
    assert_eq!(motor.status().duty, 0);
}

#[test]
fn test_pwm_period_tracks_throttle_while_running() {
    let mut motor = controller(FORWARD[0], 0);
    motor.start();

    motor.throttle_mut().raw = 4_095;
    motor.on_pwm_period();
    assert_eq!(motor.power_stage().last_duty(), Some(PWM_PERIOD));

    motor.throttle_mut().raw = 0;
    motor.on_pwm_period();
    assert_eq!(motor.power_stage().last_duty(), Some(0));
}

#[test]
fn test_stop_disables_everything() {
    let mut motor = controller(FORWARD[1], 3_000);
    motor.start();
    motor.on_pwm_period();
    motor.power_stage_mut().ops.clear();

    motor.stop();

    let stage = motor.power_stage();
    assert!(!stage.enabled());
    assert_eq!(stage.applied(), vec![BridgeConfiguration::ALL_DISABLED]);
    assert_eq!(stage.last_duty(), Some(0));
    assert_eq!(motor.status().duty, 0);
    assert_eq!(motor.run_state(), RunState::Stopped);
}

#[test]
fn test_throttle_hysteresis_drives_run_state() {
    let mut motor = controller(FORWARD[0], 0);

    // Filtered level ramps up towards 1000 and crosses the turn-on threshold.
    let mut started = false;
    for _ in 0..50 {
        if motor.update_throttle(1_000) == RunState::Running {
            started = true;
            break;
        }
    }
    assert!(started);
    assert!(motor.power_stage().enabled());

    // Inside the band nothing changes.
    for _ in 0..100 {
        assert_eq!(motor.update_throttle(150), RunState::Running);
    }

    let mut stopped = false;
    for _ in 0..100 {
        if motor.update_throttle(0) == RunState::Stopped {
            stopped = true;
            break;
        }
    }
    assert!(stopped);
    assert!(!motor.power_stage().enabled());
}

fn ramp_until(motor: &mut Controller, raw: u16, target: RunState) {
    for _ in 0..200 {
        if motor.update_throttle(raw) == target {
            return;
        }
    }
    panic!("run state never reached {:?}", target);
}

/// Gate closes first, the sector configuration is written, and only then the gate opens
fn assert_phase_before_gate(ops: &[StageOp], expected: BridgeConfiguration) {
    assert_eq!(ops.first(), Some(&StageOp::Enable(false)));
    let apply_pos = ops
        .iter()
        .position(|op| *op == StageOp::Apply(expected))
        .expect("sector configuration applied");
    let open_pos = ops
        .iter()
        .position(|op| *op == StageOp::Enable(true))
        .expect("gate opened");
    assert!(apply_pos < open_pos);
    assert_eq!(open_pos, ops.len() - 1);
}

#[test]
fn test_restart_reapplies_sector_reached_while_stopped() {
    let mut motor = controller(FORWARD[1], 0);

    ramp_until(&mut motor, 1_000, RunState::Running);
    assert_eq!(
        motor.power_stage().applied().last(),
        Some(&commutate(RotorSector::S1))
    );

    ramp_until(&mut motor, 0, RunState::Stopped);
    assert!(!motor.power_stage().enabled());

    // Rotor is pushed on by hand while the bridge is off.
    edge(&mut motor, FORWARD[2], 3_000);
    edge(&mut motor, FORWARD[3], 3_000);
    edge(&mut motor, FORWARD[4], 3_000);
    motor.power_stage_mut().ops.clear();

    ramp_until(&mut motor, 1_000, RunState::Running);

    let ops = &motor.power_stage().ops;
    assert_phase_before_gate(ops, commutate(RotorSector::S4));
    assert!(!ops.contains(&StageOp::Apply(commutate(RotorSector::S1))));
    assert_eq!(motor.sector(), RotorSector::S4);
}

#[test]
fn test_start_from_invalid_resting_code_uses_fallback_sector() {
    for code in [0b000, 0b111] {
        let mut motor = controller(code, 2_000);
        assert_eq!(motor.status().invalid_codes, 1);
        motor.power_stage_mut().ops.clear();

        motor.start();

        assert_phase_before_gate(&motor.power_stage().ops, commutate(RotorSector::S0));
        assert_eq!(motor.sector(), RotorSector::S0);
        assert_eq!(motor.status().invalid_codes, 2);
    }
}

#[test]
fn test_overflow_and_edge_serviced_together_both_take_effect() {
    let mut motor = controller(FORWARD[0], 2_000);
    motor.start();
    edge(&mut motor, FORWARD[1], 1_000);
    motor.power_stage_mut().ops.clear();

    // One interrupt with both flags pending: overflow first, then the edge.
    motor.on_capture_timeout();
    edge(&mut motor, FORWARD[2], 0);

    let status = motor.status();
    assert_eq!(status.capture_timeouts, 1);
    assert_eq!(status.sector, RotorSector::S2);
    assert_eq!(status.speed_sample, 0);
    assert_eq!(
        motor.power_stage().applied(),
        vec![commutate(RotorSector::S2)]
    );
}

#[test]
fn test_invalid_codes_fall_back_and_are_counted() {
    let mut motor = controller(FORWARD[2], 0);
    motor.start();

    edge(&mut motor, 0b111, 1_000);
    assert_eq!(motor.sector(), RotorSector::S0);
    edge(&mut motor, 0b000, 1_000);

    let status = motor.status();
    assert_eq!(status.invalid_codes, 2);
    assert_eq!(
        motor.power_stage().applied().last(),
        Some(&commutate(RotorSector::S0))
    );
}

#[test]
fn test_stall_flag() {
    let mut motor = controller(FORWARD[0], 2_000);
    motor.start();
    motor.on_capture_timeout();
    assert!(motor.status().is_stalled());

    edge(&mut motor, FORWARD[1], 0);
    assert!(!motor.status().is_stalled());
}

#[derive(Default)]
struct MockSink {
    lines: Vec<String>,
    fail: bool,
}

impl DiagnosticSink for MockSink {
    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError);
        }
        self.lines.push(line.to_string());
        Ok(())
    }
}

#[test]
fn test_telemetry_reports_controller_status() {
    let mut motor = controller(FORWARD[0], 4_095);
    motor.start();
    edge(&mut motor, FORWARD[1], 1_000);
    motor.on_pwm_period();

    let mut reporter = TelemetryReporter::new(MockSink::default());
    reporter.report(&motor.status()).unwrap();

    motor.stop();
    motor.on_capture_timeout();
    reporter.report(&motor.status()).unwrap();

    assert_eq!(
        reporter.sink().lines,
        vec![
            "speed=2500 rpm sector=1 duty=1000 run=on\r\n".to_string(),
            "speed=0 rpm sector=1 duty=0 run=off\r\n".to_string(),
        ]
    );
    assert_eq!(reporter.sent(), 2);
}

#[test]
fn test_telemetry_sink_failure_is_dropped() {
    let motor = controller(FORWARD[0], 0);
    let mut reporter = TelemetryReporter::new(MockSink {
        fail: true,
        ..Default::default()
    });

    assert_eq!(
        reporter.report(&motor.status()),
        Err(TelemetryError::Sink(SinkError))
    );
    assert_eq!(reporter.dropped(), 1);
    assert_eq!(reporter.sent(), 0);
}
