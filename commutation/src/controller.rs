//! Six-step commutation controller
//!
//! Owns the controller state and the hardware adapters. The firmware drives it from three
//! event sources: Hall edges ([`MotorController::on_sector_change`]), the PWM period
//! ([`MotorController::on_pwm_period`]) and the capture-counter overflow
//! ([`MotorController::on_capture_timeout`]). Throttle samples feed the run/stop decision
//! through [`MotorController::update_throttle`].
//!
//! Every handler runs to completion on `&mut self`, so callers sharing the controller
//! between interrupts must serialize access (the firmware uses a critical-section mutex).

use crate::config::ControllerConfig;
use crate::duty::DutyMapper;
use crate::hall::{decode, HallCode, RotorSector};
use crate::run_state::{RunGate, RunState, ThrottleFilter};
use crate::six_step::{commutate, BridgeConfiguration};
use crate::speed::{self, CaptureState, SpeedCapture, TickCounter};

/// Three Hall sensor inputs
pub trait HallInputs {
    /// Sample the current sensor levels
    fn read(&self) -> HallCode;
}

/// Three-phase bridge driven by one PWM timer
pub trait PowerStage {
    /// Program all three legs at once; the new pattern must take effect atomically
    fn apply(&mut self, config: &BridgeConfiguration);

    /// Compare value shared by every PWM-modulated leg
    fn set_duty(&mut self, duty: u16);

    /// Master output-enable gate; when closed every gate driver output is inactive
    fn set_output_enable(&mut self, enabled: bool);
}

/// Non-blocking access to the most recent throttle conversion
pub trait AnalogSampler {
    fn latest(&self) -> u16;
}

/// Snapshot of the controller for diagnostics and telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorStatus {
    pub sector: RotorSector,
    /// Ticks between the two most recent Hall transitions (0 = stopped)
    pub speed_sample: u32,
    pub speed_rpm: u32,
    pub duty: u16,
    pub run: RunState,
    pub capture: CaptureState,
    /// Invalid Hall codes (000/111) seen since boot
    pub invalid_codes: u32,
    /// Capture-counter overflows since boot
    pub capture_timeouts: u32,
}

impl MotorStatus {
    /// The bridge is energized but the rotor is not turning
    pub fn is_stalled(&self) -> bool {
        self.run.is_running() && self.capture == CaptureState::Stopped
    }
}

pub struct MotorController<H, P, C, A> {
    hall: H,
    stage: P,
    counter: C,
    throttle: A,

    mapper: DutyMapper,
    filter: ThrottleFilter,
    gate: RunGate,
    poles: u8,
    tick_hz: u32,

    sector: RotorSector,
    speed: SpeedCapture,
    duty: u16,
    run: RunState,
    invalid_codes: u32,
}

impl<H, P, C, A> MotorController<H, P, C, A>
where
    H: HallInputs,
    P: PowerStage,
    C: TickCounter,
    A: AnalogSampler,
{
    /// Build a controller around the hardware adapters
    ///
    /// Nothing is written to the hardware until [`Self::init`] is called.
    ///
    /// # Arguments
    /// * `config` - Validated controller parameters
    /// * `pwm_period` - Compare value of 100 % duty on the power stage timer
    pub fn new(
        config: &ControllerConfig,
        pwm_period: u16,
        hall: H,
        stage: P,
        counter: C,
        throttle: A,
    ) -> Self {
        Self {
            hall,
            stage,
            counter,
            throttle,
            mapper: DutyMapper::new(pwm_period, config.adc_max),
            filter: ThrottleFilter::new(config.filter_alpha),
            gate: RunGate::new(config.on_threshold, config.off_threshold),
            poles: config.poles,
            tick_hz: config.tick_hz,
            sector: RotorSector::S0,
            speed: SpeedCapture::new(),
            duty: 0,
            run: RunState::Stopped,
            invalid_codes: 0,
        }
    }

    /// Put the power stage into its safe idle state and arm speed capture
    ///
    /// Gate closed, every leg disabled, duty 0. The sector is read once from the sensors so
    /// telemetry is meaningful before the first edge.
    pub fn init(&mut self) {
        self.stage.set_output_enable(false);
        self.stage.apply(&BridgeConfiguration::ALL_DISABLED);
        self.stage.set_duty(0);
        self.duty = 0;
        self.run = RunState::Stopped;

        self.sector = self.sample_sector();
        self.filter.initialize(self.throttle.latest());
        self.speed.arm(&mut self.counter);

        info!("Commutation controller idle, sector {}", self.sector.index());
    }

    /// Startup sequence: outputs off, commutate from the static sensor reading, gate on
    pub fn start(&mut self) {
        if self.run.is_running() {
            return;
        }

        self.stage.set_output_enable(false);
        self.stage.apply(&BridgeConfiguration::ALL_DISABLED);

        self.sector = self.sample_sector();
        self.duty = self.mapper.map(self.throttle.latest());
        self.stage.set_duty(self.duty);
        self.stage.apply(&commutate(self.sector));

        self.run = RunState::Running;
        self.stage.set_output_enable(true);

        info!(
            "Motor start: sector {}, duty {}/{}",
            self.sector.index(),
            self.duty,
            self.mapper.pwm_period()
        );
    }

    /// Close the gate, disable every leg and force duty 0
    pub fn stop(&mut self) {
        self.stage.set_output_enable(false);
        self.stage.apply(&BridgeConfiguration::ALL_DISABLED);
        self.stage.set_duty(0);
        self.duty = 0;

        if self.run.is_running() {
            info!("Motor stop");
        }
        self.run = RunState::Stopped;
    }

    pub fn set_run_state(&mut self, state: RunState) {
        match state {
            RunState::Running => self.start(),
            RunState::Stopped => self.stop(),
        }
    }

    /// Feed one raw throttle sample through the filter and the hysteresis gate
    ///
    /// # Returns
    /// Run state after the sample
    pub fn update_throttle(&mut self, raw: u16) -> RunState {
        let level = self.filter.update(raw);
        let requested = self.gate.update(level);
        if requested != self.run {
            self.set_run_state(requested);
        }
        self.run
    }

    /// Hall edge: decode, commutate, capture speed
    ///
    /// While stopped the sector and speed keep tracking a coasting rotor, but the bridge is
    /// left untouched.
    #[inline(always)]
    pub fn on_sector_change(&mut self) {
        self.sector = self.sample_sector();
        let ticks = self.speed.on_transition(&mut self.counter);

        if self.run.is_running() {
            self.stage.apply(&commutate(self.sector));
        }

        trace!("Hall edge: sector {}, {} ticks", self.sector.index(), ticks);
    }

    /// Capture counter overflowed without a Hall edge
    pub fn on_capture_timeout(&mut self) {
        self.speed.on_overflow(&mut self.counter);
    }

    /// PWM period: refresh the duty of the modulated legs from the throttle
    #[inline(always)]
    pub fn on_pwm_period(&mut self) {
        self.duty = if self.run.is_running() {
            self.mapper.map(self.throttle.latest())
        } else {
            0
        };
        self.stage.set_duty(self.duty);
    }

    pub fn status(&self) -> MotorStatus {
        MotorStatus {
            sector: self.sector,
            speed_sample: self.speed.sample(),
            speed_rpm: speed::rpm(self.speed.sample(), self.poles, self.tick_hz),
            duty: self.duty,
            run: self.run,
            capture: self.speed.state(),
            invalid_codes: self.invalid_codes,
            capture_timeouts: self.speed.timeouts(),
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn sector(&self) -> RotorSector {
        self.sector
    }

    pub fn hall(&self) -> &H {
        &self.hall
    }

    pub fn power_stage(&self) -> &P {
        &self.stage
    }

    pub fn power_stage_mut(&mut self) -> &mut P {
        &mut self.stage
    }

    pub fn counter_mut(&mut self) -> &mut C {
        &mut self.counter
    }

    pub fn throttle_mut(&mut self) -> &mut A {
        &mut self.throttle
    }

    fn sample_sector(&mut self) -> RotorSector {
        let code = self.hall.read();
        if !code.is_valid() {
            self.invalid_codes = self.invalid_codes.wrapping_add(1);
            warn!("Invalid Hall code {=u8:#b}", code.bits());
        }
        decode(code)
    }
}
