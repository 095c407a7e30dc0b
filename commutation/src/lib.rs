//! Sensored BLDC six-step commutation
//!
//! Hardware-independent core of the `bldc-sensored` firmware: Hall decoding, the
//! commutation table, speed capture, throttle mapping and the controller that ties them to
//! a power stage through small adapter traits.

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod config;
pub mod controller;
pub mod duty;
pub mod hall;
pub mod run_state;
pub mod six_step;
pub mod speed;
pub mod telemetry;

pub use config::{ConfigError, ControllerConfig};
pub use controller::{AnalogSampler, HallInputs, MotorController, MotorStatus, PowerStage};
pub use duty::{DutyMapper, ADC_MAX};
pub use hall::{decode, HallCode, RotorSector};
pub use run_state::{RunGate, RunState, ThrottleFilter};
pub use six_step::{commutate, BridgeConfiguration, GateDrive, LegMode, OutputReference};
pub use speed::{CaptureState, SpeedCapture, TickCounter};
pub use telemetry::{DiagnosticSink, SinkError, TelemetryError, TelemetryReporter};
