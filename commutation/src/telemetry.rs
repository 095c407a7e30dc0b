//! One-way diagnostic text output
//!
//! Line format: `speed=<rpm> rpm sector=<n> duty=<d> run=<on|off>\r\n`

use core::fmt::{self, Write};

use heapless::String;

use crate::controller::MotorStatus;

/// Capacity of one formatted line
pub const LINE_CAPACITY: usize = 80;

/// Formatted telemetry line
pub type TelemetryLine = String<LINE_CAPACITY>;

/// The sink could not accept the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkError;

/// Bounded text output (UART on the board)
pub trait DiagnosticSink {
    fn write_line(&mut self, line: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// The line did not fit into its buffer
    Overflow,
    Sink(SinkError),
}

impl From<SinkError> for TelemetryError {
    fn from(err: SinkError) -> Self {
        TelemetryError::Sink(err)
    }
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Overflow => write!(f, "telemetry line overflow"),
            TelemetryError::Sink(_) => write!(f, "diagnostic sink rejected line"),
        }
    }
}

/// Render a status snapshot into `line`
pub fn format_line<const N: usize>(
    status: &MotorStatus,
    line: &mut String<N>,
) -> Result<(), TelemetryError> {
    line.clear();
    write!(
        line,
        "speed={} rpm sector={} duty={} run={}\r\n",
        status.speed_rpm,
        status.sector.index(),
        status.duty,
        if status.run.is_running() { "on" } else { "off" }
    )
    .map_err(|_| TelemetryError::Overflow)
}

/// Periodic speed reporter
///
/// Failed lines are dropped and counted; they never propagate into the control paths.
pub struct TelemetryReporter<S> {
    sink: S,
    line: TelemetryLine,
    sent: u32,
    dropped: u32,
}

impl<S: DiagnosticSink> TelemetryReporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            line: String::new(),
            sent: 0,
            dropped: 0,
        }
    }

    /// Format and emit one line
    ///
    /// # Returns
    /// The error that caused the line to be dropped, if any
    pub fn report(&mut self, status: &MotorStatus) -> Result<(), TelemetryError> {
        let result = format_line(status, &mut self.line)
            .and_then(|_| self.sink.write_line(self.line.as_str()).map_err(Into::into));

        match result {
            Ok(()) => self.sent = self.sent.wrapping_add(1),
            Err(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Telemetry line dropped: {}", e);
            }
        }
        result
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
