//! Sector-to-sector speed capture
//!
//! A free-running counter is restarted on every Hall transition. The value it held just
//! before the restart is the number of ticks the rotor spent in the previous sector. If the
//! counter overflows before the next transition the rotor is considered stopped.

/// Sentinel sample meaning "no rotation observed within the capture window"
pub const STOPPED_SAMPLE: u32 = 0;

/// Hall transitions per pole for three sensors 120° apart
pub const TRANSITIONS_PER_POLE: u32 = 3;

/// Free-running tick counter used for speed capture
pub trait TickCounter {
    /// Ticks counted since the last restart
    ///
    /// Must return 0 while the counter is halted. The first transition after a capture
    /// timeout (or before the counter was ever started) therefore reports
    /// [`STOPPED_SAMPLE`]; a real interval only appears from the second transition on.
    fn read(&self) -> u32;

    /// Reset the count to zero and make sure the counter runs
    fn restart(&mut self);

    /// Stop counting and clear the count
    fn halt(&mut self);
}

/// Capture state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureState {
    /// A transition was seen within the capture window
    Running,
    /// The counter overflowed without a transition
    Stopped,
}

/// Speed capture between Hall transitions
#[derive(Debug, Clone, Copy)]
pub struct SpeedCapture {
    state: CaptureState,
    sample: u32,
    timeouts: u32,
}

impl SpeedCapture {
    pub const fn new() -> Self {
        Self {
            state: CaptureState::Stopped,
            sample: STOPPED_SAMPLE,
            timeouts: 0,
        }
    }

    /// Clear the last sample and start the capture window without waiting for a first
    /// transition
    pub fn arm<C: TickCounter>(&mut self, counter: &mut C) {
        self.sample = STOPPED_SAMPLE;
        self.state = CaptureState::Stopped;
        counter.restart();
    }

    /// Sector transition: latch the elapsed ticks and restart the window
    #[inline(always)]
    pub fn on_transition<C: TickCounter>(&mut self, counter: &mut C) -> u32 {
        let ticks = counter.read();
        counter.restart();

        self.sample = ticks;
        self.state = CaptureState::Running;
        ticks
    }

    /// Counter overflow without a transition: the rotor is stalled
    pub fn on_overflow<C: TickCounter>(&mut self, counter: &mut C) {
        counter.halt();

        if self.state == CaptureState::Running {
            debug!("Speed capture timeout, last sample {} ticks", self.sample);
        }
        self.sample = STOPPED_SAMPLE;
        self.state = CaptureState::Stopped;
        self.timeouts = self.timeouts.wrapping_add(1);
    }

    /// Ticks between the two most recent transitions, `STOPPED_SAMPLE` when stalled
    pub fn sample(&self) -> u32 {
        self.sample
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Number of capture timeouts since boot
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }
}

impl Default for SpeedCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Mechanical speed from a capture sample
///
/// `rpm = 60 / (poles × 3 × tick_duration × sample)` with `tick_duration = 1 / tick_hz`.
/// A stopped sample reports 0. The result is truncated to whole revolutions per minute.
///
/// # Arguments
/// * `sample` - Ticks between two Hall transitions
/// * `poles` - Rotor pole count (not pole pairs)
/// * `tick_hz` - Capture counter frequency
pub fn rpm(sample: u32, poles: u8, tick_hz: u32) -> u32 {
    if sample == STOPPED_SAMPLE || poles == 0 {
        return 0;
    }

    let transitions_per_rev = poles as u64 * TRANSITIONS_PER_POLE as u64;
    let rpm = (60 * tick_hz as u64) / (transitions_per_rev * sample as u64);
    rpm.min(u32::MAX as u64) as u32
}
