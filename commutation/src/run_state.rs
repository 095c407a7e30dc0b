//! Throttle smoothing and run/stop hysteresis

/// On/off state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    Stopped,
    Running,
}

impl RunState {
    pub fn is_running(self) -> bool {
        self == RunState::Running
    }
}

/// Exponential moving average of the raw throttle sample
///
/// `filtered = α × raw + (1 − α) × filtered_prev`
#[derive(Debug, Clone, Copy)]
pub struct ThrottleFilter {
    alpha: f32,
    value: f32,
}

impl ThrottleFilter {
    pub const fn new(alpha: f32) -> Self {
        Self { alpha, value: 0.0 }
    }

    /// Seed the filter with a first sample so start-up does not ramp from zero
    pub fn initialize(&mut self, raw: u16) {
        self.value = raw as f32;
    }

    /// Feed one raw sample and return the filtered level
    pub fn update(&mut self, raw: u16) -> u16 {
        self.value = self.alpha * raw as f32 + (1.0 - self.alpha) * self.value;
        self.level()
    }

    /// Current filtered level, rounded to the nearest count
    pub fn level(&self) -> u16 {
        let rounded = self.value + 0.5;
        if rounded <= 0.0 {
            0
        } else if rounded >= u16::MAX as f32 {
            u16::MAX
        } else {
            rounded as u16
        }
    }
}

/// Hysteresis comparator deciding run/stop from the filtered throttle level
///
/// Turns on when the level rises strictly above `on_threshold`, off when it falls strictly
/// below `off_threshold`. Levels in between keep the current state.
#[derive(Debug, Clone, Copy)]
pub struct RunGate {
    on_threshold: u16,
    off_threshold: u16,
    state: RunState,
}

impl RunGate {
    pub const fn new(on_threshold: u16, off_threshold: u16) -> Self {
        Self {
            on_threshold,
            off_threshold,
            state: RunState::Stopped,
        }
    }

    /// Evaluate one filtered level
    ///
    /// # Returns
    /// The run state after this level
    pub fn update(&mut self, level: u16) -> RunState {
        let next = match self.state {
            RunState::Stopped if level > self.on_threshold => RunState::Running,
            RunState::Running if level < self.off_threshold => RunState::Stopped,
            current => current,
        };

        if next != self.state {
            info!(
                "Throttle {} crossed threshold: running={}",
                level,
                next.is_running()
            );
            self.state = next;
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_turns_on_only_above_high_threshold() {
        let mut gate = RunGate::new(200, 100);
        assert_eq!(gate.update(150), RunState::Stopped);
        assert_eq!(gate.update(200), RunState::Stopped);
        assert_eq!(gate.update(201), RunState::Running);
    }

    #[test]
    fn test_gate_turns_off_only_below_low_threshold() {
        let mut gate = RunGate::new(200, 100);
        gate.update(300);
        assert_eq!(gate.update(150), RunState::Running);
        assert_eq!(gate.update(100), RunState::Running);
        assert_eq!(gate.update(99), RunState::Stopped);
    }

    #[test]
    fn test_gate_holds_inside_band() {
        let mut gate = RunGate::new(200, 100);
        for level in [120, 180, 199, 101] {
            assert_eq!(gate.update(level), RunState::Stopped);
        }
        gate.update(250);
        for level in [199, 101, 150, 200] {
            assert_eq!(gate.update(level), RunState::Running);
        }
    }

    #[test]
    fn test_filter_converges_to_input() {
        let mut filter = ThrottleFilter::new(0.1);
        let mut level = 0;
        for _ in 0..200 {
            level = filter.update(1000);
        }
        assert_eq!(level, 1000);
    }

    #[test]
    fn test_filter_first_step_is_alpha_weighted() {
        let mut filter = ThrottleFilter::new(0.1);
        assert_eq!(filter.update(1000), 100);

        let mut seeded = ThrottleFilter::new(0.1);
        seeded.initialize(1000);
        assert_eq!(seeded.update(1000), 1000);
    }
}
