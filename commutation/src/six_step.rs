//! Six-step commutation table
//!
//! Every sector drives all three legs. One leg chops its high-side switch at the commanded
//! duty, the other two are held at opposite rails through their complementary pair. The
//! PWM leg stays on the same phase for two consecutive sectors while the forced legs swap
//! rails between them, so a leg is never left floating while the motor runs.

use crate::hall::RotorSector;

/// Drive mode of one half-bridge leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LegMode {
    /// High-side switch chopped at the commanded duty, low-side output held inactive
    PwmHigh,
    /// High-side switch held on, low-side off
    ForcedHigh,
    /// Low-side switch held on, high-side off
    ForcedLow,
    /// Both switches off (idle and stop only)
    Disabled,
}

/// Output reference the timer channel generates for a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputReference {
    /// Active while the counter is below the compare value
    Pwm,
    ForceActive,
    ForceInactive,
}

/// Gate-level description of a leg: the channel reference plus which outputs are enabled
///
/// The high-side output follows the reference, the low-side output its complement with
/// dead time inserted on every reference edge. With both outputs enabled the pair is
/// complementary, so a forced leg can change rail without a shoot-through window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GateDrive {
    pub reference: OutputReference,
    pub high_output: bool,
    pub low_output: bool,
}

impl LegMode {
    /// Translate the mode into the gate descriptor the power-stage adapter programs
    pub const fn gate_drive(self) -> GateDrive {
        match self {
            LegMode::PwmHigh => GateDrive {
                reference: OutputReference::Pwm,
                high_output: true,
                low_output: false,
            },
            LegMode::ForcedHigh => GateDrive {
                reference: OutputReference::ForceActive,
                high_output: true,
                low_output: true,
            },
            LegMode::ForcedLow => GateDrive {
                reference: OutputReference::ForceInactive,
                high_output: true,
                low_output: true,
            },
            LegMode::Disabled => GateDrive {
                reference: OutputReference::ForceInactive,
                high_output: false,
                low_output: false,
            },
        }
    }

    /// The high-side switch conducts for at least part of the PWM period
    pub const fn drives_high_side(self) -> bool {
        matches!(self, LegMode::PwmHigh | LegMode::ForcedHigh)
    }

    /// The low-side switch conducts for at least part of the PWM period
    pub const fn drives_low_side(self) -> bool {
        matches!(self, LegMode::ForcedLow)
    }

    pub const fn is_forced(self) -> bool {
        matches!(self, LegMode::ForcedHigh | LegMode::ForcedLow)
    }
}

/// Switching pattern of the three legs (A, B, C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfiguration {
    pub legs: [LegMode; 3],
}

impl BridgeConfiguration {
    /// Every leg off
    pub const ALL_DISABLED: Self = Self {
        legs: [LegMode::Disabled; 3],
    };

    const fn new(a: LegMode, b: LegMode, c: LegMode) -> Self {
        Self { legs: [a, b, c] }
    }

    /// Number of legs whose high-side switch conducts
    pub fn high_sides(&self) -> usize {
        self.legs.iter().filter(|l| l.drives_high_side()).count()
    }

    /// Number of legs whose low-side switch conducts
    pub fn low_sides(&self) -> usize {
        self.legs.iter().filter(|l| l.drives_low_side()).count()
    }
}

/// Commutation table indexed by sector
///
/// | sector | A | B | C |
/// |---|---|---|---|
/// | 0 | PWM | low | high |
/// | 1 | PWM | high | low |
/// | 2 | high | PWM | low |
/// | 3 | low | PWM | high |
/// | 4 | low | high | PWM |
/// | 5 | high | low | PWM |
pub const COMMUTATION_TABLE: [BridgeConfiguration; 6] = [
    BridgeConfiguration::new(LegMode::PwmHigh, LegMode::ForcedLow, LegMode::ForcedHigh),
    BridgeConfiguration::new(LegMode::PwmHigh, LegMode::ForcedHigh, LegMode::ForcedLow),
    BridgeConfiguration::new(LegMode::ForcedHigh, LegMode::PwmHigh, LegMode::ForcedLow),
    BridgeConfiguration::new(LegMode::ForcedLow, LegMode::PwmHigh, LegMode::ForcedHigh),
    BridgeConfiguration::new(LegMode::ForcedLow, LegMode::ForcedHigh, LegMode::PwmHigh),
    BridgeConfiguration::new(LegMode::ForcedHigh, LegMode::ForcedLow, LegMode::PwmHigh),
];

/// Switching pattern for a sector
#[inline(always)]
pub fn commutate(sector: RotorSector) -> BridgeConfiguration {
    COMMUTATION_TABLE[sector.index()]
}
