// Hall sensor position decoding for six-step commutation

/// Raw Hall sensor reading
///
/// Bit layout: `(H3 << 2) | (H2 << 1) | H1`. Only the lower three bits are significant.
/// The all-low (`0b000`) and all-high (`0b111`) patterns cannot occur with sensors spaced
/// 120° apart and are treated as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HallCode(u8);

impl HallCode {
    /// Build a code from a raw value; bits above bit 2 are discarded
    pub const fn new(raw: u8) -> Self {
        Self(raw & 0b111)
    }

    /// Build a code from the three sensor levels
    pub const fn from_levels(h1: bool, h2: bool, h3: bool) -> Self {
        Self(((h3 as u8) << 2) | ((h2 as u8) << 1) | h1 as u8)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// `true` for the six patterns reachable in normal operation
    pub const fn is_valid(self) -> bool {
        self.0 != 0b000 && self.0 != 0b111
    }
}

/// One of the six 60° electrical sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RotorSector {
    S0 = 0,
    S1 = 1,
    S2 = 2,
    S3 = 3,
    S4 = 4,
    S5 = 5,
}

impl RotorSector {
    /// All sectors in forward rotation order
    pub const ALL: [RotorSector; 6] = [
        RotorSector::S0,
        RotorSector::S1,
        RotorSector::S2,
        RotorSector::S3,
        RotorSector::S4,
        RotorSector::S5,
    ];

    /// Sector index (0-5)
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Next sector in forward rotation
    pub const fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % 6]
    }
}

/// Sector reported for the two invalid Hall codes
pub const FALLBACK_SECTOR: RotorSector = RotorSector::S0;

/// Hall code to sector mapping, indexed by the raw 3-bit code
///
/// Forward rotation walks 101 → 001 → 011 → 010 → 110 → 100, one sensor edge per step.
const HALL_SECTOR_TABLE: [RotorSector; 8] = [
    FALLBACK_SECTOR, // 0b000: invalid
    RotorSector::S1, // 0b001
    RotorSector::S3, // 0b010
    RotorSector::S2, // 0b011
    RotorSector::S5, // 0b100
    RotorSector::S0, // 0b101
    RotorSector::S4, // 0b110
    FALLBACK_SECTOR, // 0b111: invalid
];

/// Map a Hall reading to its rotor sector
///
/// Constant-time lookup, safe to call from interrupt context. Invalid codes resolve to
/// [`FALLBACK_SECTOR`].
#[inline(always)]
pub fn decode(code: HallCode) -> RotorSector {
    HALL_SECTOR_TABLE[code.bits() as usize]
}
