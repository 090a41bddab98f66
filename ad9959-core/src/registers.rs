use thiserror::Error;

/// The register address is not part of the AD9959 map.
///
/// Surfacing this error means an internal invariant was broken; correct use
/// of the crate never produces it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown register address {0:#04X}")]
pub struct UnknownRegister(pub u8);

/// The AD9959 register map.
///
/// `CW1`..`CW15` are the profile tuning words; only `CW1` is used by the
/// two-level sweep feature (it holds the sweep end point).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// Channel select register.
    CSR = 0x00,
    /// Function register 1 (VCO, multiplier, modulation level).
    FR1 = 0x01,
    /// Function register 2.
    FR2 = 0x02,
    /// Channel function register (AFP select, sweep enable, current divider).
    CFR = 0x03,
    /// Channel frequency tuning word 0 (sweep start point for frequency).
    CFTW0 = 0x04,
    /// Channel phase offset word 0.
    CPOW0 = 0x05,
    /// Amplitude control register (sweep start point for amplitude).
    ACR = 0x06,
    /// Linear sweep ramp rate (falling byte, then rising byte).
    LSR = 0x07,
    /// Rising delta word.
    RDW = 0x08,
    /// Falling delta word.
    FDW = 0x09,
    /// Channel word 1 (sweep end point).
    CW1 = 0x0A,
    CW2 = 0x0B,
    CW3 = 0x0C,
    CW4 = 0x0D,
    CW5 = 0x0E,
    CW6 = 0x0F,
    CW7 = 0x10,
    CW8 = 0x11,
    CW9 = 0x12,
    CW10 = 0x13,
    CW11 = 0x14,
    CW12 = 0x15,
    CW13 = 0x16,
    CW14 = 0x17,
    CW15 = 0x18,
}

impl Register {
    const ALL: [Register; 25] = [
        Register::CSR,
        Register::FR1,
        Register::FR2,
        Register::CFR,
        Register::CFTW0,
        Register::CPOW0,
        Register::ACR,
        Register::LSR,
        Register::RDW,
        Register::FDW,
        Register::CW1,
        Register::CW2,
        Register::CW3,
        Register::CW4,
        Register::CW5,
        Register::CW6,
        Register::CW7,
        Register::CW8,
        Register::CW9,
        Register::CW10,
        Register::CW11,
        Register::CW12,
        Register::CW13,
        Register::CW14,
        Register::CW15,
    ];

    /// The serial address of the register.
    #[must_use]
    pub const fn address(self) -> u8 {
        self as u8
    }

    /// The declared width of the register in bytes.
    ///
    /// Every bus transaction transfers exactly this many bytes.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Register::CSR => 1,
            Register::FR2 | Register::CPOW0 | Register::LSR => 2,
            Register::FR1 | Register::CFR | Register::ACR => 3,
            _ => 4,
        }
    }

    #[doc(hidden)]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        false
    }

    /// Resolves a serial address back to its register.
    pub fn from_address(address: u8) -> Result<Self, UnknownRegister> {
        Self::ALL
            .into_iter()
            .find(|r| r.address() == address)
            .ok_or(UnknownRegister(address))
    }
}
