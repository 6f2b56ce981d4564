//! OPL3 Register Definitions
//!
//! The OPL3 exposes two register sets of 256 entries each. Set #1 lives at
//! 0x000-0x0FF, set #2 at 0x100-0x1FF. Only the global control registers are
//! named here; operator and channel registers are addressed numerically.

use crate::backend::{BankMode, OplBackend};
use bitflags::bitflags;
use std::fmt;

/// Number of addressable registers across both sets
pub const REGISTER_SPACE: usize = 0x200;

/// OPL3 global control register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// LSI test / waveform select enable - 0x01
    Test = 0x01,
    /// Timer 1 preset - 0x02
    Timer1 = 0x02,
    /// Timer 2 preset - 0x03
    Timer2 = 0x03,
    /// Timer control and IRQ reset - 0x04
    TimerControl = 0x04,
    /// Keyboard split / CSM - 0x08
    KeySplit = 0x08,
    /// AM/VIB depth and rhythm control - 0xBD
    Rhythm = 0xBD,
    /// 4-operator connection select - 0x104
    FourOpEnable = 0x104,
    /// OPL3 mode enable - 0x105
    Mode = 0x105,
}

impl Register {
    /// Convert a raw 9-bit address to a named global register
    pub fn from_addr(addr: u16) -> Option<Self> {
        match addr & 0x1FF {
            0x001 => Some(Register::Test),
            0x002 => Some(Register::Timer1),
            0x003 => Some(Register::Timer2),
            0x004 => Some(Register::TimerControl),
            0x008 => Some(Register::KeySplit),
            0x0BD => Some(Register::Rhythm),
            0x104 => Some(Register::FourOpEnable),
            0x105 => Some(Register::Mode),
            _ => None,
        }
    }

    /// Get the register address value
    pub fn addr(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::Test => "test",
            Register::Timer1 => "timer 1",
            Register::Timer2 => "timer 2",
            Register::TimerControl => "timer control",
            Register::KeySplit => "keyboard split",
            Register::Rhythm => "rhythm",
            Register::FourOpEnable => "4-op enable",
            Register::Mode => "mode",
        };
        write!(f, "{name} (0x{:03X})", self.addr())
    }
}

bitflags! {
    /// Mode register (0x105) bitflags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModeFlags: u8 {
        /// OPL3 mode enable
        const NEW = 0x01;
        /// OPL4 extension enable (ignored by OPL3 silicon)
        const NEW2 = 0x02;
    }
}

impl ModeFlags {
    /// Addressing mode implied by these flags
    pub fn bank_mode(&self) -> BankMode {
        if self.contains(ModeFlags::NEW) {
            BankMode::Opl3
        } else {
            BankMode::Opl2
        }
    }
}

/// Register-tracking OPL3 backend
///
/// Records every register write and derives the addressing mode from
/// register 0x105 the same way the silicon does, but renders silence. Useful
/// for bringing up the audio path before a synthesis engine is wired in, and
/// as a reference for backends that need to report [`BankMode`].
#[derive(Clone)]
pub struct RegisterShadow {
    regs: [u8; REGISTER_SPACE],
    mode: ModeFlags,
    sample_rate: u32,
    writes: u64,
}

impl RegisterShadow {
    /// Create a shadow in its power-on state
    pub fn new() -> Self {
        RegisterShadow {
            regs: [0; REGISTER_SPACE],
            mode: ModeFlags::empty(),
            sample_rate: 0,
            writes: 0,
        }
    }

    /// Read back the last value written to a register
    pub fn read(&self, register: u16) -> u8 {
        self.regs[(register & 0x1FF) as usize]
    }

    /// Current mode register flags
    pub fn mode(&self) -> ModeFlags {
        self.mode
    }

    /// Sample rate passed to the last reset (0 before the first reset)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of register writes since the last reset
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl Default for RegisterShadow {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegisterShadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterShadow")
            .field("mode", &self.mode)
            .field("sample_rate", &self.sample_rate)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl OplBackend for RegisterShadow {
    fn reset(&mut self, sample_rate: u32) {
        self.regs = [0; REGISTER_SPACE];
        self.mode = ModeFlags::empty();
        self.sample_rate = sample_rate;
        self.writes = 0;
    }

    fn write_register(&mut self, register: u16, value: u8) {
        let register = register & 0x1FF;
        self.regs[register as usize] = value;
        self.writes += 1;

        if Register::from_addr(register) == Some(Register::Mode) {
            self.mode = ModeFlags::from_bits_truncate(value);
        }
    }

    fn generate_period(&mut self, buffer: &mut [i16], _frames: usize) {
        buffer.fill(0);
    }

    fn bank_mode(&self) -> BankMode {
        self.mode.bank_mode()
    }
}
