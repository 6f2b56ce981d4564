//! Backend trait abstraction for OPL synthesis engines
//!
//! The bridge never computes FM waveforms itself. It forwards register writes
//! to an engine implementing [`OplBackend`] and asks that engine for one
//! period of interleaved PCM at a time.

/// Register addressing mode currently active inside the chip
///
/// OPL3 chips power up in OPL2-compatible mode. Software switches to OPL3
/// mode by setting bit 0 (`NEW`) of register 0x105, which makes the second
/// register set (0x100-0x1FF) reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BankMode {
    /// OPL2 compatibility mode: only register 0x105 is reachable in the upper bank
    #[default]
    Opl2,
    /// OPL3 mode: the full upper bank is reachable
    Opl3,
}

impl BankMode {
    /// Derive the mode from the `NEW` bit of register 0x105
    pub fn from_new_bit(value: u8) -> Self {
        if value & 0x01 != 0 {
            BankMode::Opl3
        } else {
            BankMode::Opl2
        }
    }
}

/// Common interface for OPL synthesis engines
///
/// # Example
///
/// ```
/// use opl3sw::{BankMode, OplBackend};
///
/// fn enable_opl3<B: OplBackend>(chip: &mut B) {
///     chip.write_register(0x105, 0x01);
///     assert_eq!(chip.bank_mode(), BankMode::Opl3);
/// }
/// ```
pub trait OplBackend: Send {
    /// Reset the chip to its power-on condition at the given output rate
    fn reset(&mut self, sample_rate: u32);

    /// Write to a chip register
    ///
    /// # Arguments
    ///
    /// * `register` - 9-bit register address (0x000-0x1FF)
    /// * `value` - Register value (0x00-0xFF)
    fn write_register(&mut self, register: u16, value: u8);

    /// Generate `frames` interleaved frames into `buffer`
    ///
    /// `buffer.len()` is always `frames * channels` for the negotiated
    /// channel count.
    fn generate_period(&mut self, buffer: &mut [i16], frames: usize);

    /// Current addressing mode, read live on every upper-bank address latch
    fn bank_mode(&self) -> BankMode;
}

impl<B: OplBackend + ?Sized> OplBackend for Box<B> {
    fn reset(&mut self, sample_rate: u32) {
        (**self).reset(sample_rate);
    }

    fn write_register(&mut self, register: u16, value: u8) {
        (**self).write_register(register, value);
    }

    fn generate_period(&mut self, buffer: &mut [i16], frames: usize) {
        (**self).generate_period(buffer, frames);
    }

    fn bank_mode(&self) -> BankMode {
        (**self).bank_mode()
    }
}
