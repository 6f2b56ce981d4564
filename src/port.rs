//! Address/data port demultiplexer
//!
//! The OPL3 exposes four I/O ports selected by address lines A0 and A1:
//!
//! | A1 A0 | Port                               |
//! |-------|------------------------------------|
//! | 0 0   | Address, register set #1           |
//! | 0 1   | Data                               |
//! | 1 0   | Address, register set #2           |
//! | 1 1   | Data (A1 ignored)                  |
//!
//! [`AddressLatch`] turns a stream of port writes into register writes on an
//! [`OplBackend`].

use crate::backend::{BankMode, OplBackend};
use crate::opl3::Register;
use tracing::{debug, trace};

/// Register reachable in the upper bank even in OPL2 mode (OPL3 mode enable)
const OPL2_UPPER_BANK_REGISTER: u8 = 0x05;

/// One queued port write, decoded from a 16-bit transport entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingWrite {
    /// Port selector (only the low two bits are significant)
    pub port: u8,
    /// Byte written to the port
    pub value: u8,
}

impl PendingWrite {
    /// Create a pending write
    pub fn new(port: u8, value: u8) -> Self {
        PendingWrite { port, value }
    }

    /// Decode a transport entry: port in the high byte, value in the low byte
    pub fn from_entry(entry: u16) -> Self {
        PendingWrite {
            port: (entry >> 8) as u8,
            value: entry as u8,
        }
    }

    /// Encode back to the transport entry layout
    pub fn to_entry(self) -> u16 {
        ((self.port as u16) << 8) | self.value as u16
    }
}

/// Port selected by address lines A1/A0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSelect {
    /// Address port for register set #1
    AddressLow = 0,
    /// Data port
    Data = 1,
    /// Address port for register set #2
    AddressHigh = 2,
    /// Data port alias (A1 ignored)
    DataAlias = 3,
}

impl PortSelect {
    /// Decode the low two bits of a port selector
    pub fn from_bits(port: u8) -> Self {
        match port & 0x03 {
            0 => PortSelect::AddressLow,
            1 => PortSelect::Data,
            2 => PortSelect::AddressHigh,
            _ => PortSelect::DataAlias,
        }
    }

    /// Whether this port carries register data rather than an address
    pub fn is_data(&self) -> bool {
        matches!(self, PortSelect::Data | PortSelect::DataAlias)
    }
}

/// Outcome of applying one port write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortAction {
    /// A new register address was latched
    Latched(u16),
    /// A value was written to the latched register
    Written {
        /// Target register
        register: u16,
        /// Value written
        value: u8,
    },
}

/// Currently latched register address
///
/// Persists across polls. The bank mode is never cached here: it is read from
/// the backend on every set #2 address write since the chip flips modes on
/// register writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressLatch {
    register: u16,
}

impl AddressLatch {
    /// Create a latch pointing at register 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently latched 9-bit register address
    pub fn register(&self) -> u16 {
        self.register
    }

    /// Apply one port write
    pub fn apply<B: OplBackend + ?Sized>(&mut self, chip: &mut B, write: PendingWrite) -> PortAction {
        let value = write.value;

        let action = match PortSelect::from_bits(write.port) {
            PortSelect::AddressLow => {
                self.register = value as u16;
                PortAction::Latched(self.register)
            }
            PortSelect::Data | PortSelect::DataAlias => {
                if let Some(named) = Register::from_addr(self.register) {
                    debug!(register = %named, value, "control register write");
                }
                chip.write_register(self.register, value);
                PortAction::Written {
                    register: self.register,
                    value,
                }
            }
            PortSelect::AddressHigh => {
                self.register = match chip.bank_mode() {
                    BankMode::Opl3 => value as u16 | 0x100,
                    // Set #2 folds onto set #1 in OPL2 mode, except for the mode register
                    BankMode::Opl2 if value == OPL2_UPPER_BANK_REGISTER => value as u16 | 0x100,
                    BankMode::Opl2 => value as u16,
                };
                PortAction::Latched(self.register)
            }
        };

        trace!(port = write.port & 0x03, value, ?action, "port write");
        action
    }
}
