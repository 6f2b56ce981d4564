//! OPL3 Register Domain
//!
//! Register definitions for the Yamaha YMF262 (OPL3) and a register-tracking
//! backend that keeps the chip's addressing mode without synthesizing audio.
//!
//! Implementation:
//! - `registers` - Global control registers, mode flags and the register shadow

pub mod registers;

pub use registers::{ModeFlags, Register, RegisterShadow, REGISTER_SPACE};
