//! Software OPL3 bridge
//!
//! Connects an emulated Yamaha OPL2/OPL3 sound device, which queues register
//! writes behind a polled DMA-style mailbox, to a real-time PCM output. Two
//! independently timed actors share the synthesis engine:
//!
//! - the poll tick ([`Opl3Bridge::poll`]) drains pending writes through the
//!   address/data port demultiplexer into the engine's registers;
//! - the output's ready callback renders whole periods until the device
//!   buffer is full, recovering from underflows by re-priming silence.
//!
//! The audio path is opened lazily on the first poll that sees register
//! activity.
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Real-time audio output via rodio ([`streaming::RodioOutput`])
//!
//! # Seams
//! - [`OplBackend`]: the FM synthesis engine ([`RegisterShadow`] tracks registers only)
//! - [`RegisterTransport`]: the register-write mailbox ([`QueueTransport`] is in-process)
//! - [`AudioOutput`]: the PCM sink
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use opl3sw::streaming::RodioOutput;
//! use opl3sw::{BridgeConfig, Opl3Bridge, QueueTransport, RegisterShadow};
//!
//! let mut bridge =
//!     Opl3Bridge::new(BridgeConfig::default(), RegisterShadow::new(), RodioOutput::new()).unwrap();
//! let mut mailbox = QueueTransport::new();
//!
//! // Emulated guest: select register 0x20, write 0x01
//! mailbox.push(0, 0x20);
//! mailbox.push(1, 0x01);
//!
//! // Emulation loop tick
//! bridge.poll(&mut mailbox);
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend; // Synthesis engine trait
pub mod bridge; // Context object, lazy bring-up
pub mod config;
pub mod drain; // Write-queue drain
pub mod opl3; // OPL3 registers and register shadow
pub mod output; // Audio output trait
pub mod port; // Address/data port demultiplexer
pub mod render; // Render callback
pub mod streaming; // Sample ring and rodio output
pub mod transport; // Register mailbox

/// Error types for bridge operations
#[derive(thiserror::Error, Debug)]
pub enum Opl3Error {
    /// IO error from filesystem, thread spawn or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Malformed configuration document
    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Opl3Error {
    /// Converts a String into `Opl3Error::Other`.
    ///
    /// Prefer the specific variants (`AudioDeviceError`, `ConfigError`) where
    /// the failure category is known.
    fn from(msg: String) -> Self {
        Opl3Error::Other(msg)
    }
}

impl From<&str> for Opl3Error {
    /// Converts a string slice into `Opl3Error::Other`.
    fn from(msg: &str) -> Self {
        Opl3Error::Other(msg.to_string())
    }
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Opl3Error>;

// Public API exports
pub use backend::{BankMode, OplBackend};
pub use bridge::Opl3Bridge;
pub use config::BridgeConfig;
pub use drain::{DrainStats, WriteBatch, WriteQueueDrain};
pub use opl3::RegisterShadow;
pub use output::{AudioOutput, ReadyCallback, StreamFormat, StreamRequest, WriteStatus};
pub use port::{AddressLatch, PendingWrite, PortAction, PortSelect};
pub use render::{PlaybackEvent, PlaybackState, RenderStats, Renderer};
pub use transport::{QueueTransport, RegisterTransport};
