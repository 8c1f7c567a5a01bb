//! Extracts musical notation from NSF files via frame-accurate APU
//! emulation, and serializes it to a lossless binary container.
//!
//! The emulator itself lives outside this crate: it drives one through
//! [`emulator::Emulator`], infers events through [`state::ChannelState`],
//! and persists the result through [`container`].

pub mod channel;
pub mod config;
pub mod container;
pub mod emulator;
pub mod error;
pub mod notation;
pub mod pitch;
pub mod runner;
pub mod state;

pub use config::ExtractionConfig;
pub use emulator::Emulator;
pub use error::{NotationError, Result};
pub use notation::NotationFile;
