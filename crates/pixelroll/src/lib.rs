//! Roll detection and result lighting for Bluetooth Pixel dice.
//!
//! pixelroll decodes the status frames Pixel dice send, groups dice rolled
//! together into sessions, classifies the total into a result tier and turns
//! the tier into a light effect.
//!
//! # Crate Structure
//!
//! - [`transport`]: Link ids, the transport boundary and a loopback transport
//! - [`frame`]: Fixed-layout codec for die frames and commands
//! - [`session`]: Die store, roll detection, session engine, async monitor
//! - [`effects`]: Tier → light effect planning (behind `effects` feature)

/// Re-export transport types.
pub mod transport {
    pub use pixelroll_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pixelroll_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use pixelroll_session::*;
}

#[cfg(feature = "effects")]
pub mod effects;
