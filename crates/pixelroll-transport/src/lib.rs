//! Transport boundary for Pixel dice.
//!
//! The Bluetooth stack (scanning, GATT discovery, notification subscription)
//! lives outside this workspace. The core only sees two primitives:
//! - "send bytes" to a die link
//! - "bytes arrived" from a die link, one notification per frame
//!
//! [`DieTransport`] captures both. [`LoopbackTransport`] is an in-memory
//! implementation used to replay recorded frames and to drive tests.

pub mod error;
pub mod loopback;
pub mod traits;

pub use error::{Result, TransportError};
pub use loopback::LoopbackTransport;
pub use traits::{DieTransport, InboundCallback, LinkId};
