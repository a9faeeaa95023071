//! Die tracking and multi-die roll sessions.
//!
//! Decoded frames update a [`DieStore`]; the roll detector turns consecutive
//! records of one die into `Started` / `Settled` transitions; the
//! [`SessionEngine`] groups dice that start rolling together, waits for them
//! to come to rest and resolves an [`Outcome`] that is handed to an
//! [`EffectDispatcher`].
//!
//! Everything here is synchronous and takes time as a parameter. The
//! `async` feature adds [`RollMonitor`], a tokio driver with a fixed-tick
//! session loop.

pub mod config;
pub mod detector;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod pipeline;
#[cfg(feature = "async")]
pub mod runtime;
pub mod store;

pub use config::SessionConfig;
pub use detector::{classify, Confidence, RollTransition};
pub use dispatch::{DispatchError, EffectDispatcher, NoopDispatcher};
pub use engine::{Participant, RollSession, SessionEngine, SessionPhase};
pub use error::{Result, SessionError};
pub use outcome::{Outcome, ResultTier};
pub use pipeline::{log_ingest_error, FramePipeline, RollEvent};
#[cfg(feature = "async")]
pub use runtime::RollMonitor;
pub use store::{DieState, DieStore, StoreSnapshot, StoreUpdate};
