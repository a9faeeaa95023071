use crate::outcome::Outcome;

/// Errors reported by an effect backend.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend refused the effect.
    #[error("effect rejected: {0}")]
    Rejected(String),
}

/// Receives every resolved roll session.
///
/// Called synchronously from the session engine, once per outcome. Failures
/// are logged by the engine and never stop it.
pub trait EffectDispatcher {
    fn dispatch(&mut self, outcome: &Outcome) -> Result<(), DispatchError>;
}

impl<F> EffectDispatcher for F
where
    F: FnMut(&Outcome) -> Result<(), DispatchError>,
{
    fn dispatch(&mut self, outcome: &Outcome) -> Result<(), DispatchError> {
        self(outcome)
    }
}

/// Dispatcher that discards outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

impl EffectDispatcher for NoopDispatcher {
    fn dispatch(&mut self, _outcome: &Outcome) -> Result<(), DispatchError> {
        Ok(())
    }
}
