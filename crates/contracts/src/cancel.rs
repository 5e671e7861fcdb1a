use std::fmt;
use std::sync::Arc;

/// Cancellation check supplied by the surrounding ad request.
///
/// Polled after every suspension point of a callout. Once it returns `false`
/// the callout contributes no result at all.
#[derive(Clone)]
pub struct StillCurrent(Arc<dyn Fn() -> bool + Send + Sync>);

impl StillCurrent {
    pub fn new(check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(check))
    }

    /// A check that never cancels.
    pub fn always() -> Self {
        Self::new(|| true)
    }

    pub fn check(&self) -> bool {
        (self.0)()
    }
}

impl Default for StillCurrent {
    fn default() -> Self {
        Self::always()
    }
}

impl fmt::Debug for StillCurrent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StillCurrent").finish()
    }
}
