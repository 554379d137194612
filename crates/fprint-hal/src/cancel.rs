//! Per-operation cancellation handle

use std::sync::Weak;

use tracing::debug;

use crate::error::Result;
use crate::session::SessionCore;

/// Cancels the operation it was issued for, and nothing else
///
/// Once that operation has finished, or a newer one has been admitted, the
/// signal is stale and cancelling is a no-op.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    session: Weak<SessionCore>,
    token: u64,
}

impl CancellationSignal {
    pub(crate) fn new(session: Weak<SessionCore>, token: u64) -> Self {
        Self { session, token }
    }

    pub fn cancel(&self) -> Result<()> {
        match self.session.upgrade() {
            Some(core) => core.cancel(Some(self.token)),
            None => {
                debug!("Cancellation signal outlived its session");
                Ok(())
            }
        }
    }
}
