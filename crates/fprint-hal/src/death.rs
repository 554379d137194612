//! Client death notification

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use crate::session::SessionCore;

/// Closes the session when the client process dies
///
/// The link is released when the session closes, after which a late death
/// notification does nothing.
#[derive(Debug, Clone)]
pub struct DeathRecipient {
    session: Weak<SessionCore>,
    linked: Arc<AtomicBool>,
}

impl DeathRecipient {
    pub(crate) fn new(session: Weak<SessionCore>, linked: Arc<AtomicBool>) -> Self {
        Self { session, linked }
    }

    pub fn binder_died(&self) {
        if !self.linked.swap(false, Ordering::SeqCst) {
            debug!("Death notification after unlink");
            return;
        }
        info!("Client has died, closing session");
        if let Some(core) = self.session.upgrade() {
            core.close();
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::SeqCst)
    }
}
