//! Directory and profile-cache subscriptions.
//!
//! Each forwarder owns its broadcast receiver and turns notifications into
//! inbox events. Cancelling the token ends the loop and drops the receiver,
//! which is what unsubscribes.

use std::sync::Arc;

use acpick_core::collaborators::{AccountDirectory, ProfileCache};
use acpick_core::AccountId;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::handlers;
use super::inbox::SheetEventSender;
use crate::events::SheetEvent;

pub struct Sources {
    pub directory: Arc<dyn AccountDirectory>,
    pub profiles: Arc<dyn ProfileCache>,
    pub inbox: SheetEventSender,
    pub cancel: CancellationToken,
}

impl Sources {
    /// Returns false once the sheet can no longer receive events.
    fn deliver(&self, event: SheetEvent) -> bool {
        self.inbox.send(event).is_ok()
    }
}

pub async fn forward_directory(mut changes: broadcast::Receiver<()>, sources: Sources) {
    loop {
        let received = tokio::select! {
            () = sources.cancel.cancelled() => break,
            received = changes.recv() => received,
        };
        match received {
            Ok(()) => {}
            // A fresh snapshot covers every missed notification.
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "directory notifications coalesced"),
            Err(RecvError::Closed) => break,
        }
        let event = handlers::snapshot(sources.directory.as_ref(), sources.profiles.as_ref()).await;
        if !sources.deliver(event) {
            break;
        }
    }
    debug!("directory subscription closed");
}

pub async fn forward_profiles(mut changes: broadcast::Receiver<AccountId>, sources: Sources) {
    loop {
        let received = tokio::select! {
            () = sources.cancel.cancelled() => break,
            received = changes.recv() => received,
        };
        let event = match received {
            Ok(id) => {
                let data = sources.profiles.display_data(&id);
                SheetEvent::ProfileChanged { id, data }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "profile notifications dropped, reloading all display data");
                handlers::snapshot(sources.directory.as_ref(), sources.profiles.as_ref()).await
            }
            Err(RecvError::Closed) => break,
        };
        if !sources.deliver(event) {
            break;
        }
    }
    debug!("profile subscription closed");
}
