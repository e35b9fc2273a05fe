use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

use crate::events::SheetEvent;

/// Sender for the runtime's event inbox.
pub type SheetEventSender = mpsc::UnboundedSender<SheetEvent>;

/// Receiver for the runtime's event inbox.
pub type SheetEventReceiver = mpsc::UnboundedReceiver<SheetEvent>;

/// Shared by every handle and delegate controller. Dropping the last one
/// tells the runtime nobody can drive the sheet anymore.
pub type Presence = Arc<DropGuard>;
