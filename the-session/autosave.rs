use the_notes_event::{
  AsyncHook,
  deadline_after,
};
use tokio::{
  sync::mpsc::UnboundedSender,
  time::Instant,
};

use crate::controller::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSaveEvent {
  /// The buffer changed; save once it has been quiet for `save_after` ms.
  DocumentChanged { save_after: u64 },
  /// A save happened some other way or the document closed.
  Cancel,
}

/// Debounces edits into [`SessionEvent::AutoSaveDue`] on the session's queue.
#[derive(Debug)]
pub struct AutoSaveHandler {
  events: UnboundedSender<SessionEvent>,
}

impl AutoSaveHandler {
  pub fn new(events: UnboundedSender<SessionEvent>) -> Self {
    Self { events }
  }
}

impl AsyncHook for AutoSaveHandler {
  type Event = AutoSaveEvent;

  fn handle_event(&mut self, event: Self::Event, _deadline: Option<Instant>) -> Option<Instant> {
    match event {
      AutoSaveEvent::DocumentChanged { save_after } => Some(deadline_after(save_after)),
      AutoSaveEvent::Cancel => None,
    }
  }

  fn finish_debounce(&mut self) {
    if self.events.send(SessionEvent::AutoSaveDue).is_err() {
      log::debug!("autosave fired after the session closed");
    }
  }
}
