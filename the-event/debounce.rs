//! Debounced async hooks.
//!
//! A hook lives in its own tokio task and receives events through a bounded
//! channel. Each event may (re)arm a deadline; once the deadline passes with no
//! further events, [`AsyncHook::finish_debounce`] runs. Autosave uses this to
//! turn a burst of keystrokes into one save request.

use std::{
  any::type_name,
  future,
  time::Duration,
};

use futures_executor::block_on;
use tokio::{
  sync::mpsc::{
    self,
    Receiver,
    Sender,
    error::TrySendError,
  },
  time::Instant,
};

/// Upper bound on how long a synchronous caller may block on a full channel.
const SEND_TIMEOUT_MS: u64 = 2;

/// Room for a fast typist's worth of events between two hook wakeups.
const HOOK_CHANNEL_CAPACITY: usize = 256;

pub trait AsyncHook: Send + 'static + Sized {
  type Event: Send + 'static;

  /// Consume an event. Return the deadline the hook should wait for next:
  /// `None` disarms the timer, `deadline` keeps the current one, a fresh
  /// instant restarts the quiet period.
  fn handle_event(&mut self, event: Self::Event, deadline: Option<Instant>) -> Option<Instant>;

  /// The armed deadline elapsed without another event arriving.
  fn finish_debounce(&mut self);

  /// Start the hook on the current runtime and hand back its event sender.
  ///
  /// Outside a runtime the task is not spawned and the returned sender is
  /// simply never drained, which keeps plain unit tests runtime-free.
  fn spawn(self) -> Sender<Self::Event> {
    let (tx, rx) = mpsc::channel(HOOK_CHANNEL_CAPACITY);
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    }
    tx
  }
}

/// Resolves at `deadline`, or never when the hook is disarmed.
async fn quiet_until(deadline: Option<Instant>) {
  match deadline {
    Some(at) => tokio::time::sleep_until(at).await,
    None => future::pending().await,
  }
}

/// Drive `hook` until every sender is gone. An event arriving together with
/// the deadline wins, so a late edit still pushes the deadline back.
async fn run<Hook: AsyncHook>(mut hook: Hook, mut events: Receiver<Hook::Event>) {
  let mut armed = None;
  loop {
    tokio::select! {
      biased;
      event = events.recv() => {
        let Some(event) = event else {
          log::trace!("{} hook stopped", type_name::<Hook>());
          return;
        };
        armed = hook.handle_event(event, armed);
      },
      () = quiet_until(armed) => {
        armed = None;
        hook.finish_debounce();
      },
    }
  }
}

/// Deadline `ms` milliseconds from now.
pub fn deadline_after(ms: u64) -> Instant {
  Instant::now() + Duration::from_millis(ms)
}

/// Queue `event` from synchronous code and report whether it was queued.
///
/// A full channel gets [`SEND_TIMEOUT_MS`] to drain. After that, or when the
/// hook has stopped, the event is dropped: editing never stalls on a
/// background hook.
pub fn send_blocking<T>(tx: &Sender<T>, event: T) -> bool {
  let event = match tx.try_send(event) {
    Ok(()) => return true,
    Err(TrySendError::Full(event)) => event,
    Err(TrySendError::Closed(_)) => {
      log::warn!("dropping {}: hook has stopped", type_name::<T>());
      return false;
    },
  };
  let timeout = Duration::from_millis(SEND_TIMEOUT_MS);
  let queued = block_on(tx.send_timeout(event, timeout)).is_ok();
  if !queued {
    log::warn!("dropping {}: hook channel is full", type_name::<T>());
  }
  queued
}
