//! Latest-wins task slots.
//!
//! A [`TaskSlot`] owns at most one running task of a given kind (a render, a
//! document load). Spawning into the slot aborts whatever was there and bumps
//! the slot's [`Generation`]. Tasks report back tagged with the generation they
//! were started under, and the owner applies a result only if
//! [`TaskSlot::complete`] accepts that generation. Abort covers tasks that have
//! not reached their side effect yet; the generation check covers results that
//! were already in the owner's queue when the newer task started.

use std::future::Future;

use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
  pub const fn get(self) -> u64 {
    self.0
  }

  const fn next(self) -> Self {
    Self(self.0.wrapping_add(1))
  }
}

#[derive(Debug)]
pub struct TaskSlot {
  name:       &'static str,
  generation: Generation,
  handle:     Option<JoinHandle<()>>,
}

impl TaskSlot {
  pub const fn new(name: &'static str) -> Self {
    Self {
      name,
      generation: Generation(0),
      handle: None,
    }
  }

  pub fn generation(&self) -> Generation {
    self.generation
  }

  /// Whether a task was started and its completion has not been accepted yet.
  pub fn is_pending(&self) -> bool {
    self.handle.is_some()
  }

  pub fn is_current(&self, generation: Generation) -> bool {
    self.generation == generation
  }

  /// Cancel the occupant and start `task` under a fresh generation.
  pub fn spawn<F, Fut>(&mut self, task: F) -> Generation
  where
    F: FnOnce(Generation) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.cancel();
    let generation = self.generation;
    self.handle = Some(tokio::spawn(task(generation)));
    generation
  }

  /// Abort the occupant, if any. Results it may already have queued become
  /// stale because the generation moves on either way.
  pub fn cancel(&mut self) -> bool {
    self.generation = self.generation.next();
    match self.handle.take() {
      Some(handle) => {
        handle.abort();
        log::debug!("{}: cancelled pending task", self.name);
        true
      },
      None => false,
    }
  }

  /// Accept the completion of the task started under `generation`.
  /// Returns `false` for a superseded task, whose result must be dropped.
  pub fn complete(&mut self, generation: Generation) -> bool {
    if generation != self.generation {
      log::debug!(
        "{}: dropping stale result (generation {} != {})",
        self.name,
        generation.get(),
        self.generation.get()
      );
      return false;
    }
    self.handle = None;
    true
  }
}

impl Drop for TaskSlot {
  fn drop(&mut self) {
    if let Some(handle) = self.handle.take() {
      handle.abort();
    }
  }
}
