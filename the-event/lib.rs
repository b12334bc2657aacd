//! Scheduling primitives shared by the session crates.
//!
//! - [`AsyncHook`]: a background task fed through a channel that can debounce
//!   bursts of events into a single effect.
//! - [`TaskSlot`]: one cancellable handle per kind of pending effect, where
//!   starting a new task unconditionally supersedes the previous one.

mod debounce;
mod slot;

pub use debounce::{
  AsyncHook,
  deadline_after,
  send_blocking,
};
pub use slot::{
  Generation,
  TaskSlot,
};
