//! Debounced, latest-wins preview rendering.
//!
//! The debounce timer and the render itself run in one task held by a single
//! [`TaskSlot`], so scheduling again cancels both a pending timer and a render
//! that is already running. Rendering happens on a blocking thread under a
//! timeout. A render thread that outlives its task can not be stopped, but its
//! result carries a superseded generation and is dropped.

use std::{
  sync::Arc,
  time::Duration,
};

use the_notes_event::{
  Generation,
  TaskSlot,
};
use the_notes_render::{
  RenderError,
  RenderOptions,
  Renderer,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::controller::SessionEvent;

/// Render `text` on a blocking thread, giving up after `timeout`.
pub async fn render_with_timeout(
  renderer: Arc<dyn Renderer>,
  text: String,
  options: RenderOptions,
  timeout: Duration,
) -> Result<String, RenderError> {
  let task = tokio::task::spawn_blocking(move || renderer.render(&text, &options));
  match tokio::time::timeout(timeout, task).await {
    Ok(Ok(result)) => result,
    Ok(Err(err)) => Err(RenderError::Internal(err.to_string())),
    Err(_elapsed) => {
      log::warn!("render did not finish within {timeout:?}");
      Err(RenderError::Timeout(timeout))
    },
  }
}

#[derive(Debug)]
pub struct RenderScheduler {
  slot:     TaskSlot,
  debounce: Duration,
  timeout:  Duration,
}

impl RenderScheduler {
  pub fn new(debounce: Duration, timeout: Duration) -> Self {
    Self {
      slot: TaskSlot::new("render"),
      debounce,
      timeout,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.slot.is_pending()
  }

  /// Replace whatever is pending with a render of `text`. `immediate` skips
  /// the debounce.
  pub fn schedule(
    &mut self,
    renderer: Arc<dyn Renderer>,
    text: String,
    options: RenderOptions,
    immediate: bool,
    events: UnboundedSender<SessionEvent>,
  ) -> Generation {
    let delay = if immediate { Duration::ZERO } else { self.debounce };
    let timeout = self.timeout;
    self.slot.spawn(move |generation| {
      async move {
        if !delay.is_zero() {
          tokio::time::sleep(delay).await;
        }
        let result = render_with_timeout(renderer, text, options, timeout).await;
        let _ = events.send(SessionEvent::Rendered { generation, result });
      }
    })
  }

  pub fn cancel(&mut self) -> bool {
    self.slot.cancel()
  }

  /// Whether a finished render is the latest one and may be shown.
  pub fn complete(&mut self, generation: Generation) -> bool {
    self.slot.complete(generation)
  }
}
