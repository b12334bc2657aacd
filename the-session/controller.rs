//! The session controller.
//!
//! [`SessionController`] owns the open [`Session`] and is the only thing that
//! mutates it. UI calls (`set_body`, `request_switch`, ...) update state
//! synchronously and start background work: saves, loads, deletes and renders
//! run as tokio tasks that only see immutable snapshots. Their results come
//! back as [`SessionEvent`]s on the controller's queue and are applied one at
//! a time by [`SessionController::handle_event`], so every state transition
//! happens on the caller's task.
//!
//! Ordering rules:
//!
//! - loads are latest-wins through a [`TaskSlot`]; a superseded load is
//!   aborted and its result dropped if it was already queued,
//! - saves are never aborted; a save requested while one is in flight is
//!   queued and re-evaluated when the first one lands,
//! - a document switch waits for the outgoing document to be clean and for
//!   any save to finish before it loads or opens anything,
//! - renders are latest-wins through the [`RenderScheduler`].
//!
//! Nothing here drops unsaved text: a failed save leaves the buffer dirty and
//! abandons any pending switch.

use std::{
  borrow::Cow,
  collections::BTreeSet,
  sync::Arc,
};

use chrono::Utc;
use the_notes_event::{
  AsyncHook,
  Generation,
  TaskSlot,
  send_blocking,
};
use the_notes_lib::{
  Document,
  DocumentFlags,
  DocumentId,
  Session,
  TextRange,
  ViewMode,
  search::{
    SearchOptions,
    SearchState,
  },
  widget::EditCommand,
};
use the_notes_render::{
  RenderError,
  RenderOptions,
  Renderer,
  markdown::escape_html,
};
use tokio::sync::mpsc::{
  self,
  Sender,
  UnboundedReceiver,
  UnboundedSender,
};

use crate::{
  autosave::{
    AutoSaveEvent,
    AutoSaveHandler,
  },
  config::SessionConfig,
  error::{
    SessionError,
    StoreError,
  },
  mirror::FileMirror,
  render::RenderScheduler,
  store::Storage,
};


/// Where the next document comes from.
#[derive(Debug, Clone)]
pub enum LoadSource {
  Fetch(DocumentId),
  /// Persist a brand new document, then open it.
  Create(Document),
}

impl LoadSource {
  pub fn id(&self) -> DocumentId {
    match self {
      Self::Fetch(id) => *id,
      Self::Create(doc) => doc.id,
    }
  }
}

/// Completion of background work, applied by [`SessionController::handle_event`].
#[derive(Debug)]
pub enum SessionEvent {
  Loaded {
    generation: Generation,
    result:     Result<Document, StoreError>,
  },
  Saved {
    seq:    u64,
    result: Result<Document, StoreError>,
  },
  Deleted {
    id:     DocumentId,
    result: Result<(), StoreError>,
  },
  Rendered {
    generation: Generation,
    result:     Result<String, RenderError>,
  },
  AutoSaveDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  NoDocument,
  Loading,
  Ready,
  Saving,
}

/// Notifications for the UI, collected until [`SessionController::take_updates`].
#[derive(Debug, Clone)]
pub enum SessionUpdate {
  Opened(DocumentId),
  Closed(DocumentId),
  LoadFailed {
    id:    DocumentId,
    error: Arc<StoreError>,
  },
  Saved(DocumentId),
  SaveSkipped(DocumentId),
  SaveFailed {
    id:    DocumentId,
    error: Arc<StoreError>,
  },
  SwitchAborted {
    target: DocumentId,
  },
  Deleted(DocumentId),
  DeleteFailed {
    id:    DocumentId,
    error: Arc<StoreError>,
  },
  Rendered,
  RenderFailed(Arc<RenderError>),
}

impl SessionUpdate {
  pub fn error(&self) -> Option<SessionError> {
    match self {
      Self::LoadFailed { error, .. }
      | Self::SaveFailed { error, .. }
      | Self::DeleteFailed { error, .. } => Some(SessionError::Store(error.clone())),
      Self::RenderFailed(error) => Some(SessionError::Render(error.clone())),
      Self::SwitchAborted { target } => Some(SessionError::SwitchAborted(target.to_string())),
      _ => None,
    }
  }
}

#[derive(Debug)]
enum SwitchStage {
  /// Waiting for the outgoing document to be clean before loading.
  Waiting(LoadSource),
  Loading,
  /// Loaded, waiting for the outgoing document to be clean before opening.
  Loaded(Document),
}

#[derive(Debug)]
struct PendingSwitch {
  target: DocumentId,
  stage:  SwitchStage,
}

#[derive(Debug, Default)]
struct SaveState {
  seq:         u64,
  in_flight:   Option<(u64, DocumentId)>,
  queued:      bool,
  force:       bool,
  /// Close the session once a save marking it deleted lands.
  close_after: bool,
}

pub struct SessionController {
  storage:  Arc<dyn Storage>,
  mirror:   Arc<dyn FileMirror>,
  renderer: Arc<dyn Renderer>,
  config:   SessionConfig,
  theme:    Option<String>,
  grouping: bool,

  session: Option<Session>,
  search:  SearchState,
  switch:  Option<PendingSwitch>,

  loads:           TaskSlot,
  save:            SaveState,
  deleting:        usize,
  deferred_delete: Option<DocumentId>,
  render:          RenderScheduler,
  rendered:        Option<String>,
  render_error:    Option<Arc<RenderError>>,
  autosave:        Sender<AutoSaveEvent>,

  events_tx: UnboundedSender<SessionEvent>,
  events_rx: UnboundedReceiver<SessionEvent>,
  updates:   Vec<SessionUpdate>,
  edits:     Vec<EditCommand>,
}

impl SessionController {
  /// Must be called inside a tokio runtime; the autosave hook is spawned
  /// here.
  pub fn new(
    storage: Arc<dyn Storage>,
    mirror: Arc<dyn FileMirror>,
    renderer: Arc<dyn Renderer>,
    config: SessionConfig,
  ) -> Self {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let autosave = AutoSaveHandler::new(events_tx.clone()).spawn();
    let render = RenderScheduler::new(config.render.debounce(), config.render.timeout());
    Self {
      storage,
      mirror,
      renderer,
      config,
      theme: None,
      grouping: true,
      session: None,
      search: SearchState::new(),
      switch: None,
      loads: TaskSlot::new("load"),
      save: SaveState::default(),
      deleting: 0,
      deferred_delete: None,
      render,
      rendered: None,
      render_error: None,
      autosave,
      events_tx,
      events_rx,
      updates: Vec::new(),
      edits: Vec::new(),
    }
  }

  pub fn with_theme(mut self, theme: Option<String>) -> Self {
    self.theme = theme;
    self
  }

  /// Whether the host widget can merge a batch of edits into one undo step.
  pub fn with_grouping(mut self, grouping: bool) -> Self {
    self.grouping = grouping;
    self
  }

  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  pub fn session(&self) -> Option<&Session> {
    self.session.as_ref()
  }

  pub fn search(&self) -> &SearchState {
    &self.search
  }

  pub fn phase(&self) -> Phase {
    if self.switch.is_some() {
      Phase::Loading
    } else if self.session.is_none() {
      Phase::NoDocument
    } else if self.save.in_flight.is_some() {
      Phase::Saving
    } else {
      Phase::Ready
    }
  }

  pub fn is_dirty(&self) -> bool {
    self.session.as_ref().is_some_and(Session::is_dirty)
  }

  pub fn rendered(&self) -> Option<&str> {
    self.rendered.as_deref()
  }

  pub fn render_error(&self) -> Option<&RenderError> {
    self.render_error.as_deref()
  }

  /// The preview to show: the last good render, headed by an error banner
  /// when the latest render failed.
  pub fn rendered_view(&self) -> Option<Cow<'_, str>> {
    match (&self.render_error, &self.rendered) {
      (Some(err), html) => {
        Some(Cow::Owned(format!(
          "<div class=\"render-error\">{}</div>\n{}",
          escape_html(&err.to_string()),
          html.as_deref().unwrap_or_default()
        )))
      },
      (None, Some(html)) => Some(Cow::Borrowed(html)),
      (None, None) => None,
    }
  }

  pub fn render_options(&self) -> RenderOptions {
    self.config.render.options(self.theme.clone())
  }

  pub fn take_updates(&mut self) -> Vec<SessionUpdate> {
    std::mem::take(&mut self.updates)
  }

  /// Edits the host widget must apply to mirror replacements made here.
  pub fn take_edit_commands(&mut self) -> Vec<EditCommand> {
    std::mem::take(&mut self.edits)
  }

  // Editing

  pub fn set_body(&mut self, body: impl Into<String>) {
    if let Some(session) = self.session.as_mut()
      && session.set_body(body)
    {
      self.after_edit();
    }
  }

  pub fn set_title(&mut self, title: impl Into<String>) {
    if let Some(session) = self.session.as_mut()
      && session.set_title(title)
    {
      self.after_edit();
    }
  }

  /// Replace `range` of the body with `text`.
  pub fn edit(&mut self, range: TextRange, text: &str) {
    if let Some(session) = self.session.as_mut()
      && session.replace(range, text)
    {
      self.after_edit();
    }
  }

  pub fn set_selection(&mut self, selection: TextRange) {
    if let Some(session) = self.session.as_mut() {
      session.set_selection(selection);
    }
  }

  fn after_edit(&mut self) {
    if let Some(session) = self.session.as_ref() {
      self.search.recompute(session.body());
    }
    self.after_change();
  }

  /// Re-render and re-arm autosave after the working text changed.
  fn after_change(&mut self) {
    self.schedule_render(false);

    if !self.config.autosave.enable || self.session.is_none() {
      return;
    }
    let event = if self.is_dirty() {
      AutoSaveEvent::DocumentChanged {
        save_after: self.config.autosave.after_delay_ms,
      }
    } else {
      AutoSaveEvent::Cancel
    };
    send_blocking(&self.autosave, event);
  }

  // Persistence

  /// Save now. Returns whether a save was started or queued behind the one
  /// in flight; an unchanged document is not written.
  pub fn request_save(&mut self) -> Result<bool, SessionError> {
    if self.session.is_none() {
      return Err(SessionError::NoDocument);
    }
    send_blocking(&self.autosave, AutoSaveEvent::Cancel);
    Ok(self.start_save(false))
  }

  /// The primary text field lost focus.
  pub fn focus_lost(&mut self) {
    if self.is_dirty() {
      let _ = self.request_save();
    }
  }

  fn start_save(&mut self, force: bool) -> bool {
    let Some(session) = self.session.as_ref() else {
      return false;
    };
    if self.save.in_flight.is_some() {
      self.save.queued = true;
      self.save.force |= force;
      return true;
    }

    let snapshot = session.snapshot();
    if !force && session.is_saved(&snapshot) {
      self.updates.push(SessionUpdate::SaveSkipped(snapshot.id));
      return false;
    }
    let document = session.document_for_save(&snapshot, Utc::now());
    self.save.seq += 1;
    let seq = self.save.seq;
    self.save.in_flight = Some((seq, snapshot.id));

    let storage = self.storage.clone();
    let mirror = self.mirror.clone();
    let events = self.events_tx.clone();
    tokio::spawn(async move {
      let result = storage.update(&document).await.map(|()| document);
      if let Ok(doc) = &result {
        sync_mirror(mirror.as_ref(), doc).await;
      }
      let _ = events.send(SessionEvent::Saved { seq, result });
    });
    true
  }

  // Document lifecycle

  /// Open another document. The latest request wins.
  pub fn request_switch(&mut self, id: DocumentId) {
    self.begin_switch(LoadSource::Fetch(id));
  }

  /// Create a document and switch to it once it is stored.
  pub fn create_document(&mut self, title: impl Into<String>, body: impl Into<String>) -> DocumentId {
    let doc = Document::new(title, body);
    let id = doc.id;
    self.begin_switch(LoadSource::Create(doc));
    id
  }

  /// Switch to a document built elsewhere (an import), storing it first.
  pub fn create_from(&mut self, doc: Document) -> DocumentId {
    let id = doc.id;
    self.begin_switch(LoadSource::Create(doc));
    id
  }

  fn begin_switch(&mut self, source: LoadSource) {
    let target = source.id();
    self.loads.cancel();
    if let Some(previous) = self.switch.take() {
      log::debug!("switch to {} superseded by {target}", previous.target);
    }
    let reopening = matches!(source, LoadSource::Fetch(_))
      && self.session.as_ref().is_some_and(|s| s.id() == target);
    if reopening {
      return;
    }
    self.switch = Some(PendingSwitch {
      target,
      stage: SwitchStage::Waiting(source),
    });
    self.advance_switch();
  }

  fn advance_switch(&mut self) {
    let Some(switch) = self.switch.take() else {
      return;
    };
    let saving = self.save.in_flight.is_some();
    if saving || self.is_dirty() {
      if !saving {
        self.start_save(false);
      }
      self.switch = Some(switch);
      return;
    }

    match switch.stage {
      SwitchStage::Waiting(source) => {
        self.switch = Some(PendingSwitch {
          target: switch.target,
          stage:  SwitchStage::Loading,
        });
        self.start_load(source);
      },
      SwitchStage::Loading => self.switch = Some(switch),
      SwitchStage::Loaded(doc) => self.open(doc),
    }
  }

  fn start_load(&mut self, source: LoadSource) {
    let storage = self.storage.clone();
    let mirror = self.mirror.clone();
    let events = self.events_tx.clone();
    self.loads.spawn(move |generation| {
      async move {
        let result = match source {
          LoadSource::Fetch(id) => storage.fetch(id).await,
          LoadSource::Create(doc) => {
            match storage.create(&doc).await {
              Ok(()) => {
                sync_mirror(mirror.as_ref(), &doc).await;
                Ok(doc)
              },
              Err(err) => Err(err),
            }
          },
        };
        let _ = events.send(SessionEvent::Loaded { generation, result });
      }
    });
  }

  fn open(&mut self, doc: Document) {
    let id = doc.id;
    self.reset_views();
    self.session = Some(Session::open(doc));
    self.updates.push(SessionUpdate::Opened(id));
  }

  fn close_session(&mut self) -> Option<DocumentId> {
    let id = self.session.take()?.id();
    self.reset_views();
    self.updates.push(SessionUpdate::Closed(id));
    Some(id)
  }

  fn reset_views(&mut self) {
    self.render.cancel();
    self.rendered = None;
    self.render_error = None;
    self.search.clear();
    send_blocking(&self.autosave, AutoSaveEvent::Cancel);
  }

  /// Permanently delete the open document. Unsaved text goes with it.
  pub fn delete_document(&mut self) -> Option<DocumentId> {
    let id = self.close_session()?;
    self.save.queued = false;
    self.save.force = false;
    self.save.close_after = false;
    if self.save.in_flight.is_some() {
      self.deferred_delete = Some(id);
    } else {
      self.spawn_delete(id);
    }
    Some(id)
  }

  /// Mark the open document deleted, save it, and close it once saved.
  pub fn trash_document(&mut self) -> bool {
    let Some(session) = self.session.as_mut() else {
      return false;
    };
    session.set_flags(DocumentFlags {
      deleted: true,
      ..session.flags()
    });
    self.save.close_after = true;
    self.start_save(true);
    true
  }

  fn spawn_delete(&mut self, id: DocumentId) {
    self.deleting += 1;
    let storage = self.storage.clone();
    let mirror = self.mirror.clone();
    let events = self.events_tx.clone();
    tokio::spawn(async move {
      let result = storage.delete(id).await;
      if result.is_ok()
        && let Err(err) = mirror.delete_file(id).await
      {
        log::warn!("removing mirror of {id} failed: {err}");
      }
      let _ = events.send(SessionEvent::Deleted { id, result });
    });
  }

  pub fn set_starred(&mut self, starred: bool) {
    self.update_flags(|flags| flags.starred = starred);
  }

  pub fn set_pinned(&mut self, pinned: bool) {
    self.update_flags(|flags| flags.pinned = pinned);
  }

  fn update_flags(&mut self, change: impl FnOnce(&mut DocumentFlags)) {
    let Some(session) = self.session.as_mut() else {
      return;
    };
    let mut flags = session.flags();
    change(&mut flags);
    if flags != session.flags() {
      session.set_flags(flags);
      self.start_save(true);
    }
  }

  pub fn set_tags(&mut self, tags: BTreeSet<String>) {
    let Some(session) = self.session.as_mut() else {
      return;
    };
    if &tags != session.tags() {
      session.set_tags(tags);
      self.start_save(true);
    }
  }

  // Rendering

  pub fn set_view_mode(&mut self, mode: ViewMode) {
    let Some(session) = self.session.as_mut() else {
      return;
    };
    let previous = session.set_view_mode(mode);
    if !mode.shows_rendered() {
      self.render.cancel();
    } else if !previous.shows_rendered() {
      self.schedule_render(true);
    }
  }

  pub fn set_theme(&mut self, theme: Option<String>) {
    self.theme = theme;
    self.schedule_render(true);
  }

  fn schedule_render(&mut self, immediate: bool) {
    let Some(session) = self.session.as_ref() else {
      return;
    };
    if !session.view_mode().shows_rendered() {
      return;
    }
    let text = session.body().to_owned();
    let options = self.render_options();
    self.render.schedule(
      self.renderer.clone(),
      text,
      options,
      immediate,
      self.events_tx.clone(),
    );
  }

  // Search

  pub fn set_search_pattern(&mut self, pattern: impl Into<String>) {
    let body = self.session.as_ref().map_or("", Session::body);
    self.search.set_pattern(pattern, body);
  }

  pub fn set_search_options(&mut self, options: SearchOptions) {
    let body = self.session.as_ref().map_or("", Session::body);
    self.search.set_options(options, body);
  }

  pub fn set_replacement(&mut self, replacement: impl Into<String>) {
    self.search.set_replacement(replacement);
  }

  pub fn find_next(&mut self) -> Option<TextRange> {
    let found = self.search.find_next()?;
    self.set_selection(found);
    Some(found)
  }

  pub fn find_previous(&mut self) -> Option<TextRange> {
    let found = self.search.find_previous()?;
    self.set_selection(found);
    Some(found)
  }

  pub fn replace_current(&mut self) -> bool {
    let Some(session) = self.session.as_mut() else {
      return false;
    };
    let Some(outcome) = self.search.replace_current(session.body()) else {
      return false;
    };
    session.set_body(outcome.text);
    session.set_selection(outcome.selection);
    self.edits.extend(outcome.commands);
    self.after_change();
    true
  }

  pub fn replace_all(&mut self) -> bool {
    let Some(session) = self.session.as_mut() else {
      return false;
    };
    let Some(outcome) = self.search.replace_all(session.body(), self.grouping) else {
      return false;
    };
    session.set_body(outcome.text);
    session.set_selection(outcome.selection);
    self.edits.extend(outcome.commands);
    self.after_change();
    true
  }

  // Event loop

  fn has_pending_work(&self) -> bool {
    self.loads.is_pending()
      || self.save.in_flight.is_some()
      || self.render.is_pending()
      || self.deleting > 0
  }

  pub async fn next_event(&mut self) -> Option<SessionEvent> {
    self.events_rx.recv().await
  }

  /// Wait for one event and apply it.
  pub async fn step(&mut self) -> bool {
    match self.events_rx.recv().await {
      Some(event) => {
        self.handle_event(event);
        true
      },
      None => false,
    }
  }

  /// Apply every event that is already queued, without waiting.
  pub fn drain_ready(&mut self) -> usize {
    let mut handled = 0;
    while let Ok(event) = self.events_rx.try_recv() {
      self.handle_event(event);
      handled += 1;
    }
    handled
  }

  /// Apply events until no load, save, delete or render is outstanding.
  /// A pending autosave timer does not count.
  pub async fn settle(&mut self) {
    while self.has_pending_work() {
      if !self.step().await {
        break;
      }
    }
  }

  pub fn handle_event(&mut self, event: SessionEvent) {
    match event {
      SessionEvent::Loaded { generation, result } => self.on_loaded(generation, result),
      SessionEvent::Saved { seq, result } => self.on_saved(seq, result),
      SessionEvent::Deleted { id, result } => self.on_deleted(id, result),
      SessionEvent::Rendered { generation, result } => self.on_rendered(generation, result),
      SessionEvent::AutoSaveDue => {
        if self.is_dirty() {
          self.start_save(false);
        }
      },
    }
  }

  fn on_loaded(&mut self, generation: Generation, result: Result<Document, StoreError>) {
    if !self.loads.complete(generation) {
      return;
    }
    let Some(switch) = self.switch.take() else {
      return;
    };
    match result {
      Ok(doc) => {
        self.switch = Some(PendingSwitch {
          target: switch.target,
          stage:  SwitchStage::Loaded(doc),
        });
        self.advance_switch();
      },
      Err(err) => {
        log::error!("loading {} failed: {err}", switch.target);
        self.updates.push(SessionUpdate::LoadFailed {
          id:    switch.target,
          error: Arc::new(err),
        });
      },
    }
  }

  fn on_saved(&mut self, seq: u64, result: Result<Document, StoreError>) {
    let Some((current, id)) = self.save.in_flight else {
      log::debug!("dropping result of save {seq}, none in flight");
      return;
    };
    if current != seq {
      log::debug!("dropping result of save {seq}, waiting for {current}");
      return;
    }
    self.save.in_flight = None;

    match result {
      Ok(doc) => {
        if let Some(session) = self.session.as_mut() {
          session.mark_saved(&doc);
        }
        self.updates.push(SessionUpdate::Saved(id));

        let close = self.save.close_after
          && doc.flags.deleted
          && self
            .session
            .as_ref()
            .is_some_and(|s| s.id() == id && !s.is_dirty());
        if close {
          self.save.close_after = false;
          self.save.queued = false;
          self.save.force = false;
          self.close_session();
        } else if std::mem::take(&mut self.save.queued) {
          let force = std::mem::take(&mut self.save.force);
          self.start_save(force);
        }
      },
      Err(err) => {
        log::error!("saving {id} failed: {err}");
        self.save.queued = false;
        self.save.force = false;
        if std::mem::take(&mut self.save.close_after)
          && let Some(session) = self.session.as_mut()
        {
          session.set_flags(DocumentFlags {
            deleted: false,
            ..session.flags()
          });
        }
        self.updates.push(SessionUpdate::SaveFailed {
          id,
          error: Arc::new(err),
        });
        if let Some(switch) = self.switch.take() {
          self.loads.cancel();
          self.updates.push(SessionUpdate::SwitchAborted {
            target: switch.target,
          });
        }
      },
    }

    if self.save.in_flight.is_none()
      && let Some(id) = self.deferred_delete.take()
    {
      self.spawn_delete(id);
    }
    self.advance_switch();
  }

  fn on_deleted(&mut self, id: DocumentId, result: Result<(), StoreError>) {
    self.deleting = self.deleting.saturating_sub(1);
    match result {
      Ok(()) => self.updates.push(SessionUpdate::Deleted(id)),
      Err(err) => {
        log::error!("deleting {id} failed: {err}");
        self.updates.push(SessionUpdate::DeleteFailed {
          id,
          error: Arc::new(err),
        });
      },
    }
  }

  fn on_rendered(&mut self, generation: Generation, result: Result<String, RenderError>) {
    if !self.render.complete(generation) {
      return;
    }
    match result {
      Ok(html) => {
        self.rendered = Some(html);
        self.render_error = None;
        self.updates.push(SessionUpdate::Rendered);
      },
      Err(RenderError::Cancelled) => {},
      Err(err) => {
        log::warn!("render failed: {err}");
        let err = Arc::new(err);
        self.render_error = Some(err.clone());
        self.updates.push(SessionUpdate::RenderFailed(err));
      },
    }
  }
}

async fn sync_mirror(mirror: &dyn FileMirror, doc: &Document) {
  let result = if doc.flags.deleted {
    mirror.delete_file(doc.id).await
  } else {
    mirror.write_file(doc).await
  };
  if let Err(err) = result {
    log::warn!("mirroring {} failed: {err}", doc.id);
  }
}
