//! Markdown to themed, self-contained HTML.
//!
//! The [`Pipeline`] runs a fixed sequence of stages over a text snapshot:
//!
//! 1. `[TOC]` marker detection
//! 2. diagram and math extraction ([`extract`])
//! 3. CommonMark conversion ([`markdown`])
//! 4. code highlighting ([`highlight`])
//! 5. diagram and math reinsertion
//! 6. table of contents ([`toc`]) and local image embedding ([`images`])
//! 7. document assembly with the theme stylesheet ([`assemble`])
//!
//! Only assembly talks to the outside world (the [`ThemeRegistry`]), and a
//! failing theme degrades to [`theme::BASELINE_CSS`]. Rendering is a pure
//! function of `(text, options)` otherwise, which is what lets the session
//! run it on a blocking thread and throw stale results away.

pub mod assemble;
pub mod error;
pub mod extract;
pub mod highlight;
pub mod images;
pub mod markdown;
pub mod options;
pub mod theme;
pub mod toc;

use std::sync::Arc;

pub use error::{
  RenderError,
  Result,
};
pub use options::{
  Alignment,
  RenderOptions,
};
pub use theme::{
  BuiltinThemes,
  ThemeDir,
  ThemeError,
  ThemeRegistry,
};

use crate::{
  assemble::AssetNeeds,
  extract::PreprocessedDocument,
};

/// Anything that turns note text into a rendered document.
pub trait Renderer: Send + Sync {
  fn render(&self, text: &str, options: &RenderOptions) -> Result<String>;
}

#[derive(Clone)]
pub struct Pipeline {
  themes: Arc<dyn ThemeRegistry>,
}

impl Pipeline {
  pub fn new(themes: Arc<dyn ThemeRegistry>) -> Self {
    Self { themes }
  }

  pub fn themes(&self) -> &dyn ThemeRegistry {
    self.themes.as_ref()
  }

  /// Stages one through six: the article body without the document shell.
  pub fn render_body(&self, text: &str, options: &RenderOptions) -> (String, AssetNeeds) {
    let marker = toc::has_marker(text);
    let doc = PreprocessedDocument::extract(text);

    let (html, headings) = markdown::to_html(&doc.text, |chunk| doc.restore_source(chunk));
    let html = highlight::highlight_code_blocks(&html);
    let mut html = doc.reinsert(&html);

    if options.include_toc || marker {
      html = toc::insert_toc(&html, &toc::generate_toc(&headings), marker);
    }
    if let Some(base_dir) = &options.base_dir {
      html = images::embed_images(&html, base_dir);
    }

    let needs = AssetNeeds {
      diagrams: doc.has_diagrams(),
      math:     doc.has_math(),
    };
    (html, needs)
  }
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new(Arc::new(BuiltinThemes))
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline").finish_non_exhaustive()
  }
}

impl Renderer for Pipeline {
  fn render(&self, text: &str, options: &RenderOptions) -> Result<String> {
    let (body, needs) = self.render_body(text, options);
    Ok(assemble::assemble(&body, options, self.themes(), needs))
  }
}

/// Render with the builtin themes.
pub fn render_document(text: &str, options: &RenderOptions) -> Result<String> {
  Pipeline::default().render(text, options)
}
