use std::path::PathBuf;

use serde::{
  Deserialize,
  Serialize,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
  #[default]
  Left,
  Center,
  Right,
  Justify,
}

impl Alignment {
  pub const fn as_css(self) -> &'static str {
    match self {
      Self::Left => "left",
      Self::Center => "center",
      Self::Right => "right",
      Self::Justify => "justify",
    }
  }
}

/// Everything a render depends on besides the text itself.
///
/// The theme is resolved once per request from `theme_id`; `None` selects the
/// registry's default theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderOptions {
  pub theme_id:          Option<String>,
  pub include_toc:       bool,
  pub line_spacing:      f32,
  pub paragraph_spacing: f32,
  pub alignment:         Alignment,
  pub max_width:         Option<u32>,
  /// Directory relative image paths resolve against. Images are only
  /// embedded when this is set.
  #[serde(skip)]
  pub base_dir:          Option<PathBuf>,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self {
      theme_id:          None,
      include_toc:       false,
      line_spacing:      1.6,
      paragraph_spacing: 1.0,
      alignment:         Alignment::Left,
      max_width:         Some(860),
      base_dir:          None,
    }
  }
}
