use std::time::Duration;

use serde::{
  Deserialize,
  Serialize,
};
use the_notes_render::{
  Alignment,
  RenderOptions,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
  pub autosave: AutoSaveConfig,
  pub render:   RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AutoSaveConfig {
  pub enable:         bool,
  /// Quiet period after the last edit before the note is saved.
  pub after_delay_ms: u64,
}

impl Default for AutoSaveConfig {
  fn default() -> Self {
    Self {
      enable:         true,
      after_delay_ms: 1500,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderConfig {
  pub debounce_ms:       u64,
  pub timeout_ms:        u64,
  pub include_toc:       bool,
  pub line_spacing:      f32,
  pub paragraph_spacing: f32,
  pub alignment:         Alignment,
  pub max_width:         Option<u32>,
}

impl Default for RenderConfig {
  fn default() -> Self {
    let options = RenderOptions::default();
    Self {
      debounce_ms:       300,
      timeout_ms:        5000,
      include_toc:       options.include_toc,
      line_spacing:      options.line_spacing,
      paragraph_spacing: options.paragraph_spacing,
      alignment:         options.alignment,
      max_width:         options.max_width,
    }
  }
}

impl RenderConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn options(&self, theme_id: Option<String>) -> RenderOptions {
    RenderOptions {
      theme_id,
      include_toc: self.include_toc,
      line_spacing: self.line_spacing,
      paragraph_spacing: self.paragraph_spacing,
      alignment: self.alignment,
      max_width: self.max_width,
      base_dir: None,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn partial_config_fills_defaults() {
    let config: SessionConfig = toml::from_str(
      r#"
      [autosave]
      after-delay-ms = 250

      [render]
      alignment = "justify"
      "#,
    )
    .unwrap();
    assert!(config.autosave.enable);
    assert_eq!(config.autosave.after_delay_ms, 250);
    assert_eq!(config.render.alignment, Alignment::Justify);
    assert_eq!(config.render.debounce_ms, 300);
  }

  #[test]
  fn options_carry_theme() {
    let options = RenderConfig::default().options(Some("paper".into()));
    assert_eq!(options.theme_id.as_deref(), Some("paper"));
    assert_eq!(options.max_width, Some(860));
  }
}
