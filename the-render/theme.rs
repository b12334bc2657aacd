//! Theme registry: stylesheets by theme id plus the script assets diagrams
//! and math need.

use std::{
  fs,
  io,
  path::{
    Path,
    PathBuf,
  },
};

use thiserror::Error;

pub const DEFAULT_THEME: &str = "github";

pub const DIAGRAM_ASSET: &str = "mermaid.js";
pub const MATH_ASSET: &str = "math.js";

/// Used whenever the requested theme can not be loaded.
pub const BASELINE_CSS: &str = r#"body {
  font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif;
  color: #222;
  background: #fff;
  padding: 1.5em;
}
a { color: #0969da; }
pre, code { font-family: ui-monospace, Menlo, Consolas, monospace; }
pre { background: #f6f8fa; padding: 0.8em; overflow: auto; }
blockquote { border-left: 3px solid #ccc; margin-left: 0; padding-left: 1em; color: #555; }
table { border-collapse: collapse; }
th, td { border: 1px solid #ccc; padding: 0.3em 0.6em; }
.toc { border-bottom: 1px solid #ddd; margin-bottom: 1em; }
.math-display { text-align: center; overflow-x: auto; }
"#;

const GITHUB_CSS: &str = r#"body {
  font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif;
  color: #1f2328;
  background: #ffffff;
  padding: 2em;
}
h1, h2 { border-bottom: 1px solid #d1d9e0; padding-bottom: 0.3em; }
a { color: #0969da; text-decoration: none; }
code { background: rgba(129, 139, 152, 0.12); border-radius: 6px; padding: 0.2em 0.4em; }
pre { background: #f6f8fa; border-radius: 6px; padding: 1em; overflow: auto; }
pre code { background: none; padding: 0; }
blockquote { border-left: 0.25em solid #d1d9e0; color: #59636e; margin-left: 0; padding: 0 1em; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d1d9e0; padding: 6px 13px; }
.toc { background: #f6f8fa; border-radius: 6px; padding: 0.5em 1em; }
.hl-comment { color: #59636e; font-style: italic; }
.hl-keyword, .hl-storage { color: #cf222e; }
.hl-string { color: #0a3069; }
.hl-constant { color: #0550ae; }
.hl-entity { color: #8250df; }
.math-display { text-align: center; overflow-x: auto; }
"#;

const PAPER_CSS: &str = r#"body {
  font-family: Georgia, "Times New Roman", serif;
  color: #2b2b2b;
  background: #fbf8f1;
  padding: 2.5em;
}
h1, h2, h3 { font-weight: normal; }
a { color: #8a3b12; }
pre { background: #f1ece0; padding: 1em; overflow: auto; }
code { font-family: "Courier New", monospace; }
blockquote { font-style: italic; border-left: 2px solid #c9bfa8; margin-left: 0; padding-left: 1em; }
.toc { font-size: 0.9em; }
.hl-comment { color: #8c8273; }
.hl-keyword, .hl-storage { color: #8a3b12; }
.hl-string { color: #4d6b2f; }
.math-display { text-align: center; }
"#;

const NIGHT_CSS: &str = r#"body {
  font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif;
  color: #d6deeb;
  background: #011627;
  padding: 2em;
}
a { color: #82aaff; }
pre { background: #0b2942; padding: 1em; overflow: auto; }
code { color: #ecc48d; }
blockquote { border-left: 3px solid #5f7e97; color: #a0b3c5; margin-left: 0; padding-left: 1em; }
th, td { border: 1px solid #5f7e97; padding: 0.3em 0.6em; }
.hl-comment { color: #637777; font-style: italic; }
.hl-keyword, .hl-storage { color: #c792ea; }
.hl-string { color: #ecc48d; }
.hl-constant { color: #f78c6c; }
.math-display { text-align: center; }
"#;

const MERMAID_JS: &str = r#"(function () {
  var s = document.createElement("script");
  s.src = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";
  s.onload = function () { mermaid.initialize({ startOnLoad: true }); mermaid.run(); };
  document.head.appendChild(s);
})();
"#;

const MATH_JS: &str = r#"(function () {
  var s = document.createElement("script");
  s.src = "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-chtml.js";
  s.async = true;
  document.head.appendChild(s);
})();
"#;

#[derive(Debug, Error)]
pub enum ThemeError {
  #[error("unknown theme {0:?}")]
  Unknown(String),
  #[error("asset {0:?} not found")]
  AssetNotFound(String),
  #[error("invalid theme or asset name {0:?}")]
  InvalidName(String),
  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Source of stylesheets and script assets for rendered documents.
pub trait ThemeRegistry: Send + Sync {
  fn default_theme(&self) -> &str {
    DEFAULT_THEME
  }

  fn get_style(&self, theme_id: &str) -> Result<String, ThemeError>;

  fn get_asset(&self, name: &str) -> Result<String, ThemeError>;

  /// Theme ids this registry can serve, sorted.
  fn list(&self) -> Vec<String>;
}

/// Themes compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinThemes;

impl BuiltinThemes {
  const THEMES: [(&'static str, &'static str); 3] = [
    ("github", GITHUB_CSS),
    ("night", NIGHT_CSS),
    ("paper", PAPER_CSS),
  ];
}

impl ThemeRegistry for BuiltinThemes {
  fn get_style(&self, theme_id: &str) -> Result<String, ThemeError> {
    Self::THEMES
      .iter()
      .find(|(id, _)| *id == theme_id)
      .map(|(_, css)| (*css).to_owned())
      .ok_or_else(|| ThemeError::Unknown(theme_id.to_owned()))
  }

  fn get_asset(&self, name: &str) -> Result<String, ThemeError> {
    match name {
      DIAGRAM_ASSET => Ok(MERMAID_JS.to_owned()),
      MATH_ASSET => Ok(MATH_JS.to_owned()),
      _ => Err(ThemeError::AssetNotFound(name.to_owned())),
    }
  }

  fn list(&self) -> Vec<String> {
    Self::THEMES.iter().map(|(id, _)| (*id).to_owned()).collect()
  }
}

/// User themes from a directory: `<root>/<id>.css` and
/// `<root>/assets/<name>`. Anything missing there falls through to the
/// builtin set.
#[derive(Debug, Clone)]
pub struct ThemeDir {
  root:    PathBuf,
  builtin: BuiltinThemes,
}

impl ThemeDir {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root:    root.into(),
      builtin: BuiltinThemes,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

fn is_valid_name(name: &str) -> bool {
  !name.is_empty()
    && !name.starts_with('.')
    && name
      .chars()
      .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

fn read_optional(path: &Path) -> Result<Option<String>, ThemeError> {
  match fs::read_to_string(path) {
    Ok(text) => Ok(Some(text)),
    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(err) => Err(err.into()),
  }
}

impl ThemeRegistry for ThemeDir {
  fn get_style(&self, theme_id: &str) -> Result<String, ThemeError> {
    if !is_valid_name(theme_id) {
      return Err(ThemeError::InvalidName(theme_id.to_owned()));
    }
    match read_optional(&self.root.join(format!("{theme_id}.css")))? {
      Some(css) => Ok(css),
      None => self.builtin.get_style(theme_id),
    }
  }

  fn get_asset(&self, name: &str) -> Result<String, ThemeError> {
    if !is_valid_name(name) {
      return Err(ThemeError::InvalidName(name.to_owned()));
    }
    match read_optional(&self.root.join("assets").join(name))? {
      Some(asset) => Ok(asset),
      None => self.builtin.get_asset(name),
    }
  }

  fn list(&self) -> Vec<String> {
    let mut ids = self.builtin.list();
    if let Ok(entries) = fs::read_dir(&self.root) {
      ids.extend(entries.filter_map(|entry| {
        let path = entry.ok()?.path();
        if path.extension()? != "css" {
          return None;
        }
        Some(path.file_stem()?.to_str()?.to_owned())
      }));
    }
    ids.sort();
    ids.dedup();
    ids
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_themes() {
    let themes = BuiltinThemes;
    assert!(themes.get_style(DEFAULT_THEME).is_ok());
    assert!(matches!(themes.get_style("nope"), Err(ThemeError::Unknown(_))));
    assert!(themes.get_asset(DIAGRAM_ASSET).is_ok());
    assert!(matches!(themes.get_asset("x.js"), Err(ThemeError::AssetNotFound(_))));
    assert_eq!(themes.list(), ["github", "night", "paper"]);
  }

  #[test]
  fn theme_dir_overrides_and_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("github.css"), "body { color: red; }").unwrap();
    fs::write(dir.path().join("solar.css"), "body { color: gold; }").unwrap();
    let themes = ThemeDir::new(dir.path());

    assert_eq!(themes.get_style("github").unwrap(), "body { color: red; }");
    assert_eq!(themes.get_style("solar").unwrap(), "body { color: gold; }");
    assert_eq!(themes.get_style("paper").unwrap(), PAPER_CSS);
    assert!(themes.get_asset(MATH_ASSET).is_ok());
    assert!(themes.list().contains(&"solar".to_owned()));
  }

  #[test]
  fn names_can_not_escape_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let themes = ThemeDir::new(dir.path());
    assert!(matches!(themes.get_style("../secret"), Err(ThemeError::InvalidName(_))));
    assert!(matches!(themes.get_asset(".hidden"), Err(ThemeError::InvalidName(_))));
  }
}
