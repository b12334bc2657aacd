use std::fmt::Write as _;

use crate::{
  error::RenderError,
  options::RenderOptions,
  theme::{
    BASELINE_CSS,
    DIAGRAM_ASSET,
    MATH_ASSET,
    ThemeRegistry,
  },
};

/// Which script assets the body needs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssetNeeds {
  pub diagrams: bool,
  pub math:     bool,
}

/// Stylesheet for the requested theme, or the baseline one if it fails.
pub fn resolve_style(themes: &dyn ThemeRegistry, options: &RenderOptions) -> String {
  let theme = options
    .theme_id
    .as_deref()
    .unwrap_or_else(|| themes.default_theme());
  match themes.get_style(theme) {
    Ok(css) => css,
    Err(source) => {
      let err = RenderError::ThemeLoad {
        theme: theme.to_owned(),
        source,
      };
      log::warn!("{err}, using baseline style");
      BASELINE_CSS.to_owned()
    },
  }
}

fn layout_css(options: &RenderOptions) -> String {
  let mut css = String::from(":root {\n");
  let _ = writeln!(css, "  --line-spacing: {};", options.line_spacing);
  let _ = writeln!(css, "  --paragraph-spacing: {}em;", options.paragraph_spacing);
  let _ = writeln!(css, "  --text-align: {};", options.alignment.as_css());
  match options.max_width {
    Some(width) => {
      let _ = writeln!(css, "  --max-width: {width}px;");
    },
    None => css.push_str("  --max-width: none;\n"),
  }
  css.push_str(
    "}\n.markdown-body {\n  line-height: var(--line-spacing);\n  text-align: \
     var(--text-align);\n  max-width: var(--max-width);\n  margin: 0 auto;\n}\n.markdown-body p \
     {\n  margin: 0 0 var(--paragraph-spacing) 0;\n}\n",
  );
  css
}

fn script(themes: &dyn ThemeRegistry, name: &str) -> Option<String> {
  match themes.get_asset(name) {
    Ok(js) => Some(format!("<script>\n{js}</script>\n")),
    Err(source) => {
      log::warn!("{} ({source})", RenderError::StyleAssetNotFound(name.to_owned()));
      None
    },
  }
}

/// Wrap a rendered body into a standalone HTML document.
pub fn assemble(
  body: &str,
  options: &RenderOptions,
  themes: &dyn ThemeRegistry,
  needs: AssetNeeds,
) -> String {
  let style = resolve_style(themes, options);
  let layout = layout_css(options);

  let mut scripts = String::new();
  if needs.diagrams
    && let Some(tag) = script(themes, DIAGRAM_ASSET)
  {
    scripts.push_str(&tag);
  }
  if needs.math
    && let Some(tag) = script(themes, MATH_ASSET)
  {
    scripts.push_str(&tag);
  }

  format!(
    "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<meta name=\"viewport\" \
     content=\"width=device-width, initial-scale=1\">\n<style>\n{style}</style>\n<style>\n{layout}</style>\n</head>\n<body>\n<article \
     class=\"markdown-body\">\n{body}</article>\n{scripts}</body>\n</html>\n"
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    options::Alignment,
    theme::{
      BuiltinThemes,
      ThemeError,
    },
  };

  struct Broken;

  impl ThemeRegistry for Broken {
    fn get_style(&self, theme_id: &str) -> Result<String, ThemeError> {
      Err(ThemeError::Unknown(theme_id.to_owned()))
    }

    fn get_asset(&self, name: &str) -> Result<String, ThemeError> {
      Err(ThemeError::AssetNotFound(name.to_owned()))
    }

    fn list(&self) -> Vec<String> {
      Vec::new()
    }
  }

  #[test]
  fn failing_theme_falls_back_to_baseline() {
    let html = assemble("<p>x</p>\n", &RenderOptions::default(), &Broken, AssetNeeds {
      diagrams: true,
      math:     true,
    });
    assert!(html.contains(BASELINE_CSS));
    assert!(html.contains("<p>x</p>"));
    assert!(!html.contains("<script>"));
  }

  #[test]
  fn layout_follows_options() {
    let options = RenderOptions {
      alignment: Alignment::Justify,
      max_width: None,
      line_spacing: 2.0,
      ..RenderOptions::default()
    };
    let html = assemble("", &options, &BuiltinThemes, AssetNeeds::default());
    assert!(html.contains("--text-align: justify;"));
    assert!(html.contains("--max-width: none;"));
    assert!(html.contains("--line-spacing: 2;"));
  }

  #[test]
  fn scripts_only_when_needed() {
    let themes = BuiltinThemes;
    let plain = assemble("", &RenderOptions::default(), &themes, AssetNeeds::default());
    assert!(!plain.contains("<script>"));
    let math = assemble("", &RenderOptions::default(), &themes, AssetNeeds {
      diagrams: false,
      math:     true,
    });
    assert_eq!(math.matches("<script>").count(), 1);
  }
}
