//! Syntax colouring for fenced code blocks.
//!
//! Runs on converted HTML: every `<pre><code class="language-X">` block is
//! unescaped, coloured with syntect's classed generator (`hl-` prefixed
//! classes, styled by the theme) and rewrapped with a `data-language`
//! attribute. Unknown languages keep their escaped text as is.

use once_cell::sync::Lazy;
use regex::{
  Captures,
  Regex,
};
use syntect::{
  html::{
    ClassStyle,
    ClassedHTMLGenerator,
  },
  parsing::SyntaxSet,
  util::LinesWithEndings,
};

use crate::markdown::{
  escape_html,
  unescape_html,
};

pub const CLASS_PREFIX: &str = "hl-";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?s)<pre><code class="language-([^"]+)">(.*?)</code></pre>"#)
    .expect("code block regex should compile")
});

pub fn highlight_code_blocks(html: &str) -> String {
  CODE_BLOCK
    .replace_all(html, |caps: &Captures| {
      let language = unescape_html(&caps[1]);
      let escaped = &caps[2];
      let body = highlight(&language, &unescape_html(escaped)).unwrap_or_else(|| escaped.to_owned());
      format!(
        "<pre class=\"code\" data-language=\"{}\"><code>{body}</code></pre>",
        escape_html(&language)
      )
    })
    .into_owned()
}

fn highlight(language: &str, code: &str) -> Option<String> {
  let syntax = SYNTAXES
    .find_syntax_by_token(language)
    .or_else(|| SYNTAXES.find_syntax_by_extension(language))?;
  let mut generator = ClassedHTMLGenerator::new_with_class_style(
    syntax,
    &SYNTAXES,
    ClassStyle::SpacedPrefixed {
      prefix: CLASS_PREFIX,
    },
  );
  for line in LinesWithEndings::from(code) {
    if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
      log::debug!("highlighting {language} block failed: {err}");
      return None;
    }
  }
  Some(generator.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_language_is_coloured() {
    let html = "<pre><code class=\"language-rust\">let x = &quot;a&lt;b&quot;;\n</code></pre>\n";
    let out = highlight_code_blocks(html);
    assert!(out.starts_with("<pre class=\"code\" data-language=\"rust\"><code>"));
    assert!(out.contains("<span class=\"hl-"));
    // content is escaped exactly once
    assert!(out.contains("&lt;"));
    assert!(!out.contains("&amp;lt;"));
  }

  #[test]
  fn unknown_language_keeps_text() {
    let html = "<pre><code class=\"language-nope\">a &amp; b\n</code></pre>";
    assert_eq!(
      highlight_code_blocks(html),
      "<pre class=\"code\" data-language=\"nope\"><code>a &amp; b\n</code></pre>"
    );
  }

  #[test]
  fn plain_blocks_are_untouched() {
    let html = "<pre><code>x\n</code></pre>";
    assert_eq!(highlight_code_blocks(html), html);
  }
}
