//! Table of contents.
//!
//! The heading list comes out of CommonMark conversion of the note
//! ([`crate::markdown::to_html`]), so fenced code never contributes and
//! every entry links to an id that exists in the rendered body. The list
//! nests by level with one `<ul>` opened or closed per level step.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{
  NoExpand,
  Regex,
};

use crate::{
  extract::code_regions,
  markdown::escape_html,
};

static MARKER_LINE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?im)^[ \t]*\[toc\][ \t]*$").expect("toc marker regex should compile"));

static MARKER_HTML: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)<p>\[toc\]</p>\n?").expect("toc paragraph regex should compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
  pub level: u8,
  pub text:  String,
  pub id:    String,
}

/// Whether the raw text carries a `[TOC]` line outside code.
pub fn has_marker(raw: &str) -> bool {
  let code = code_regions(raw);
  MARKER_LINE
    .find_iter(raw)
    .any(|m| !code.iter().any(|r| r.contains(&m.start())))
}

/// Lowercase, spaces to hyphens, drop everything outside `[a-z0-9-]`.
pub fn slugify(text: &str) -> String {
  text
    .trim()
    .to_lowercase()
    .chars()
    .filter_map(|ch| {
      match ch {
        ' ' => Some('-'),
        'a'..='z' | '0'..='9' | '-' => Some(ch),
        _ => None,
      }
    })
    .collect()
}

/// Hands out slugs, suffixing repeats with `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct Slugger {
  seen: HashMap<String, usize>,
}

impl Slugger {
  pub fn unique(&mut self, text: &str) -> String {
    let mut base = slugify(text);
    if base.is_empty() {
      base.push_str("section");
    }
    let count = self.seen.entry(base.clone()).or_insert(0);
    let slug = match *count {
      0 => base,
      n => format!("{base}-{n}"),
    };
    *count += 1;
    slug
  }
}

/// The nested list for `headings`, or an empty string when there are none.
pub fn generate_toc(headings: &[Heading]) -> String {
  let Some(base) = headings.iter().map(|h| h.level).min() else {
    return String::new();
  };

  let mut html = String::from("<nav class=\"toc\">\n");
  let mut depth = 0usize;
  for heading in headings {
    let level = usize::from(heading.level - base) + 1;
    if level > depth {
      if depth > 0 {
        html.push('\n');
      }
      for step in depth..level {
        html.push_str("<ul>\n");
        if step + 1 < level {
          html.push_str("<li>\n");
        }
      }
    } else {
      html.push_str("</li>\n");
      for _ in level..depth {
        html.push_str("</ul>\n</li>\n");
      }
    }
    depth = level;
    html.push_str(&format!(
      "<li><a href=\"#{}\">{}</a>",
      heading.id,
      escape_html(&heading.text)
    ));
  }
  html.push_str("</li>\n");
  for _ in 1..depth {
    html.push_str("</ul>\n</li>\n");
  }
  html.push_str("</ul>\n</nav>\n");
  html
}

/// Put `toc` where the marker paragraphs are, or above the body when there
/// is no marker.
pub fn insert_toc(html: &str, toc: &str, marker: bool) -> String {
  if marker && MARKER_HTML.is_match(html) {
    return MARKER_HTML.replace_all(html, NoExpand(toc)).into_owned();
  }
  format!("{toc}{html}")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::markdown;

  fn collect_headings(text: &str) -> Vec<Heading> {
    markdown::to_html(text, str::to_owned).1
  }

  #[test]
  fn siblings_and_children() {
    let headings = collect_headings("# A\n## B\n# C");
    assert_eq!(
      generate_toc(&headings),
      "<nav class=\"toc\">\n<ul>\n<li><a href=\"#a\">A</a>\n<ul>\n<li><a \
       href=\"#b\">B</a></li>\n</ul>\n</li>\n<li><a href=\"#c\">C</a></li>\n</ul>\n</nav>\n"
    );
  }

  #[test]
  fn groups_balance_when_starting_deep() {
    let toc = generate_toc(&collect_headings("### deep\n# top\n"));
    assert_eq!(toc.matches("<ul>").count(), toc.matches("</ul>").count());
    assert_eq!(toc.matches("<li>").count(), toc.matches("</li>").count());
  }

  #[test]
  fn headings_in_code_are_ignored() {
    let headings = collect_headings("# Real\n```\n# not a heading\n```\n#hashtag\n## Closed ##");
    let texts: Vec<_> = headings.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, ["Real", "Closed"]);
  }

  #[test]
  fn quoted_and_setext_headings_are_listed() {
    let headings = collect_headings("> # Quote\n\n# Quote\n\nQuote\n=====\n");
    let ids: Vec<_> = headings.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["quote", "quote-1", "quote-2"]);
  }

  #[test]
  fn slugs() {
    assert_eq!(slugify("Hello, World!"), "hello-world");
    assert_eq!(slugify("Step 2: a-b"), "step-2-a-b");
    let mut slugger = Slugger::default();
    assert_eq!(slugger.unique("Intro"), "intro");
    assert_eq!(slugger.unique("Intro"), "intro-1");
    assert_eq!(slugger.unique("!!"), "section");
  }

  #[test]
  fn link_destinations_do_not_leak_into_ids() {
    let headings = collect_headings("## See [docs](https://example.com)");
    assert_eq!(headings[0].id, "see-docs");
  }

  #[test]
  fn marker_detection() {
    assert!(has_marker("intro\n[toc]\nbody"));
    assert!(!has_marker("```\n[TOC]\n```"));
    assert!(!has_marker("see [TOC] inline"));
  }

  #[test]
  fn toc_goes_at_marker_or_on_top() {
    let toc = "<nav>t</nav>\n";
    assert_eq!(insert_toc("<p>a</p>\n<p>[TOC]</p>\n", toc, true), "<p>a</p>\n<nav>t</nav>\n");
    assert_eq!(insert_toc("<p>a</p>\n", toc, false), "<nav>t</nav>\n<p>a</p>\n");
  }
}
