//! Volatile block extraction.
//!
//! Diagram fences and TeX math do not survive CommonMark conversion intact
//! (underscores turn into emphasis, backslashes get eaten). They are cut out
//! of the raw text before conversion, replaced by inert placeholders and put
//! back into dedicated containers afterwards.
//!
//! A placeholder is a kind tag and index between two Private Use Area
//! sentinels (`U+E000` and `U+E001`). Sentinels already present in the note
//! are replaced with `U+FFFD` first, so no user text can ever resolve to an
//! extracted region.
//!
//! Passes run in a fixed order: diagrams, display math, inline math. Each
//! pass scans the output of the previous one and applies its replacements
//! back to front so earlier byte ranges stay valid. Placeholders carry their
//! index into the per-kind side list, assigned in document order.

use std::{
  borrow::Cow,
  ops::Range,
};

use once_cell::sync::Lazy;
use regex::{
  Captures,
  Regex,
};

use crate::markdown::escape_html;

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static DIAGRAM: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?ms)^[ \t]{0,3}```[ \t]*mermaid[ \t]*\r?\n(.*?)^[ \t]{0,3}```[ \t]*$")
    .expect("diagram regex should compile")
});

static MATH_BLOCK: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").expect("block math regex should compile"));

static MATH_INLINE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\$([^\s$](?:[^$\n]*?[^\s$])?)\$").expect("inline math regex should compile")
});

static CODE_SPAN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"`[^`\n]+`").expect("code span regex should compile"));

static BLOCK_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"<p>\x{E000}(MERMAIDBLOCK|MATHBLOCK)(\d+)\x{E001}</p>\n?")
    .expect("block placeholder regex should compile")
});

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\x{E000}(MERMAIDBLOCK|MATHBLOCK|MATHINLINE)(\d+)\x{E001}")
    .expect("placeholder regex should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
  Diagram,
  MathBlock,
  MathInline,
}

impl BlockKind {
  const fn tag(self) -> &'static str {
    match self {
      Self::Diagram => "MERMAIDBLOCK",
      Self::MathBlock => "MATHBLOCK",
      Self::MathInline => "MATHINLINE",
    }
  }

  fn from_tag(tag: &str) -> Option<Self> {
    match tag {
      "MERMAIDBLOCK" => Some(Self::Diagram),
      "MATHBLOCK" => Some(Self::MathBlock),
      "MATHINLINE" => Some(Self::MathInline),
      _ => None,
    }
  }

  pub fn placeholder(self, index: usize) -> String {
    format!("{OPEN}{}{index}{CLOSE}", self.tag())
  }

  const fn is_block(self) -> bool {
    !matches!(self, Self::MathInline)
  }
}

/// One extracted region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
  /// The raw text the placeholder replaced, delimiters included.
  pub source: String,
  pub body:   String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessedDocument {
  /// Markdown with placeholders in place of the extracted regions.
  pub text:        String,
  pub diagrams:    Vec<Extracted>,
  pub math_blocks: Vec<Extracted>,
  pub math_inline: Vec<Extracted>,
}

impl PreprocessedDocument {
  pub fn extract(raw: &str) -> Self {
    let mut doc = Self::default();
    let raw = neutralize_sentinels(raw);
    let text = extract_pass(&raw, &DIAGRAM, BlockKind::Diagram, &mut doc.diagrams);
    let text = extract_pass(&text, &MATH_BLOCK, BlockKind::MathBlock, &mut doc.math_blocks);
    doc.text = extract_pass(&text, &MATH_INLINE, BlockKind::MathInline, &mut doc.math_inline);
    doc
  }

  pub fn has_diagrams(&self) -> bool {
    !self.diagrams.is_empty()
  }

  pub fn has_math(&self) -> bool {
    !self.math_blocks.is_empty() || !self.math_inline.is_empty()
  }

  fn lookup(&self, kind: BlockKind, index: usize) -> Option<&Extracted> {
    match kind {
      BlockKind::Diagram => self.diagrams.get(index),
      BlockKind::MathBlock => self.math_blocks.get(index),
      BlockKind::MathInline => self.math_inline.get(index),
    }
  }

  fn resolve(&self, caps: &Captures) -> Option<(BlockKind, &Extracted)> {
    let kind = BlockKind::from_tag(caps.get(1)?.as_str())?;
    let index = caps.get(2)?.as_str().parse().ok()?;
    Some((kind, self.lookup(kind, index)?))
  }

  /// Replace placeholders in converted HTML with their containers. Block
  /// placeholders that became a paragraph of their own lose the `<p>`.
  /// Unknown placeholders are left alone.
  pub fn reinsert(&self, html: &str) -> String {
    let blocks = BLOCK_PARAGRAPH.replace_all(html, |caps: &Captures| {
      match self.resolve(caps) {
        Some((kind, extracted)) => container(kind, extracted),
        None => caps[0].to_owned(),
      }
    });
    PLACEHOLDER
      .replace_all(&blocks, |caps: &Captures| {
        match self.resolve(caps) {
          Some((kind, extracted)) => container(kind, extracted),
          None => caps[0].to_owned(),
        }
      })
      .into_owned()
  }

  /// Put the original source text back in place of placeholders.
  pub fn restore_source(&self, text: &str) -> String {
    PLACEHOLDER
      .replace_all(text, |caps: &Captures| {
        match self.resolve(caps) {
          Some((_, extracted)) => extracted.source.clone(),
          None => caps[0].to_owned(),
        }
      })
      .into_owned()
  }
}

fn container(kind: BlockKind, extracted: &Extracted) -> String {
  let body = escape_html(&extracted.body);
  match kind {
    BlockKind::Diagram => format!("<div class=\"mermaid\">{body}</div>\n"),
    BlockKind::MathBlock => format!("<div class=\"math-display\">\\[{body}\\]</div>\n"),
    BlockKind::MathInline => format!("<span class=\"math-inline\">\\({body}\\)</span>"),
  }
}

fn extract_pass(text: &str, regex: &Regex, kind: BlockKind, out: &mut Vec<Extracted>) -> String {
  let mut skip = code_regions(text);
  if kind != BlockKind::Diagram {
    skip.extend(CODE_SPAN.find_iter(text).map(|m| m.range()));
  }

  let found: Vec<(Range<usize>, String)> = regex
    .captures_iter(text)
    .filter_map(|caps| {
      let whole = caps.get(0)?;
      let body = caps.get(1)?;
      let start = whole.start();
      if is_escaped(text, start) || skip.iter().any(|r| r.start < start && start < r.end) {
        return None;
      }
      Some((whole.range(), body.as_str().to_owned()))
    })
    .collect();

  let base = out.len();
  out.extend(found.iter().map(|(range, body)| {
    Extracted {
      source: text[range.clone()].to_owned(),
      body:   clean_body(kind, body),
    }
  }));

  let mut result = text.to_owned();
  for (idx, (range, _)) in found.iter().enumerate().rev() {
    let placeholder = kind.placeholder(base + idx);
    if kind.is_block() {
      result.replace_range(range.clone(), &format!("\n\n{placeholder}\n\n"));
    } else {
      result.replace_range(range.clone(), &placeholder);
    }
  }
  result
}

fn neutralize_sentinels(raw: &str) -> Cow<'_, str> {
  if raw.contains([OPEN, CLOSE]) {
    Cow::Owned(raw.replace([OPEN, CLOSE], "\u{FFFD}"))
  } else {
    Cow::Borrowed(raw)
  }
}

fn clean_body(kind: BlockKind, body: &str) -> String {
  match kind {
    BlockKind::Diagram => body.trim_end_matches(['\r', '\n']).to_owned(),
    BlockKind::MathBlock | BlockKind::MathInline => body.trim().to_owned(),
  }
}

fn is_escaped(text: &str, at: usize) -> bool {
  text[..at].ends_with('\\')
}

/// Byte ranges of fenced code blocks (```` ``` ```` or `~~~`). An unclosed
/// fence runs to the end of the text.
pub(crate) fn code_regions(text: &str) -> Vec<Range<usize>> {
  let mut regions = Vec::new();
  let mut open: Option<(usize, &str)> = None;
  let mut offset = 0;

  for line in text.split_inclusive('\n') {
    let trimmed = line.trim_start();
    let fence = ["```", "~~~"]
      .into_iter()
      .find(|marker| trimmed.starts_with(marker));
    match (open, fence) {
      (None, Some(marker)) => open = Some((offset, marker)),
      (Some((start, marker)), Some(found)) if found == marker => {
        regions.push(start..offset + line.len());
        open = None;
      },
      _ => {},
    }
    offset += line.len();
  }
  if let Some((start, _)) = open {
    regions.push(start..text.len());
  }
  regions
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn diagrams_are_cut_out() {
    let doc = PreprocessedDocument::extract("a\n\n```mermaid\ngraph TD\nA-->B\n```\n\nb");
    assert_eq!(doc.diagrams.len(), 1);
    assert_eq!(doc.diagrams[0].body, "graph TD\nA-->B");
    let block = format!("\n\n{}\n\n", BlockKind::Diagram.placeholder(0));
    assert!(doc.text.contains(&block));
    assert!(!doc.text.contains("graph TD"));
  }

  #[test]
  fn indices_follow_document_order() {
    let doc = PreprocessedDocument::extract("$a$ and $b$ then $$c$$");
    assert_eq!(doc.math_blocks[0].body, "c");
    assert_eq!(doc.math_inline[0].body, "a");
    assert_eq!(doc.math_inline[1].body, "b");
    let expected = format!(
      "{} and {} then",
      BlockKind::MathInline.placeholder(0),
      BlockKind::MathInline.placeholder(1)
    );
    assert!(doc.text.starts_with(&expected));
  }

  #[test]
  fn prices_and_code_are_not_math() {
    let doc = PreprocessedDocument::extract("costs $5 or $10\n\n```sh\necho $a$\n```\n\n`$x$` and \\$y$");
    assert!(!doc.has_math());
  }

  #[test]
  fn reinsertion_unwraps_block_paragraphs() {
    let doc = PreprocessedDocument::extract("$$x<1$$\n\nsee $y$");
    let html = format!(
      "<p>{}</p>\n<p>see {} and {}</p>\n",
      BlockKind::MathBlock.placeholder(0),
      BlockKind::MathInline.placeholder(0),
      BlockKind::MathInline.placeholder(9),
    );
    assert_eq!(
      doc.reinsert(&html),
      format!(
        "<div class=\"math-display\">\\[x&lt;1\\]</div>\n<p>see <span \
         class=\"math-inline\">\\(y\\)</span> and {}</p>\n",
        BlockKind::MathInline.placeholder(9)
      )
    );
  }

  #[test]
  fn typed_placeholder_words_stay_text() {
    let text = "literal MATHINLINE0END and $x$\n\n```\nMATHBLOCK0END\n```\n";
    let doc = PreprocessedDocument::extract(text);
    assert_eq!(doc.math_inline.len(), 1);
    assert_eq!(doc.restore_source(&doc.text), text);
  }

  #[test]
  fn sentinels_in_the_note_are_neutralized() {
    let forged = format!("{} and $x$", BlockKind::MathInline.placeholder(0));
    let doc = PreprocessedDocument::extract(&forged);
    assert_eq!(doc.text.matches(OPEN).count(), 1);
    assert_eq!(
      doc.reinsert(&doc.text),
      "\u{FFFD}MATHINLINE0\u{FFFD} and <span class=\"math-inline\">\\(x\\)</span>"
    );
  }

  #[test]
  fn restore_brings_back_source() {
    let doc = PreprocessedDocument::extract("Energy $E=mc^2$");
    assert_eq!(doc.restore_source(&doc.text), "Energy $E=mc^2$");
  }

  #[test]
  fn unclosed_fence_runs_to_end() {
    let text = "a\n```\ncode $x$\n";
    assert_eq!(code_regions(text), [2..text.len()]);
  }
}
