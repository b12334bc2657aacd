use pulldown_cmark::{
  CowStr,
  Event,
  Options,
  Parser,
  Tag,
  TagEnd,
  html,
};

use crate::toc::{
  Heading,
  Slugger,
};

fn options() -> Options {
  let mut options = Options::empty();
  options.insert(Options::ENABLE_TABLES);
  options.insert(Options::ENABLE_FOOTNOTES);
  options.insert(Options::ENABLE_STRIKETHROUGH);
  options.insert(Options::ENABLE_TASKLISTS);
  options
}

/// CommonMark to HTML, plus every heading of the document in order.
///
/// Headings get an `id` slugged from their text, after `restore` maps
/// placeholders back to the source they stand for. The returned headings
/// carry the same ids, quoted and setext headings included.
pub fn to_html(text: &str, restore: impl Fn(&str) -> String) -> (String, Vec<Heading>) {
  let mut events: Vec<Event> = Parser::new_ext(text, options()).collect();
  let mut slugs = Slugger::default();
  let mut headings = Vec::new();

  let mut idx = 0;
  while idx < events.len() {
    let level = match &events[idx] {
      Event::Start(Tag::Heading { level, .. }) => Some(*level as u8),
      _ => None,
    };
    if let Some(level) = level {
      let mut title = String::new();
      let mut end = idx + 1;
      while end < events.len() && !matches!(events[end], Event::End(TagEnd::Heading(_))) {
        if let Event::Text(chunk) | Event::Code(chunk) = &events[end] {
          title.push_str(chunk);
        }
        end += 1;
      }
      let text = restore(&title).trim().to_owned();
      let slug = slugs.unique(&text);
      if let Event::Start(Tag::Heading { id, .. }) = &mut events[idx] {
        *id = Some(CowStr::from(slug.clone()));
      }
      headings.push(Heading {
        level,
        text,
        id: slug,
      });
      idx = end;
    }
    idx += 1;
  }

  let mut out = String::with_capacity(text.len() * 3 / 2);
  html::push_html(&mut out, events.into_iter());
  (out, headings)
}

pub fn escape_html(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(ch),
    }
  }
  out
}

pub(crate) fn unescape_html(text: &str) -> String {
  if !text.contains('&') {
    return text.to_owned();
  }
  text
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
    .replace("&#39;", "'")
    .replace("&#x27;", "'")
    .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn headings_get_slug_ids() {
    let (html, headings) = to_html("# Hello World\n\n## Hello World\n", str::to_owned);
    assert!(html.contains("<h1 id=\"hello-world\">Hello World</h1>"));
    assert!(html.contains("<h2 id=\"hello-world-1\">Hello World</h2>"));
    let ids: Vec<_> = headings.iter().map(|h| (h.level, h.id.as_str())).collect();
    assert_eq!(ids, [(1, "hello-world"), (2, "hello-world-1")]);
  }

  #[test]
  fn heading_ids_use_restored_text() {
    let (html, headings) = to_html("## Energy XX\n", |text| text.replace("XX", "$E=mc^2$"));
    assert!(html.contains("id=\"energy-emc2\""));
    assert_eq!(headings[0].text, "Energy $E=mc^2$");
  }

  #[test]
  fn fenced_code_keeps_language_class() {
    let (html, _) = to_html("```rust\nfn main() {}\n```\n", str::to_owned);
    assert!(html.contains("<pre><code class=\"language-rust\">fn main() {}\n</code></pre>"));
  }

  #[test]
  fn escape_roundtrip() {
    let text = "a < b && \"c\" > 'd'";
    assert_eq!(unescape_html(&escape_html(text)), text);
  }
}
