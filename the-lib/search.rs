//! Find and replace over a note body.
//!
//! [`compute_matches`] is a pure function of `(body, pattern, options)` that
//! returns non-overlapping UTF-16 ranges in ascending order. [`SearchState`]
//! wraps it with the navigation cursor and the replacement text the UI edits.
//!
//! Matches are only meaningful against the exact body they were computed on.
//! Every body change must be followed by [`SearchState::recompute`].
//!
//! Replacements never touch a buffer directly. They return the new text
//! together with the [`EditCommand`]s a host widget applies to keep its undo
//! history in step.

use regex::RegexBuilder;
use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  range::{
    self,
    TextRange,
    Utf16Mapper,
  },
  widget::{
    self,
    EditCommand,
  },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearchOptions {
  pub match_case:   bool,
  pub whole_words:  bool,
  pub regex:        bool,
  pub replace_mode: bool,
}

/// All matches of `pattern` in `body`, ascending and non-overlapping.
///
/// An invalid regex yields no matches; the error is logged and otherwise
/// swallowed.
pub fn compute_matches(body: &str, pattern: &str, options: SearchOptions) -> Vec<TextRange> {
  if pattern.is_empty() || body.is_empty() {
    return Vec::new();
  }

  let bytes = if options.regex {
    regex_matches(body, pattern, options.match_case)
  } else if options.whole_words {
    let wrapped = format!(r"\b{}\b", regex::escape(pattern));
    regex_matches(body, &wrapped, options.match_case)
  } else if options.match_case {
    body
      .match_indices(pattern)
      .map(|(start, found)| start..start + found.len())
      .collect()
  } else {
    folded_matches(body, pattern)
  };

  let mut mapper = Utf16Mapper::new(body);
  bytes.into_iter().map(|bytes| mapper.range(bytes)).collect()
}

fn regex_matches(body: &str, pattern: &str, match_case: bool) -> Vec<std::ops::Range<usize>> {
  let regex = match RegexBuilder::new(pattern)
    .case_insensitive(!match_case)
    .build()
  {
    Ok(regex) => regex,
    Err(err) => {
      log::debug!("search pattern {pattern:?} does not compile: {err}");
      return Vec::new();
    },
  };
  regex
    .find_iter(body)
    .filter(|found| !found.is_empty())
    .map(|found| found.range())
    .collect()
}

/// Lowercased copy of a text with, for every folded byte, the byte offset of
/// the original char it came from. The final entry maps the folded end to
/// the original end.
struct Folded {
  text:   String,
  origin: Vec<usize>,
}

impl Folded {
  fn new(text: &str) -> Self {
    let mut folded = String::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len() + 1);
    for (byte, ch) in text.char_indices() {
      let before = folded.len();
      folded.extend(ch.to_lowercase());
      origin.resize(origin.len() + folded.len() - before, byte);
    }
    origin.push(text.len());
    Self {
      text: folded,
      origin,
    }
  }

  /// Whether folded byte `at` starts the expansion of an original char.
  fn is_boundary(&self, at: usize) -> bool {
    at == 0 || at == self.text.len() || self.origin[at] != self.origin[at - 1]
  }
}

fn folded_matches(body: &str, pattern: &str) -> Vec<std::ops::Range<usize>> {
  let haystack = Folded::new(body);
  let needle = pattern.to_lowercase();
  let mut out = Vec::new();
  let mut cursor = 0;

  while let Some(offset) = haystack.text[cursor..].find(&needle) {
    let start = cursor + offset;
    let end = start + needle.len();
    if haystack.is_boundary(start) && haystack.is_boundary(end) {
      out.push(haystack.origin[start]..haystack.origin[end]);
      cursor = end;
    } else {
      // partial overlap with a multi-char expansion, retry one char later
      let step = haystack.text[start..]
        .chars()
        .next()
        .map_or(1, char::len_utf8);
      cursor = start + step;
    }
    if cursor >= haystack.text.len() {
      break;
    }
  }
  out
}

/// Splice `replacement` over every range, last range first. `ranges` must be
/// non-overlapping; their order does not matter.
pub fn replace_ranges(text: &str, ranges: &[TextRange], replacement: &str) -> String {
  let mut ordered = ranges.to_vec();
  ordered.sort_unstable_by(|a, b| b.cmp(a));
  ordered
    .into_iter()
    .fold(text.to_owned(), |text, range| range::splice(&text, range, replacement))
}

/// Result of a replace operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
  /// The full body after replacement.
  pub text:      String,
  /// The same change expressed for a host widget.
  pub commands:  Vec<EditCommand>,
  /// Where the cursor should land.
  pub selection: TextRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
  pattern:     String,
  options:     SearchOptions,
  replacement: String,
  matches:     Vec<TextRange>,
  current:     Option<usize>,
}

impl SearchState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn pattern(&self) -> &str {
    &self.pattern
  }

  pub fn options(&self) -> SearchOptions {
    self.options
  }

  pub fn replacement(&self) -> &str {
    &self.replacement
  }

  pub fn matches(&self) -> &[TextRange] {
    &self.matches
  }

  pub fn current(&self) -> Option<usize> {
    self.current
  }

  pub fn current_match(&self) -> Option<TextRange> {
    self.current.and_then(|idx| self.matches.get(idx).copied())
  }

  /// A new pattern starts unselected; the first `find_next` lands on the
  /// first match.
  pub fn set_pattern(&mut self, pattern: impl Into<String>, body: &str) {
    self.pattern = pattern.into();
    self.current = None;
    self.recompute(body);
  }

  pub fn set_options(&mut self, options: SearchOptions, body: &str) {
    self.options = options;
    self.current = None;
    self.recompute(body);
  }

  pub fn set_replacement(&mut self, replacement: impl Into<String>) {
    self.replacement = replacement.into();
  }

  /// Recompute matches against `body`. A selected match stays selected,
  /// clamped to the new count.
  pub fn recompute(&mut self, body: &str) {
    self.matches = compute_matches(body, &self.pattern, self.options);
    let count = self.matches.len();
    self.current = self
      .current
      .filter(|_| count > 0)
      .map(|idx| idx.min(count - 1));
  }

  /// Drop pattern and matches. Mode flags and the replacement survive.
  pub fn clear(&mut self) {
    self.pattern.clear();
    self.matches.clear();
    self.current = None;
  }

  pub fn select(&mut self, idx: usize) -> Option<TextRange> {
    if idx < self.matches.len() {
      self.current = Some(idx);
    }
    self.current_match()
  }

  pub fn find_next(&mut self) -> Option<TextRange> {
    let count = self.matches.len();
    if count == 0 {
      return None;
    }
    self.current = Some(self.current.map_or(0, |idx| (idx + 1) % count));
    self.current_match()
  }

  pub fn find_previous(&mut self) -> Option<TextRange> {
    let count = self.matches.len();
    if count == 0 {
      return None;
    }
    self.current = Some(match self.current {
      Some(0) | None => count - 1,
      Some(idx) => idx - 1,
    });
    self.current_match()
  }

  /// Replace the selected match in `body`, then search the new text again.
  ///
  /// Needs a selected match and a non-empty replacement.
  pub fn replace_current(&mut self, body: &str) -> Option<ReplaceOutcome> {
    if self.replacement.is_empty() {
      return None;
    }
    let target = self.current_match()?;
    if !target.is_valid_for(body) {
      self.recompute(body);
      return None;
    }

    let text = range::splice(body, target, &self.replacement);
    let selection = TextRange::point(target.start + range::utf16_len(&self.replacement));
    let commands = vec![EditCommand::single(target, self.replacement.clone())];
    self.recompute(&text);
    Some(ReplaceOutcome {
      text,
      commands,
      selection,
    })
  }

  /// Replace every match in `body`. Matches are cleared afterwards.
  ///
  /// `grouping` asks for the commands to form a single undo unit.
  pub fn replace_all(&mut self, body: &str, grouping: bool) -> Option<ReplaceOutcome> {
    if self.replacement.is_empty() || self.matches.is_empty() {
      return None;
    }
    let len = range::utf16_len(body);
    if self.matches.iter().any(|m| m.end() > len) {
      self.recompute(body);
      return None;
    }

    let text = replace_ranges(body, &self.matches, &self.replacement);
    let commands = widget::replacement_commands(&self.matches, &self.replacement, grouping);
    let selection = self
      .matches
      .first()
      .map_or(TextRange::point(0), |first| {
        TextRange::point(first.start + range::utf16_len(&self.replacement))
      });
    self.matches.clear();
    self.current = None;
    Some(ReplaceOutcome {
      text,
      commands,
      selection,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::widget::{
    PlainTextWidget,
    TextWidget,
    apply_commands,
  };

  fn literal() -> SearchOptions {
    SearchOptions {
      match_case: true,
      ..SearchOptions::default()
    }
  }

  fn ranges(pairs: &[(usize, usize)]) -> Vec<TextRange> {
    pairs.iter().map(|&(s, l)| TextRange::new(s, l)).collect()
  }

  fn linear_rebuild(text: &str, ranges: &[TextRange], replacement: &str) -> String {
    let mut out = String::new();
    let mut last = 0;
    for range in ranges {
      let bytes = range.byte_range(text);
      out.push_str(&text[last..bytes.start]);
      out.push_str(replacement);
      last = bytes.end;
    }
    out.push_str(&text[last..]);
    out
  }

  quickcheck::quickcheck! {
      fn matches_are_idempotent(body: String, pattern: String, case: bool, words: bool) -> bool {
          let options = SearchOptions { match_case: case, whole_words: words, ..SearchOptions::default() };
          compute_matches(&body, &pattern, options) == compute_matches(&body, &pattern, options)
      }

      fn matches_ascend_without_overlap(body: String, pattern: String, case: bool) -> bool {
          let options = SearchOptions { match_case: case, ..SearchOptions::default() };
          let matches = compute_matches(&body, &pattern, options);
          let len = range::utf16_len(&body);
          matches.iter().all(|m| m.end() <= len && !m.is_empty())
              && matches.windows(2).all(|w| w[0].end() <= w[1].start)
      }

      fn descending_splices_equal_linear_rebuild(body: String, pattern: String, replacement: String) -> bool {
          let matches = compute_matches(&body, &pattern, SearchOptions { match_case: true, ..SearchOptions::default() });
          replace_ranges(&body, &matches, &replacement) == linear_rebuild(&body, &matches, &replacement)
      }
  }

  #[test]
  fn literal_matches_do_not_overlap() {
    assert_eq!(
      compute_matches("aaa", "a", literal()),
      ranges(&[(0, 1), (1, 1), (2, 1)])
    );
    assert_eq!(compute_matches("aaaa", "aa", literal()), ranges(&[(0, 2), (2, 2)]));
  }

  #[test]
  fn whole_word_skips_embedded_occurrences() {
    let options = SearchOptions {
      whole_words: true,
      ..SearchOptions::default()
    };
    assert_eq!(
      compute_matches("concatenate cat", "cat", options),
      ranges(&[(12, 3)])
    );
  }

  #[test]
  fn invalid_regex_is_empty() {
    let options = SearchOptions {
      regex: true,
      ..SearchOptions::default()
    };
    assert!(compute_matches("a (b) c", "(", options).is_empty());
    assert_eq!(compute_matches("a1 b22", r"\d+", options), ranges(&[(1, 1), (4, 2)]));
  }

  #[test]
  fn empty_regex_matches_are_skipped() {
    let options = SearchOptions {
      regex: true,
      ..SearchOptions::default()
    };
    assert!(compute_matches("abc", "x*", options).is_empty());
  }

  #[test]
  fn case_folding() {
    let options = SearchOptions::default();
    assert_eq!(
      compute_matches("Hello hELLo", "HELLO", options),
      ranges(&[(0, 5), (6, 5)])
    );
    assert!(compute_matches("Hello", "HELLO", literal()).is_empty());
    // 'İ' lowercases to two chars; a match of only the first is not a match
    assert!(compute_matches("İx", "i", options).is_empty());
    assert_eq!(compute_matches("İx ix", "ix", options), ranges(&[(3, 2)]));
  }

  #[test]
  fn offsets_are_utf16() {
    assert_eq!(compute_matches("😀 cat", "cat", literal()), ranges(&[(3, 3)]));
    assert_eq!(
      compute_matches("é😀é", "é", SearchOptions::default()),
      ranges(&[(0, 1), (3, 1)])
    );
  }

  #[test]
  fn navigation_wraps() {
    let body = "x x x";
    let mut state = SearchState::new();
    state.set_options(literal(), body);
    state.set_pattern("x", body);
    assert_eq!(state.current(), None);
    assert_eq!(state.find_next(), Some(TextRange::new(0, 1)));
    assert_eq!(state.find_next(), Some(TextRange::new(2, 1)));
    state.find_next();
    assert_eq!(state.find_next(), Some(TextRange::new(0, 1)));
    assert_eq!(state.find_previous(), Some(TextRange::new(4, 1)));

    state.set_pattern("x", body);
    assert_eq!(state.find_previous(), Some(TextRange::new(4, 1)));

    state.set_pattern("", body);
    assert_eq!(state.find_next(), None);
    assert_eq!(state.current(), None);
  }

  #[test]
  fn replace_current_recomputes() {
    let body = "cat dog cat";
    let mut state = SearchState::new();
    state.set_pattern("cat", body);
    state.set_replacement("cow");
    state.find_next();
    state.find_next();

    let outcome = state.replace_current(body).unwrap();
    assert_eq!(outcome.text, "cat dog cow");
    assert_eq!(outcome.selection, TextRange::point(11));
    assert_eq!(state.matches(), ranges(&[(0, 3)]));
    assert_eq!(state.current(), Some(0));
  }

  #[test]
  fn replace_current_needs_a_selection() {
    let body = "cat dog cat";
    let mut state = SearchState::new();
    state.set_pattern("cat", body);
    state.set_replacement("cow");
    assert!(state.replace_current(body).is_none());

    state.find_next();
    state.set_options(literal(), body);
    assert_eq!(state.current(), None);
    assert!(state.replace_current(body).is_none());

    state.find_next();
    assert_eq!(state.replace_current(body).unwrap().text, "cow dog cat");
  }

  #[test]
  fn edits_keep_the_selection() {
    let mut state = SearchState::new();
    state.set_pattern("x", "x x x");
    state.recompute("x x x x");
    assert_eq!(state.current(), None);

    state.find_next();
    state.find_next();
    state.recompute("x");
    assert_eq!(state.current(), Some(0));
    state.recompute("y");
    assert_eq!(state.current(), None);
  }

  #[test]
  fn replace_needs_replacement_and_matches() {
    let body = "cat";
    let mut state = SearchState::new();
    state.set_pattern("cat", body);
    assert!(state.replace_current(body).is_none());
    assert!(state.replace_all(body, true).is_none());

    state.set_replacement("dog");
    state.set_pattern("zebra", body);
    assert!(state.replace_current(body).is_none());
    assert!(state.replace_all(body, true).is_none());
  }

  #[test]
  fn stale_matches_are_not_applied() {
    let mut state = SearchState::new();
    state.set_pattern("world", "hello world");
    state.set_replacement("there");
    state.find_next();
    assert!(state.replace_current("hello").is_none());
    assert!(state.matches().is_empty());
  }

  #[test]
  fn replace_all_clears_matches_and_drives_widget() {
    let body = "cat dog cat bird cat";
    let mut state = SearchState::new();
    state.set_pattern("cat", body);
    state.set_replacement("lion");

    let outcome = state.replace_all(body, true).unwrap();
    assert_eq!(outcome.text, "lion dog lion bird lion");
    assert!(state.matches().is_empty());
    assert_eq!(state.current(), None);

    let mut widget = PlainTextWidget::new(body, true);
    apply_commands(&mut widget, &outcome.commands);
    assert_eq!(widget.text(), outcome.text);
    assert!(widget.undo());
    assert_eq!(widget.text(), body);
  }

  #[test]
  fn clear_keeps_flags() {
    let body = "a";
    let mut state = SearchState::new();
    let options = SearchOptions {
      regex: true,
      replace_mode: true,
      ..SearchOptions::default()
    };
    state.set_options(options, body);
    state.set_pattern("a", body);
    state.clear();
    assert_eq!(state.pattern(), "");
    assert!(state.matches().is_empty());
    assert_eq!(state.options(), options);
  }
}
