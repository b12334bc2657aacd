//! Half-open text ranges addressed in UTF-16 code units.
//!
//! Native text widgets address their buffers in UTF-16 code units, so every
//! range that crosses the boundary to the UI (search matches, the cursor,
//! edit commands) uses that unit. Rust strings are UTF-8; the helpers here
//! convert between the two.
//!
//! Ranges are never trusted: anything reaching past the end of the text is
//! clamped, and an offset that lands inside a surrogate pair snaps back to the
//! start of that character. No conversion in this module panics.

use std::ops::Range;

use serde::{
  Deserialize,
  Serialize,
};

/// `start..start + length` in UTF-16 code units.
///
/// Ordering is by `start`, then `length`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextRange {
  pub start:  usize,
  pub length: usize,
}

impl TextRange {
  pub const fn new(start: usize, length: usize) -> Self {
    Self { start, length }
  }

  pub const fn point(pos: usize) -> Self {
    Self::new(pos, 0)
  }

  pub const fn from_bounds(start: usize, end: usize) -> Self {
    Self::new(start, end.saturating_sub(start))
  }

  pub const fn end(self) -> usize {
    self.start.saturating_add(self.length)
  }

  pub const fn is_empty(self) -> bool {
    self.length == 0
  }

  pub const fn contains(self, pos: usize) -> bool {
    self.start <= pos && pos < self.end()
  }

  pub const fn overlaps(self, other: Self) -> bool {
    self.start < other.end() && other.start < self.end()
  }

  /// Clamp both ends into `0..=len`.
  pub fn clamp(self, len: usize) -> Self {
    let start = self.start.min(len);
    let end = self.end().min(len);
    Self::from_bounds(start, end)
  }

  pub fn is_valid_for(self, text: &str) -> bool {
    self.end() <= utf16_len(text)
  }

  /// The UTF-8 byte range this range covers in `text`, after clamping.
  pub fn byte_range(self, text: &str) -> Range<usize> {
    let clamped = self.clamp(utf16_len(text));
    let start = utf16_to_byte(text, clamped.start);
    let end = utf16_to_byte(text, clamped.end());
    start..end.max(start)
  }

  pub fn from_byte_range(text: &str, bytes: Range<usize>) -> Self {
    let start = byte_to_utf16(text, bytes.start);
    let end = byte_to_utf16(text, bytes.end);
    Self::from_bounds(start, end)
  }
}

pub fn utf16_len(text: &str) -> usize {
  text.chars().map(char::len_utf16).sum()
}

/// Byte offset of the UTF-16 `offset` in `text`.
pub fn utf16_to_byte(text: &str, offset: usize) -> usize {
  let mut units = 0;
  for (byte, ch) in text.char_indices() {
    let next = units + ch.len_utf16();
    if next > offset {
      return byte;
    }
    units = next;
  }
  text.len()
}

/// UTF-16 offset of the byte `offset` in `text`.
pub fn byte_to_utf16(text: &str, offset: usize) -> usize {
  utf16_len(&text[..floor_char_boundary(text, offset)])
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
  let mut offset = offset.min(text.len());
  while !text.is_char_boundary(offset) {
    offset -= 1;
  }
  offset
}

/// Replace `range` in `text` with `replacement`.
pub fn splice(text: &str, range: TextRange, replacement: &str) -> String {
  let bytes = range.byte_range(text);
  let mut out = String::with_capacity(text.len() - bytes.len() + replacement.len());
  out.push_str(&text[..bytes.start]);
  out.push_str(replacement);
  out.push_str(&text[bytes.end..]);
  out
}

/// Converts a non-decreasing sequence of byte offsets into UTF-16 offsets in a
/// single pass over the text.
#[derive(Debug)]
pub struct Utf16Mapper<'a> {
  text:  &'a str,
  byte:  usize,
  units: usize,
}

impl<'a> Utf16Mapper<'a> {
  pub fn new(text: &'a str) -> Self {
    Self {
      text,
      byte: 0,
      units: 0,
    }
  }

  pub fn to_utf16(&mut self, byte: usize) -> usize {
    let byte = floor_char_boundary(self.text, byte);
    if byte < self.byte {
      self.byte = 0;
      self.units = 0;
    }
    self.units += utf16_len(&self.text[self.byte..byte]);
    self.byte = byte;
    self.units
  }

  pub fn range(&mut self, bytes: Range<usize>) -> TextRange {
    let start = self.to_utf16(bytes.start);
    let end = self.to_utf16(bytes.end);
    TextRange::from_bounds(start, end)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn boundaries(text: &str) -> Vec<usize> {
    let mut out = vec![0];
    let mut units = 0;
    for ch in text.chars() {
      units += ch.len_utf16();
      out.push(units);
    }
    out
  }

  fn valid_range(text: &str, a: usize, b: usize) -> TextRange {
    let bounds = boundaries(text);
    let x = bounds[a % bounds.len()];
    let y = bounds[b % bounds.len()];
    TextRange::from_bounds(x.min(y), x.max(y))
  }

  quickcheck::quickcheck! {
      fn splice_length_adds_up(text: String, replacement: String, a: usize, b: usize) -> bool {
          let range = valid_range(&text, a, b);
          let out = splice(&text, range, &replacement);
          utf16_len(&out) == utf16_len(&text) - range.length + utf16_len(&replacement)
      }

      fn splice_relocates_insertion(text: String, replacement: String, a: usize, b: usize) -> bool {
          let range = valid_range(&text, a, b);
          let out = splice(&text, range, &replacement);
          let at = utf16_to_byte(&out, range.start);
          out[at..].starts_with(replacement.as_str())
      }
  }

  #[test]
  fn emoji_counts_two_units() {
    let text = "a😀b";
    assert_eq!(utf16_len(text), 4);
    assert_eq!(utf16_to_byte(text, 1), 1);
    assert_eq!(utf16_to_byte(text, 3), 5);
    assert_eq!(byte_to_utf16(text, 5), 3);
  }

  #[test]
  fn offset_inside_surrogate_pair_snaps_back() {
    let text = "a😀b";
    assert_eq!(utf16_to_byte(text, 2), 1);
    assert_eq!(byte_to_utf16(text, 3), 1);
  }

  #[test]
  fn out_of_bounds_ranges_clamp() {
    let text = "hello";
    let range = TextRange::new(3, 10);
    assert!(!range.is_valid_for(text));
    assert_eq!(range.clamp(5), TextRange::new(3, 2));
    assert_eq!(splice(text, range, "p!"), "help!");
    assert_eq!(splice(text, TextRange::new(99, 1), "!"), "hello!");
  }

  #[test]
  fn mapper_tracks_ascending_offsets() {
    let text = "ü😀x😀";
    let mut mapper = Utf16Mapper::new(text);
    assert_eq!(mapper.to_utf16(0), 0);
    assert_eq!(mapper.to_utf16(2), 1);
    assert_eq!(mapper.to_utf16(6), 3);
    assert_eq!(mapper.range(7..11), TextRange::new(4, 2));
    // going backwards restarts rather than underflowing
    assert_eq!(mapper.to_utf16(2), 1);
  }

  #[test]
  fn ranges_order_by_start() {
    let mut ranges = vec![TextRange::new(5, 1), TextRange::new(0, 3), TextRange::new(2, 1)];
    ranges.sort();
    assert_eq!(ranges, [TextRange::new(0, 3), TextRange::new(2, 1), TextRange::new(5, 1)]);
  }
}
