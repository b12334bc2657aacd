//! Edit commands for a host text widget.
//!
//! The search engine owns the decision of *what* to replace; the host widget
//! owns undo history. Replacements therefore travel to the widget as
//! [`EditCommand`]s instead of being written into its buffer behind its back.
//! A batch that should undo as one step carries `grouped` with `first`/`last`
//! marking the batch boundaries.

use crate::range::{
  self,
  TextRange,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCommand {
  pub range:       TextRange,
  pub replacement: String,
  pub grouped:     bool,
  pub first:       bool,
  pub last:        bool,
}

impl EditCommand {
  /// A replacement that forms its own undo unit.
  pub fn single(range: TextRange, replacement: impl Into<String>) -> Self {
    Self {
      range,
      replacement: replacement.into(),
      grouped: false,
      first: true,
      last: true,
    }
  }
}

/// Commands replacing every range with `replacement`, highest offset first,
/// so each command's range is still valid when the widget reaches it.
pub fn replacement_commands(
  ranges: &[TextRange],
  replacement: &str,
  grouping: bool,
) -> Vec<EditCommand> {
  let mut ordered = ranges.to_vec();
  ordered.sort_unstable_by(|a, b| b.cmp(a));
  let count = ordered.len();
  ordered
    .into_iter()
    .enumerate()
    .map(|(idx, range)| {
      EditCommand {
        range,
        replacement: replacement.to_owned(),
        grouped: grouping,
        first: !grouping || idx == 0,
        last: !grouping || idx + 1 == count,
      }
    })
    .collect()
}

/// A text widget that can receive range replacements.
pub trait TextWidget {
  /// Whether consecutive edits can be merged into one undo step.
  fn supports_grouping(&self) -> bool;

  fn text(&self) -> &str;

  fn apply(&mut self, command: &EditCommand);
}

pub fn apply_commands<W: TextWidget + ?Sized>(widget: &mut W, commands: &[EditCommand]) {
  for command in commands {
    widget.apply(command);
  }
}

#[derive(Debug, Clone)]
struct Step {
  start:    usize,
  removed:  String,
  inserted: String,
}

type UndoUnit = Vec<Step>;

/// A plain string buffer with undo/redo, used by headless front ends.
#[derive(Debug, Default)]
pub struct PlainTextWidget {
  text:     String,
  grouping: bool,
  undo:     Vec<UndoUnit>,
  redo:     Vec<UndoUnit>,
  open:     Option<UndoUnit>,
}

impl PlainTextWidget {
  pub fn new(text: impl Into<String>, grouping: bool) -> Self {
    Self {
      text: text.into(),
      grouping,
      ..Self::default()
    }
  }

  pub fn undo_depth(&self) -> usize {
    self.undo.len() + usize::from(self.open.as_ref().is_some_and(|unit| !unit.is_empty()))
  }

  pub fn undo(&mut self) -> bool {
    self.close_group();
    let Some(unit) = self.undo.pop() else {
      return false;
    };
    for step in unit.iter().rev() {
      let inserted = TextRange::new(step.start, range::utf16_len(&step.inserted));
      self.text = range::splice(&self.text, inserted, &step.removed);
    }
    self.redo.push(unit);
    true
  }

  pub fn redo(&mut self) -> bool {
    let Some(unit) = self.redo.pop() else {
      return false;
    };
    for step in &unit {
      let removed = TextRange::new(step.start, range::utf16_len(&step.removed));
      self.text = range::splice(&self.text, removed, &step.inserted);
    }
    self.undo.push(unit);
    true
  }

  fn close_group(&mut self) {
    if let Some(unit) = self.open.take()
      && !unit.is_empty()
    {
      self.undo.push(unit);
    }
  }
}

impl TextWidget for PlainTextWidget {
  fn supports_grouping(&self) -> bool {
    self.grouping
  }

  fn text(&self) -> &str {
    &self.text
  }

  fn apply(&mut self, command: &EditCommand) {
    let range = command.range.clamp(range::utf16_len(&self.text));
    let bytes = range.byte_range(&self.text);
    let step = Step {
      start:    range.start,
      removed:  self.text[bytes.clone()].to_owned(),
      inserted: command.replacement.clone(),
    };
    self.text.replace_range(bytes, &command.replacement);
    self.redo.clear();

    if command.grouped && self.grouping {
      if command.first {
        self.close_group();
      }
      self.open.get_or_insert_with(Vec::new).push(step);
      if command.last {
        self.close_group();
      }
    } else {
      self.close_group();
      self.undo.push(vec![step]);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ranges() -> Vec<TextRange> {
    // "cat dog cat bird cat"
    vec![TextRange::new(0, 3), TextRange::new(8, 3), TextRange::new(17, 3)]
  }

  #[test]
  fn commands_run_highest_offset_first() {
    let commands = replacement_commands(&ranges(), "lion", true);
    let starts: Vec<_> = commands.iter().map(|c| c.range.start).collect();
    assert_eq!(starts, [17, 8, 0]);
    assert!(commands[0].first && !commands[0].last);
    assert!(!commands[1].first && !commands[1].last);
    assert!(!commands[2].first && commands[2].last);
  }

  #[test]
  fn grouped_batch_undoes_in_one_step() {
    let mut widget = PlainTextWidget::new("cat dog cat bird cat", true);
    apply_commands(&mut widget, &replacement_commands(&ranges(), "lion", true));
    assert_eq!(widget.text(), "lion dog lion bird lion");
    assert_eq!(widget.undo_depth(), 1);

    assert!(widget.undo());
    assert_eq!(widget.text(), "cat dog cat bird cat");
    assert!(widget.redo());
    assert_eq!(widget.text(), "lion dog lion bird lion");
  }

  #[test]
  fn ungrouped_edits_undo_one_at_a_time() {
    let mut widget = PlainTextWidget::new("cat dog cat bird cat", false);
    apply_commands(&mut widget, &replacement_commands(&ranges(), "ox", false));
    assert_eq!(widget.text(), "ox dog ox bird ox");
    assert_eq!(widget.undo_depth(), 3);

    assert!(widget.undo());
    assert_eq!(widget.text(), "cat dog ox bird ox");
    assert!(widget.undo());
    assert!(widget.undo());
    assert_eq!(widget.text(), "cat dog cat bird cat");
    assert!(!widget.undo());
  }

  #[test]
  fn new_edit_clears_redo() {
    let mut widget = PlainTextWidget::new("abc", true);
    widget.apply(&EditCommand::single(TextRange::new(0, 1), "x"));
    assert!(widget.undo());
    widget.apply(&EditCommand::single(TextRange::new(2, 1), "y"));
    assert!(!widget.redo());
    assert_eq!(widget.text(), "aby");
  }
}
