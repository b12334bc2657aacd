use std::path::{
  Path,
  PathBuf,
};

use clap::{
  ArgAction,
  Args,
  Parser,
  Subcommand,
};

#[derive(Parser, Debug)]
#[command(name = "the-notes", about, long_about = None, version)]
pub struct Cli {
  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count, global = true)]
  pub verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE", global = true, value_parser = parse_pathbuf)]
  pub log_file: Option<PathBuf>,

  /// Load configuration from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE", global = true, value_parser = parse_pathbuf)]
  pub config_file: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Render a markdown file to a standalone HTML document
  Render(RenderArgs),
  /// Find, and optionally replace, text in a file
  Search(SearchArgs),
  /// Copy markdown files into the note store
  Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct RenderArgs {
  #[arg(value_name = "FILE", value_parser = parse_pathbuf)]
  pub file: PathBuf,

  /// Write the document here instead of stdout
  #[arg(short = 'o', long = "output", value_name = "FILE", value_parser = parse_pathbuf)]
  pub output: Option<PathBuf>,

  /// Theme id, overriding the configured one
  #[arg(short = 't', long = "theme", value_name = "THEME")]
  pub theme: Option<String>,

  /// Replace a `[TOC]` line with a table of contents
  #[arg(long = "toc")]
  pub toc: bool,

  /// Leave local images as links instead of inlining them
  #[arg(long = "no-images")]
  pub no_images: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
  #[arg(value_name = "FILE", value_parser = parse_pathbuf)]
  pub file: PathBuf,

  #[arg(value_name = "PATTERN")]
  pub pattern: String,

  /// Treat PATTERN as a regular expression
  #[arg(short = 'e', long = "regex")]
  pub regex: bool,

  #[arg(short = 's', long = "match-case")]
  pub match_case: bool,

  #[arg(short = 'w', long = "whole-word")]
  pub whole_words: bool,

  /// Replace every match with TEXT and print the result
  #[arg(short = 'r', long = "replace", value_name = "TEXT")]
  pub replace: Option<String>,

  /// Write the replaced text back to FILE
  #[arg(long = "in-place", requires = "replace")]
  pub in_place: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
  #[arg(value_name = "FILES", required = true, value_parser = parse_pathbuf)]
  pub files: Vec<PathBuf>,

  /// Note store directory, overriding the configured one
  #[arg(long = "store", value_name = "DIR", value_parser = parse_pathbuf)]
  pub store: Option<PathBuf>,
}

fn parse_pathbuf(value: &str) -> Result<PathBuf, String> {
  Ok(the_notes_loader::expand_tilde(Path::new(value)))
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["the-notes", "render", "a.md", "-vv", "--toc"]).unwrap();
    assert_eq!(cli.verbosity, 2);
    let Command::Render(args) = cli.command else {
      panic!("expected render");
    };
    assert!(args.toc);
    assert_eq!(args.file, PathBuf::from("a.md"));
  }

  #[test]
  fn in_place_needs_replacement() {
    assert!(Cli::try_parse_from(["the-notes", "search", "a.md", "x", "--in-place"]).is_err());
    let cli =
      Cli::try_parse_from(["the-notes", "search", "a.md", "x", "-r", "y", "--in-place"]).unwrap();
    assert!(matches!(cli.command, Command::Search(SearchArgs { in_place: true, .. })));
  }

  #[test]
  fn import_needs_files() {
    assert!(Cli::try_parse_from(["the-notes", "import"]).is_err());
  }
}
