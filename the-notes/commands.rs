use std::{
  fs,
  io::{
    self,
    Write,
  },
  path::Path,
  process::ExitCode,
  sync::Arc,
};

use anyhow::{
  Context,
  Result,
};
use the_notes_lib::{
  Document,
  TextRange,
  range,
  search::{
    self,
    SearchOptions,
  },
};
use the_notes_render::{
  Pipeline,
  ThemeDir,
};
use the_notes_session::{
  FileMirror,
  FolderStore,
  MarkdownMirror,
  NoMirror,
  SessionController,
  SessionUpdate,
  mirror::split_front_matter,
  render::render_with_timeout,
};

use crate::{
  cli::{
    ImportArgs,
    RenderArgs,
    SearchArgs,
  },
  config::Config,
};

fn read(path: &Path) -> Result<String> {
  fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))
}

pub async fn render(args: RenderArgs, config: &Config) -> Result<ExitCode> {
  let text = read(&args.file)?;
  let theme = args.theme.or_else(|| config.theme.clone());
  let mut options = config.session.render.options(theme);
  options.include_toc |= args.toc;
  if !args.no_images {
    options.base_dir = args.file.parent().map(Path::to_owned);
  }

  let pipeline = Pipeline::new(Arc::new(ThemeDir::new(config.storage.themes_dir())));
  let html = render_with_timeout(
    Arc::new(pipeline),
    text,
    options,
    config.session.render.timeout(),
  )
  .await
  .with_context(|| format!("could not render {}", args.file.display()))?;

  match args.output {
    Some(path) => {
      fs::write(&path, html).with_context(|| format!("could not write {}", path.display()))?;
      log::info!("rendered {} to {}", args.file.display(), path.display());
    },
    None => io::stdout().write_all(html.as_bytes())?,
  }
  Ok(ExitCode::SUCCESS)
}

/// 1-based line and UTF-16 column of `found`, plus the line it starts on.
fn locate(text: &str, found: TextRange) -> (usize, usize, &str) {
  let start = found.byte_range(text).start;
  let line_start = text[..start].rfind('\n').map_or(0, |idx| idx + 1);
  let line_end = text[start..].find('\n').map_or(text.len(), |idx| start + idx);
  let line = text[..start].matches('\n').count() + 1;
  let column = found.start - range::byte_to_utf16(text, line_start) + 1;
  (line, column, text[line_start..line_end].trim_end_matches('\r'))
}

/// Exits with failure when nothing matched, like grep.
pub fn search(args: SearchArgs) -> Result<ExitCode> {
  let text = read(&args.file)?;
  let options = SearchOptions {
    match_case:   args.match_case,
    whole_words:  args.whole_words,
    regex:        args.regex,
    replace_mode: args.replace.is_some(),
  };
  let matches = search::compute_matches(&text, &args.pattern, options);
  let mut stdout = io::stdout().lock();

  match &args.replace {
    Some(replacement) => {
      let replaced = search::replace_ranges(&text, &matches, replacement);
      if args.in_place {
        if !matches.is_empty() {
          fs::write(&args.file, replaced)
            .with_context(|| format!("could not write {}", args.file.display()))?;
        }
        writeln!(stdout, "{} replacements in {}", matches.len(), args.file.display())?;
      } else {
        stdout.write_all(replaced.as_bytes())?;
      }
    },
    None => {
      for found in &matches {
        let (line, column, content) = locate(&text, *found);
        writeln!(stdout, "{}:{line}:{column}: {content}", args.file.display())?;
      }
    },
  }

  Ok(if matches.is_empty() {
    ExitCode::FAILURE
  } else {
    ExitCode::SUCCESS
  })
}

fn title_of(path: &Path) -> String {
  path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default()
}

/// Store every file as a new note, printing `<id> <path>` per import.
pub async fn import(args: ImportArgs, config: &Config) -> Result<ExitCode> {
  let dir = args.store.unwrap_or_else(|| config.storage.notes_dir());
  let mirror: Arc<dyn FileMirror> = match config.storage.mirror_dir() {
    Some(dir) => Arc::new(MarkdownMirror::new(dir)),
    None => Arc::new(NoMirror),
  };
  let mut session = config.session.clone();
  session.autosave.enable = false;
  let mut controller = SessionController::new(
    Arc::new(FolderStore::new(dir)),
    mirror,
    Arc::new(Pipeline::default()),
    session,
  );

  let mut failed = 0;
  for path in &args.files {
    let text = match read(path) {
      Ok(text) => text,
      Err(err) => {
        log::error!("{err:#}");
        eprintln!("{err:#}");
        failed += 1;
        continue;
      },
    };
    let doc = match split_front_matter(&text) {
      (Some(front), body) => front.into_document(body),
      (None, body) => Document::new(title_of(path), body),
    };
    controller.create_from(doc);
    controller.settle().await;

    for update in controller.take_updates() {
      match update {
        SessionUpdate::Opened(id) => println!("{id} {}", path.display()),
        update => {
          if let Some(err) = update.error() {
            eprintln!("{}: {err}", path.display());
            failed += 1;
          }
        },
      }
    }
  }

  Ok(if failed == 0 {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn locate_reports_utf16_columns() {
    let text = "first\n😀 cat\r\nlast";
    let found = search::compute_matches(text, "cat", SearchOptions::default());
    assert_eq!(locate(text, found[0]), (2, 4, "😀 cat"));
    assert_eq!(locate(text, TextRange::new(0, 1)), (1, 1, "first"));
  }

  #[test]
  fn title_comes_from_file_stem() {
    assert_eq!(title_of(Path::new("/x/Shopping list.md")), "Shopping list");
  }

  #[tokio::test]
  async fn import_writes_store_and_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let note = dir.path().join("plans.md");
    fs::write(&note, "+++\ntitle = \"Plans\"\nstarred = true\n+++\n\n# Q3\n").unwrap();

    let mut config = Config::default();
    config.storage.mirror_dir = Some(dir.path().join("mirror"));
    let args = ImportArgs {
      files: vec![note, dir.path().join("missing.md")],
      store: Some(dir.path().join("store")),
    };
    let code = import(args, &config).await.unwrap();
    assert_eq!(code, ExitCode::FAILURE);

    let stored: Vec<_> = fs::read_dir(dir.path().join("store")).unwrap().collect();
    assert_eq!(stored.len(), 1);
    let mirrored = fs::read_dir(dir.path().join("mirror"))
      .unwrap()
      .next()
      .unwrap()
      .unwrap();
    let text = fs::read_to_string(mirrored.path()).unwrap();
    assert!(text.contains("title = \"Plans\""));
    assert!(text.ends_with("# Q3\n"));
  }
}
