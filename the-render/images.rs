//! Inline local images as data URIs so the rendered document stands alone.

use std::{
  fs,
  io,
  path::{
    Component,
    Path,
    PathBuf,
  },
};

use base64::{
  Engine as _,
  engine::general_purpose::STANDARD,
};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{
  Captures,
  Regex,
};

use crate::{
  error::RenderError,
  markdown::unescape_html,
};

static IMG_SRC: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(<img\b[^>]*?\bsrc=")([^"]*)(")"#).expect("img regex should compile")
});

fn mime_type(path: &Path) -> Option<&'static str> {
  let ext = path.extension()?.to_str()?.to_ascii_lowercase();
  Some(match ext.as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    "bmp" => "image/bmp",
    _ => return None,
  })
}

fn is_external(src: &str) -> bool {
  src.is_empty() || src.starts_with("data:") || src.starts_with("//") || src.starts_with('#') || src.contains("://")
}

/// The file `src` names under `base_dir`. Sources are percent-decoded first;
/// absolute paths and `..` components are refused.
fn local_path(base_dir: &Path, src: &str) -> Result<PathBuf, RenderError> {
  let decoded = percent_decode_str(src).decode_utf8_lossy();
  let relative = Path::new(decoded.as_ref());
  let inside = relative
    .components()
    .all(|part| matches!(part, Component::Normal(_) | Component::CurDir));
  if !inside {
    return Err(RenderError::ImageLoad {
      path:   relative.to_owned(),
      source: io::Error::new(io::ErrorKind::InvalidInput, "path leaves the note directory"),
    });
  }
  Ok(base_dir.join(relative))
}

fn data_uri(base_dir: &Path, src: &str) -> Option<Result<String, RenderError>> {
  if is_external(src) {
    return None;
  }
  let path = match local_path(base_dir, src) {
    Ok(path) => path,
    Err(err) => return Some(Err(err)),
  };
  let mime = mime_type(&path)?;
  Some(
    fs::read(&path)
      .map(|bytes| format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
      .map_err(|source| RenderError::ImageLoad { path, source }),
  )
}

/// Replace relative `<img src>` paths with data URIs read from `base_dir`.
/// Images that can not be read keep their original `src`.
pub fn embed_images(html: &str, base_dir: &Path) -> String {
  IMG_SRC
    .replace_all(html, |caps: &Captures| {
      match data_uri(base_dir, &unescape_html(&caps[2])) {
        Some(Ok(uri)) => format!("{}{uri}{}", &caps[1], &caps[3]),
        Some(Err(err)) => {
          log::warn!("{err}");
          caps[0].to_owned()
        },
        None => caps[0].to_owned(),
      }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn local_images_are_inlined() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("dot.png"), [1u8, 2, 3]).unwrap();
    let html = "<p><img src=\"dot.png\" alt=\"d\" /></p>";
    assert_eq!(
      embed_images(html, dir.path()),
      "<p><img src=\"data:image/png;base64,AQID\" alt=\"d\" /></p>"
    );
  }

  #[test]
  fn encoded_names_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("my dot.png"), [1u8, 2, 3]).unwrap();
    fs::write(dir.path().join("café.gif"), [4u8]).unwrap();
    let html = "<img src=\"my%20dot.png\" /><img src=\"caf%C3%A9.gif\" />";
    assert_eq!(
      embed_images(html, dir.path()),
      "<img src=\"data:image/png;base64,AQID\" /><img src=\"data:image/gif;base64,BA==\" />"
    );
  }

  #[test]
  fn paths_outside_base_dir_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("notes");
    fs::create_dir(&base).unwrap();
    fs::write(base.join("ok.png"), [1u8]).unwrap();
    let secret = dir.path().join("secret.png");
    fs::write(&secret, [9u8]).unwrap();

    for src in [
      "../secret.png".to_owned(),
      "%2E%2E/secret.png".to_owned(),
      "sub/../../secret.png".to_owned(),
      secret.display().to_string(),
    ] {
      let html = format!("<img src=\"{src}\" />");
      assert_eq!(embed_images(&html, &base), html);
    }
    assert!(embed_images("<img src=\"./ok.png\" />", &base).contains("base64,AQ=="));
  }

  #[test]
  fn missing_and_remote_images_keep_src() {
    let dir = tempfile::tempdir().unwrap();
    let html = "<img src=\"gone.png\" /><img src=\"https://x.test/a.png\" /><img src=\"notes.txt\" />";
    assert_eq!(embed_images(html, dir.path()), html);
  }
}
