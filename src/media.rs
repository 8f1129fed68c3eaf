//! Downloading Telegram files and pulling text out of them with external
//! tools (`tesseract` for OCR, `ffmpeg` for video frames).
use crate::text;
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use teloxide::net::Download;
use teloxide::prelude::*;
use tokio::process::Command;
use tracing::{debug, instrument};

pub const OCR_LANGUAGES: &str = "fas+eng";

/// Plain-text documents larger than this are not read.
pub const MAX_TEXT_DOCUMENT_BYTES: u64 = 1024 * 1024;

/// How a document attachment should be turned into claim text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Image,
    Unsupported,
}

pub fn classify_document(mime: Option<&str>, file_name: Option<&str>) -> DocumentKind {
    let ext = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let mime = mime.map(|m| m.to_ascii_lowercase());

    match (mime.as_deref(), ext.as_deref()) {
        (Some(m), _) if m.starts_with("text/") => DocumentKind::Text,
        (Some(m), _) if m.starts_with("image/") => DocumentKind::Image,
        (_, Some("txt")) => DocumentKind::Text,
        (_, Some("jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff")) => DocumentKind::Image,
        _ => DocumentKind::Unsupported,
    }
}

/// Probe `<tool> --version` (or `-version` for ffmpeg).
pub async fn ensure_tool_available(tool: &str) -> Result<()> {
    let flag = if tool == "ffmpeg" { "-version" } else { "--version" };
    let status = Command::new(tool)
        .arg(flag)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;
    match status {
        Ok(s) if s.success() => Ok(()),
        Ok(s) => Err(anyhow!("{} not available (exit status {})", tool, s)),
        Err(e) => Err(anyhow!("{} not available: {}", tool, e)),
    }
}

/// Save a Telegram file to `{data_dir}/media/{tg_user_id}/{msg_id}_{unique_id}.{ext}`.
#[instrument(skip_all)]
pub async fn download_file(
    bot: &Bot,
    data_dir: &Path,
    tg_user_id: i64,
    msg_id: i32,
    file_id: &str,
) -> Result<PathBuf> {
    let file = bot.get_file(file_id).await?;
    let dir = data_dir.join("media").join(tg_user_id.to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create media dir: {}", dir.display()))?;
    // keep the original extension from Telegram's file path
    let ext = Path::new(&file.path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let path = dir.join(format!("{}_{}.{}", msg_id, file.meta.unique_id, ext));
    let mut dst = tokio::fs::File::create(&path).await?;
    bot.download_file(&file.path, &mut dst).await?;
    debug!(path = %path.display(), "downloaded telegram file");
    Ok(path)
}

/// Run `tesseract <image> stdout -l <langs>` and return the cleaned text.
#[instrument(skip_all)]
pub async fn ocr_image(image: &Path, languages: &str) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(image.as_os_str())
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to spawn tesseract for {}", image.display()))?;

    if !output.status.success() {
        bail!(
            "tesseract exited with status {} for {}: {}",
            output.status,
            image.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(text::clean_text(&String::from_utf8_lossy(&output.stdout)))
}

/// Grab one frame at 0.25s into `{temp_dir}/{video stem}.jpg`.
#[instrument(skip_all)]
pub async fn extract_frame(video: &Path, temp_dir: &Path) -> Result<PathBuf> {
    let stem = video
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("invalid video file name"))?;
    tokio::fs::create_dir_all(temp_dir)
        .await
        .with_context(|| format!("failed to create temp dir: {}", temp_dir.display()))?;

    let frame = temp_dir.join(format!("{}.jpg", stem));
    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-ss")
        .arg("0.25")
        .arg("-i")
        .arg(video.as_os_str())
        .arg("-frames:v")
        .arg("1")
        .arg("-q:v")
        .arg("2")
        .arg(frame.as_os_str())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("failed to spawn ffmpeg for {}", video.display()))?;

    if !status.success() {
        bail!("ffmpeg exited with status {} for {}", status, video.display());
    }
    Ok(frame)
}

/// Read a plain-text document, refusing files over `MAX_TEXT_DOCUMENT_BYTES`.
pub async fn read_text_document(path: &Path) -> Result<String> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("failed to stat {}", path.display()))?;
    if meta.len() > MAX_TEXT_DOCUMENT_BYTES {
        bail!("document too large: {} bytes", meta.len());
    }
    let bytes = tokio::fs::read(path).await?;
    Ok(text::clean_text(&String::from_utf8_lossy(&bytes)))
}

/// Caption first, then extracted text; either may be missing.
pub fn combine_text(caption: Option<&str>, extracted: Option<&str>) -> String {
    let parts: Vec<&str> = [caption, extracted]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    parts.join("\n")
}
