use crate::error::{ProsoloError, Result};
use prosolo_common::NewFile;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|e| is_image_extension(&e.to_string_lossy()))
        .unwrap_or(false)
}

/// 更新日時（UNIX ミリ秒）。取れなければ 0
fn modified_ms(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn new_file(path: &Path) -> NewFile {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_path = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string();
    NewFile {
        file_name,
        file_path,
        modified_ms: modified_ms(path),
    }
}

/// フォルダ直下の画像を列挙（再帰しない）
pub fn scan_folder(folder: &Path) -> Result<Vec<NewFile>> {
    if !folder.is_dir() {
        return Err(ProsoloError::FolderNotFound(folder.display().to_string()));
    }

    let mut images: Vec<NewFile> = WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image(e.path()))
        .map(|e| new_file(e.path()))
        .collect();

    // 並び順はストア側で撮影順に揃えるので、ここでは名前順
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(images)
}

/// フォルダ・ファイルの混在指定から画像を集める
///
/// 画像以外のファイルを直接指定した場合は警告して飛ばす。
pub fn collect_images(paths: &[PathBuf]) -> Result<Vec<NewFile>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(scan_folder(path)?);
        } else if path.is_file() {
            if is_image(path) {
                files.push(new_file(path));
            } else {
                warn!(path = %path.display(), "not a supported image, skipped");
            }
        } else {
            return Err(ProsoloError::FileNotFound(path.display().to_string()));
        }
    }
    Ok(files)
}
