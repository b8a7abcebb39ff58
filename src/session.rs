//! セッションファイル
//!
//! レビューストア（写真行＋採水地点）を1つのJSONとして保存し、
//! CLIの呼び出しをまたいで取込み・解析・レビュー・出力を続けられるようにする。

use crate::error::{ProsoloError, Result};
use prosolo_common::ReviewStore;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::warn;

pub const DEFAULT_SESSION_FILE: &str = "session.json";

/// セッションを読み込む（ファイルが必要）
///
/// 読み込み後に区間を再計算し、中断された processing 行を idle に戻す。
pub fn load(path: &Path) -> Result<ReviewStore> {
    if !path.exists() {
        return Err(ProsoloError::SessionNotFound(path.display().to_string()));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut store: ReviewStore = serde_json::from_reader(reader)?;
    store.normalize();

    let interrupted = store.reset_interrupted();
    if interrupted > 0 {
        warn!(count = interrupted, "reset interrupted items to idle");
    }
    Ok(store)
}

/// セッションを読み込む。ファイルがなければ空のストア
pub fn load_or_new(path: &Path) -> Result<ReviewStore> {
    if path.exists() {
        load(path)
    } else {
        Ok(ReviewStore::new())
    }
}

/// セッションを保存（一時ファイルに書いてから置き換え）
pub fn save(path: &Path, store: &ReviewStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    {
        let writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(writer, store)?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
