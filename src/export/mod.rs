pub mod excel;

use crate::error::Result;
use prosolo_common::export::excel_core::DEFAULT_FILE_NAME;
use prosolo_common::ReviewStore;
use std::path::{Path, PathBuf};

/// 出力先がフォルダ（または拡張子なし）なら既定のファイル名を付ける
pub fn output_path(output: &Path) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(DEFAULT_FILE_NAME)
    } else {
        output.to_path_buf()
    }
}

/// セッションの内容をExcelに出力し、書き出したパスを返す
pub fn export_store(store: &ReviewStore, output: &Path) -> Result<PathBuf> {
    let path = output_path(output);
    let layout = if store.sample_points().is_empty() { "単一表" } else { "地点別＋用户格式" };
    println!("- Excelを生成中... ({}, {}行)", layout, store.len());
    excel::write_workbook(store, &path)?;
    println!("✔ Excel出力: {}", path.display());
    Ok(path)
}
