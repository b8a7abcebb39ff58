//! Excel生成（CLI版）
//!
//! シートの組み立てとブック生成は共通ライブラリ、ここではファイルへの書き出しのみ

use crate::error::{ProsoloError, Result};
use prosolo_common::export::excel_core::generate_workbook_buffer;
use prosolo_common::{build_sheets, ReviewStore};
use std::path::Path;
use tracing::debug;

pub fn write_workbook(store: &ReviewStore, output_path: &Path) -> Result<()> {
    let sheets = build_sheets(store.items(), store.sample_points());
    debug!(sheets = sheets.len(), "building workbook");

    let buffer = generate_workbook_buffer(&sheets)
        .map_err(|e| ProsoloError::ExcelGeneration(e.to_string()))?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, buffer)?;
    Ok(())
}
