//! Excel生成（共通ライブラリ）
//!
//! table.rs で組み立てたシートを rust_xlsxwriter でブックに書き出す

use super::table::{Cell, Sheet};
use crate::error::{Error, Result};
use rust_xlsxwriter::*;

/// 既定の出力ファイル名
pub const DEFAULT_FILE_NAME: &str = "ProSolo_数据导出.xlsx";

fn excel_err(context: &str) -> impl Fn(XlsxError) -> Error + '_ {
    move |e| Error::Excel(format!("{}: {}", context, e))
}

/// シート群をバッファに書き出す
pub fn generate_workbook_buffer(sheets: &[Sheet]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xAAAAAA));

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&sheet.name)
            .map_err(excel_err("シート名設定エラー"))?;

        for (col, width) in sheet.column_widths.iter().enumerate() {
            worksheet
                .set_column_width(col as u16, *width)
                .map_err(excel_err("列幅設定エラー"))?;
        }

        for (r, row) in sheet.rows.iter().enumerate() {
            let r = r as u32;
            let is_header = r < sheet.header_rows;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    Cell::Empty if is_header => {
                        worksheet
                            .write_blank(r, c, &header_format)
                            .map_err(excel_err("セル書き込みエラー"))?;
                    }
                    Cell::Empty => {}
                    Cell::Text(text) if is_header => {
                        worksheet
                            .write_string_with_format(r, c, text, &header_format)
                            .map_err(excel_err("セル書き込みエラー"))?;
                    }
                    Cell::Text(text) => {
                        worksheet
                            .write_string(r, c, text)
                            .map_err(excel_err("セル書き込みエラー"))?;
                    }
                    Cell::Number(value) => {
                        worksheet
                            .write_number(r, c, *value)
                            .map_err(excel_err("セル書き込みエラー"))?;
                    }
                }
            }
        }

        for merge in &sheet.merges {
            let title = match sheet.rows.get(merge.row as usize).and_then(|row| row.get(merge.first_col as usize)) {
                Some(Cell::Text(text)) => text.as_str(),
                _ => "",
            };
            worksheet
                .merge_range(merge.row, merge.first_col, merge.row, merge.last_col, title, &header_format)
                .map_err(excel_err("セルマージエラー"))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(excel_err("Excel保存エラー"))
}
