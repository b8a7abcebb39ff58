//! 出力表の組み立て
//!
//! レビューストアと採水地点から、スプレッドシートに書き出す表を作る。
//! - 地点なし: 1シート（ラベル + 4項目）
//! - 地点あり: 明細シート（地点名・深度付き）と、深度 × 地点のクロス集計シート

use crate::registry::DEPTH_UNIT;
use crate::types::{Field, Item, SamplePoint};

pub const SHEET_SINGLE: &str = "ProSolo 数据";
pub const SHEET_GROUPED: &str = "多采样点数据";
pub const SHEET_MATRIX: &str = "用户格式";

/// 水面（深度 0 の行見出し）
pub const SURFACE_LABEL: &str = "水面";

/// セル値
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn reading(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// 同一行内の横方向セル結合
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub row: u32,
    pub first_col: u16,
    pub last_col: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
    /// 列幅（文字数）
    pub column_widths: Vec<f64>,
    /// 見出しとして太字にする行数
    pub header_rows: u32,
    pub merges: Vec<Merge>,
}

impl Sheet {
    fn new(name: &str, column_widths: Vec<f64>, header_rows: u32) -> Self {
        Self {
            name: name.to_string(),
            rows: Vec::new(),
            column_widths,
            header_rows,
            merges: Vec::new(),
        }
    }
}

fn reading_cells(item: &Item) -> impl Iterator<Item = Cell> {
    item.data.as_array().into_iter().map(Cell::reading)
}

fn metric_headers() -> impl Iterator<Item = Cell> {
    Field::READINGS.into_iter().map(|f| Cell::text(f.label()))
}

/// ラベルから単位を除いた深度値
pub fn strip_depth_unit(label: &str) -> String {
    label.replace(DEPTH_UNIT, "").trim().to_string()
}

/// 深度 × 地点表の行見出し
pub fn depth_row_label(depth: usize) -> String {
    if depth == 0 {
        SURFACE_LABEL.to_string()
    } else {
        format!("{} {}", depth, DEPTH_UNIT)
    }
}

/// 出力シートを組み立てる（地点の有無で形式を切替え）
pub fn build_sheets(items: &[Item], points: &[SamplePoint]) -> Vec<Sheet> {
    if points.is_empty() {
        vec![build_single_sheet(items)]
    } else {
        vec![build_grouped_sheet(items, points), build_matrix_sheet(items, points)]
    }
}

/// 地点なし: 1行1写真
pub fn build_single_sheet(items: &[Item]) -> Sheet {
    let mut sheet = Sheet::new(SHEET_SINGLE, vec![20.0, 15.0, 15.0, 15.0, 15.0], 1);

    let mut header = vec![Cell::text(Field::DepthLabel.label())];
    header.extend(metric_headers());
    sheet.rows.push(header);

    for item in items {
        let mut row = vec![Cell::text(item.depth_label.clone())];
        row.extend(reading_cells(item));
        sheet.rows.push(row);
    }
    sheet
}

/// 地点あり: 明細シート
pub fn build_grouped_sheet(items: &[Item], points: &[SamplePoint]) -> Sheet {
    let mut sheet = Sheet::new(SHEET_GROUPED, vec![12.0, 15.0, 15.0, 15.0, 12.0, 12.0], 1);

    let mut header = vec![Cell::text("深度 (m)"), Cell::text("采样点")];
    header.extend(metric_headers());
    sheet.rows.push(header);

    let count = items.len();
    for point in points {
        let end = point.end_exclusive(count).min(count);
        for item in items.iter().take(end).skip(point.start_image_index) {
            let mut row = vec![
                Cell::text(strip_depth_unit(&item.depth_label)),
                Cell::text(point.name.clone()),
            ];
            row.extend(reading_cells(item));
            sheet.rows.push(row);
        }
    }
    sheet
}

/// 地点あり: 深度 × 地点のクロス集計シート
///
/// 各地点は4列（温度, 気圧, DO%, DO mg/L）。区間外の深度は空欄
pub fn build_matrix_sheet(items: &[Item], points: &[SamplePoint]) -> Sheet {
    let mut widths = vec![12.0];
    for _ in points {
        widths.extend([12.0, 15.0, 10.0, 10.0]);
    }
    let mut sheet = Sheet::new(SHEET_MATRIX, widths, 2);

    let mut name_row = vec![Cell::text("深度 (m)")];
    let mut metric_row = vec![Cell::Empty];
    for (i, point) in points.iter().enumerate() {
        name_row.push(Cell::text(point.name.clone()));
        name_row.extend([Cell::Empty, Cell::Empty, Cell::Empty]);
        metric_row.extend(metric_headers());

        let first_col = (1 + i * 4) as u16;
        sheet.merges.push(Merge { row: 0, first_col, last_col: first_col + 3 });
    }
    sheet.rows.push(name_row);
    sheet.rows.push(metric_row);

    let count = items.len();
    let max_depth = points
        .iter()
        .map(|p| p.end_exclusive(count).min(count).saturating_sub(p.start_image_index))
        .max()
        .unwrap_or(0);

    for depth in 0..max_depth {
        let mut row = vec![Cell::text(depth_row_label(depth))];
        for point in points {
            let index = point.start_image_index + depth;
            match items.get(index) {
                Some(item) if point.contains(index, count) => row.extend(reading_cells(item)),
                _ => row.extend([Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty]),
            }
        }
        sheet.rows.push(row);
    }
    sheet
}
