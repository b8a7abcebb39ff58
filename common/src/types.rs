//! 水質計読取りの型定義
//!
//! CLIと共通ライブラリで共有される型:
//! - ProSoloData: 1枚の写真から読み取る4つの計測値
//! - Item: アップロードされた写真1枚分のレビュー行
//! - SamplePoint: 採水地点（写真列の連続区間）

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 計測値（どの値も読めなければ None）
///
/// キー名は AI への指示と返信 JSON のキーに一致させる
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProSoloData {
    /// 水温 (°C)
    pub temp: Option<f64>,
    /// 気圧 (mmHg)
    pub mmhg: Option<f64>,
    /// 溶存酸素飽和度 (%)
    pub do_pct: Option<f64>,
    /// 溶存酸素濃度 (mg/L)
    pub do_mgl: Option<f64>,
}

impl ProSoloData {
    /// 4項目とも空
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn is_blank(&self) -> bool {
        self.temp.is_none() && self.mmhg.is_none() && self.do_pct.is_none() && self.do_mgl.is_none()
    }

    /// 出力列順（温度, 気圧, DO%, DO mg/L）
    pub fn as_array(&self) -> [Option<f64>; 4] {
        [self.temp, self.mmhg, self.do_pct, self.do_mgl]
    }
}

/// 解析ステータス
///
/// idle → processing → success / error、error・success は再解析で idle に戻る
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

impl ItemStatus {
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Idle, Processing) | (Processing, Success) | (Processing, Error) | (Error, Idle) | (Success, Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Idle => "idle",
            ItemStatus::Processing => "processing",
            ItemStatus::Success => "success",
            ItemStatus::Error => "error",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 取込み前のファイル情報
#[derive(Debug, Clone, PartialEq)]
pub struct NewFile {
    pub file_name: String,
    pub file_path: String,
    /// 更新日時（UNIX ミリ秒）。撮影順の並べ替えに使う
    pub modified_ms: i64,
}

/// レビュー行（写真1枚）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub file_name: String,

    /// 画像ファイルのパス（解析とプレビューに使用）
    pub file_path: String,

    pub modified_ms: i64,

    #[serde(default)]
    pub status: ItemStatus,

    /// 深度ラベル（"0 米", "1 米" ...）。ユーザーが上書き可
    #[serde(default)]
    pub depth_label: String,

    #[serde(default)]
    pub data: ProSoloData,

    /// status = error の間のみ Some
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default)]
    pub sample_point_index: usize,
}

impl Item {
    pub fn from_file(file: NewFile) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file.file_name,
            file_path: file.file_path,
            modified_ms: file.modified_ms,
            status: ItemStatus::Idle,
            depth_label: String::new(),
            data: ProSoloData::blank(),
            error_message: None,
            sample_point_index: 0,
        }
    }
}

/// 採水地点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePoint {
    pub id: String,
    pub name: String,
    pub start_image_index: usize,

    /// None は「リスト末尾まで」
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_image_index: Option<usize>,

    #[serde(default)]
    pub depth_count: usize,
}

impl SamplePoint {
    /// 区間の終端（排他的）
    pub fn end_exclusive(&self, item_count: usize) -> usize {
        match self.end_image_index {
            Some(end) => end + 1,
            None => item_count,
        }
    }

    pub fn contains(&self, index: usize, item_count: usize) -> bool {
        index >= self.start_image_index && index < self.end_exclusive(item_count)
    }
}

/// 編集可能なフィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DepthLabel,
    Temp,
    Mmhg,
    DoPct,
    DoMgl,
}

impl Field {
    pub const READINGS: [Field; 4] = [Field::Temp, Field::Mmhg, Field::DoPct, Field::DoMgl];

    pub fn key(&self) -> &'static str {
        match self {
            Field::DepthLabel => "depthLabel",
            Field::Temp => "temp",
            Field::Mmhg => "mmhg",
            Field::DoPct => "do_pct",
            Field::DoMgl => "do_mgl",
        }
    }

    /// 表示用ラベル（Excel 見出しと同じ）
    pub fn label(&self) -> &'static str {
        match self {
            Field::DepthLabel => "深度 / 标签",
            Field::Temp => "温度 (°C)",
            Field::Mmhg => "氧分压 (mmHg)",
            Field::DoPct => "DO (%)",
            Field::DoMgl => "DO (mg/L)",
        }
    }

    pub fn reading<'a>(&self, data: &'a mut ProSoloData) -> Option<&'a mut Option<f64>> {
        match self {
            Field::DepthLabel => None,
            Field::Temp => Some(&mut data.temp),
            Field::Mmhg => Some(&mut data.mmhg),
            Field::DoPct => Some(&mut data.do_pct),
            Field::DoMgl => Some(&mut data.do_mgl),
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "depthlabel" | "depth_label" | "label" | "depth" => Ok(Field::DepthLabel),
            "temp" | "temperature" => Ok(Field::Temp),
            "mmhg" | "pressure" => Ok(Field::Mmhg),
            "do_pct" | "dopct" | "do%" => Ok(Field::DoPct),
            "do_mgl" | "domgl" => Ok(Field::DoMgl),
            _ => Err(Error::InvalidField(s.to_string())),
        }
    }
}

/// 数値入力の変換（空文字は None）
pub fn parse_reading_input(value: &str) -> Result<Option<f64>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| Error::InvalidNumber(value.to_string()))
}
