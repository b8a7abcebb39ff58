//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Sample point not found: {0}")]
    SamplePointNotFound(String),

    #[error("Unknown field: {0}")]
    InvalidField(String),

    #[error("Not a number: {0}")]
    InvalidNumber(String),

    #[error("Cannot add sample point: {0}")]
    SamplePointLimit(String),

    #[error("Invalid status change for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: crate::types::ItemStatus,
        to: crate::types::ItemStatus,
    },

    #[error("Excel error: {0}")]
    Excel(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
