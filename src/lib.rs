//! ProSolo 水質計写真の読取りツール
//!
//! 写真を取り込み、AI（OpenAI互換 / Gemini）で4項目を読み取り、
//! 採水地点・深度ごとに確認してExcelに出力する。

pub mod ai_provider;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod review;
pub mod scanner;
pub mod session;
