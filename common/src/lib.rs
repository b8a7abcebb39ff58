//! ProSolo Common Library
//!
//! CLIから使われるドメインロジック（通信なし）:
//! 写真行・採水地点の管理、深度ラベル導出、返信パース、出力表の組み立て

pub mod types;
pub mod error;
pub mod registry;
pub mod store;
pub mod prompts;
pub mod parser;
pub mod export;

pub use types::{Field, Item, ItemStatus, NewFile, ProSoloData, SamplePoint, parse_reading_input};
pub use error::{Error, Result};
pub use registry::{SampleRegistry, depth_label, relabel_positional, sort_by_capture, DEPTH_UNIT};
pub use store::ReviewStore;
pub use prompts::{READING_KEYS, READING_PROMPT, SYSTEM_PROMPT, build_openai_prompt, reading_schema};
pub use parser::{extract_json, parse_reading_reply};
pub use export::{build_sheets, Cell, Sheet};
