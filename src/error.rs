use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProsoloError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("設定の検証に失敗:\n{}", .0.join("\n"))]
    InvalidConfig(Vec<String>),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("セッションファイルが見つかりません: {0}")]
    SessionNotFound(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("対話入力エラー: {0}")]
    Prompt(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Extract(#[from] crate::gateway::ExtractError),

    #[error(transparent)]
    Common(#[from] prosolo_common::Error),
}

impl From<dialoguer::Error> for ProsoloError {
    fn from(e: dialoguer::Error) -> Self {
        ProsoloError::Prompt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProsoloError>;
