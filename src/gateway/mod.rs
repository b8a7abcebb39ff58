//! 抽出ゲートウェイ
//!
//! 写真1枚から4項目（温度・気圧・DO%・DO mg/L）を読み取る。
//! 呼び出しごとに設定と環境変数からプロバイダを選び、
//! レート制限時の再試行もここで扱う。
//!
//! - selection: プロバイダ選択（純粋関数）
//! - retry: 待ち時間の計算と再試行ループ
//! - image_prep: 送信用の画像縮小・Base64化
//! - openai / gemini: 各プロバイダのHTTP呼び出し
//! - queue: 逐次処理キュー

pub mod gemini;
pub mod image_prep;
pub mod openai;
pub mod queue;
pub mod retry;
pub mod selection;

#[cfg(test)]
mod test_server;

use crate::ai_provider::ProviderKind;
use crate::config::{ApiConfig, EnvDefaults};
use prosolo_common::ProSoloData;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use queue::{process_queue, retry_item, QueueReport};
pub use retry::{retry_delay, with_retry, Attempt, RetryPolicy};
pub use selection::{select_provider, GeminiSettings, OpenAiSettings, Provider};

/// 抽出処理のエラー分類
///
/// 行の `errorMessage` にはこの Display がそのまま入る。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("{provider} のレート制限: {attempts}回試行しても解除されませんでした。時間をおいて再試行してください")]
    RateLimited { provider: ProviderKind, attempts: u32 },

    #[error("ネットワークエラー: {0}")]
    Network(String),

    #[error("CORSエラー: {0}")]
    Cors(String),

    #[error("{provider} の認証に失敗しました。APIキーを確認してください")]
    Auth { provider: ProviderKind },

    #[error("モデル \"{model}\" が見つかりません。設定のモデル名を確認してください")]
    ModelNotFound { model: String },

    #[error("{provider} APIエラー ({status}): {message}")]
    Provider {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("応答の解析に失敗: {0}")]
    Parse(String),

    #[error("APIのURLが不正です: {0}")]
    InvalidUrl(String),

    #[error("処理エラー: {0}")]
    Unexpected(String),
}

impl ExtractError {
    /// 送信時の reqwest エラーを分類
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ExtractError::Network(format!("タイムアウトしました: {}", err))
        } else if err.is_connect() {
            ExtractError::Network(format!("APIサーバーに接続できません: {}", err))
        } else if err.is_builder() {
            ExtractError::InvalidUrl(err.to_string())
        } else {
            ExtractError::Network(err.to_string())
        }
    }
}

/// 失敗レスポンス（429以外）の分類
pub fn classify_status(provider: ProviderKind, status: u16, message: String, model: &str) -> ExtractError {
    let lower = message.to_lowercase();
    if lower.contains("cors") || lower.contains("cross-origin") {
        return ExtractError::Cors(message);
    }
    match status {
        401 | 403 => ExtractError::Auth { provider },
        404 => ExtractError::ModelNotFound { model: model.to_string() },
        // Gemini は不正キーを 400 で返す
        400 if lower.contains("api key not valid") || lower.contains("invalid api key") => {
            ExtractError::Auth { provider }
        }
        _ => ExtractError::Provider { provider, status, message },
    }
}

/// OpenAI / Gemini 共通のエラー本文 `{"error": {"message": ...}}`
#[derive(Deserialize, Default)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// エラー本文からメッセージを取り出す（取れなければステータスのみ）
pub(crate) fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("API request failed with status: {}", status))
}

/// 抽出処理のオプション
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Base64化後の上限（OpenAI経路）
    pub max_encoded_bytes: usize,
    /// これより幅の広い画像は縮小（OpenAI経路）
    pub max_width: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_encoded_bytes: 9 * 1024 * 1024,
            max_width: 1920,
            timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

/// 写真1枚から読み取り値を得るもの
#[allow(async_fn_in_trait)]
pub trait Extractor {
    async fn extract(&self, path: &Path) -> Result<ProSoloData, ExtractError>;

    /// 通信前の確認（キーの有無など）
    fn preflight(&self) -> Result<(), ExtractError> {
        Ok(())
    }
}

/// 実際のHTTPプロバイダを呼ぶゲートウェイ
pub struct Gateway {
    config: Option<ApiConfig>,
    env: EnvDefaults,
    client: Client,
    options: GatewayOptions,
}

impl Gateway {
    pub fn new(config: Option<ApiConfig>, env: EnvDefaults, options: GatewayOptions) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ExtractError::Config(format!("HTTPクライアントの初期化に失敗: {}", e)))?;
        Ok(Self {
            config,
            env,
            client,
            options,
        })
    }

    /// 現在の設定で選ばれるプロバイダ
    pub fn provider(&self) -> Result<Provider, ExtractError> {
        select_provider(self.config.as_ref(), &self.env)
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }
}

impl Extractor for Gateway {
    async fn extract(&self, path: &Path) -> Result<ProSoloData, ExtractError> {
        // 設定は呼び出しごとに評価する
        let provider = self.provider()?;
        info!(provider = %provider.kind(), file = %path.display(), "extracting readings");

        match &provider {
            Provider::OpenAi(settings) => openai::extract(&self.client, settings, &self.options, path).await,
            Provider::Gemini(settings) => gemini::extract(&self.client, settings, &self.options, path).await,
        }
    }

    fn preflight(&self) -> Result<(), ExtractError> {
        self.provider().map(|_| ())
    }
}
