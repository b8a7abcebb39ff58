//! プロバイダ選択
//!
//! 設定（あれば）と環境変数の値だけで決まる純粋関数。

use super::ExtractError;
use crate::ai_provider::{ApiChoice, ProviderKind};
use crate::config::{
    ApiConfig, EnvDefaults, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// 呼び出し先プロバイダ（2種類のみ）
#[derive(Debug, Clone, PartialEq)]
pub enum Provider {
    OpenAi(OpenAiSettings),
    Gemini(GeminiSettings),
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::Gemini(_) => ProviderKind::Gemini,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAi(s) => &s.model,
            Provider::Gemini(s) => &s.model,
        }
    }
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn openai_from_config(config: &ApiConfig) -> OpenAiSettings {
    OpenAiSettings {
        api_key: config.openai_api_key.trim().to_string(),
        base_url: or_default(&config.openai_base_url, DEFAULT_OPENAI_BASE_URL),
        model: or_default(&config.openai_model, DEFAULT_OPENAI_MODEL),
    }
}

fn gemini_from_config(config: &ApiConfig) -> Result<GeminiSettings, ExtractError> {
    let api_key = config.gemini_api_key.trim();
    if api_key.is_empty() {
        return Err(ExtractError::Config(
            "Gemini APIキーがありません。API設定で有効なGemini APIキーを指定してください".into(),
        ));
    }
    Ok(GeminiSettings {
        api_key: api_key.to_string(),
        base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        model: or_default(&config.gemini_model, DEFAULT_GEMINI_MODEL),
    })
}

/// 使うプロバイダを決める
///
/// - openai / gemini 指定: そのプロバイダのキーが必須
/// - auto: OpenAIキーがあれば OpenAI、なければ Gemini（キー必須）
/// - 設定なし: 環境変数 OPENAI_API_KEY、次に GEMINI_API_KEY
pub fn select_provider(config: Option<&ApiConfig>, env: &EnvDefaults) -> Result<Provider, ExtractError> {
    let Some(config) = config else {
        return select_from_env(env);
    };

    let has_openai_key = !config.openai_api_key.trim().is_empty();
    match config.selected_api {
        ApiChoice::OpenAi if !has_openai_key => Err(ExtractError::Config(
            "OpenAI APIキーがありません。API設定で有効なOpenAI APIキーを指定してください".into(),
        )),
        ApiChoice::OpenAi => Ok(Provider::OpenAi(openai_from_config(config))),
        ApiChoice::Auto if has_openai_key => Ok(Provider::OpenAi(openai_from_config(config))),
        ApiChoice::Gemini | ApiChoice::Auto => gemini_from_config(config).map(Provider::Gemini),
    }
}

fn select_from_env(env: &EnvDefaults) -> Result<Provider, ExtractError> {
    if let Some(api_key) = &env.openai_api_key {
        return Ok(Provider::OpenAi(OpenAiSettings {
            api_key: api_key.clone(),
            base_url: env
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: env
                .openai_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        }));
    }
    if let Some(api_key) = &env.gemini_api_key {
        return Ok(Provider::Gemini(GeminiSettings {
            api_key: api_key.clone(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: env
                .gemini_model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        }));
    }
    Err(ExtractError::Config(
        "APIキーがありません。環境変数またはAPI設定でOpenAIかGeminiのAPIキーを指定してください".into(),
    ))
}
