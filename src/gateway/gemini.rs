//! Gemini API連携（generateContent）
//!
//! 画像はそのままインラインで送り、responseSchema で4項目のJSONを要求する。

use super::image_prep::{encode_original, EncodedImage};
use super::retry::{with_retry, Attempt};
use super::{classify_status, error_message, ExtractError, GatewayOptions, GeminiSettings};
use crate::ai_provider::ProviderKind;
use prosolo_common::{parse_reading_reply, reading_schema, ProSoloData, READING_PROMPT};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

const PROVIDER: ProviderKind = ProviderKind::Gemini;

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// モデル名とキーからURLを組み立てる（キーはクエリ）
pub fn endpoint_url(base_url: &str, model: &str, api_key: &str) -> Result<reqwest::Url, ExtractError> {
    let raw = format!("{}/models/{}:generateContent", base_url.trim_end_matches('/'), model);
    reqwest::Url::parse_with_params(&raw, &[("key", api_key)])
        .map_err(|_| ExtractError::InvalidUrl(raw))
}

fn build_request(image: &EncodedImage) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.base64.clone(),
                    },
                },
                Part::Text {
                    text: READING_PROMPT.to_string(),
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: 0.1,
            response_mime_type: "application/json".to_string(),
            response_schema: reading_schema(),
        },
    }
}

fn parse_response(body: &str) -> Result<ProSoloData, ExtractError> {
    let response: GeminiResponse =
        serde_json::from_str(body).map_err(|e| ExtractError::Parse(format!("応答JSONが不正です: {}", e)))?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ExtractError::Parse("Geminiの応答にテキストがありません".into()));
    }
    parse_reading_reply(&text).map_err(|e| ExtractError::Parse(e.to_string()))
}

/// 写真1枚を解析
///
/// 分類できないエラーは全項目 null として返す。
pub async fn extract(
    client: &Client,
    settings: &GeminiSettings,
    options: &GatewayOptions,
    path: &Path,
) -> Result<ProSoloData, ExtractError> {
    match request(client, settings, options, path).await {
        Err(ExtractError::Unexpected(message)) => {
            warn!(file = %path.display(), %message, "Gemini extraction failed, using empty readings");
            Ok(ProSoloData::blank())
        }
        other => other,
    }
}

async fn request(
    client: &Client,
    settings: &GeminiSettings,
    options: &GatewayOptions,
    path: &Path,
) -> Result<ProSoloData, ExtractError> {
    let url = endpoint_url(&settings.base_url, &settings.model, &settings.api_key)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractError::Unexpected(format!("{}: {}", path.display(), e)))?;
    let image = encode_original(&bytes, path);
    let body = build_request(&image);

    debug!(model = %settings.model, mime_type = %image.mime_type, "sending Gemini request");

    let (url, body) = (&url, &body);
    let text = with_retry(
        &options.retry,
        PROVIDER,
        move |_| async move {
            let response = client
                .post(url.clone())
                .json(body)
                .send()
                .await
                .map_err(|e| ExtractError::from_transport(&e))?;

            let status = response.status();
            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                return Ok(Attempt::RateLimited { retry_after });
            }

            let text = response.text().await.map_err(|e| ExtractError::from_transport(&e))?;
            if !status.is_success() {
                let message = error_message(&text, status.as_u16());
                return Err(classify_status(PROVIDER, status.as_u16(), message, &settings.model));
            }
            Ok::<_, ExtractError>(Attempt::Done(text))
        },
        |delay| tokio::time::sleep(delay),
    )
    .await?;

    parse_response(&text)
}
