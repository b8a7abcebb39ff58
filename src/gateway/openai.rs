//! OpenAI互換API（chat/completions）
//!
//! 画像は縮小・再圧縮してから data URL で送る。
//! カスタムのベースURLにも対応。

use super::image_prep::{shrink_for_upload, EncodedImage};
use super::retry::{with_retry, Attempt};
use super::{classify_status, error_message, ExtractError, GatewayOptions, OpenAiSettings};
use crate::ai_provider::ProviderKind;
use prosolo_common::{build_openai_prompt, parse_reading_reply, ProSoloData, SYSTEM_PROMPT};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

const PROVIDER: ProviderKind = ProviderKind::OpenAi;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// `{base_url}/chat/completions` を検証付きで組み立てる
pub fn endpoint_url(base_url: &str) -> Result<reqwest::Url, ExtractError> {
    let raw = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    reqwest::Url::parse(&raw).map_err(|_| {
        ExtractError::InvalidUrl(format!("{}。API設定を確認してください", raw))
    })
}

fn build_request(model: &str, image: &EncodedImage) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: build_openai_prompt(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image.data_url() },
                    },
                ]),
            },
        ],
        response_format: ResponseFormat { kind: "json_object" },
        temperature: 0.1,
    }
}

/// 応答本文から読み取り値を取り出す
fn parse_response(body: &str) -> Result<ProSoloData, ExtractError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ExtractError::Parse(format!("応答JSONが不正です: {}", e)))?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ExtractError::Parse("APIの応答にテキストがありません".into()))?;
    parse_reading_reply(&text).map_err(|e| ExtractError::Parse(e.to_string()))
}

/// 写真1枚を解析
///
/// 分類できないエラー（画像の読み込み失敗など）は全項目 null として返す。
pub async fn extract(
    client: &Client,
    settings: &OpenAiSettings,
    options: &GatewayOptions,
    path: &Path,
) -> Result<ProSoloData, ExtractError> {
    match request(client, settings, options, path).await {
        Err(ExtractError::Unexpected(message)) => {
            warn!(file = %path.display(), %message, "OpenAI extraction failed, using empty readings");
            Ok(ProSoloData::blank())
        }
        other => other,
    }
}

async fn request(
    client: &Client,
    settings: &OpenAiSettings,
    options: &GatewayOptions,
    path: &Path,
) -> Result<ProSoloData, ExtractError> {
    let url = endpoint_url(&settings.base_url)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractError::Unexpected(format!("{}: {}", path.display(), e)))?;
    let image = shrink_for_upload(&bytes, options.max_width, options.max_encoded_bytes)?;
    let body = build_request(&settings.model, &image);

    debug!(model = %settings.model, url = %url, encoded_len = image.base64.len(), "sending OpenAI request");

    let (url, body) = (&url, &body);
    let text = with_retry(
        &options.retry,
        PROVIDER,
        move |_| async move {
            let response = client
                .post(url.clone())
                .bearer_auth(&settings.api_key)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_server::{client, TestServer};
    use std::path::PathBuf;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("https://api.openai.com/v1").unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_url("http://localhost:8080/v1/").unwrap().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert!(matches!(endpoint_url("not a url"), Err(ExtractError::InvalidUrl(_))));
    }

    #[test]
    fn test_request_shape() {
        let image = EncodedImage {
            mime_type: "image/jpeg".into(),
            base64: "QUJD".into(),
        };
        let value = serde_json::to_value(build_request("gpt-4o-mini", &image)).unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], SYSTEM_PROMPT);

        let parts = &value["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[0]["text"].as_str().unwrap().contains("temp, mmhg, do_pct, do_mgl"));
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");

        let temperature = value["temperature"].as_f64().unwrap();
        assert!((temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"temp\":21.4,\"mmhg\":760.2,\"do_pct\":95.1,\"do_mgl\":null}"}}]}"#;
        let data = parse_response(body).unwrap();
        assert_eq!(data.temp, Some(21.4));
        assert_eq!(data.mmhg, Some(760.2));
        assert_eq!(data.do_pct, Some(95.1));
        assert_eq!(data.do_mgl, None);
    }

    #[test]
    fn test_parse_response_without_text() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(matches!(parse_response(body), Err(ExtractError::Parse(_))));
        assert!(matches!(parse_response(r#"{"choices":[]}"#), Err(ExtractError::Parse(_))));
    }

    #[test]
    fn test_parse_response_bad_reply() {
        let body = r#"{"choices":[{"message":{"content":"I cannot read this"}}]}"#;
        assert!(matches!(parse_response(body), Err(ExtractError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unreadable_image_becomes_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let settings = OpenAiSettings {
            api_key: "sk-test".into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
        };
        let data = extract(&Client::new(), &settings, &GatewayOptions::default(), &path)
            .await
            .unwrap();
        assert!(data.is_blank());
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_reported() {
        let settings = OpenAiSettings {
            api_key: "sk-test".into(),
            base_url: "::bad::".into(),
            model: "gpt-4o-mini".into(),
        };
        let err = extract(&Client::new(), &settings, &GatewayOptions::default(), Path::new("x.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUrl(_)));
    }

    fn write_png(dir: &Path) -> PathBuf {
        let path = dir.join("meter.png");
        image::RgbImage::from_pixel(32, 32, image::Rgb([200, 200, 200]))
            .save(&path)
            .unwrap();
        path
    }

    fn local_settings(server: &TestServer) -> OpenAiSettings {
        OpenAiSettings {
            api_key: "sk-test".into(),
            base_url: format!("{}/v1", server.base_url),
            model: "gpt-4o-mini".into(),
        }
    }

    #[tokio::test]
    async fn test_http_success() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"temp\":1,\"mmhg\":2,\"do_pct\":3,\"do_mgl\":null}"}}]}"#;
        let server = TestServer::start(200, &[], body).await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path());

        let data = extract(&client(), &local_settings(&server), &GatewayOptions::default(), &path)
            .await
            .unwrap();
        assert_eq!(data.temp, Some(1.0));
        assert_eq!(data.mmhg, Some(2.0));
        assert_eq!(data.do_pct, Some(3.0));
        assert_eq!(data.do_mgl, None);

        let request = server.requests()[0].to_lowercase();
        assert!(request.starts_with("post /v1/chat/completions "));
        assert!(request.contains("authorization: bearer sk-test"));
        assert!(request.contains("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_http_rate_limit_exhausted() {
        let server = TestServer::start(429, &[("Retry-After", "0")], r#"{"error":{"message":"slow down"}}"#).await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path());

        let err = extract(&client(), &local_settings(&server), &GatewayOptions::default(), &path)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExtractError::RateLimited {
                provider: ProviderKind::OpenAi,
                attempts: 6
            }
        );
        assert_eq!(server.hits(), 6);
    }

    #[tokio::test]
    async fn test_http_unauthorized() {
        let server = TestServer::start(401, &[], r#"{"error":{"message":"Incorrect API key provided"}}"#).await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path());

        let err = extract(&client(), &local_settings(&server), &GatewayOptions::default(), &path)
            .await
            .unwrap_err();
        assert_eq!(err, ExtractError::Auth { provider: ProviderKind::OpenAi });
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_http_unknown_model() {
        let server = TestServer::start(404, &[], r#"{"error":{"message":"model not found"}}"#).await;
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path());

        let err = extract(&client(), &local_settings(&server), &GatewayOptions::default(), &path)
            .await
            .unwrap_err();
        assert_eq!(err, ExtractError::ModelNotFound { model: "gpt-4o-mini".into() });
    }
}
