//! 送信用の画像準備

use super::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

const START_QUALITY: u8 = 90;
const QUALITY_STEP: u8 = 10;
const MIN_QUALITY: u8 = 10;

/// Base64化した画像
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: String,
    pub base64: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// 拡張子からMIMEタイプ
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// そのままBase64化（Gemini経路）
pub fn encode_original(bytes: &[u8], path: &Path) -> EncodedImage {
    EncodedImage {
        mime_type: mime_type_for(path).to_string(),
        base64: STANDARD.encode(bytes),
    }
}

/// 縮小してJPEG再圧縮（OpenAI経路）
///
/// 幅が `max_width` を超えれば縦横比を保って縮小し、
/// 品質 90 から 10 ずつ下げて Base64 長が `max_encoded_bytes` 以下になるまで再圧縮する。
/// 品質 10 でも収まらなければその結果を使う。
pub fn shrink_for_upload(bytes: &[u8], max_width: u32, max_encoded_bytes: usize) -> Result<EncodedImage, ExtractError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractError::Unexpected(format!("画像の読み込みに失敗: {}", e)))?;
    let img = downscale(img, max_width);

    let mut quality = START_QUALITY;
    loop {
        let base64 = STANDARD.encode(encode_jpeg(&img, quality)?);
        debug!(quality, encoded_len = base64.len(), "encoded image");
        if base64.len() <= max_encoded_bytes || quality <= MIN_QUALITY {
            return Ok(EncodedImage {
                mime_type: "image/jpeg".to_string(),
                base64,
            });
        }
        quality -= QUALITY_STEP;
    }
}

fn downscale(img: DynamicImage, max_width: u32) -> DynamicImage {
    if img.width() <= max_width {
        return img;
    }
    let ratio = max_width as f64 / img.width() as f64;
    let height = ((img.height() as f64 * ratio).round() as u32).max(1);
    img.resize_exact(max_width, height, FilterType::Triangle)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ExtractError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| ExtractError::Unexpected(format!("画像の圧縮に失敗: {}", e)))?;
    Ok(buf)
}
