//! APIレスポンスパーサー
//!
//! モデルの返信テキストから JSON オブジェクトを抽出し、4項目の計測値に変換する

use crate::error::{Error, Result};
use crate::prompts::READING_KEYS;
use crate::types::ProSoloData;
use serde_json::{Map, Value};

/// 返信テキストから JSON オブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use prosolo_common::extract_json;
///
/// let reply = "Result: {\"temp\": 20.5}";
/// assert_eq!(extract_json(reply).unwrap(), "{\"temp\": 20.5}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// 返信を計測値にパース
///
/// 4つのキーはすべて必須。値は数値・null・数値文字列を受け付け、余分なキーは無視する
pub fn parse_reading_reply(response: &str) -> Result<ProSoloData> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("JSONパースエラー: {}", e)))?;

    let Some(map) = value.as_object() else {
        return Err(Error::Parse("JSONオブジェクトではありません".into()));
    };

    let mut values = [None; 4];
    for (slot, key) in values.iter_mut().zip(READING_KEYS) {
        *slot = get_number(map, key)?;
    }

    let [temp, mmhg, do_pct, do_mgl] = values;
    Ok(ProSoloData { temp, mmhg, do_pct, do_mgl })
}

fn get_number(map: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    let value = map
        .get(key)
        .ok_or_else(|| Error::Parse(format!("キー {} がありません", key)))?;

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| Error::Parse(format!("{} が数値ではありません: {}", key, s))),
        other => Err(Error::Parse(format!("{} が数値ではありません: {}", key, other))),
    }
}
