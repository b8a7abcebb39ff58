//! プロンプト生成モジュール
//!
//! 2つのプロバイダで共有する指示文:
//! - READING_PROMPT: 計器画面から4項目を読み取る指示
//! - SYSTEM_PROMPT: OpenAI互換APIのシステムメッセージ
//! - reading_schema: Gemini の responseSchema

use serde_json::{json, Value};

/// 返信 JSON のキー（出力順）
pub const READING_KEYS: [&str; 4] = ["temp", "mmhg", "do_pct", "do_mgl"];

pub const SYSTEM_PROMPT: &str = "You are a water quality data extraction expert. \
Extract numerical values from water quality meter screens accurately.";

/// 計器画面の読取り指示（両プロバイダ共通）
pub const READING_PROMPT: &str = r#"Analyze this image of a YSI ProSolo water quality meter screen.
The image might be rotated (portrait or landscape).
Extract the following 4 numerical values exactly as displayed:
1. Temperature (°C)
2. Pressure (mmHg)
3. Dissolved Oxygen % (DO %)
4. Dissolved Oxygen mg/L (DO mg/L)

If a value is blurry, unreadable, or missing, return null for that field."#;

/// OpenAI互換API用の指示（キー名を明示）
pub fn build_openai_prompt() -> String {
    format!(
        "{}\n\nReturn your response as a JSON object with these exact keys: {}.",
        READING_PROMPT,
        READING_KEYS.join(", ")
    )
}

/// Gemini の構造化出力スキーマ
pub fn reading_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "temp": { "type": "NUMBER", "description": "Temperature in Celsius (°C)", "nullable": true },
            "mmhg": { "type": "NUMBER", "description": "Pressure in mmHg", "nullable": true },
            "do_pct": { "type": "NUMBER", "description": "Dissolved Oxygen in % (DO %)", "nullable": true },
            "do_mgl": { "type": "NUMBER", "description": "Dissolved Oxygen in mg/L (DO mg/L)", "nullable": true }
        },
        "required": READING_KEYS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_prompt_lists_keys() {
        let prompt = build_openai_prompt();
        assert!(prompt.starts_with(READING_PROMPT));
        assert!(prompt.contains("temp, mmhg, do_pct, do_mgl"));
    }

    #[test]
    fn test_prompt_mentions_rotation_and_null() {
        assert!(READING_PROMPT.contains("rotated"));
        assert!(READING_PROMPT.contains("return null"));
    }

    #[test]
    fn test_schema_requires_all_keys() {
        let schema = reading_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, READING_KEYS);
        assert_eq!(schema["properties"]["do_pct"]["nullable"], true);
    }
}
