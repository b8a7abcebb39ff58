use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 設定で選ぶAPI（auto は OpenAI 優先、キーがなければ Gemini）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiChoice {
    #[value(name = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    #[default]
    Auto,
}

impl ApiChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiChoice::OpenAi => "openai",
            ApiChoice::Gemini => "gemini",
            ApiChoice::Auto => "auto",
        }
    }
}

impl fmt::Display for ApiChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 実際に呼び出すプロバイダ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_choice_serde() {
        assert_eq!(serde_json::to_string(&ApiChoice::OpenAi).unwrap(), "\"openai\"");
        assert_eq!(serde_json::to_string(&ApiChoice::Auto).unwrap(), "\"auto\"");
        let parsed: ApiChoice = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(parsed, ApiChoice::Gemini);
    }

    #[test]
    fn test_api_choice_value_enum() {
        assert_eq!(ApiChoice::from_str("openai", true).unwrap(), ApiChoice::OpenAi);
        assert_eq!(ApiChoice::from_str("AUTO", true).unwrap(), ApiChoice::Auto);
        assert!(ApiChoice::from_str("claude", true).is_err());
    }
}
