//! API設定の管理
//!
//! `~/.config/prosolo/config.json` に複数の設定を保存し、
//! 1つを「現在の設定」として使う。

use crate::ai_provider::ApiChoice;
use crate::error::{ProsoloError, Result};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// この接頭辞で始まるキーは「未設定」扱い
const PLACEHOLDER_PREFIX: &str = "PLACEHOLDER_";

lazy_static! {
    static ref MODEL_NAME: Regex = Regex::new(r"^[a-zA-Z0-9\-_.]+$").unwrap();
}

/// 1件のAPI設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    pub id: String,
    pub name: String,
    pub selected_api: ApiChoice,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            selected_api: ApiChoice::Auto,
            openai_api_key: String::new(),
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
        }
    }
}

impl ApiConfig {
    /// 新しいIDを振った設定を作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: format!("config-{}", chrono::Utc::now().timestamp_millis()),
            name: name.into(),
            ..Default::default()
        }
    }

    /// 保存前の検証。問題がなければ空のVecを返す
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("設定名を入力してください".to_string());
        }

        match self.selected_api {
            ApiChoice::OpenAi if self.openai_api_key.trim().is_empty() => {
                problems.push("OpenAIを選択する場合はAPIキーが必要です".to_string());
            }
            ApiChoice::Gemini if self.gemini_api_key.trim().is_empty() => {
                problems.push("Geminiを選択する場合はAPIキーが必要です".to_string());
            }
            _ => {}
        }

        let openai_key = self.openai_api_key.trim();
        if !openai_key.is_empty() && !openai_key.starts_with("sk-") {
            problems.push("OpenAI APIキーは sk- で始まる必要があります".to_string());
        }

        let gemini_key = self.gemini_api_key.trim();
        if !gemini_key.is_empty() && !gemini_key.starts_with("AIza") {
            problems.push("Gemini APIキーは AIza で始まる必要があります".to_string());
        }

        if !self.openai_model.is_empty() && !MODEL_NAME.is_match(&self.openai_model) {
            problems.push(format!("OpenAIモデル名が不正です: {}", self.openai_model));
        }
        if !self.gemini_model.is_empty() && !MODEL_NAME.is_match(&self.gemini_model) {
            problems.push(format!("Geminiモデル名が不正です: {}", self.gemini_model));
        }

        if !self.openai_base_url.is_empty() && url::Url::parse(&self.openai_base_url).is_err() {
            problems.push(format!("ベースURLが不正です: {}", self.openai_base_url));
        }

        problems
    }

    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ProsoloError::InvalidConfig(problems))
        }
    }

    /// 表示用にキーを伏せる
    pub fn masked_key(key: &str) -> String {
        let key = key.trim();
        if key.is_empty() {
            return "未設定".into();
        }
        let head: String = key.chars().take(4).collect();
        format!("{}****", head)
    }
}

/// 保存される設定一式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfigCollection {
    pub configs: Vec<ApiConfig>,
    #[serde(default)]
    pub current_config_id: String,
}

impl ApiConfigCollection {
    /// 設定ファイルを読む。ファイルがなければ None
    pub fn load() -> Result<Option<Self>> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let collection: Self = serde_json::from_str(&content)?;
        Ok(Some(collection))
    }

    pub fn load_or_default() -> Result<Self> {
        Ok(Self::load()?.unwrap_or_default())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ProsoloError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("prosolo").join("config.json"))
    }

    /// 現在の設定（IDが見つからなければ先頭）
    pub fn current(&self) -> Option<&ApiConfig> {
        self.configs
            .iter()
            .find(|c| c.id == self.current_config_id)
            .or_else(|| self.configs.first())
    }

    /// IDまたは設定名で検索
    pub fn find(&self, key: &str) -> Option<&ApiConfig> {
        self.configs
            .iter()
            .find(|c| c.id == key)
            .or_else(|| self.configs.iter().find(|c| c.name == key))
    }

    pub fn set_current(&mut self, key: &str) -> Result<()> {
        let id = self
            .find(key)
            .map(|c| c.id.clone())
            .ok_or_else(|| ProsoloError::Config(format!("設定が見つかりません: {}", key)))?;
        self.current_config_id = id;
        Ok(())
    }

    /// 検証してから追加（同じIDがあれば置き換え）。最初の1件は現在の設定になる
    pub fn upsert(&mut self, config: ApiConfig) -> Result<()> {
        config.ensure_valid()?;
        match self.configs.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => *existing = config,
            None => {
                if self.configs.is_empty() {
                    self.current_config_id = config.id.clone();
                }
                self.configs.push(config);
            }
        }
        Ok(())
    }

    /// 削除。最後の1件は消せない
    pub fn remove(&mut self, key: &str) -> Result<ApiConfig> {
        if self.configs.len() <= 1 {
            return Err(ProsoloError::Config("最後の設定は削除できません".into()));
        }
        let id = self
            .find(key)
            .map(|c| c.id.clone())
            .ok_or_else(|| ProsoloError::Config(format!("設定が見つかりません: {}", key)))?;
        let pos = self
            .configs
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ProsoloError::Config(format!("設定が見つかりません: {}", key)))?;
        let removed = self.configs.remove(pos);
        if self.current_config_id == removed.id {
            self.current_config_id = self.configs[0].id.clone();
        }
        Ok(removed)
    }

    /// インポート用JSONの解析
    ///
    /// `configs` 配列が必須で、各要素に空でない `id` と `name` が必要。
    pub fn import_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let configs = value
            .get("configs")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProsoloError::Config("configs 配列がありません".into()))?;

        for (i, entry) in configs.iter().enumerate() {
            let has = |key: &str| {
                entry
                    .get(key)
                    .and_then(|v| v.as_str())
                    .is_some_and(|s| !s.trim().is_empty())
            };
            if !has("id") || !has("name") {
                return Err(ProsoloError::Config(format!(
                    "configs[{}] に id または name がありません",
                    i
                )));
            }
        }

        let mut collection: Self = serde_json::from_value(value)?;
        if collection.find(&collection.current_config_id.clone()).is_none() {
            collection.current_config_id = collection
                .configs
                .first()
                .map(|c| c.id.clone())
                .unwrap_or_default();
        }
        Ok(collection)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// エクスポートファイル名 `prosolo-api-config-YYYY-MM-DD.json`
    pub fn export_file_name(date: NaiveDate) -> String {
        format!("prosolo-api-config-{}.json", date.format("%Y-%m-%d"))
    }
}

/// 設定がない場合に使う環境変数の値
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvDefaults {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
}

impl EnvDefaults {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から構築（テスト用に環境変数を差し替えられる）
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            openai_api_key: usable_key(lookup("OPENAI_API_KEY")),
            openai_base_url: non_blank(lookup("OPENAI_BASE_URL")),
            openai_model: non_blank(lookup("OPENAI_MODEL")),
            gemini_api_key: usable_key(lookup("GEMINI_API_KEY")),
            gemini_model: non_blank(lookup("GEMINI_MODEL")),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn usable_key(value: Option<String>) -> Option<String> {
    non_blank(value).filter(|v| !v.starts_with(PLACEHOLDER_PREFIX))
}
