use crate::ai_provider::ApiChoice;
use crate::session::DEFAULT_SESSION_FILE;
use clap::{Parser, Subcommand};
use prosolo_common::Field;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prosolo")]
#[command(about = "水質計（ProSolo）写真のAI読取り・Excel出力ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// セッションファイル
    #[arg(short, long, default_value = DEFAULT_SESSION_FILE, global = true)]
    pub session: PathBuf,

    /// 使用するAPI設定（ID または設定名）。省略時は現在の設定
    #[arg(long, global = true)]
    pub config_id: Option<String>,

    /// APIリクエストのタイムアウト（秒）
    #[arg(long, default_value = "120", global = true)]
    pub timeout: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真（フォルダまたはファイル）をセッションに追加
    Add {
        /// 写真フォルダまたは画像ファイル
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// 未解析の写真をAIで読み取る（1枚ずつ順番に）
    Extract {
        /// エラーになった写真も再解析する
        #[arg(long)]
        include_errors: bool,
    },

    /// 追加・解析・Excel出力を一括実行
    Run {
        /// 写真フォルダまたは画像ファイル
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// エラーになった写真も再解析する
        #[arg(long)]
        include_errors: bool,
    },

    /// 1枚だけ再解析
    Retry {
        /// 行番号（1始まり）または行ID
        item: String,
    },

    /// 採水地点の管理
    Points {
        #[command(subcommand)]
        action: PointsAction,
    },

    /// 対話式で結果を確認・修正
    Review,

    /// 深度ラベルまたは計測値を修正
    Edit {
        /// 行番号（1始まり）または行ID
        item: String,

        /// 項目 (label/temp/mmhg/do_pct/do_mgl)
        field: Field,

        /// 新しい値（計測値は空文字で未設定）
        value: String,
    },

    /// 写真を1枚削除
    Remove {
        /// 行番号（1始まり）または行ID
        item: String,
    },

    /// 撮影時刻順に並べ直してラベルを振り直す
    Sort,

    /// すべての写真と採水地点を削除
    Clear {
        /// 確認なしで削除
        #[arg(short, long)]
        yes: bool,
    },

    /// セッションの内容を表示
    Show,

    /// Excelに出力
    Export {
        /// 出力ファイル/ディレクトリ
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// API設定の管理
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum PointsAction {
    /// 地点一覧
    List,

    /// 地点を追加（前の地点の次の写真から開始）
    Add,

    /// 地点を削除
    Remove {
        /// 地点番号（1始まり）または地点ID
        point: String,
    },

    /// 地点名を変更
    Rename {
        /// 地点番号（1始まり）または地点ID
        point: String,
        /// 新しい名前
        name: String,
    },

    /// 地点の開始写真を変更
    SetStart {
        /// 地点番号（1始まり）または地点ID
        point: String,
        /// 開始する写真の行番号（1始まり）
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        photo: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// 現在の設定を表示
    Show,

    /// 設定一覧
    List,

    /// 現在の設定を切り替え
    Use {
        /// ID または設定名
        key: String,
    },

    /// 設定を追加（同じIDがあれば更新）
    Add {
        /// 設定名
        #[arg(required = true)]
        name: String,

        /// 更新する設定のID（省略時は新規）
        #[arg(long)]
        id: Option<String>,

        /// 使用するAPI (openai/gemini/auto)
        #[arg(long, default_value = "auto")]
        api: ApiChoice,

        /// OpenAI APIキー（sk-...）
        #[arg(long)]
        openai_key: Option<String>,

        /// OpenAIモデル
        #[arg(long)]
        openai_model: Option<String>,

        /// OpenAI互換APIのベースURL
        #[arg(long)]
        openai_base_url: Option<String>,

        /// Gemini APIキー（AIza...）
        #[arg(long)]
        gemini_key: Option<String>,

        /// Geminiモデル
        #[arg(long)]
        gemini_model: Option<String>,

        /// 追加後に現在の設定にする
        #[arg(long)]
        use_now: bool,
    },

    /// 設定を削除
    Remove {
        /// ID または設定名
        key: String,
    },

    /// JSONファイルから設定を読み込む（既存の設定は置き換え）
    Import {
        file: PathBuf,
    },

    /// 設定をJSONファイルに書き出す
    Export {
        /// 出力ファイル/ディレクトリ（省略時は prosolo-api-config-日付.json）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// 1始まりの写真番号を行インデックスに変換（範囲外はストア側で丸める）
pub fn photo_index(photo: u64) -> usize {
    usize::try_from(photo.saturating_sub(1)).unwrap_or(usize::MAX)
}
