use anyhow::Context;
use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use prosolo_common::{ItemStatus, ReviewStore};
use prosolo_rust::{cli, config, error, export, gateway, review, scanner, session};
use cli::{Cli, Commands, ConfigAction, PointsAction};
use config::{ApiConfig, ApiConfigCollection, EnvDefaults};
use error::{ProsoloError, Result};
use gateway::{process_queue, retry_item, Gateway, GatewayOptions, QueueReport};
use std::path::Path;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli).await.context("prosolo の実行に失敗しました")
}

async fn run(cli: Cli) -> Result<()> {
    let session_path = cli.session.as_path();

    match cli.command {
        Commands::Add { paths } => {
            let mut store = session::load_or_new(session_path)?;
            add_photos(&mut store, &paths)?;
            session::save(session_path, &store)?;
            println!("✔ セッションを保存: {}", session_path.display());
        }

        Commands::Extract { include_errors } => {
            let mut store = session::load(session_path)?;
            let gateway = build_gateway(cli.config_id.as_deref(), cli.timeout)?;
            extract_pending(&mut store, session_path, &gateway, include_errors).await?;
        }

        Commands::Run { paths, output, include_errors } => {
            println!("🚀 prosolo - 一括処理\n");
            let mut store = session::load_or_new(session_path)?;

            println!("[1/3] 写真を追加中...");
            add_photos(&mut store, &paths)?;
            session::save(session_path, &store)?;
            println!();

            println!("[2/3] AI解析中...");
            let gateway = build_gateway(cli.config_id.as_deref(), cli.timeout)?;
            extract_pending(&mut store, session_path, &gateway, include_errors).await?;
            println!();

            println!("[3/3] エクスポート中...");
            export::export_store(&store, &output)?;
            println!("\n✅ 完了");
        }

        Commands::Retry { item } => {
            let mut store = session::load(session_path)?;
            let id = store.resolve(&item)?.id.clone();
            let gateway = build_gateway(cli.config_id.as_deref(), cli.timeout)?;
            // キーがなければ行をエラーにせずここで失敗する
            retry_item(&mut store, &gateway, &id, |store, _| session::save(session_path, store)).await?;

            if let Some(updated) = store.item(&id) {
                match &updated.error_message {
                    Some(message) => println!("✗ {}: {}", updated.file_name, message),
                    None => println!("✔ {} を再解析しました", updated.file_name),
                }
            }
        }

        Commands::Points { action } => {
            let mut store = session::load(session_path)?;
            run_points(&mut store, action)?;
            session::save(session_path, &store)?;
        }

        Commands::Review => {
            let mut store = session::load(session_path)?;
            let gateway = build_gateway(cli.config_id.as_deref(), cli.timeout)?;
            review::run_interactive_review(&mut store, &gateway, |store| session::save(session_path, store)).await?;
        }

        Commands::Edit { item, field, value } => {
            let mut store = session::load(session_path)?;
            let id = store.resolve(&item)?.id.clone();
            store.update_field(&id, field, &value)?;
            session::save(session_path, &store)?;
            println!("✔ {} を更新しました", field.label());
        }

        Commands::Remove { item } => {
            let mut store = session::load(session_path)?;
            let id = store.resolve(&item)?.id.clone();
            let removed = store.remove(&id)?;
            session::save(session_path, &store)?;
            println!("✔ {} を削除しました（残り {}枚）", removed.file_name, store.len());
        }

        Commands::Sort => {
            let mut store = session::load(session_path)?;
            store.sort_by_time();
            session::save(session_path, &store)?;
            println!("✔ 撮影時刻順に並べ直しました");
        }

        Commands::Clear { yes } => {
            let mut store = session::load(session_path)?;
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!(
                        "{}枚の写真と{}件の採水地点をすべて削除しますか？",
                        store.len(),
                        store.sample_points().len()
                    ))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("キャンセルしました");
                return Ok(());
            }
            store.clear();
            session::save(session_path, &store)?;
            println!("✔ すべて削除しました");
        }

        Commands::Show => {
            let store = session::load(session_path)?;
            print_summary(&store);
            println!("{}", review::render_table(&store));
        }

        Commands::Export { output } => {
            let store = session::load(session_path)?;
            if store.is_empty() {
                return Err(ProsoloError::NoImagesFound(session_path.display().to_string()));
            }
            export::export_store(&store, &output)?;
        }

        Commands::Config { action } => run_config(action)?,
    }

    Ok(())
}

fn add_photos(store: &mut ReviewStore, paths: &[std::path::PathBuf]) -> Result<()> {
    let files = scanner::collect_images(paths)?;
    if files.is_empty() {
        let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        return Err(ProsoloError::NoImagesFound(joined.join(", ")));
    }
    let added = store.add(files);
    println!("✔ {}枚の写真を追加（合計 {}枚）", added.len(), store.len());
    Ok(())
}

/// 設定ファイル（または環境変数）からゲートウェイを作る
fn build_gateway(config_id: Option<&str>, timeout_secs: u64) -> Result<Gateway> {
    let collection = ApiConfigCollection::load()?;
    let config = match (collection, config_id) {
        (Some(collection), Some(key)) => Some(
            collection
                .find(key)
                .cloned()
                .ok_or_else(|| ProsoloError::Config(format!("設定が見つかりません: {}", key)))?,
        ),
        (Some(collection), None) => collection.current().cloned(),
        (None, Some(key)) => {
            return Err(ProsoloError::Config(format!(
                "設定ファイルがないため {} を使えません",
                key
            )))
        }
        (None, None) => None,
    };

    let options = GatewayOptions {
        timeout: Duration::from_secs(timeout_secs),
        ..Default::default()
    };
    Ok(Gateway::new(config, EnvDefaults::from_env(), options)?)
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// idle の写真を1枚ずつ解析し、1枚ごとにセッションを保存
async fn extract_pending(
    store: &mut ReviewStore,
    session_path: &Path,
    gateway: &Gateway,
    include_errors: bool,
) -> Result<QueueReport> {
    let ids = store.queue(include_errors);
    if ids.is_empty() {
        println!("解析待ちの写真はありません");
        return Ok(QueueReport::default());
    }

    // キーがなければ通信前にここで失敗する
    let provider = gateway.provider()?;
    println!("- {} ({}) で {}枚を解析します", provider.kind(), provider.model(), ids.len());
    let options = gateway.options();
    tracing::debug!(
        timeout_secs = options.timeout.as_secs(),
        max_retries = options.retry.max_retries,
        "gateway options"
    );

    let pb = progress_bar(ids.len() as u64);
    let report = process_queue(store, gateway, &ids, |store, item| {
        pb.inc(1);
        pb.set_message(item.file_name.clone());
        session::save(session_path, store)
    })
    .await;
    pb.finish_and_clear();
    let report = report?;

    println!(
        "✔ 解析完了: 成功 {}枚 / エラー {}枚",
        report.succeeded, report.failed
    );
    for item in store.items().iter().filter(|i| i.status == ItemStatus::Error) {
        if let Some(message) = &item.error_message {
            println!("  ✗ {}: {}", item.file_name, message);
        }
    }
    Ok(report)
}

fn print_summary(store: &ReviewStore) {
    println!(
        "写真 {}枚（未解析 {} / 成功 {} / エラー {}）、採水地点 {}件\n",
        store.len(),
        store.count_by_status(ItemStatus::Idle),
        store.count_by_status(ItemStatus::Success),
        store.count_by_status(ItemStatus::Error),
        store.sample_points().len()
    );
}

fn print_points(store: &ReviewStore) {
    if store.sample_points().is_empty() {
        println!("採水地点はありません（全写真を1つの系列として扱います）");
        return;
    }
    for (i, point) in store.sample_points().iter().enumerate() {
        let end = point
            .end_image_index
            .map(|e| (e + 1).to_string())
            .unwrap_or_else(|| "最後".into());
        println!(
            "{:>2}. {}  写真 {}〜{}（{}枚）  id={}",
            i + 1,
            point.name,
            point.start_image_index + 1,
            end,
            point.depth_count,
            point.id
        );
    }
}

fn run_points(store: &mut ReviewStore, action: PointsAction) -> Result<()> {
    match action {
        PointsAction::List => {}
        PointsAction::Add => {
            let id = store.add_sample_point()?;
            println!("✔ 地点を追加しました: {}", id);
        }
        PointsAction::Remove { point } => {
            let id = store.resolve_point(&point)?.id.clone();
            let removed = store.remove_sample_point(&id)?;
            println!("✔ {} を削除しました", removed.name);
        }
        PointsAction::Rename { point, name } => {
            let id = store.resolve_point(&point)?.id.clone();
            store.rename_sample_point(&id, &name)?;
            println!("✔ 地点名を変更しました: {}", name);
        }
        PointsAction::SetStart { point, photo } => {
            let id = store.resolve_point(&point)?.id.clone();
            store.reassign_start_index(&id, cli::photo_index(photo))?;
            println!("✔ 開始写真を変更しました");
        }
    }
    print_points(store);
    Ok(())
}

fn print_config(config: &ApiConfig, current: bool) {
    println!("{}{} ({})", if current { "* " } else { "  " }, config.name, config.id);
    println!("    API: {}", config.selected_api);
    println!(
        "    OpenAI: {} / {} / {}",
        ApiConfig::masked_key(&config.openai_api_key),
        config.openai_model,
        config.openai_base_url
    );
    println!(
        "    Gemini: {} / {}",
        ApiConfig::masked_key(&config.gemini_api_key),
        config.gemini_model
    );
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let collection = ApiConfigCollection::load_or_default()?;
            match collection.current() {
                Some(config) => print_config(config, true),
                None => {
                    let env = EnvDefaults::from_env();
                    println!("API設定はありません。環境変数を使用します:");
                    println!("  OPENAI_API_KEY: {}", if env.openai_api_key.is_some() { "設定済み" } else { "未設定" });
                    println!("  GEMINI_API_KEY: {}", if env.gemini_api_key.is_some() { "設定済み" } else { "未設定" });
                }
            }
            println!("\n設定ファイル: {}", ApiConfigCollection::config_path()?.display());
        }

        ConfigAction::List => {
            let collection = ApiConfigCollection::load_or_default()?;
            if collection.configs.is_empty() {
                println!("API設定はありません");
            }
            let current_id = collection.current().map(|c| c.id.clone());
            for config in &collection.configs {
                print_config(config, current_id.as_deref() == Some(config.id.as_str()));
            }
        }

        ConfigAction::Use { key } => {
            let mut collection = ApiConfigCollection::load_or_default()?;
            collection.set_current(&key)?;
            collection.save()?;
            println!("✔ 現在の設定: {}", key);
        }

        ConfigAction::Add {
            name,
            id,
            api,
            openai_key,
            openai_model,
            openai_base_url,
            gemini_key,
            gemini_model,
            use_now,
        } => {
            let mut collection = ApiConfigCollection::load_or_default()?;
            let existing = id.as_deref().and_then(|id| collection.find(id)).cloned();
            let mut config = match existing {
                Some(existing) => existing,
                None => {
                    let mut config = ApiConfig::new(&name);
                    if let Some(id) = id {
                        config.id = id;
                    }
                    config
                }
            };
            config.name = name;
            config.selected_api = api;
            if let Some(v) = openai_key {
                config.openai_api_key = v;
            }
            if let Some(v) = openai_model {
                config.openai_model = v;
            }
            if let Some(v) = openai_base_url {
                config.openai_base_url = v;
            }
            if let Some(v) = gemini_key {
                config.gemini_api_key = v;
            }
            if let Some(v) = gemini_model {
                config.gemini_model = v;
            }

            let config_id = config.id.clone();
            collection.upsert(config)?;
            if use_now {
                collection.set_current(&config_id)?;
            }
            collection.save()?;
            println!("✔ 設定を保存しました: {}", config_id);
        }

        ConfigAction::Remove { key } => {
            let mut collection = ApiConfigCollection::load_or_default()?;
            let removed = collection.remove(&key)?;
            collection.save()?;
            println!("✔ 設定を削除しました: {}", removed.name);
        }

        ConfigAction::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|_| ProsoloError::FileNotFound(file.display().to_string()))?;
            let collection = ApiConfigCollection::import_json(&content)?;
            collection.save()?;
            println!("✔ {}件の設定を読み込みました", collection.configs.len());
        }

        ConfigAction::Export { output } => {
            let collection = ApiConfigCollection::load_or_default()?;
            let file_name = ApiConfigCollection::export_file_name(chrono::Local::now().date_naive());
            let path = match output {
                Some(p) if p.is_dir() => p.join(file_name),
                Some(p) => p,
                None => file_name.into(),
            };
            std::fs::write(&path, collection.to_json_pretty()?)?;
            println!("✔ 設定を書き出しました: {}", path.display());
        }
    }
    Ok(())
}
