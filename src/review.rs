//! 対話式レビュー
//!
//! 行を選んで深度ラベル・計測値を修正、削除、再解析する。
//! 変更のたびに保存コールバックを呼ぶ。

use crate::error::Result;
use crate::gateway::{retry_item, Extractor};
use dialoguer::{Confirm, Input, Select};
use prosolo_common::{Field, Item, ReviewStore};

/// 計測値の表示（空は "-"）
pub fn format_reading(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn point_name<'a>(store: &'a ReviewStore, item: &Item) -> &'a str {
    if store.sample_points().is_empty() {
        return "-";
    }
    store
        .sample_points()
        .get(item.sample_point_index)
        .map(|p| p.name.as_str())
        .unwrap_or("-")
}

/// セッションの一覧表
pub fn render_table(store: &ReviewStore) -> String {
    let mut lines = vec![format!(
        "{:>3}  {:<24} {:<10} {:<8} {:<10} {:>8} {:>8} {:>8} {:>8}",
        "#",
        "ファイル",
        "地点",
        "深度",
        "状態",
        Field::Temp.key(),
        Field::Mmhg.key(),
        Field::DoPct.key(),
        Field::DoMgl.key(),
    )];

    for (i, item) in store.items().iter().enumerate() {
        let [temp, mmhg, do_pct, do_mgl] = item.data.as_array().map(format_reading);
        lines.push(format!(
            "{:>3}  {:<24} {:<10} {:<8} {:<10} {:>8} {:>8} {:>8} {:>8}",
            i + 1,
            item.file_name,
            point_name(store, item),
            item.depth_label,
            item.status.as_str(),
            temp,
            mmhg,
            do_pct,
            do_mgl,
        ));
        if let Some(message) = &item.error_message {
            lines.push(format!("     ⚠ {}", message));
        }
    }
    lines.join("\n")
}

/// 行に対する操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Edit(Field),
    Retry,
    Remove,
    Back,
}

impl ReviewAction {
    pub const ALL: [ReviewAction; 8] = [
        ReviewAction::Edit(Field::DepthLabel),
        ReviewAction::Edit(Field::Temp),
        ReviewAction::Edit(Field::Mmhg),
        ReviewAction::Edit(Field::DoPct),
        ReviewAction::Edit(Field::DoMgl),
        ReviewAction::Retry,
        ReviewAction::Remove,
        ReviewAction::Back,
    ];

    pub fn label(&self) -> String {
        match self {
            ReviewAction::Edit(field) => format!("{} を修正", field.label()),
            ReviewAction::Retry => "再解析".into(),
            ReviewAction::Remove => "この行を削除".into(),
            ReviewAction::Back => "戻る".into(),
        }
    }
}

fn current_value(item: &Item, field: Field) -> String {
    match field {
        Field::DepthLabel => item.depth_label.clone(),
        Field::Temp => item.data.temp.map(|v| v.to_string()).unwrap_or_default(),
        Field::Mmhg => item.data.mmhg.map(|v| v.to_string()).unwrap_or_default(),
        Field::DoPct => item.data.do_pct.map(|v| v.to_string()).unwrap_or_default(),
        Field::DoMgl => item.data.do_mgl.map(|v| v.to_string()).unwrap_or_default(),
    }
}

fn row_label(store: &ReviewStore, index: usize, item: &Item) -> String {
    let [temp, mmhg, do_pct, do_mgl] = item.data.as_array().map(format_reading);
    format!(
        "{:>3}. {} [{}] {} {} | {} / {} / {} / {}",
        index + 1,
        item.file_name,
        item.status.as_str(),
        point_name(store, item),
        item.depth_label,
        temp,
        mmhg,
        do_pct,
        do_mgl
    )
}

/// 対話式レビューを実行
pub async fn run_interactive_review<E, S>(store: &mut ReviewStore, extractor: &E, mut save: S) -> Result<()>
where
    E: Extractor,
    S: FnMut(&ReviewStore) -> Result<()>,
{
    if store.is_empty() {
        println!("写真がありません。`prosolo add` で追加してください");
        return Ok(());
    }

    let mut cursor = 0;
    loop {
        let mut rows: Vec<String> = store
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| row_label(store, i, item))
            .collect();
        rows.push("保存して終了".into());

        let selected = Select::new()
            .with_prompt("行を選択")
            .items(&rows)
            .default(cursor.min(rows.len() - 1))
            .interact()?;

        if selected == store.len() {
            break;
        }
        cursor = selected;
        let item = store.items()[selected].clone();

        let labels: Vec<String> = ReviewAction::ALL.iter().map(|a| a.label()).collect();
        let choice = Select::new()
            .with_prompt(format!("{} の操作", item.file_name))
            .items(&labels)
            .default(0)
            .interact()?;

        match ReviewAction::ALL[choice] {
            ReviewAction::Edit(field) => {
                let value: String = Input::new()
                    .with_prompt(field.label())
                    .with_initial_text(current_value(&item, field))
                    .allow_empty(true)
                    .interact_text()?;
                match store.update_field(&item.id, field, &value) {
                    Ok(()) => println!("  → {} を更新しました\n", field.label()),
                    Err(e) => {
                        println!("  → {}\n", e);
                        continue;
                    }
                }
            }
            ReviewAction::Retry => {
                println!("  → 再解析中...");
                if let Err(e) = retry_item(store, extractor, &item.id, |_, _| Ok(())).await {
                    println!("  → {}\n", e);
                    continue;
                }
                if let Some(updated) = store.item(&item.id) {
                    match &updated.error_message {
                        Some(message) => println!("  ✗ {}\n", message),
                        None => println!("  ✔ 再解析しました\n"),
                    }
                }
            }
            ReviewAction::Remove => {
                let confirmed = Confirm::new()
                    .with_prompt(format!("{} を削除しますか？", item.file_name))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    continue;
                }
                store.remove(&item.id)?;
                println!("  → 削除しました\n");
                if store.is_empty() {
                    save(store)?;
                    break;
                }
            }
            ReviewAction::Back => continue,
        }

        save(store)?;
    }

    save(store)?;
    println!("\n✓ 保存しました");
    Ok(())
}
