//! 逐次処理キュー
//!
//! 1件ずつ processing → success / error と進める。同時に処理中になる行は常に1件以下。
//! 1件の失敗でキューは止まらない。

use super::Extractor;
use crate::error::Result;
use prosolo_common::{Item, ReviewStore};
use std::path::Path;
use tracing::{debug, warn};

/// キュー処理の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub succeeded: usize,
    pub failed: usize,
    /// idle でなかった・見つからなかった行
    pub skipped: usize,
}

/// `ids` の順に解析する
///
/// 各行の処理後に `on_item` を呼ぶ（セッション保存や進捗表示用）。
/// `on_item` がエラーを返した場合のみ中断する。
pub async fn process_queue<E, F>(
    store: &mut ReviewStore,
    extractor: &E,
    ids: &[String],
    mut on_item: F,
) -> Result<QueueReport>
where
    E: Extractor,
    F: FnMut(&ReviewStore, &Item) -> Result<()>,
{
    let mut report = QueueReport::default();

    for id in ids {
        if let Err(e) = store.begin_processing(id) {
            warn!(id = %id, error = %e, "skipping queue entry");
            report.skipped += 1;
            continue;
        }

        let file_path = match store.item(id) {
            Some(item) => item.file_path.clone(),
            None => {
                report.skipped += 1;
                continue;
            }
        };

        match extractor.extract(Path::new(&file_path)).await {
            Ok(data) => {
                debug!(id = %id, ?data, "extraction succeeded");
                store.complete(id, data)?;
                report.succeeded += 1;
            }
            Err(e) => {
                warn!(id = %id, error = %e, "extraction failed");
                store.fail(id, e.to_string())?;
                report.failed += 1;
            }
        }

        if let Some(item) = store.item(id) {
            on_item(&*store, item)?;
        }
    }

    Ok(report)
}

/// 1行だけ再解析する
///
/// 先に `preflight` を通し、失敗した場合は行を変更せずに返す。
pub async fn retry_item<E, F>(store: &mut ReviewStore, extractor: &E, id: &str, on_item: F) -> Result<QueueReport>
where
    E: Extractor,
    F: FnMut(&ReviewStore, &Item) -> Result<()>,
{
    extractor.preflight()?;
    store.retry(id)?;
    process_queue(store, extractor, &[id.to_string()], on_item).await
}
