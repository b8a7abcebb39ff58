//! 採水地点レジストリ
//!
//! 写真列を採水地点ごとの連続区間に分割し、区間内の位置から深度ラベルを導出する。
//!
//! 区間の不変条件:
//! - 開始インデックス昇順、先頭地点は 0 から始まる
//! - 隣接区間は隙間も重なりもない（前地点の終端 = 次地点の開始 - 1）
//! - 最終地点の終端は None（リスト末尾まで）

use crate::error::{Error, Result};
use crate::types::{Item, SamplePoint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 深度の単位
pub const DEPTH_UNIT: &str = "米";

/// 地点内の相対位置から深度ラベルを生成（"0 米", "1 米", ...）
pub fn depth_label(index: usize, start: usize) -> String {
    format!("{} {}", index.saturating_sub(start), DEPTH_UNIT)
}

/// 撮影順の比較（更新日時、同時刻はファイル名）
pub fn capture_order(a: &Item, b: &Item) -> Ordering {
    a.modified_ms
        .cmp(&b.modified_ms)
        .then_with(|| a.file_name.cmp(&b.file_name))
}

/// 撮影順に並べ替え（安定ソート）
pub fn sort_by_capture(items: &mut [Item]) {
    items.sort_by(capture_order);
}

/// 地点区間を無視し、絶対位置だけでラベルを振り直す
///
/// 単体削除時の簡易経路。地点の区切りは反映されない
pub fn relabel_positional(items: &mut [Item]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.depth_label = depth_label(index, 0);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRegistry {
    points: Vec<SamplePoint>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存の地点リストから構築し、区間を再計算
    pub fn from_points(points: Vec<SamplePoint>, item_count: usize) -> Self {
        let mut registry = Self { points };
        registry.recompute(item_count);
        registry
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SamplePoint> {
        self.points.iter().find(|p| p.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.points
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::SamplePointNotFound(id.to_string()))
    }

    /// インデックスを含む地点の (地点番号, 開始インデックス)
    ///
    /// 地点がなければ全体を 1 地点（開始 0）とみなす
    pub fn locate(&self, index: usize, item_count: usize) -> (usize, usize) {
        self.points
            .iter()
            .enumerate()
            .find(|(_, p)| p.contains(index, item_count))
            .map(|(i, p)| (i, p.start_image_index))
            .unwrap_or((0, 0))
    }

    /// 地点を追加（直前の地点の次の写真から開始）
    pub fn add_point(&mut self, item_count: usize) -> Result<&SamplePoint> {
        if item_count == 0 {
            return Err(Error::SamplePointLimit("写真がありません".into()));
        }
        if self.points.len() >= item_count {
            return Err(Error::SamplePointLimit(format!(
                "地点数 {} が写真枚数 {} に達しています",
                self.points.len(),
                item_count
            )));
        }

        let start = self
            .points
            .last()
            .map(|p| p.start_image_index + 1)
            .unwrap_or(0)
            .min(item_count - 1);

        let id = format!("point-{}", uuid::Uuid::new_v4().simple());
        self.points.push(SamplePoint {
            id: id.clone(),
            name: format!("采样点 {}", self.points.len() + 1),
            start_image_index: start,
            end_image_index: None,
            depth_count: 0,
        });
        self.recompute(item_count);

        let index = self.position(&id)?;
        Ok(&self.points[index])
    }

    pub fn remove_point(&mut self, id: &str, item_count: usize) -> Result<SamplePoint> {
        let index = self.position(id)?;
        let removed = self.points.remove(index);
        self.recompute(item_count);
        Ok(removed)
    }

    pub fn rename_point(&mut self, id: &str, name: &str) -> Result<()> {
        let index = self.position(id)?;
        self.points[index].name = name.to_string();
        Ok(())
    }

    /// 開始インデックスを変更し、全地点を並べ替えて区間を再計算
    pub fn reassign_start_index(&mut self, id: &str, new_index: usize, item_count: usize) -> Result<()> {
        let index = self.position(id)?;
        self.points[index].start_image_index = new_index.min(item_count.saturating_sub(1));
        self.recompute(item_count);
        Ok(())
    }

    /// 区間の正規化と終端・深度数の再計算
    ///
    /// 開始インデックスは昇順かつ狭義単調増加、[0, item_count-1] に収める。
    /// 写真枚数より地点が多い場合は末尾の地点を削除する
    pub fn recompute(&mut self, item_count: usize) {
        if self.points.len() > item_count {
            let dropped = self.points.len() - item_count;
            tracing::warn!(dropped, item_count, "写真枚数を超える採水地点を削除");
            self.points.sort_by_key(|p| p.start_image_index);
            self.points.truncate(item_count);
        }
        if self.points.is_empty() {
            return;
        }

        self.points.sort_by_key(|p| p.start_image_index);

        let count = self.points.len();
        self.points[0].start_image_index = 0;
        for i in 1..count {
            let min_start = self.points[i - 1].start_image_index + 1;
            if self.points[i].start_image_index < min_start {
                self.points[i].start_image_index = min_start;
            }
        }
        if self.points[count - 1].start_image_index > item_count - 1 {
            self.points[count - 1].start_image_index = item_count - 1;
        }
        for i in (0..count - 1).rev() {
            let max_start = self.points[i + 1].start_image_index - 1;
            if self.points[i].start_image_index > max_start {
                self.points[i].start_image_index = max_start;
            }
        }

        for i in 0..count {
            let start = self.points[i].start_image_index;
            let (end, depth_count) = match self.points.get(i + 1) {
                Some(next) => (Some(next.start_image_index - 1), next.start_image_index - start),
                None => (None, item_count - start),
            };
            self.points[i].end_image_index = end;
            self.points[i].depth_count = depth_count;
        }
    }

    /// 各写真の所属地点を区間から再割当て
    pub fn assign_items(&self, items: &mut [Item]) {
        let count = items.len();
        for (index, item) in items.iter_mut().enumerate() {
            item.sample_point_index = self.locate(index, count).0;
        }
    }

    /// 撮影順に並べ替え、区間を再計算してラベルと所属地点を付け直す
    pub fn relabel(&mut self, items: &mut [Item]) {
        sort_by_capture(items);
        let count = items.len();
        self.recompute(count);
        for (index, item) in items.iter_mut().enumerate() {
            let (point_index, start) = self.locate(index, count);
            item.depth_label = depth_label(index, start);
            item.sample_point_index = point_index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewFile;

    fn item(name: &str, modified_ms: i64) -> Item {
        Item::from_file(NewFile {
            file_name: name.to_string(),
            file_path: format!("/photos/{}", name),
            modified_ms,
        })
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| item(&format!("img{:02}.jpg", i), 1_000 + i as i64)).collect()
    }

    fn labels(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.depth_label.as_str()).collect()
    }

    /// 区間が連続・非重複・全体を覆っていることを確認
    fn assert_partition(registry: &SampleRegistry, item_count: usize) {
        let points = registry.points();
        if points.is_empty() {
            return;
        }
        assert_eq!(points[0].start_image_index, 0);
        for window in points.windows(2) {
            assert!(window[0].start_image_index < window[1].start_image_index);
            assert_eq!(window[0].end_image_index, Some(window[1].start_image_index - 1));
        }
        assert_eq!(points.last().unwrap().end_image_index, None);
        let total: usize = points.iter().map(|p| p.depth_count).sum();
        assert_eq!(total, item_count);
        for index in 0..item_count {
            let owners = points.iter().filter(|p| p.contains(index, item_count)).count();
            assert_eq!(owners, 1, "index {} は1地点に属するべき", index);
        }
    }

    #[test]
    fn test_depth_label() {
        assert_eq!(depth_label(0, 0), "0 米");
        assert_eq!(depth_label(3, 0), "3 米");
        assert_eq!(depth_label(5, 3), "2 米");
    }

    #[test]
    fn test_sort_by_time_then_name() {
        let mut list = vec![item("b.jpg", 20), item("c.jpg", 10), item("a.jpg", 20), item("B.jpg", 20)];
        sort_by_capture(&mut list);
        let names: Vec<&str> = list.iter().map(|i| i.file_name.as_str()).collect();
        // 大文字は小文字より前（バイト順）
        assert_eq!(names, vec!["c.jpg", "B.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut list = vec![item("x.jpg", 3), item("y.jpg", 1), item("w.jpg", 1), item("z.jpg", 2)];
        sort_by_capture(&mut list);
        let first: Vec<String> = list.iter().map(|i| i.id.clone()).collect();
        sort_by_capture(&mut list);
        let second: Vec<String> = list.iter().map(|i| i.id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_relabel_without_points() {
        let mut list = vec![item("c.jpg", 3), item("a.jpg", 1), item("b.jpg", 2)];
        let mut registry = SampleRegistry::new();
        registry.relabel(&mut list);
        assert_eq!(labels(&list), vec!["0 米", "1 米", "2 米"]);
        assert_eq!(list[0].file_name, "a.jpg");
        assert!(list.iter().all(|i| i.sample_point_index == 0));
    }

    #[test]
    fn test_relabel_with_two_points() {
        let mut list = items(3);
        let mut registry = SampleRegistry::new();
        registry.add_point(3).unwrap();
        let second = registry.add_point(3).unwrap().id.clone();
        registry.reassign_start_index(&second, 1, 3).unwrap();
        registry.relabel(&mut list);

        assert_eq!(labels(&list), vec!["0 米", "0 米", "1 米"]);
        assert_eq!(list[0].sample_point_index, 0);
        assert_eq!(list[1].sample_point_index, 1);
        assert_eq!(list[2].sample_point_index, 1);

        let points = registry.points();
        assert_eq!(points[0].end_image_index, Some(0));
        assert_eq!(points[0].depth_count, 1);
        assert_eq!(points[1].end_image_index, None);
        assert_eq!(points[1].depth_count, 2);
    }

    #[test]
    fn test_relabel_one_zero_label_per_point() {
        let mut list = items(10);
        let mut registry = SampleRegistry::new();
        for _ in 0..3 {
            registry.add_point(10).unwrap();
        }
        let ids: Vec<String> = registry.points().iter().map(|p| p.id.clone()).collect();
        registry.reassign_start_index(&ids[1], 4, 10).unwrap();
        registry.reassign_start_index(&ids[2], 7, 10).unwrap();
        registry.relabel(&mut list);

        let zeros = list.iter().filter(|i| i.depth_label == "0 米").count();
        assert_eq!(zeros, 3);
        assert_eq!(
            labels(&list),
            vec!["0 米", "1 米", "2 米", "3 米", "0 米", "1 米", "2 米", "0 米", "1 米", "2 米"]
        );
    }

    #[test]
    fn test_add_point_defaults() {
        let mut registry = SampleRegistry::new();
        let first = registry.add_point(5).unwrap();
        assert_eq!(first.name, "采样点 1");
        assert_eq!(first.start_image_index, 0);
        assert_eq!(first.depth_count, 5);

        let second = registry.add_point(5).unwrap();
        assert_eq!(second.name, "采样点 2");
        assert_eq!(second.start_image_index, 1);
        assert_partition(&registry, 5);
    }

    #[test]
    fn test_add_point_requires_room() {
        let mut registry = SampleRegistry::new();
        assert!(registry.add_point(0).is_err());
        registry.add_point(2).unwrap();
        registry.add_point(2).unwrap();
        assert!(matches!(registry.add_point(2), Err(Error::SamplePointLimit(_))));
    }

    #[test]
    fn test_reassign_clamps_and_sorts() {
        let mut registry = SampleRegistry::new();
        registry.add_point(6).unwrap();
        let b = registry.add_point(6).unwrap().id.clone();
        let c = registry.add_point(6).unwrap().id.clone();

        registry.reassign_start_index(&b, 100, 6).unwrap();
        assert_partition(&registry, 6);
        // b は末尾へ移動し、最終インデックスに収まる
        let last = registry.points().last().unwrap();
        assert_eq!(last.id, b);
        assert_eq!(last.start_image_index, 5);
        assert_eq!(registry.points()[1].id, c);
    }

    #[test]
    fn test_reassign_sequence_keeps_partition() {
        let count = 8;
        let mut registry = SampleRegistry::new();
        for _ in 0..4 {
            registry.add_point(count).unwrap();
        }
        let ids: Vec<String> = registry.points().iter().map(|p| p.id.clone()).collect();
        let edits = [(0, 5), (3, 0), (1, 7), (2, 2), (0, 0), (3, 6), (1, 1), (2, 100)];
        for (which, target) in edits {
            registry.reassign_start_index(&ids[which], target, count).unwrap();
            assert_partition(&registry, count);
        }
    }

    #[test]
    fn test_reassign_unknown_point() {
        let mut registry = SampleRegistry::new();
        let result = registry.reassign_start_index("missing", 1, 3);
        assert!(matches!(result, Err(Error::SamplePointNotFound(_))));
    }

    #[test]
    fn test_remove_point_recomputes() {
        let mut registry = SampleRegistry::new();
        let a = registry.add_point(4).unwrap().id.clone();
        registry.add_point(4).unwrap();
        registry.remove_point(&a, 4).unwrap();
        assert_eq!(registry.len(), 1);
        assert_partition(&registry, 4);
        assert_eq!(registry.points()[0].depth_count, 4);
    }

    #[test]
    fn test_recompute_drops_excess_points() {
        let mut registry = SampleRegistry::new();
        for _ in 0..3 {
            registry.add_point(3).unwrap();
        }
        registry.recompute(2);
        assert_eq!(registry.len(), 2);
        assert_partition(&registry, 2);
    }

    #[test]
    fn test_relabel_positional_ignores_points() {
        let mut list = items(4);
        let mut registry = SampleRegistry::new();
        registry.add_point(4).unwrap();
        let second = registry.add_point(4).unwrap().id.clone();
        registry.reassign_start_index(&second, 2, 4).unwrap();
        registry.relabel(&mut list);
        assert_eq!(labels(&list), vec!["0 米", "1 米", "0 米", "1 米"]);

        relabel_positional(&mut list);
        assert_eq!(labels(&list), vec!["0 米", "1 米", "2 米", "3 米"]);
    }

    #[test]
    fn test_registry_serializes_as_list() {
        let mut registry = SampleRegistry::new();
        registry.add_point(2).unwrap();
        let json = serde_json::to_value(&registry).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["startImageIndex"], 0);
        assert_eq!(json[0]["depthCount"], 2);
    }
}
