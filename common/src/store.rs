//! レビューストア
//!
//! 写真行の正本。取込み・編集・削除・再解析と、構造変更後のラベル再計算を担う。
//! 採水地点レジストリを内包し、セッション JSON としてそのまま保存できる。

use crate::error::{Error, Result};
use crate::registry::{relabel_positional, SampleRegistry};
use crate::types::{parse_reading_input, Field, Item, ItemStatus, NewFile, ProSoloData, SamplePoint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStore {
    #[serde(default)]
    items: Vec<Item>,

    #[serde(default, rename = "samplePoints")]
    registry: SampleRegistry,
}

impl ReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn registry(&self) -> &SampleRegistry {
        &self.registry
    }

    pub fn sample_points(&self) -> &[SamplePoint] {
        self.registry.points()
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    fn item_mut(&mut self, id: &str) -> Result<&mut Item> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))
    }

    /// 表示順の番号（1始まり）または ID 前方一致で行を探す
    pub fn resolve(&self, key: &str) -> Result<&Item> {
        let key = key.trim();
        if let Ok(number) = key.parse::<usize>() {
            if number >= 1 && number <= self.items.len() {
                return Ok(&self.items[number - 1]);
            }
        }
        if let Some(item) = self.item(key) {
            return Ok(item);
        }
        let mut matches = self.items.iter().filter(|i| i.id.starts_with(key));
        match (matches.next(), matches.next()) {
            (Some(item), None) if !key.is_empty() => Ok(item),
            _ => Err(Error::ItemNotFound(key.to_string())),
        }
    }

    /// 写真を追加し、撮影順に並べ替えてラベルを付け直す
    ///
    /// 追加された行の ID を返す
    pub fn add(&mut self, files: Vec<NewFile>) -> Vec<String> {
        let new_items: Vec<Item> = files.into_iter().map(Item::from_file).collect();
        let ids = new_items.iter().map(|i| i.id.clone()).collect();
        self.items.extend(new_items);
        self.registry.relabel(&mut self.items);
        ids
    }

    /// 撮影順の手動並べ替え
    pub fn sort_by_time(&mut self) {
        self.registry.relabel(&mut self.items);
    }

    /// フィールドを更新
    ///
    /// 計測値は空文字を None、それ以外を数値に変換する。ラベルの再計算は行わない
    pub fn update_field(&mut self, id: &str, field: Field, value: &str) -> Result<()> {
        let parsed = match field {
            Field::DepthLabel => None,
            _ => Some(parse_reading_input(value)?),
        };
        let item = self.item_mut(id)?;
        match (field.reading(&mut item.data), parsed) {
            (Some(slot), Some(number)) => *slot = number,
            _ => item.depth_label = value.to_string(),
        }
        Ok(())
    }

    /// 行を削除し、残りを絶対位置でラベル付け
    pub fn remove(&mut self, id: &str) -> Result<Item> {
        let index = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))?;
        let removed = self.items.remove(index);

        self.registry.recompute(self.items.len());
        relabel_positional(&mut self.items);
        self.registry.assign_items(&mut self.items);
        Ok(removed)
    }

    /// 全行と採水地点を破棄（確認は呼び出し側で行う）
    pub fn clear(&mut self) {
        self.items.clear();
        self.registry = SampleRegistry::new();
    }

    fn transition(&mut self, id: &str, next: ItemStatus) -> Result<&mut Item> {
        let item = self.item_mut(id)?;
        if !item.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                id: id.to_string(),
                from: item.status,
                to: next,
            });
        }
        item.status = next;
        Ok(item)
    }

    /// 再解析: error / success → idle
    pub fn retry(&mut self, id: &str) -> Result<()> {
        let item = self.transition(id, ItemStatus::Idle)?;
        item.error_message = None;
        Ok(())
    }

    pub fn begin_processing(&mut self, id: &str) -> Result<()> {
        self.transition(id, ItemStatus::Processing)?;
        Ok(())
    }

    pub fn complete(&mut self, id: &str, data: ProSoloData) -> Result<()> {
        let item = self.transition(id, ItemStatus::Success)?;
        item.data = data;
        item.error_message = None;
        Ok(())
    }

    pub fn fail(&mut self, id: &str, message: impl Into<String>) -> Result<()> {
        let item = self.transition(id, ItemStatus::Error)?;
        item.error_message = Some(message.into());
        Ok(())
    }

    /// 解析待ち行の ID（表示順）
    ///
    /// `include_errors` の場合は error 行を idle に戻してから含める
    pub fn queue(&mut self, include_errors: bool) -> Vec<String> {
        if include_errors {
            for item in self.items.iter_mut().filter(|i| i.status == ItemStatus::Error) {
                item.status = ItemStatus::Idle;
                item.error_message = None;
            }
        }
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Idle)
            .map(|i| i.id.clone())
            .collect()
    }

    /// 中断された processing 行を idle に戻す
    pub fn reset_interrupted(&mut self) -> usize {
        let mut count = 0;
        for item in self.items.iter_mut().filter(|i| i.status == ItemStatus::Processing) {
            item.status = ItemStatus::Idle;
            count += 1;
        }
        count
    }

    pub fn count_by_status(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    // =============================================
    // 採水地点の操作（変更後はラベルを全体再計算）
    // =============================================

    pub fn add_sample_point(&mut self) -> Result<String> {
        let id = self.registry.add_point(self.items.len())?.id.clone();
        self.registry.relabel(&mut self.items);
        Ok(id)
    }

    pub fn remove_sample_point(&mut self, id: &str) -> Result<SamplePoint> {
        let removed = self.registry.remove_point(id, self.items.len())?;
        self.registry.relabel(&mut self.items);
        Ok(removed)
    }

    pub fn rename_sample_point(&mut self, id: &str, name: &str) -> Result<()> {
        self.registry.rename_point(id, name)
    }

    pub fn reassign_start_index(&mut self, id: &str, new_index: usize) -> Result<()> {
        self.registry.reassign_start_index(id, new_index, self.items.len())?;
        self.registry.relabel(&mut self.items);
        Ok(())
    }

    /// 地点番号（1始まり）または ID で地点を探す
    pub fn resolve_point(&self, key: &str) -> Result<&SamplePoint> {
        let key = key.trim();
        let points = self.registry.points();
        if let Ok(number) = key.parse::<usize>() {
            if number >= 1 && number <= points.len() {
                return Ok(&points[number - 1]);
            }
        }
        self.registry
            .get(key)
            .ok_or_else(|| Error::SamplePointNotFound(key.to_string()))
    }

    /// 読込み後の整合性回復（手編集された JSON 対策）
    pub fn normalize(&mut self) {
        let count = self.items.len();
        self.registry.recompute(count);
        self.registry.assign_items(&mut self.items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, modified_ms: i64) -> NewFile {
        NewFile {
            file_name: name.to_string(),
            file_path: format!("/photos/{}", name),
            modified_ms,
        }
    }

    fn store_with(n: usize) -> ReviewStore {
        let mut store = ReviewStore::new();
        store.add((0..n).map(|i| file(&format!("p{}.jpg", i), 100 + i as i64)).collect());
        store
    }

    fn labels(store: &ReviewStore) -> Vec<String> {
        store.items().iter().map(|i| i.depth_label.clone()).collect()
    }

    #[test]
    fn test_add_sorts_and_labels() {
        let mut store = ReviewStore::new();
        let ids = store.add(vec![file("c.jpg", 3), file("a.jpg", 1), file("b.jpg", 2)]);
        assert_eq!(ids.len(), 3);
        assert_eq!(labels(&store), vec!["0 米", "1 米", "2 米"]);
        assert_eq!(store.items()[0].file_name, "a.jpg");
        assert!(store.items().iter().all(|i| i.status == ItemStatus::Idle));
    }

    #[test]
    fn test_add_merges_into_existing_order() {
        let mut store = ReviewStore::new();
        store.add(vec![file("a.jpg", 1), file("c.jpg", 3)]);
        store.add(vec![file("b.jpg", 2)]);
        let names: Vec<&str> = store.items().iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(labels(&store), vec!["0 米", "1 米", "2 米"]);
    }

    #[test]
    fn test_update_field_numeric() {
        let mut store = store_with(1);
        let id = store.items()[0].id.clone();
        store.update_field(&id, Field::Temp, "21.4").unwrap();
        store.update_field(&id, Field::DoMgl, "").unwrap();
        assert_eq!(store.items()[0].data.temp, Some(21.4));
        assert_eq!(store.items()[0].data.do_mgl, None);

        let err = store.update_field(&id, Field::Mmhg, "abc");
        assert!(matches!(err, Err(Error::InvalidNumber(_))));
    }

    #[test]
    fn test_update_label_does_not_relabel() {
        let mut store = store_with(2);
        let id = store.items()[1].id.clone();
        store.update_field(&id, Field::DepthLabel, "水面").unwrap();
        assert_eq!(labels(&store), vec!["0 米", "水面"]);
    }

    #[test]
    fn test_remove_relabels_by_position() {
        let mut store = store_with(4);
        let first_point = store.add_sample_point().unwrap();
        let second_point = store.add_sample_point().unwrap();
        assert_ne!(first_point, second_point);
        store.reassign_start_index(&second_point, 2).unwrap();
        assert_eq!(labels(&store), vec!["0 米", "1 米", "0 米", "1 米"]);

        let id = store.items()[0].id.clone();
        store.remove(&id).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(labels(&store), vec!["0 米", "1 米", "2 米"]);
        // 区間と所属地点は再計算される
        let points = store.sample_points();
        assert_eq!(points[0].depth_count + points[1].depth_count, 3);
    }

    #[test]
    fn test_remove_unknown() {
        let mut store = store_with(1);
        assert!(matches!(store.remove("nope"), Err(Error::ItemNotFound(_))));
    }

    #[test]
    fn test_status_flow() {
        let mut store = store_with(2);
        let a = store.items()[0].id.clone();
        let b = store.items()[1].id.clone();

        store.begin_processing(&a).unwrap();
        store.complete(&a, ProSoloData { temp: Some(1.0), ..Default::default() }).unwrap();
        store.begin_processing(&b).unwrap();
        store.fail(&b, "Network error").unwrap();

        assert_eq!(store.item(&a).unwrap().status, ItemStatus::Success);
        assert_eq!(store.item(&b).unwrap().error_message.as_deref(), Some("Network error"));

        store.retry(&b).unwrap();
        assert_eq!(store.item(&b).unwrap().status, ItemStatus::Idle);
        assert_eq!(store.item(&b).unwrap().error_message, None);
    }

    #[test]
    fn test_invalid_transition() {
        let mut store = store_with(1);
        let id = store.items()[0].id.clone();
        let result = store.complete(&id, ProSoloData::blank());
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
        assert!(store.retry(&id).is_err());
    }

    #[test]
    fn test_queue_with_errors() {
        let mut store = store_with(3);
        let ids: Vec<String> = store.items().iter().map(|i| i.id.clone()).collect();
        store.begin_processing(&ids[0]).unwrap();
        store.fail(&ids[0], "x").unwrap();
        store.begin_processing(&ids[1]).unwrap();
        store.complete(&ids[1], ProSoloData::blank()).unwrap();

        assert_eq!(store.queue(false), vec![ids[2].clone()]);
        assert_eq!(store.queue(true), vec![ids[0].clone(), ids[2].clone()]);
        assert_eq!(store.item(&ids[0]).unwrap().status, ItemStatus::Idle);
    }

    #[test]
    fn test_clear() {
        let mut store = store_with(3);
        store.add_sample_point().unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.sample_points().is_empty());
    }

    #[test]
    fn test_resolve_by_number_and_prefix() {
        let store = store_with(3);
        let second = store.items()[1].clone();
        assert_eq!(store.resolve("2").unwrap().id, second.id);
        assert_eq!(store.resolve(&second.id[..8]).unwrap().id, second.id);
        assert!(store.resolve("").is_err());
        assert!(store.resolve("zzzz-not-an-id").is_err());
    }

    #[test]
    fn test_session_json_roundtrip_shape() {
        let mut store = store_with(2);
        store.add_sample_point().unwrap();
        let json = serde_json::to_value(&store).unwrap();
        assert!(json["items"].is_array());
        assert_eq!(json["samplePoints"][0]["name"], "采样点 1");
        assert_eq!(json["items"][0]["depthLabel"], "0 米");

        let restored: ReviewStore = serde_json::from_value(json).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn test_scenario_three_files_then_point() {
        let mut store = ReviewStore::new();
        store.add(vec![file("t0.jpg", 1_000), file("t1.jpg", 2_000), file("t2.jpg", 3_000)]);
        assert_eq!(labels(&store), vec!["0 米", "1 米", "2 米"]);

        store.add_sample_point().unwrap();
        let second = store.add_sample_point().unwrap();
        store.reassign_start_index(&second, 1).unwrap();

        assert_eq!(labels(&store), vec!["0 米", "0 米", "1 米"]);
        let points = store.sample_points();
        assert_eq!(points[0].end_image_index, Some(0));
        assert_eq!(points[1].start_image_index, 1);
        assert_eq!(points[1].depth_count, 2);
    }
}
