//! 最近分析结果的内存缓存, 供下载接口按 id 取回

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::ensemble::Analysis;

/// 默认保留最近 32 次分析
pub const STORE_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct StoredAnalysis {
    pub id: u64,
    pub analysis: Analysis,
    /// 上传的原始文件
    pub original: Vec<u8>,
    pub original_mime: &'static str,
}

pub struct AnalysisStore {
    next_id: AtomicU64,
    capacity: usize,
    entries: Mutex<VecDeque<Arc<StoredAnalysis>>>,
}

impl AnalysisStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// 插入新结果, 超出容量时淘汰最旧的
    pub fn insert(
        &self,
        analysis: Analysis,
        original: Vec<u8>,
        original_mime: &'static str,
    ) -> Arc<StoredAnalysis> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stored = Arc::new(StoredAnalysis {
            id,
            analysis,
            original,
            original_mime,
        });

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::debug!(id = evicted.id, "淘汰旧的分析结果");
            }
        }
        entries.push_back(stored.clone());
        stored
    }

    pub fn get(&self, id: u64) -> Option<Arc<StoredAnalysis>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().find(|s| s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnalysisStore {
    fn default() -> Self {
        Self::new(STORE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn analysis(name: &str) -> Analysis {
        Analysis {
            image_name: name.to_string(),
            annotated: RgbImage::new(4, 4),
            rows: vec![],
        }
    }

    #[test]
    fn ids_are_sequential() {
        let store = AnalysisStore::default();
        let a = store.insert(analysis("a"), vec![1], "image/png");
        let b = store.insert(analysis("b"), vec![2], "image/jpeg");

        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.get(2).unwrap().analysis.image_name, "b");
        assert!(store.get(3).is_none());
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let store = AnalysisStore::new(2);
        for name in ["a", "b", "c"] {
            store.insert(analysis(name), vec![], "image/png");
        }

        assert_eq!(store.len(), 2);
        assert!(store.get(1).is_none());
        assert_eq!(store.get(3).unwrap().analysis.image_name, "c");
    }
}
