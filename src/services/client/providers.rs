use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::services::registry::{Patch, ServiceName};

/// 服务本地维护的依赖视图（服务名 -> 提供者地址）
#[derive(Debug, Clone, Default)]
pub struct Providers {
    services: Arc<DashMap<ServiceName, Vec<String>>>,
    cursor: Arc<AtomicUsize>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 先处理移除再处理新增，同一补丁可以替换同一地址上的服务
    pub fn apply(&self, patch: &Patch) {
        for entry in &patch.removed {
            if let Some(mut urls) = self.services.get_mut(&entry.name) {
                let before = urls.len();
                urls.retain(|url| url != &entry.url);
                if urls.len() != before {
                    tracing::info!(
                        service_name = %entry.name,
                        url = %entry.url,
                        "Dependency provider removed"
                    );
                }
            }
            self.services.remove_if(&entry.name, |_, urls| urls.is_empty());
        }

        for entry in &patch.added {
            let mut urls = self.services.entry(entry.name.clone()).or_default();
            if !urls.contains(&entry.url) {
                tracing::info!(
                    service_name = %entry.name,
                    url = %entry.url,
                    "Dependency provider added"
                );
                urls.push(entry.url.clone());
            }
        }
    }

    /// 轮询选择一个提供者
    pub fn get(&self, name: &ServiceName) -> Option<String> {
        let urls = self.services.get(name)?;
        if urls.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(urls[idx % urls.len()].clone())
    }

    pub fn all(&self, name: &ServiceName) -> Vec<String> {
        self.services
            .get(name)
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
