use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::RegistryError;
use super::types::{Patch, Registration};
use crate::services::broadcast::PatchBroadcaster;
use crate::services::transport::ServiceTransport;

/// 活跃注册信息的集合（service_url -> 注册信息）
#[derive(Debug)]
pub struct RegistrationStore {
    registrations: RwLock<HashMap<String, Arc<Registration>>>,
    broadcaster: PatchBroadcaster,
}

impl RegistrationStore {
    pub fn new(transport: Arc<dyn ServiceTransport>) -> Self {
        Self::with_broadcaster(PatchBroadcaster::new(transport))
    }

    pub fn with_broadcaster(broadcaster: PatchBroadcaster) -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    /// 注册服务：写入注册表，通知关心它的服务，并向新服务发送已有依赖。
    ///
    /// 同一 URL 已有不同的注册信息时，旧条目的移除与新条目的加入在同一个补丁中广播。
    /// 首次同步失败时返回错误，但注册信息保留在注册表中。
    pub async fn add(
        &self,
        registration: impl Into<Arc<Registration>>,
    ) -> Result<(), RegistryError> {
        let registration: Arc<Registration> = registration.into();
        let url = registration.service_url.clone();

        let (initial_sync, recipients, previous) = {
            let mut registrations = self.registrations.write().await;
            let previous = registrations.insert(url.clone(), registration.clone());
            if let Some(ref previous) = previous {
                tracing::warn!(
                    service_name = %previous.service_name,
                    service_url = %url,
                    "Replacing existing registration with the same URL"
                );
            }

            // 降级为读锁，基于同一快照计算首次同步和广播对象
            let registrations = registrations.downgrade();
            let initial_sync = Patch::added(
                registrations
                    .values()
                    .filter(|other| {
                        other.service_url != url && registration.requires(&other.service_name)
                    })
                    .map(|other| other.entry())
                    .collect(),
            );
            let recipients: Vec<Arc<Registration>> = registrations
                .values()
                .filter(|other| other.service_url != url)
                .cloned()
                .collect();
            (initial_sync, recipients, previous)
        };

        tracing::info!(
            service_name = %registration.service_name,
            service_url = %url,
            required = registration.required_services.len(),
            "Added registration"
        );

        let mut event = Patch::added(vec![registration.entry()]);
        if let Some(previous) = previous {
            if previous.entry() != registration.entry() {
                event.removed.push(previous.entry());
            }
        }
        // 先派发广播，避免等待首次同步期间发生的注销被更早送达
        self.broadcaster.notify(&event, &recipients);

        if initial_sync.is_empty() {
            return Ok(());
        }

        if let Err(e) = self
            .broadcaster
            .deliver(&registration.service_update_url, &initial_sync)
            .await
        {
            tracing::warn!(
                service_name = %registration.service_name,
                service_url = %url,
                error = %e,
                "Initial dependency sync failed, registration kept"
            );
            return Err(e.into());
        }

        Ok(())
    }

    /// 按 URL 注销服务并通知依赖方
    pub async fn remove(&self, service_url: &str) -> Result<Arc<Registration>, RegistryError> {
        let (removed, recipients) = {
            let mut registrations = self.registrations.write().await;
            let removed = registrations
                .remove(service_url)
                .ok_or_else(|| RegistryError::NotFound {
                    url: service_url.to_string(),
                })?;

            let registrations = registrations.downgrade();
            let recipients: Vec<Arc<Registration>> = registrations.values().cloned().collect();
            (removed, recipients)
        };

        tracing::info!(
            service_name = %removed.service_name,
            service_url = %service_url,
            "Removed registration"
        );

        self.broadcaster
            .notify(&Patch::removed(vec![removed.entry()]), &recipients);

        Ok(removed)
    }

    pub async fn get(&self, service_url: &str) -> Option<Arc<Registration>> {
        self.registrations.read().await.get(service_url).cloned()
    }

    pub async fn contains(&self, service_url: &str) -> bool {
        self.registrations.read().await.contains_key(service_url)
    }

    /// 当前所有注册信息的快照
    pub async fn snapshot(&self) -> Vec<Arc<Registration>> {
        self.registrations.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registrations.read().await.is_empty()
    }

    pub fn broadcaster(&self) -> &PatchBroadcaster {
        &self.broadcaster
    }
}
