#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use opizontas_registry::services::{
    DeliveryError, HeartbeatConfig, Patch, PatchEntry, Registration, RegistrationStore,
    ServiceName, ServiceTransport,
};

/// 记录所有投递与探测的内存传输层
#[derive(Debug, Default)]
pub struct RecordingTransport {
    deliveries: Mutex<Vec<(String, Patch)>>,
    probes: Mutex<Vec<String>>,
    unreachable: Mutex<HashSet<String>>,
    down: Mutex<HashSet<String>>,
    scripted_probes: Mutex<HashMap<String, VecDeque<bool>>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 成功送达 `update_url` 的补丁
    pub fn deliveries_to(&self, update_url: &str) -> Vec<Patch> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url == update_url)
            .map(|(_, patch)| patch.clone())
            .collect()
    }

    pub fn deliveries(&self) -> Vec<(String, Patch)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn probe_count(&self, heartbeat_url: &str) -> usize {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.as_str() == heartbeat_url)
            .count()
    }

    pub fn clear(&self) {
        self.deliveries.lock().unwrap().clear();
        self.probes.lock().unwrap().clear();
    }

    pub fn make_unreachable(&self, update_url: &str) {
        self.unreachable.lock().unwrap().insert(update_url.to_string());
    }

    pub fn set_down(&self, heartbeat_url: &str, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(heartbeat_url.to_string());
        } else {
            set.remove(heartbeat_url);
        }
    }

    /// 依次返回给定的探测结果，用完后回到 `set_down` 的状态
    pub fn script_probes(&self, heartbeat_url: &str, outcomes: &[bool]) {
        self.scripted_probes
            .lock()
            .unwrap()
            .insert(heartbeat_url.to_string(), outcomes.iter().copied().collect());
    }

    /// 对指定地址的请求在返回前等待 `delay`
    pub fn set_delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    async fn wait_for(&self, url: &str) {
        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ServiceTransport for RecordingTransport {
    async fn send_patch(&self, update_url: &str, patch: &Patch) -> Result<(), DeliveryError> {
        self.wait_for(update_url).await;
        if self.unreachable.lock().unwrap().contains(update_url) {
            return Err(DeliveryError::transport(update_url, "connection refused"));
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((update_url.to_string(), patch.clone()));
        Ok(())
    }

    async fn probe(&self, heartbeat_url: &str) -> Result<(), DeliveryError> {
        self.probes.lock().unwrap().push(heartbeat_url.to_string());
        self.wait_for(heartbeat_url).await;

        let scripted = self
            .scripted_probes
            .lock()
            .unwrap()
            .get_mut(heartbeat_url)
            .and_then(|outcomes| outcomes.pop_front());
        let healthy =
            scripted.unwrap_or_else(|| !self.down.lock().unwrap().contains(heartbeat_url));

        if healthy {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                url: heartbeat_url.to_string(),
                status: 503,
            })
        }
    }
}

pub fn new_store(transport: &Arc<RecordingTransport>) -> Arc<RegistrationStore> {
    let transport: Arc<dyn ServiceTransport> = transport.clone();
    Arc::new(RegistrationStore::new(transport))
}

pub fn fast_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_millis(20),
        probe_attempts: 3,
        retry_delay: Duration::from_millis(5),
        max_unhealthy_cycles: 100,
    }
}

pub fn update_url(service_url: &str) -> String {
    format!("{service_url}/services")
}

pub fn heartbeat_url(service_url: &str) -> String {
    format!("{service_url}/heartbeat")
}

pub fn registration(name: &str, service_url: &str, requires: &[&str]) -> Registration {
    Registration {
        service_name: ServiceName::from(name),
        service_url: service_url.to_string(),
        required_services: requires.iter().copied().map(ServiceName::from).collect(),
        service_update_url: update_url(service_url),
        heartbeat_url: heartbeat_url(service_url),
    }
}

pub fn entry(name: &str, url: &str) -> PatchEntry {
    PatchEntry {
        name: ServiceName::from(name),
        url: url.to_string(),
    }
}
