use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use super::types::{HealthState, HeartbeatConfig, ProbeOutcome, TrackedRegistration};
use crate::services::registry::{Registration, RegistrationStore, RegistryError};
use crate::services::transport::ServiceTransport;

/// 周期性探测已注册服务的心跳地址，根据结果摘除或恢复注册
#[derive(Debug)]
pub struct HeartbeatMonitor {
    store: Arc<RegistrationStore>,
    transport: Arc<dyn ServiceTransport>,
    config: HeartbeatConfig,
    // service_url -> 被监控的注册信息
    tracked: DashMap<String, TrackedRegistration>,
    started: AtomicBool,
}

impl HeartbeatMonitor {
    pub fn new(
        store: Arc<RegistrationStore>,
        transport: Arc<dyn ServiceTransport>,
        config: HeartbeatConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            tracked: DashMap::new(),
            started: AtomicBool::new(false),
        }
    }

    /// 启动后台探测循环，重复调用不会产生第二个循环。返回本次调用是否真正启动了循环。
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Heartbeat monitor already running");
            return false;
        }

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tracing::debug!("Executing heartbeat cycle...");
                monitor.run_cycle().await;
            }
        });

        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            probe_attempts = self.config.probe_attempts,
            max_unhealthy_cycles = self.config.max_unhealthy_cycles,
            "Heartbeat monitor started"
        );
        true
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// 执行一轮探测，等待本轮所有服务的探测结束
    pub async fn run_cycle(self: &Arc<Self>) {
        self.sync_with_store().await;

        let targets: Vec<TrackedRegistration> = self
            .tracked
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if targets.is_empty() {
            return;
        }

        let mut probes = JoinSet::new();
        for target in targets {
            let monitor = Arc::clone(self);
            probes.spawn(async move {
                let url = target.registration.service_url.clone();
                let outcome = monitor.probe_registration(target.registration, target.state).await;
                (url, outcome)
            });
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((url, ProbeOutcome::Settled(state))) => self.record_state(&url, state),
                Ok((url, ProbeOutcome::Deregistered)) => {
                    self.tracked.remove(&url);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Heartbeat probe task aborted");
                }
            }
        }
    }

    fn record_state(&self, service_url: &str, state: HealthState) {
        let Some(mut tracked) = self.tracked.get_mut(service_url) else {
            return;
        };
        tracked.state = state;
        if state == HealthState::Healthy {
            tracked.failed_cycles = 0;
            return;
        }

        tracked.failed_cycles += 1;
        if tracked.failed_cycles < self.config.max_unhealthy_cycles {
            return;
        }

        let failed_cycles = tracked.failed_cycles;
        drop(tracked);
        self.tracked.remove(service_url);
        tracing::warn!(
            service_url = %service_url,
            failed_cycles,
            "Service stayed unhealthy, no longer probing"
        );
    }

    /// 停止跟踪某个服务（主动注销时调用）
    pub fn forget(&self, service_url: &str) -> bool {
        self.tracked.remove(service_url).is_some()
    }

    fn is_tracked(&self, service_url: &str) -> bool {
        self.tracked.contains_key(service_url)
    }

    pub fn state_of(&self, service_url: &str) -> Option<HealthState> {
        self.tracked.get(service_url).map(|entry| entry.state)
    }

    // 注册表中的服务视为健康；已主动注销的健康服务不再跟踪，
    // 因探测失败被摘除的服务继续探测以便恢复
    async fn sync_with_store(&self) {
        let registered = self.store.snapshot().await;
        let live: HashSet<&str> = registered
            .iter()
            .map(|registration| registration.service_url.as_str())
            .collect();

        self.tracked.retain(|url, tracked| {
            tracked.state == HealthState::Unhealthy || live.contains(url.as_str())
        });

        for registration in &registered {
            if registration.heartbeat_url.is_empty() {
                self.tracked.remove(&registration.service_url);
                continue;
            }
            self.tracked.insert(
                registration.service_url.clone(),
                TrackedRegistration::healthy(registration.clone()),
            );
        }
    }

    async fn probe_registration(
        &self,
        registration: Arc<Registration>,
        initial: HealthState,
    ) -> ProbeOutcome {
        let mut state = initial;
        let attempts = self.config.probe_attempts.max(1);

        for attempt in 1..=attempts {
            match self.transport.probe(&registration.heartbeat_url).await {
                Ok(()) => {
                    tracing::debug!(
                        service_name = %registration.service_name,
                        service_url = %registration.service_url,
                        "Heartbeat check passed"
                    );
                    if state == HealthState::Unhealthy {
                        if !self.is_tracked(&registration.service_url) {
                            tracing::debug!(
                                service_url = %registration.service_url,
                                "Service deregistered while unhealthy, not re-adding"
                            );
                            return ProbeOutcome::Deregistered;
                        }

                        tracing::info!(
                            service_name = %registration.service_name,
                            service_url = %registration.service_url,
                            "Service recovered, re-adding registration"
                        );
                        if let Err(e) = self.store.add(registration.clone()).await {
                            tracing::warn!(
                                service_url = %registration.service_url,
                                error = %e,
                                "Re-adding recovered service reported an error"
                            );
                        }

                        // 重新加入期间收到了主动注销
                        if !self.is_tracked(&registration.service_url) {
                            if let Err(e) = self.store.remove(&registration.service_url).await {
                                tracing::debug!(
                                    service_url = %registration.service_url,
                                    error = %e,
                                    "Deregistered service already removed"
                                );
                            }
                            return ProbeOutcome::Deregistered;
                        }
                        state = HealthState::Healthy;
                    }
                    return ProbeOutcome::Settled(state);
                }
                Err(e) => {
                    tracing::warn!(
                        service_name = %registration.service_name,
                        service_url = %registration.service_url,
                        attempt,
                        error = %e,
                        "Heartbeat check failed"
                    );
                    if state == HealthState::Healthy {
                        state = HealthState::Unhealthy;
                        match self.store.remove(&registration.service_url).await {
                            Ok(_) => {
                                tracing::warn!(
                                    service_name = %registration.service_name,
                                    service_url = %registration.service_url,
                                    "Service marked unhealthy, removed from registry"
                                );
                            }
                            Err(RegistryError::NotFound { .. }) => {
                                tracing::debug!(
                                    service_url = %registration.service_url,
                                    "Service already deregistered, no longer tracking"
                                );
                                return ProbeOutcome::Deregistered;
                            }
                            Err(e) => {
                                tracing::warn!(
                                    service_url = %registration.service_url,
                                    error = %e,
                                    "Failed to remove unhealthy service"
                                );
                            }
                        }
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        ProbeOutcome::Settled(state)
    }
}
