use std::sync::Arc;
use std::time::Duration;

use crate::services::registry::Registration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

// 心跳监控配置
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// 两轮探测之间的周期
    pub interval: Duration,
    /// 每轮对单个服务的最大探测次数
    pub probe_attempts: u32,
    /// 同一轮内两次探测之间的间隔
    pub retry_delay: Duration,
    /// 被摘除的服务连续这么多轮探测失败后不再跟踪
    pub max_unhealthy_cycles: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            probe_attempts: 3,
            retry_delay: Duration::from_secs(1),
            max_unhealthy_cycles: 100,
        }
    }
}

/// 被监控的注册信息及其健康状态
#[derive(Debug, Clone)]
pub(crate) struct TrackedRegistration {
    pub registration: Arc<Registration>,
    pub state: HealthState,
    // 连续以不健康状态结束的轮数
    pub failed_cycles: u32,
}

impl TrackedRegistration {
    pub fn healthy(registration: Arc<Registration>) -> Self {
        Self {
            registration,
            state: HealthState::Healthy,
            failed_cycles: 0,
        }
    }
}

/// 单个服务一轮探测的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeOutcome {
    Settled(HealthState),
    // 服务已被主动注销
    Deregistered,
}
