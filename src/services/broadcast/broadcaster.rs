use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::types::BroadcastStats;
use crate::services::registry::{DeliveryError, Patch, Registration};
use crate::services::transport::ServiceTransport;

/// 将成员变更按依赖关系裁剪后投递给各个依赖方
#[derive(Debug, Clone)]
pub struct PatchBroadcaster {
    transport: Arc<dyn ServiceTransport>,
    /// 每个广播事件的监督任务
    task_tracker: TaskTracker,
    stats: Arc<Mutex<BroadcastStats>>,
}

impl PatchBroadcaster {
    pub fn new(transport: Arc<dyn ServiceTransport>) -> Self {
        Self {
            transport,
            task_tracker: TaskTracker::new(),
            stats: Arc::new(Mutex::new(BroadcastStats::default())),
        }
    }

    /// 把一次成员变更事件广播给 `recipients` 中关心它的服务，返回派发的投递数量。
    ///
    /// 调用方需要在释放注册表锁之后调用；投递在独立任务中进行，不阻塞调用方。
    pub fn notify(&self, event: &Patch, recipients: &[Arc<Registration>]) -> usize {
        let event_id = Uuid::new_v4();
        let mut deliveries = JoinSet::new();

        for recipient in recipients {
            let scoped = event.scoped_to(&recipient.required_services);
            if scoped.is_empty() {
                continue;
            }

            let transport = self.transport.clone();
            let update_url = recipient.service_update_url.clone();
            let service_name = recipient.service_name.clone();
            deliveries.spawn(async move {
                let result = transport.send_patch(&update_url, &scoped).await;
                (service_name, update_url, result)
            });
        }

        let dispatched = deliveries.len();
        if dispatched == 0 {
            tracing::debug!(event_id = %event_id, "No dependents interested in membership change");
            return 0;
        }

        if let Ok(mut stats) = self.stats.lock() {
            stats.events_broadcast += 1;
            stats.deliveries_dispatched += dispatched as u64;
        }

        tracing::debug!(
            event_id = %event_id,
            recipients = dispatched,
            "Broadcasting membership change"
        );

        let stats = self.stats.clone();
        self.task_tracker.spawn(async move {
            while let Some(joined) = deliveries.join_next().await {
                let success = match joined {
                    Ok((service_name, update_url, Ok(()))) => {
                        tracing::debug!(
                            event_id = %event_id,
                            service_name = %service_name,
                            update_url = %update_url,
                            "Delivered patch"
                        );
                        true
                    }
                    Ok((service_name, update_url, Err(e))) => {
                        tracing::warn!(
                            event_id = %event_id,
                            service_name = %service_name,
                            update_url = %update_url,
                            error = %e,
                            "Failed to deliver patch"
                        );
                        false
                    }
                    Err(e) => {
                        tracing::error!(
                            event_id = %event_id,
                            error = %e,
                            "Patch delivery task aborted"
                        );
                        false
                    }
                };

                if let Ok(mut stats) = stats.lock() {
                    stats.record_outcome(success);
                }
            }
        });

        dispatched
    }

    /// 直接向单个服务投递补丁并等待结果（注册时的首次同步）
    pub async fn deliver(&self, update_url: &str, patch: &Patch) -> Result<(), DeliveryError> {
        if let Ok(mut stats) = self.stats.lock() {
            stats.deliveries_dispatched += 1;
        }

        let result = self.transport.send_patch(update_url, patch).await;

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_outcome(result.is_ok());
        }
        result
    }

    /// 等待所有已派发的投递完成
    pub async fn flush(&self) {
        self.task_tracker.close();
        self.task_tracker.wait().await;
        self.task_tracker.reopen();
    }

    pub fn stats(&self) -> BroadcastStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}
