/// 广播统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// 至少产生一次投递的成员变更事件数量
    pub events_broadcast: u64,
    /// 已派发的投递数量（包括首次同步）
    pub deliveries_dispatched: u64,
    /// 成功的投递数量
    pub deliveries_succeeded: u64,
    /// 失败的投递数量
    pub deliveries_failed: u64,
}

impl BroadcastStats {
    pub(super) fn record_outcome(&mut self, success: bool) {
        if success {
            self.deliveries_succeeded += 1;
        } else {
            self.deliveries_failed += 1;
        }
    }
}
