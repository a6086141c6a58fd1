use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 批量任务取消信号
///
/// 取消后进行中的子任务允许完成当前阶段，后续阶段中止并返回
/// 带明确标记的部分结果；已提交的知识库写入不会回滚。
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
