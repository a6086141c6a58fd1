use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 重试退避策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// 基础重试间隔（毫秒）
    pub base_interval_ms: u64,
    /// 最大重试间隔（毫秒）
    pub max_interval_ms: u64,
    /// 指数退避倍数
    pub backoff_multiplier: f64,
    /// 重试间隔的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_interval_ms: 200,
            max_interval_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffPolicy {
    /// 计算第 attempt 次重试前的等待时间（attempt 从 0 开始）
    ///
    /// 指数退避并限制最大间隔，附加随机抖动以避免雷群效应。
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_interval_ms as f64;
        let exponential = base * self.backoff_multiplier.powi(attempt as i32);
        let capped = exponential.min(self.max_interval_ms as f64);

        let jitter = capped * self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        let final_ms = (capped + jitter).max(base);

        Duration::from_millis(final_ms as u64)
    }
}
