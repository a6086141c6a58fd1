//! 领域事件
//!
//! 领域事件定义，用于系统间解耦

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TaskStatus;

/// 领域事件基础trait
pub trait DomainEvent: Send + Sync {
    fn event_id(&self) -> Uuid;
    fn event_type(&self) -> &str;
    fn occurred_at(&self) -> DateTime<Utc>;
    fn aggregate_id(&self) -> String;
}

/// 任务与知识库相关事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocgenEvent {
    TaskCompleted {
        id: Uuid,
        task_id: Uuid,
        task_type: String,
        status: TaskStatus,
        occurred_at: DateTime<Utc>,
    },
    /// 批量任务汇总事件，批次完成时发出一次
    BatchCompleted {
        id: Uuid,
        batch_id: Uuid,
        task_type: String,
        total: usize,
        successes: usize,
        success_rate: f64,
        occurred_at: DateTime<Utc>,
    },
}

impl DocgenEvent {
    pub fn task_completed(task_id: Uuid, task_type: impl Into<String>, status: TaskStatus) -> Self {
        DocgenEvent::TaskCompleted {
            id: Uuid::new_v4(),
            task_id,
            task_type: task_type.into(),
            status,
            occurred_at: Utc::now(),
        }
    }

    pub fn batch_completed(
        batch_id: Uuid,
        task_type: impl Into<String>,
        total: usize,
        successes: usize,
    ) -> Self {
        let success_rate = if total == 0 {
            1.0
        } else {
            successes as f64 / total as f64
        };
        DocgenEvent::BatchCompleted {
            id: Uuid::new_v4(),
            batch_id,
            task_type: task_type.into(),
            total,
            successes,
            success_rate,
            occurred_at: Utc::now(),
        }
    }

}

impl DomainEvent for DocgenEvent {
    fn event_id(&self) -> Uuid {
        match self {
            DocgenEvent::TaskCompleted { id, .. } => *id,
            DocgenEvent::BatchCompleted { id, .. } => *id,
        }
    }

    fn event_type(&self) -> &str {
        match self {
            DocgenEvent::TaskCompleted { .. } => "TaskCompleted",
            DocgenEvent::BatchCompleted { .. } => "BatchCompleted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocgenEvent::TaskCompleted { occurred_at, .. } => *occurred_at,
            DocgenEvent::BatchCompleted { occurred_at, .. } => *occurred_at,
        }
    }

    fn aggregate_id(&self) -> String {
        match self {
            DocgenEvent::TaskCompleted { task_id, .. } => task_id.to_string(),
            DocgenEvent::BatchCompleted { batch_id, .. } => batch_id.to_string(),
        }
    }
}
