use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 系统支持的任务类型标签
pub mod task_types {
    pub const ANALYZE_PDF_DOCUMENT: &str = "analyze_pdf_document";
    pub const BATCH_ANALYZE_FOLDER: &str = "batch_analyze_folder";
    pub const GENERATE_TEMPLATE_FROM_PDF: &str = "generate_template_from_pdf";
    pub const GENERATE_TEMPLATES_FROM_PDFS: &str = "generate_templates_from_pdfs";
    pub const GET_DOCUMENT_KNOWLEDGE: &str = "get_document_knowledge";
    pub const ADD_DOCUMENT_KNOWLEDGE: &str = "add_document_knowledge";
    pub const GET_PATTERN_SUGGESTIONS: &str = "get_pattern_suggestions";
    pub const GENERATE_LIQUIDATION_DOCUMENTS: &str = "generate_liquidation_documents";
    pub const PROCESS_MULTI_USER_DOCUMENTS: &str = "process_multi_user_documents";

    /// 批量任务类型由路由层拆分为独立子任务执行
    pub const BATCH_TYPES: [&str; 3] = [
        BATCH_ANALYZE_FOLDER,
        GENERATE_TEMPLATES_FROM_PDFS,
        PROCESS_MULTI_USER_DOCUMENTS,
    ];

    pub fn is_batch(task_type: &str) -> bool {
        BATCH_TYPES.contains(&task_type)
    }
}

/// 任务优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TaskPriority {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "NORMAL")]
    #[default]
    Normal,
    #[serde(rename = "HIGH")]
    High,
}

/// 任务请求
///
/// payload 对路由层不透明，由目标worker解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub id: Uuid,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
}

impl TaskRequest {
    pub fn new(task_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            payload,
            priority: TaskPriority::Normal,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_batch(&self) -> bool {
        task_types::is_batch(&self.task_type)
    }
}

/// 任务状态
///
/// 状态只能单向推进，进入 Running 后不会回到 Queued。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "PARTIALLY_FAILED")]
    PartiallyFailed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::PartiallyFailed
        )
    }

    /// 检查状态迁移是否合法
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (*self, next),
            (TaskStatus::Queued, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Succeeded)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::PartiallyFailed)
        )
    }
}

/// 任务执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// worker产出的结构化结果
    pub output: serde_json::Value,
    pub error_message: Option<String>,
    /// 处理该任务的worker名称
    pub agent: String,
    pub execution_time_ms: u64,
}

impl TaskOutcome {
    pub fn succeeded(
        task_id: Uuid,
        agent: impl Into<String>,
        output: serde_json::Value,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Succeeded,
            output,
            error_message: None,
            agent: agent.into(),
            execution_time_ms,
        }
    }

    /// 部分失败：结果可用，但带有明确的降级标记
    pub fn partially_failed(
        task_id: Uuid,
        agent: impl Into<String>,
        output: serde_json::Value,
        error_message: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::PartiallyFailed,
            output,
            error_message: Some(error_message.into()),
            agent: agent.into(),
            execution_time_ms,
        }
    }

    pub fn failed(
        task_id: Uuid,
        agent: impl Into<String>,
        error_message: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Failed,
            output: serde_json::Value::Null,
            error_message: Some(error_message.into()),
            agent: agent.into(),
            execution_time_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Succeeded | TaskStatus::PartiallyFailed
        )
    }
}
