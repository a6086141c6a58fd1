use async_trait::async_trait;
use docgen_core::DocgenResult;

use crate::cancellation::CancellationFlag;
use crate::models::{AgentHealth, TaskOutcome, TaskRequest};

/// 任务执行上下文
///
/// 由路由层在派发时构造；批量子任务共享同一个取消信号。
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    pub cancellation: CancellationFlag,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancellation: CancellationFlag) -> Self {
        Self { cancellation }
    }
}

/// 统一的worker能力接口
///
/// 能力注册表只持有该接口，不感知具体worker类型；每个worker
/// 声明自己支持的任务类型标签并自行上报健康状态。
#[async_trait]
pub trait WorkerAgent: Send + Sync {
    fn name(&self) -> &str;

    /// 支持的任务类型标签集合
    fn capabilities(&self) -> Vec<String>;

    async fn process(&self, task: &TaskRequest, ctx: &TaskContext) -> DocgenResult<TaskOutcome>;

    async fn health(&self) -> AgentHealth;
}

/// 组件健康探针
///
/// 服务网关与知识库通过该接口参与系统健康聚合。
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> &str;

    async fn health(&self) -> AgentHealth;
}
