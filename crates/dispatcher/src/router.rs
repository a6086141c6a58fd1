use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docgen_core::{DispatcherConfig, DocgenError, DocgenResult};
use docgen_domain::{
    CancellationFlag, DocgenEvent, HealthProbe, TaskContext, TaskOutcome, TaskRequest, TaskStatus,
};

use crate::batch::{self, BatchItem, BatchSummary};
use crate::health::{self, SystemHealth};
use crate::registry::CapabilityRegistry;

/// 任务路由器
///
/// 系统入口：按任务类型标签将请求派发到能力匹配的worker，批量
/// 任务拆分为有界并发的独立子任务并汇总部分失败。
pub struct TaskRouter {
    registry: Arc<CapabilityRegistry>,
    probes: Vec<Arc<dyn HealthProbe>>,
    concurrency_limit: usize,
    dispatch_timeout: Duration,
    /// 每个任务ID同一时刻只允许一个执行上下文
    in_flight: Mutex<HashSet<Uuid>>,
    event_tx: broadcast::Sender<DocgenEvent>,
}

impl TaskRouter {
    pub fn new(registry: Arc<CapabilityRegistry>, config: &DispatcherConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            registry,
            probes: Vec::new(),
            concurrency_limit: config.max_concurrent_tasks,
            dispatch_timeout: Duration::from_secs(config.dispatch_timeout_seconds),
            in_flight: Mutex::new(HashSet::new()),
            event_tx,
        }
    }

    /// 挂载参与健康聚合的组件探针（网关、知识库）
    pub fn add_probe(&mut self, probe: Arc<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DocgenEvent> {
        self.event_tx.subscribe()
    }

    /// 任务提交入口
    ///
    /// 单任务直接派发；批量任务类型拆分后有界并发执行，返回
    /// 携带成功率与逐项错误的汇总结果。
    pub async fn submit(&self, task: TaskRequest) -> DocgenResult<TaskOutcome> {
        self.validate(&task)?;
        if task.is_batch() {
            self.submit_batch(task, CancellationFlag::new()).await
        } else {
            self.dispatch_single(task, TaskContext::new()).await
        }
    }

    /// 带外部取消信号的批量提交
    ///
    /// 取消后每个进行中的子任务完成当前阶段后中止，产生部分结果；
    /// 已提交的知识库写入不回滚。
    pub async fn submit_batch(
        &self,
        task: TaskRequest,
        cancellation: CancellationFlag,
    ) -> DocgenResult<TaskOutcome> {
        self.validate(&task)?;
        let start = Instant::now();
        let batch_id = task.id;
        let task_type = task.task_type.clone();

        let sub_tasks = batch::expand(&task).await?;
        let total = sub_tasks.len();
        info!(
            "批量任务 {} 展开为 {} 个子任务 (并发上限 {})",
            batch_id, total, self.concurrency_limit
        );

        let ctx = TaskContext::with_cancellation(cancellation);
        let items: Vec<BatchItem> = stream::iter(sub_tasks.into_iter().enumerate())
            .map(|(index, sub)| {
                let ctx = ctx.clone();
                async move {
                    let label = batch::item_label(&sub);
                    let task_id = sub.id;
                    match self.dispatch_single(sub, ctx).await {
                        Ok(outcome) => BatchItem {
                            index,
                            task_id,
                            label,
                            status: outcome.status,
                            error: outcome.error_message.clone(),
                            output: outcome.output,
                        },
                        // 子任务失败绝不中止兄弟任务，错误就地归档
                        Err(err) => BatchItem {
                            index,
                            task_id,
                            label,
                            status: TaskStatus::Failed,
                            error: Some(err.to_string()),
                            output: serde_json::Value::Null,
                        },
                    }
                }
            })
            .buffer_unordered(self.concurrency_limit.max(1))
            .collect()
            .await;

        let summary = BatchSummary::new(batch_id, items);
        metrics::counter!("docgen_batch_completed_total").increment(1);
        let _ = self.event_tx.send(DocgenEvent::batch_completed(
            batch_id,
            task_type.as_str(),
            summary.total,
            summary.successes,
        ));
        info!(
            "批量任务 {} 完成: {}/{} 成功 (成功率 {:.2})",
            batch_id, summary.successes, summary.total, summary.success_rate
        );

        Ok(summary.into_outcome("task-router", start.elapsed().as_millis() as u64))
    }

    /// 单任务派发
    async fn dispatch_single(
        &self,
        task: TaskRequest,
        ctx: TaskContext,
    ) -> DocgenResult<TaskOutcome> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(task.id) {
                return Err(DocgenError::TaskExecution(format!(
                    "任务 {} 已存在执行上下文",
                    task.id
                )));
            }
        }

        let result = self.dispatch_inner(&task, &ctx).await;

        self.in_flight.lock().await.remove(&task.id);

        let status = match &result {
            Ok(outcome) => outcome.status,
            Err(_) => TaskStatus::Failed,
        };
        let _ = self.event_tx.send(DocgenEvent::task_completed(
            task.id,
            task.task_type.as_str(),
            status,
        ));

        result
    }

    async fn dispatch_inner(
        &self,
        task: &TaskRequest,
        ctx: &TaskContext,
    ) -> DocgenResult<TaskOutcome> {
        let start = Instant::now();
        let mut status = TaskStatus::Queued;

        let agent = self
            .registry
            .begin_dispatch(&task.task_type)
            .await
            .ok_or_else(|| DocgenError::UnroutableTask {
                task_type: task.task_type.clone(),
            })?;
        let agent_name = agent.name().to_string();

        status = Self::advance(status, TaskStatus::Running)?;
        debug!("任务 {} 进入 {:?}，worker {}", task.id, status, agent_name);
        metrics::counter!("docgen_dispatch_total").increment(1);

        let outcome = tokio::time::timeout(self.dispatch_timeout, agent.process(task, ctx)).await;

        self.registry.finish_dispatch(&agent_name).await;

        match outcome {
            Ok(Ok(outcome)) => {
                Self::advance(status, outcome.status)?;
                Ok(outcome)
            }
            // worker级失败归入该任务自身的结果
            Ok(Err(err)) => {
                Self::advance(status, TaskStatus::Failed)?;
                warn!("任务 {} 执行失败: {}", task.id, err);
                Ok(TaskOutcome::failed(
                    task.id,
                    agent_name,
                    err.to_string(),
                    start.elapsed().as_millis() as u64,
                ))
            }
            Err(_) => {
                Self::advance(status, TaskStatus::Failed)?;
                warn!("任务 {} 派发超时", task.id);
                Ok(TaskOutcome::failed(
                    task.id,
                    agent_name,
                    DocgenError::ExecutionTimeout.to_string(),
                    start.elapsed().as_millis() as u64,
                ))
            }
        }
    }

    /// 状态只允许单向推进
    fn advance(current: TaskStatus, next: TaskStatus) -> DocgenResult<TaskStatus> {
        if !current.can_transition_to(next) {
            return Err(DocgenError::Internal(format!(
                "非法的任务状态迁移: {current:?} -> {next:?}"
            )));
        }
        Ok(next)
    }

    fn validate(&self, task: &TaskRequest) -> DocgenResult<()> {
        if task.task_type.trim().is_empty() {
            return Err(DocgenError::ValidationError(
                "task_type 不能为空".to_string(),
            ));
        }
        Ok(())
    }

    /// 系统健康：worker、网关、知识库中的最差值
    pub async fn system_health(&self) -> SystemHealth {
        self.registry.refresh_health().await;
        health::aggregate(&self.registry, &self.probes).await
    }
}
