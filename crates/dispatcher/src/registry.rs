use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use docgen_core::{DocgenError, DocgenResult};
use docgen_domain::{AgentDescriptor, AgentHealth, WorkerAgent};

/// 注册表内单个worker条目
///
/// 描述符由条目自身的锁保护：负载与健康更新按worker粒度串行，
/// 不经过全局锁。
struct AgentEntry {
    agent: Arc<dyn WorkerAgent>,
    descriptor: RwLock<AgentDescriptor>,
}

/// 能力注册表
///
/// 只持有统一的worker能力接口，按任务类型标签匹配派发目标。
pub struct CapabilityRegistry {
    agents: RwLock<HashMap<String, Arc<AgentEntry>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// 注册worker，能力集合取自worker自身声明
    pub async fn register(&self, agent: Arc<dyn WorkerAgent>, max_concurrent_tasks: i32) {
        let descriptor = AgentDescriptor::new(
            agent.name(),
            agent.capabilities(),
            max_concurrent_tasks,
        );
        info!(
            "注册worker: {} 能力 {:?}",
            descriptor.name, descriptor.supported_task_types
        );
        self.agents.write().await.insert(
            descriptor.name.clone(),
            Arc::new(AgentEntry {
                agent,
                descriptor: RwLock::new(descriptor),
            }),
        );
    }

    /// 健康上报（worker自身或路由层回写）
    pub async fn report_health(&self, name: &str, health: AgentHealth) -> DocgenResult<()> {
        let agents = self.agents.read().await;
        let entry = agents
            .get(name)
            .ok_or_else(|| DocgenError::Internal(format!("未注册的worker: {name}")))?;
        entry.descriptor.write().await.update_health(health);
        Ok(())
    }

    /// 主动刷新全部worker的自报健康状态
    pub async fn refresh_health(&self) {
        let entries: Vec<Arc<AgentEntry>> =
            self.agents.read().await.values().cloned().collect();
        for entry in entries {
            let health = entry.agent.health().await;
            entry.descriptor.write().await.update_health(health);
        }
    }

    /// 调度选择并占用负载名额
    ///
    /// 匹配策略：healthy中负载最低者优先，无healthy匹配时回退
    /// degraded；unavailable不参与。成功时该worker的负载计数已
    /// 加一，调用方必须配对调用 finish_dispatch。
    pub async fn begin_dispatch(&self, task_type: &str) -> Option<Arc<dyn WorkerAgent>> {
        let agents = self.agents.read().await;

        // 候选按(健康等级, 负载)排序后逐个尝试占用
        let mut candidates: Vec<(AgentHealth, f64, Arc<AgentEntry>)> = Vec::new();
        for entry in agents.values() {
            let descriptor = entry.descriptor.read().await;
            if !descriptor.can_accept_task(task_type) {
                continue;
            }
            candidates.push((
                descriptor.health,
                descriptor.load_percentage(),
                Arc::clone(entry),
            ));
        }
        candidates.sort_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| {
                a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        for (_, _, entry) in candidates {
            let mut descriptor = entry.descriptor.write().await;
            // 写锁下复核，避免并发派发超过容量
            if !descriptor.can_accept_task(task_type) {
                continue;
            }
            descriptor.current_load += 1;
            debug!(
                "派发目标: {} (负载 {}/{})",
                descriptor.name, descriptor.current_load, descriptor.max_concurrent_tasks
            );
            return Some(Arc::clone(&entry.agent));
        }
        None
    }

    /// 归还负载名额
    pub async fn finish_dispatch(&self, name: &str) {
        if let Some(entry) = self.agents.read().await.get(name) {
            let mut descriptor = entry.descriptor.write().await;
            descriptor.current_load = (descriptor.current_load - 1).max(0);
        }
    }

    /// 全部worker描述快照，按名称排序
    pub async fn snapshot(&self) -> Vec<AgentDescriptor> {
        let agents = self.agents.read().await;
        let mut out = Vec::with_capacity(agents.len());
        for entry in agents.values() {
            out.push(entry.descriptor.read().await.clone());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
