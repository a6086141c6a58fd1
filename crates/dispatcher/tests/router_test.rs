use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use docgen_core::{DispatcherConfig, DocgenError, DocgenResult};
use docgen_dispatcher::{CapabilityRegistry, TaskRouter};
use docgen_domain::{
    task_types, AgentHealth, CancellationFlag, DocgenEvent, HealthProbe, TaskContext, TaskOutcome,
    TaskRequest, TaskStatus, WorkerAgent,
};

/// 可配置行为的测试worker
struct StubWorker {
    name: String,
    capabilities: Vec<String>,
    health: AgentHealth,
    delay: Duration,
}

impl StubWorker {
    fn new(name: &str, capability: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            capabilities: vec![capability.to_string()],
            health: AgentHealth::Healthy,
            delay: Duration::ZERO,
        })
    }

    fn with_health(name: &str, capability: &str, health: AgentHealth) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            capabilities: vec![capability.to_string()],
            health,
            delay: Duration::ZERO,
        })
    }

    fn slow(name: &str, capability: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            capabilities: vec![capability.to_string()],
            health: AgentHealth::Healthy,
            delay,
        })
    }
}

#[async_trait]
impl WorkerAgent for StubWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn process(&self, task: &TaskRequest, ctx: &TaskContext) -> DocgenResult<TaskOutcome> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        // 实体校验：公司名为空视为非法输入
        if let Some(company) = task.payload.get("company_name").and_then(|v| v.as_str()) {
            if company.trim().is_empty() {
                return Err(DocgenError::ValidationError(
                    "company_name 不能为空".to_string(),
                ));
            }
        }

        if ctx.cancellation.is_cancelled() {
            return Ok(TaskOutcome::partially_failed(
                task.id,
                &self.name,
                json!({"stage": "structure"}),
                "后续阶段因取消中止",
                1,
            ));
        }

        Ok(TaskOutcome::succeeded(
            task.id,
            &self.name,
            json!({"handled_by": self.name}),
            1,
        ))
    }

    async fn health(&self) -> AgentHealth {
        self.health
    }
}

struct StubProbe {
    name: &'static str,
    health: AgentHealth,
}

#[async_trait]
impl HealthProbe for StubProbe {
    fn component(&self) -> &str {
        self.name
    }

    async fn health(&self) -> AgentHealth {
        self.health
    }
}

fn config(concurrency: usize) -> DispatcherConfig {
    DispatcherConfig {
        max_concurrent_tasks: concurrency,
        dispatch_timeout_seconds: 30,
    }
}

#[tokio::test]
async fn test_unroutable_task_type() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(StubWorker::new("analysis", task_types::ANALYZE_PDF_DOCUMENT), 4)
        .await;
    let router = TaskRouter::new(registry, &config(4));

    let err = router
        .submit(TaskRequest::new("unknown_task_type", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, DocgenError::UnroutableTask { task_type } if task_type == "unknown_task_type"));
}

#[tokio::test]
async fn test_healthy_agent_preferred_over_degraded() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(
            StubWorker::with_health("degraded-worker", task_types::ANALYZE_PDF_DOCUMENT, AgentHealth::Degraded),
            4,
        )
        .await;
    registry
        .register(
            StubWorker::new("healthy-worker", task_types::ANALYZE_PDF_DOCUMENT),
            4,
        )
        .await;
    // 描述符健康状态取自worker自报
    registry.refresh_health().await;
    let router = TaskRouter::new(registry, &config(4));

    for _ in 0..3 {
        let outcome = router
            .submit(TaskRequest::new(
                task_types::ANALYZE_PDF_DOCUMENT,
                json!({"file_path": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(outcome.agent, "healthy-worker");
    }
}

#[tokio::test]
async fn test_degraded_fallback_when_no_healthy_match() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(
            StubWorker::with_health("degraded-worker", task_types::ANALYZE_PDF_DOCUMENT, AgentHealth::Degraded),
            4,
        )
        .await;
    registry.refresh_health().await;
    let router = TaskRouter::new(registry, &config(4));

    let outcome = router
        .submit(TaskRequest::new(
            task_types::ANALYZE_PDF_DOCUMENT,
            json!({"file_path": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(outcome.agent, "degraded-worker");
}

#[tokio::test]
async fn test_load_spills_to_second_worker() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(
            StubWorker::slow("worker-a", task_types::ANALYZE_PDF_DOCUMENT, Duration::from_millis(100)),
            1,
        )
        .await;
    registry
        .register(
            StubWorker::slow("worker-b", task_types::ANALYZE_PDF_DOCUMENT, Duration::from_millis(100)),
            1,
        )
        .await;
    let router = Arc::new(TaskRouter::new(registry, &config(4)));

    let submit = |router: Arc<TaskRouter>| async move {
        router
            .submit(TaskRequest::new(
                task_types::ANALYZE_PDF_DOCUMENT,
                json!({"file_path": "x"}),
            ))
            .await
            .unwrap()
    };

    let (a, b) = tokio::join!(submit(router.clone()), submit(router.clone()));
    // worker-a 容量为1，第二个并发任务必须落到 worker-b
    assert_ne!(a.agent, b.agent);
}

#[tokio::test]
async fn test_batch_isolation_and_success_rate() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(
            StubWorker::new("generation", task_types::GENERATE_LIQUIDATION_DOCUMENTS),
            4,
        )
        .await;
    let router = TaskRouter::new(registry, &config(4));

    let entities: Vec<serde_json::Value> = (0..5)
        .map(|i| {
            if i == 2 {
                json!({"company_name": ""})
            } else {
                json!({"company_name": format!("Company {i} Pty Ltd")})
            }
        })
        .collect();

    let outcome = router
        .submit(TaskRequest::new(
            task_types::PROCESS_MULTI_USER_DOCUMENTS,
            json!({"entities": entities}),
        ))
        .await
        .unwrap();

    assert_eq!(outcome.status, TaskStatus::PartiallyFailed);
    let success_rate = outcome.output["success_rate"].as_f64().unwrap();
    assert!((success_rate - 0.8).abs() < f64::EPSILON);

    let items = outcome.output["items"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    // 下标2是校验失败，错误就地归档
    assert_eq!(items[2]["status"], json!("FAILED"));
    assert!(items[2]["error"]
        .as_str()
        .unwrap()
        .contains("校验失败"));
    // 兄弟任务不受影响
    for index in [0usize, 1, 3, 4] {
        assert_eq!(items[index]["status"], json!("SUCCEEDED"));
        assert_eq!(items[index]["output"]["handled_by"], json!("generation"));
    }
}

#[tokio::test]
async fn test_batch_emits_summary_event() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(
            StubWorker::new("generation", task_types::GENERATE_LIQUIDATION_DOCUMENTS),
            4,
        )
        .await;
    let router = TaskRouter::new(registry, &config(2));
    let mut events = router.subscribe_events();

    router
        .submit(TaskRequest::new(
            task_types::PROCESS_MULTI_USER_DOCUMENTS,
            json!({"entities": [
                {"company_name": "Alpha Pty Ltd"},
                {"company_name": "Beta Pty Ltd"},
            ]}),
        ))
        .await
        .unwrap();

    // 子任务完成事件之后是一条批量汇总事件
    let mut saw_batch_event = false;
    while let Ok(event) = events.try_recv() {
        if let DocgenEvent::BatchCompleted {
            total,
            successes,
            success_rate,
            ..
        } = event
        {
            assert_eq!(total, 2);
            assert_eq!(successes, 2);
            assert!((success_rate - 1.0).abs() < f64::EPSILON);
            saw_batch_event = true;
        }
    }
    assert!(saw_batch_event);
}

#[tokio::test]
async fn test_batch_cancellation_yields_partial_results() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(
            StubWorker::new("generation", task_types::GENERATE_LIQUIDATION_DOCUMENTS),
            4,
        )
        .await;
    let router = TaskRouter::new(registry, &config(2));

    let cancellation = CancellationFlag::new();
    cancellation.cancel();

    let outcome = router
        .submit_batch(
            TaskRequest::new(
                task_types::PROCESS_MULTI_USER_DOCUMENTS,
                json!({"entities": [{"company_name": "Alpha Pty Ltd"}]}),
            ),
            cancellation,
        )
        .await
        .unwrap();

    // 取消产生显式的部分结果而不是静默丢弃
    let items = outcome.output["items"].as_array().unwrap();
    assert_eq!(items[0]["status"], json!("PARTIALLY_FAILED"));
    assert_eq!(items[0]["output"]["stage"], json!("structure"));
    // 部分结果计入成功率
    let success_rate = outcome.output["success_rate"].as_f64().unwrap();
    assert!((success_rate - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_system_health_is_worst_of_components() {
    let registry = Arc::new(CapabilityRegistry::new());
    registry
        .register(StubWorker::new("analysis", task_types::ANALYZE_PDF_DOCUMENT), 4)
        .await;
    let mut router = TaskRouter::new(registry, &config(4));

    router.add_probe(Arc::new(StubProbe {
        name: "provider_gateway",
        health: AgentHealth::Healthy,
    }));
    router.add_probe(Arc::new(StubProbe {
        name: "knowledge_store",
        health: AgentHealth::Unavailable,
    }));

    let health = router.system_health().await;
    assert_eq!(health.overall, AgentHealth::Unavailable);
    assert_eq!(health.components.len(), 3);
}

#[tokio::test]
async fn test_empty_task_type_is_validation_error() {
    let registry = Arc::new(CapabilityRegistry::new());
    let router = TaskRouter::new(registry, &config(4));

    let err = router
        .submit(TaskRequest::new("  ", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, DocgenError::ValidationError(_)));
}
