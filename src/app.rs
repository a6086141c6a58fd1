use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use docgen_core::{AppConfig, CircuitBreakerConfig};
use docgen_dispatcher::{CapabilityRegistry, TaskRouter};
use docgen_domain::{task_types, TaskRequest};
use docgen_infrastructure::{
    ExtractedJsonParser, KnowledgeStore, ManifestRenderer, OpenAiCompatBackend, ProviderGateway,
};
use docgen_worker::{AnalysisPipeline, DocumentAnalysisAgent, GenerationAgent, KnowledgeAgent};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 分析单个文档
    Analyze,
    /// 从单个文档生成模板
    Template,
    /// 批量分析目录
    BatchAnalyze,
    /// 生成清算文档（payload为实体字段或entities数组）
    Generate,
    /// 输出系统健康状况
    Health,
}

impl AppMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "analyze" => Ok(AppMode::Analyze),
            "template" => Ok(AppMode::Template),
            "batch-analyze" => Ok(AppMode::BatchAnalyze),
            "generate" => Ok(AppMode::Generate),
            "health" => Ok(AppMode::Health),
            other => Err(anyhow::anyhow!("不支持的运行模式: {other}")),
        }
    }
}

/// 应用装配
///
/// 知识库在启动时全量加载并在关闭时强制刷盘；全部组件经由
/// 能力注册表与路由器连接。
pub struct Application {
    router: TaskRouter,
    store: Arc<KnowledgeStore>,
    flush_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        // 知识库
        let store = KnowledgeStore::open(config.knowledge.clone())
            .await
            .context("打开知识库失败")?;
        let flush_handle = store.spawn_flush_task();

        // 服务网关
        let mut gateway = ProviderGateway::new(&config.gateway);
        for provider in config.enabled_providers() {
            let backend =
                OpenAiCompatBackend::from_config(&provider).context("构建内容生成后端失败")?;
            gateway.register(
                Arc::new(backend),
                provider.priority,
                Duration::from_secs(provider.timeout_seconds),
                CircuitBreakerConfig {
                    failure_threshold: config.gateway.failure_threshold,
                    cooldown: Duration::from_secs(config.gateway.cooldown_seconds),
                    call_timeout: Duration::from_secs(provider.timeout_seconds),
                },
            );
        }
        let gateway = Arc::new(gateway);

        // worker注册
        let parser = Arc::new(ExtractedJsonParser::new());
        let renderer = Arc::new(ManifestRenderer::new(config.generation.output_folder.clone()));
        let registry = Arc::new(CapabilityRegistry::new());
        let max_concurrent = config.dispatcher.max_concurrent_tasks as i32;

        registry
            .register(
                Arc::new(DocumentAnalysisAgent::new(
                    AnalysisPipeline::new(parser, config.analysis.clone()),
                    store.clone(),
                )),
                max_concurrent,
            )
            .await;
        registry
            .register(Arc::new(KnowledgeAgent::new(store.clone())), max_concurrent)
            .await;
        registry
            .register(
                Arc::new(GenerationAgent::new(
                    store.clone(),
                    gateway.clone(),
                    renderer,
                    config.generation.clone(),
                )),
                max_concurrent,
            )
            .await;

        let mut router = TaskRouter::new(registry, &config.dispatcher);
        router.add_probe(gateway);
        router.add_probe(store.clone());

        info!("应用装配完成: {} 个内容生成服务", config.enabled_providers().len());

        Ok(Self {
            router,
            store,
            flush_handle,
        })
    }

    /// 执行请求并返回结构化结果
    pub async fn run(&self, mode: AppMode, payload: serde_json::Value) -> Result<serde_json::Value> {
        if mode == AppMode::Health {
            let health = self.router.system_health().await;
            return Ok(serde_json::to_value(health)?);
        }

        let task_type = match mode {
            AppMode::Analyze => task_types::ANALYZE_PDF_DOCUMENT,
            AppMode::Template => task_types::GENERATE_TEMPLATE_FROM_PDF,
            AppMode::BatchAnalyze => task_types::BATCH_ANALYZE_FOLDER,
            AppMode::Generate => {
                if payload.get("entities").is_some() {
                    task_types::PROCESS_MULTI_USER_DOCUMENTS
                } else {
                    task_types::GENERATE_LIQUIDATION_DOCUMENTS
                }
            }
            AppMode::Health => unreachable!(),
        };

        let outcome = self
            .router
            .submit(TaskRequest::new(task_type, payload))
            .await?;
        Ok(serde_json::to_value(outcome)?)
    }

    /// 优雅关闭：停止后台刷盘并强制落盘一次
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = &self.flush_handle {
            handle.abort();
        }
        self.store.flush().await.context("关闭时知识库刷盘失败")?;
        info!("知识库已刷盘，应用退出");
        Ok(())
    }
}
