use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use docgen_core::{DocgenError, DocgenResult};
use docgen_domain::{
    task_types, AgentHealth, TaskContext, TaskOutcome, TaskRequest, WorkerAgent,
};
use docgen_infrastructure::KnowledgeStore;

use crate::analysis::AnalysisPipeline;

/// 文档分析worker
///
/// 承接单文档分析与模板生成任务；模板生成在分析+合成之后将
/// 模板写入知识库（带冲突重试）。
pub struct DocumentAnalysisAgent {
    pipeline: AnalysisPipeline,
    store: Arc<KnowledgeStore>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeParams {
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct TemplateParams {
    file_path: String,
    #[serde(default)]
    template_name: Option<String>,
    #[serde(default)]
    document_type: Option<String>,
}

impl DocumentAnalysisAgent {
    pub const NAME: &'static str = "document-analysis";

    pub fn new(pipeline: AnalysisPipeline, store: Arc<KnowledgeStore>) -> Self {
        Self { pipeline, store }
    }

    fn parse_params<T: serde::de::DeserializeOwned>(task: &TaskRequest) -> DocgenResult<T> {
        serde_json::from_value(task.payload.clone())
            .map_err(|e| DocgenError::InvalidTaskParams(format!("解析任务参数失败: {e}")))
    }

    async fn read_document(path: &str) -> DocgenResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| DocgenError::TaskExecution(format!("读取文档 {path} 失败: {e}")))
    }

    async fn analyze_document(
        &self,
        task: &TaskRequest,
        ctx: &TaskContext,
    ) -> DocgenResult<TaskOutcome> {
        let start = Instant::now();
        let params: AnalyzeParams = Self::parse_params(task)?;
        let bytes = Self::read_document(&params.file_path).await?;

        let analysis = self.pipeline.analyze(&bytes, &ctx.cancellation).await?;
        let degraded = analysis.degraded_pages.clone();
        let output = serde_json::to_value(&analysis)?;
        let elapsed = start.elapsed().as_millis() as u64;

        if degraded.is_empty() && !analysis.truncated {
            Ok(TaskOutcome::succeeded(task.id, Self::NAME, output, elapsed))
        } else {
            let reason = if analysis.truncated {
                "分析因取消信号提前结束".to_string()
            } else {
                DocgenError::PartialAnalysisFailure {
                    document: params.file_path.clone(),
                    pages: degraded,
                }
                .to_string()
            };
            Ok(TaskOutcome::partially_failed(
                task.id,
                Self::NAME,
                output,
                reason,
                elapsed,
            ))
        }
    }

    async fn generate_template(
        &self,
        task: &TaskRequest,
        ctx: &TaskContext,
    ) -> DocgenResult<TaskOutcome> {
        let start = Instant::now();
        let params: TemplateParams = Self::parse_params(task)?;
        let bytes = Self::read_document(&params.file_path).await?;

        let analysis = self.pipeline.analyze(&bytes, &ctx.cancellation).await?;

        // 取消时不合成模板，返回已完成阶段的部分结果
        if analysis.truncated {
            let output = serde_json::to_value(&analysis)?;
            return Ok(TaskOutcome::partially_failed(
                task.id,
                Self::NAME,
                output,
                "模板合成因取消信号中止",
                start.elapsed().as_millis() as u64,
            ));
        }

        let file_stem = Path::new(&params.file_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let template_name = params
            .template_name
            .clone()
            .unwrap_or_else(|| format!("{file_stem}_template"));
        let document_type = params.document_type.clone().unwrap_or(file_stem);

        let pattern = self
            .pipeline
            .synthesize_template(&analysis, Some(&template_name));

        let entry = self
            .store
            .upsert_with_retry(pattern.clone(), &document_type, Vec::new())
            .await?;

        info!(
            "模板生成完成: {} -> 知识库 v{}",
            template_name, entry.version
        );

        let degraded = analysis.degraded_pages.clone();
        let output = serde_json::json!({
            "pattern": pattern,
            "template_name": template_name,
            "document_type": document_type,
            "knowledge_version": entry.version,
            "degraded_pages": degraded,
        });
        let elapsed = start.elapsed().as_millis() as u64;

        if degraded.is_empty() {
            Ok(TaskOutcome::succeeded(task.id, Self::NAME, output, elapsed))
        } else {
            let reason = DocgenError::PartialAnalysisFailure {
                document: params.file_path.clone(),
                pages: degraded,
            }
            .to_string();
            Ok(TaskOutcome::partially_failed(
                task.id,
                Self::NAME,
                output,
                reason,
                elapsed,
            ))
        }
    }
}

#[async_trait]
impl WorkerAgent for DocumentAnalysisAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            task_types::ANALYZE_PDF_DOCUMENT.to_string(),
            task_types::GENERATE_TEMPLATE_FROM_PDF.to_string(),
        ]
    }

    async fn process(&self, task: &TaskRequest, ctx: &TaskContext) -> DocgenResult<TaskOutcome> {
        match task.task_type.as_str() {
            task_types::ANALYZE_PDF_DOCUMENT => self.analyze_document(task, ctx).await,
            task_types::GENERATE_TEMPLATE_FROM_PDF => self.generate_template(task, ctx).await,
            other => Err(DocgenError::UnroutableTask {
                task_type: other.to_string(),
            }),
        }
    }

    async fn health(&self) -> AgentHealth {
        AgentHealth::Healthy
    }
}
