use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use docgen_core::{DocgenError, DocgenResult};
use docgen_domain::{
    task_types, AgentHealth, KnowledgeQuery, TaskContext, TaskOutcome, TaskRequest,
    TemplatePattern, WorkerAgent,
};
use docgen_infrastructure::KnowledgeStore;

/// 知识库worker
///
/// 承接知识查询、知识写入与模式推荐任务。
pub struct KnowledgeAgent {
    store: Arc<KnowledgeStore>,
}

#[derive(Debug, Deserialize)]
struct GetKnowledgeParams {
    document_type: String,
    /// 特征名数组，或以特征名为键的上下文对象
    #[serde(default)]
    context: serde_json::Value,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AddKnowledgeParams {
    document_type: String,
    /// 来源文档的结构摘要，content_types/sections 并入合规标签
    #[serde(default)]
    structure: serde_json::Value,
    #[serde(default)]
    compliance_tags: Vec<String>,
    patterns: Vec<TemplatePattern>,
}

#[derive(Debug, Deserialize)]
struct SuggestionParams {
    document_type: String,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default = "default_complexity")]
    complexity: String,
}

fn default_complexity() -> String {
    "any".to_string()
}

impl KnowledgeAgent {
    pub const NAME: &'static str = "knowledge";

    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }

    fn parse_params<T: serde::de::DeserializeOwned>(task: &TaskRequest) -> DocgenResult<T> {
        serde_json::from_value(task.payload.clone())
            .map_err(|e| DocgenError::InvalidTaskParams(format!("解析任务参数失败: {e}")))
    }

    /// 上下文归一化：字符串数组按原样使用，对象取值为真的键
    fn context_filters(context: &serde_json::Value) -> Vec<String> {
        match context {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            serde_json::Value::Object(map) => map
                .iter()
                .filter(|(_, value)| match value {
                    serde_json::Value::Bool(b) => *b,
                    serde_json::Value::Null => false,
                    serde_json::Value::String(s) => !s.is_empty(),
                    serde_json::Value::Array(a) => !a.is_empty(),
                    _ => true,
                })
                .map(|(key, _)| key.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    async fn get_knowledge(&self, task: &TaskRequest) -> DocgenResult<TaskOutcome> {
        let start = Instant::now();
        let params: GetKnowledgeParams = Self::parse_params(task)?;

        let entries = self
            .store
            .query(&KnowledgeQuery {
                document_type: params.document_type,
                context_filters: Self::context_filters(&params.context),
                limit: params.limit,
            })
            .await;

        let total = entries.len();
        let output = serde_json::json!({
            "entries": entries,
            "total": total,
        });
        Ok(TaskOutcome::succeeded(
            task.id,
            Self::NAME,
            output,
            start.elapsed().as_millis() as u64,
        ))
    }

    async fn add_knowledge(&self, task: &TaskRequest) -> DocgenResult<TaskOutcome> {
        let start = Instant::now();
        let params: AddKnowledgeParams = Self::parse_params(task)?;

        if params.patterns.is_empty() {
            return Err(DocgenError::ValidationError(
                "patterns 不能为空".to_string(),
            ));
        }

        // 结构摘要中的内容类型与章节并入合规标签
        let mut tags = params.compliance_tags.clone();
        for key in ["content_types", "sections"] {
            if let Some(values) = params.structure.get(key).and_then(|v| v.as_array()) {
                for value in values {
                    if let Some(tag) = value.as_str() {
                        if !tags.contains(&tag.to_string()) {
                            tags.push(tag.to_string());
                        }
                    }
                }
            }
        }

        let mut versions = Vec::with_capacity(params.patterns.len());
        for pattern in params.patterns {
            let entry = self
                .store
                .upsert_with_retry(pattern, &params.document_type, tags.clone())
                .await?;
            versions.push(serde_json::json!({
                "pattern_id": entry.pattern_id,
                "version": entry.version,
            }));
        }

        let output = serde_json::json!({
            "acknowledged": true,
            "updated": versions,
        });
        Ok(TaskOutcome::succeeded(
            task.id,
            Self::NAME,
            output,
            start.elapsed().as_millis() as u64,
        ))
    }

    async fn pattern_suggestions(&self, task: &TaskRequest) -> DocgenResult<TaskOutcome> {
        let start = Instant::now();
        let params: SuggestionParams = Self::parse_params(task)?;

        let suggestions = self
            .store
            .suggestions(&params.document_type, &params.features, &params.complexity)
            .await;

        let total = suggestions.len();
        let output = serde_json::json!({
            "suggestions": suggestions,
            "total": total,
        });
        Ok(TaskOutcome::succeeded(
            task.id,
            Self::NAME,
            output,
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[async_trait]
impl WorkerAgent for KnowledgeAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            task_types::GET_DOCUMENT_KNOWLEDGE.to_string(),
            task_types::ADD_DOCUMENT_KNOWLEDGE.to_string(),
            task_types::GET_PATTERN_SUGGESTIONS.to_string(),
        ]
    }

    async fn process(&self, task: &TaskRequest, _ctx: &TaskContext) -> DocgenResult<TaskOutcome> {
        match task.task_type.as_str() {
            task_types::GET_DOCUMENT_KNOWLEDGE => self.get_knowledge(task).await,
            task_types::ADD_DOCUMENT_KNOWLEDGE => self.add_knowledge(task).await,
            task_types::GET_PATTERN_SUGGESTIONS => self.pattern_suggestions(task).await,
            other => Err(DocgenError::UnroutableTask {
                task_type: other.to_string(),
            }),
        }
    }

    async fn health(&self) -> AgentHealth {
        use docgen_domain::HealthProbe;
        self.store.health().await
    }
}
