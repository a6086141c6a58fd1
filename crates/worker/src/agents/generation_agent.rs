use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use docgen_core::{DocgenError, DocgenResult, GenerationConfig};
use docgen_domain::{
    content_hash, task_types, AgentHealth, BlockKind, ContentFlags, DocumentRenderer,
    GenerationConstraints, GenerationRequest, KnowledgeEntry, KnowledgeQuery, PlaceholderSlot,
    SlotKind, StyleRule, TaskContext, TaskOutcome, TaskRequest, TemplatePattern, WorkerAgent,
};
use docgen_infrastructure::{KnowledgeStore, ProviderGateway};

/// 文档生成worker
///
/// 清算文档生成链路：实体字段校验 -> 知识库模式查询 -> 网关
/// 内容生成 -> 外部渲染。渲染产物引用随结果返回。
pub struct GenerationAgent {
    store: Arc<KnowledgeStore>,
    gateway: Arc<ProviderGateway>,
    renderer: Arc<dyn DocumentRenderer>,
    config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct EntityParams {
    company_name: String,
    #[serde(default)]
    abn: Option<String>,
    #[serde(default)]
    acn: Option<String>,
    #[serde(default)]
    document_type: Option<String>,
    #[serde(default)]
    company_logo: Option<String>,
    #[serde(default)]
    asset_schedule: Vec<serde_json::Value>,
    #[serde(default)]
    liability_schedule: Vec<serde_json::Value>,
}

impl GenerationAgent {
    pub const NAME: &'static str = "document-generation";

    pub fn new(
        store: Arc<KnowledgeStore>,
        gateway: Arc<ProviderGateway>,
        renderer: Arc<dyn DocumentRenderer>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            renderer,
            config,
        }
    }

    /// 实体字段校验：公司名必填，ACN 9位数字，ABN 11位数字
    fn validate_entity(params: &EntityParams) -> DocgenResult<()> {
        if params.company_name.trim().is_empty() {
            return Err(DocgenError::ValidationError(
                "company_name 不能为空".to_string(),
            ));
        }
        if let Some(acn) = &params.acn {
            let digits: String = acn.chars().filter(|c| !c.is_whitespace()).collect();
            if digits.len() != 9 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(DocgenError::ValidationError(format!(
                    "ACN 必须是9位数字: {acn}"
                )));
            }
        }
        if let Some(abn) = &params.abn {
            let digits: String = abn.chars().filter(|c| !c.is_whitespace()).collect();
            if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(DocgenError::ValidationError(format!(
                    "ABN 必须是11位数字: {abn}"
                )));
            }
        }
        Ok(())
    }

    /// 实体上下文派生的知识查询特征
    fn context_features(params: &EntityParams) -> Vec<String> {
        let mut features = Vec::new();
        if params.company_logo.is_some() {
            features.push("has_logo".to_string());
        }
        if !params.asset_schedule.is_empty() || !params.liability_schedule.is_empty() {
            features.push("has_tables".to_string());
        }
        features
    }

    fn build_request(
        &self,
        document_type: &str,
        payload: &serde_json::Value,
        knowledge: &[KnowledgeEntry],
    ) -> GenerationRequest {
        let system_message = format!(
            "You are a legal document specialist generating {document_type} documents. \
             Follow Australian legal standards and liquidation procedures. \
             Ensure compliance with regulatory requirements. \
             Use professional legal language and proper formatting."
        );

        let pattern_notes: Vec<String> = knowledge
            .iter()
            .map(|entry| {
                format!(
                    "- pattern {} ({}): {} slots, tags [{}]",
                    entry.pattern_id,
                    entry.document_type,
                    entry.pattern.content_slot_count(),
                    entry.compliance_tags.join(", ")
                )
            })
            .collect();

        let prompt = format!(
            "Generate a {document_type} document with the following context:\n{}\n\n\
             Applicable template patterns:\n{}\n\n\
             Requirements:\n\
             - Follow Australian legal standards\n\
             - Include all required legal clauses\n\
             - Use professional formatting\n\
             - Ensure regulatory compliance",
            serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string()),
            if pattern_notes.is_empty() {
                "- none recorded".to_string()
            } else {
                pattern_notes.join("\n")
            }
        );

        GenerationRequest::new(prompt)
            .with_system_message(system_message)
            .with_constraints(GenerationConstraints {
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            })
    }

    /// 知识库为空时的兜底模板：页眉 + 正文 + 签名区
    fn fallback_pattern(document_type: &str) -> TemplatePattern {
        let hash = content_hash(document_type.as_bytes());
        let slot = |index: usize, region: BlockKind, font_class: &str| PlaceholderSlot {
            id: format!("slot-{index:03}-{}", region.as_str()),
            kind: SlotKind::Text,
            style: StyleRule {
                font_class: font_class.to_string(),
                font_size_pt: None,
                region,
            },
            visibility: None,
            repeat_on_every_page: false,
        };
        TemplatePattern {
            pattern_id: hash.clone(),
            name: format!("{document_type}_default"),
            slots: vec![
                slot(0, BlockKind::Header, "heading"),
                slot(1, BlockKind::Body, "body"),
                slot(2, BlockKind::Footer, "caption"),
            ],
            source_hash: hash,
            page_count: 1,
            flags: ContentFlags::default(),
        }
    }

    async fn generate_documents(&self, task: &TaskRequest) -> DocgenResult<TaskOutcome> {
        let start = Instant::now();
        let params: EntityParams = serde_json::from_value(task.payload.clone())
            .map_err(|e| DocgenError::ValidationError(format!("实体字段格式错误: {e}")))?;

        Self::validate_entity(&params)?;

        let document_type = params
            .document_type
            .clone()
            .unwrap_or_else(|| self.config.default_document_type.clone());

        // 知识库模式查询
        let knowledge = self
            .store
            .query(&KnowledgeQuery {
                document_type: document_type.clone(),
                context_filters: Self::context_features(&params),
                limit: Some(3),
            })
            .await;
        debug!(
            "文档生成使用 {} 个知识模式 (类型 {})",
            knowledge.len(),
            document_type
        );

        // 网关内容生成
        let request = self.build_request(&document_type, &task.payload, &knowledge);
        let content = self.gateway.generate(&request).await?;

        // 渲染
        let pattern = knowledge
            .first()
            .map(|entry| entry.pattern.clone())
            .unwrap_or_else(|| Self::fallback_pattern(&document_type));

        let mut values = task.payload.clone();
        if let Some(map) = values.as_object_mut() {
            map.insert(
                "generated_content".to_string(),
                serde_json::Value::String(content.content.clone()),
            );
            map.insert(
                "document_type".to_string(),
                serde_json::Value::String(document_type.clone()),
            );
        }

        let rendered = self
            .renderer
            .render(&pattern, &values, &params.company_name)
            .await?;

        info!(
            "清算文档生成完成: {} (provider={}, pattern={})",
            params.company_name, content.provider, pattern.pattern_id
        );

        let output = serde_json::json!({
            "document": rendered,
            "provider": content.provider,
            "model": content.model,
            "usage": content.usage,
            "knowledge_patterns": knowledge.iter().map(|e| e.pattern_id.clone()).collect::<Vec<_>>(),
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
impl WorkerAgent for GenerationAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> Vec<String> {
        vec![task_types::GENERATE_LIQUIDATION_DOCUMENTS.to_string()]
    }

    async fn process(&self, task: &TaskRequest, _ctx: &TaskContext) -> DocgenResult<TaskOutcome> {
        match task.task_type.as_str() {
            task_types::GENERATE_LIQUIDATION_DOCUMENTS => self.generate_documents(task).await,
            other => Err(DocgenError::UnroutableTask {
                task_type: other.to_string(),
            }),
        }
    }

    async fn health(&self) -> AgentHealth {
        use docgen_domain::HealthProbe;
        // 网关全部熔断时生成worker降级
        match HealthProbe::health(self.gateway.as_ref()).await {
            AgentHealth::Unavailable => AgentHealth::Degraded,
            health => health,
        }
    }
}
