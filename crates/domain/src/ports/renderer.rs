use async_trait::async_trait;
use docgen_core::DocgenResult;
use serde::{Deserialize, Serialize};

use crate::models::TemplatePattern;

/// 渲染产物引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDocumentRef {
    pub path: String,
    pub pattern_id: String,
    pub size_bytes: u64,
}

/// 文档渲染能力接口
///
/// 字节级渲染由外部引擎完成：输入模板模式与字段值，返回
/// 渲染产物引用。
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        pattern: &TemplatePattern,
        values: &serde_json::Value,
        output_name: &str,
    ) -> DocgenResult<RenderedDocumentRef>;
}
