use async_trait::async_trait;
use docgen_core::DocgenResult;
use serde::{Deserialize, Serialize};

use crate::models::Rect;

/// 解析引擎输出的文本片段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: Rect,
    pub font_size: f32,
}

/// 解析引擎输出的图像区域
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRegion {
    pub bbox: Rect,
}

/// 解析引擎输出的表单域
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub bbox: Rect,
}

/// 解析后的单页内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPage {
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    pub spans: Vec<TextSpan>,
    pub images: Vec<ImageRegion>,
    pub form_fields: Vec<FormField>,
}

/// 文档解析能力接口
///
/// 分析流水线不实现PDF字节解析，该能力由外部解析引擎的适配器
/// 提供：页数查询与带几何信息的逐页内容提取。单页解析失败只
/// 影响该页。
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// 文档总页数
    async fn page_count(&self, document: &[u8]) -> DocgenResult<u32>;

    /// 提取指定页的内容块（页码从1开始）
    async fn parse_page(&self, document: &[u8], page_number: u32) -> DocgenResult<ParsedPage>;
}
