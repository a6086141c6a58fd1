use async_trait::async_trait;
use serde::Deserialize;

use docgen_core::{DocgenError, DocgenResult};
use docgen_domain::{DocumentParser, FormField, ImageRegion, ParsedPage, Rect, TextSpan};

/// 外部抽取引擎转储的解析适配器
///
/// 字节级PDF解析由外部抽取引擎完成，其产物是带几何信息的逐页
/// JSON转储（文本片段/图像区域/表单域）。该适配器消费转储并提供
/// DocumentParser 能力；单页条目损坏只影响对应页的解析结果。
pub struct ExtractedJsonParser;

impl ExtractedJsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractedJsonParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A4 默认页面尺寸（pt）
const DEFAULT_PAGE_WIDTH: f32 = 595.0;
const DEFAULT_PAGE_HEIGHT: f32 = 842.0;

#[derive(Deserialize)]
struct DumpDocument {
    pages: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct DumpPage {
    #[serde(default = "default_width")]
    width: f32,
    #[serde(default = "default_height")]
    height: f32,
    #[serde(default)]
    spans: Vec<DumpSpan>,
    #[serde(default)]
    images: Vec<DumpImage>,
    #[serde(default)]
    form_fields: Vec<DumpField>,
}

#[derive(Deserialize)]
struct DumpSpan {
    text: String,
    bbox: [f32; 4],
    #[serde(default = "default_font_size")]
    font_size: f32,
}

#[derive(Deserialize)]
struct DumpImage {
    bbox: [f32; 4],
}

#[derive(Deserialize)]
struct DumpField {
    name: String,
    bbox: [f32; 4],
}

fn default_width() -> f32 {
    DEFAULT_PAGE_WIDTH
}

fn default_height() -> f32 {
    DEFAULT_PAGE_HEIGHT
}

fn default_font_size() -> f32 {
    12.0
}

fn rect(bbox: [f32; 4]) -> Rect {
    Rect::new(bbox[0], bbox[1], bbox[2], bbox[3])
}

impl ExtractedJsonParser {
    fn parse_document(&self, document: &[u8]) -> DocgenResult<DumpDocument> {
        serde_json::from_slice(document)
            .map_err(|e| DocgenError::DocumentParse(format!("文档转储格式无效: {e}")))
    }
}

#[async_trait]
impl DocumentParser for ExtractedJsonParser {
    async fn page_count(&self, document: &[u8]) -> DocgenResult<u32> {
        let dump = self.parse_document(document)?;
        Ok(dump.pages.len() as u32)
    }

    async fn parse_page(&self, document: &[u8], page_number: u32) -> DocgenResult<ParsedPage> {
        let dump = self.parse_document(document)?;
        let index = page_number
            .checked_sub(1)
            .ok_or_else(|| DocgenError::DocumentParse("页码从1开始".to_string()))?
            as usize;

        let raw = dump.pages.get(index).ok_or_else(|| {
            DocgenError::DocumentParse(format!(
                "页码超出范围: {page_number}/{}",
                dump.pages.len()
            ))
        })?;

        // 逐页反序列化：某一页损坏不影响其它页
        let page: DumpPage = serde_json::from_value(raw.clone())
            .map_err(|e| DocgenError::DocumentParse(format!("第{page_number}页损坏: {e}")))?;

        Ok(ParsedPage {
            page_number,
            width: page.width,
            height: page.height,
            spans: page
                .spans
                .into_iter()
                .map(|s| TextSpan {
                    text: s.text,
                    bbox: rect(s.bbox),
                    font_size: s.font_size,
                })
                .collect(),
            images: page
                .images
                .into_iter()
                .map(|i| ImageRegion { bbox: rect(i.bbox) })
                .collect(),
            form_fields: page
                .form_fields
                .into_iter()
                .map(|f| FormField {
                    name: f.name,
                    bbox: rect(f.bbox),
                })
                .collect(),
        })
    }
}
