use serde::{Deserialize, Serialize};

/// 内容块类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Header,
    Body,
    Table,
    Image,
    Footer,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Header => "header",
            BlockKind::Body => "body",
            BlockKind::Table => "table",
            BlockKind::Image => "image",
            BlockKind::Footer => "footer",
        }
    }
}

/// 页面相对坐标的包围盒（单位：pt）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }

    /// 量化到网格坐标，用于跨页重现检测
    pub fn quantized(&self, grid: f32) -> (i32, i32, i32, i32) {
        (
            (self.x / grid).round() as i32,
            (self.y / grid).round() as i32,
            (self.width / grid).round() as i32,
            (self.height / grid).round() as i32,
        )
    }
}

/// 页面中的类型化内容块，按阅读顺序排列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageBlock {
    pub kind: BlockKind,
    pub bbox: Rect,
    pub text: Option<String>,
    pub font_size: Option<f32>,
    /// 表格行的单元格内容
    pub columns: Option<Vec<String>>,
}

/// 单页结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStructure {
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<PageBlock>,
}

/// 页边距（单位：pt）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Margins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// 字号类别（标题/正文/注释）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontClass {
    pub name: String,
    pub size_pt: f32,
    pub sample_count: usize,
}

/// 跨页重复出现的视觉元素区域
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotifRegion {
    pub kind: BlockKind,
    pub bbox: Rect,
    /// 出现该元素的页码
    pub pages: Vec<u32>,
}

/// 设计描述符：边距、字号类别、重复视觉元素
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DesignDescriptor {
    pub margins: Option<Margins>,
    pub font_classes: Vec<FontClass>,
    pub motifs: Vec<MotifRegion>,
}

/// 内容类型标志
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContentFlags {
    pub has_logo: bool,
    pub has_tables: bool,
    pub multipage: bool,
    pub has_forms: bool,
}

/// 文档分析结果
///
/// 按内容哈希寻址，创建后不可变。无法解析的页面记录在
/// degraded_pages 中而不是整体失败。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysisResult {
    /// 源文档内容哈希
    pub content_hash: String,
    pub pages: Vec<PageStructure>,
    pub design: DesignDescriptor,
    pub flags: ContentFlags,
    /// 无法解析、被跳过的页码
    pub degraded_pages: Vec<u32>,
    /// 取消信号导致后续阶段未执行时为 true
    pub truncated: bool,
}

impl DocumentAnalysisResult {
    /// 是否存在解析失败的页面
    pub fn is_partial(&self) -> bool {
        !self.degraded_pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_quantization_is_stable() {
        let a = Rect::new(50.2, 40.1, 120.0, 60.0);
        let b = Rect::new(50.4, 39.9, 119.8, 60.3);
        assert_eq!(a.quantized(5.0), b.quantized(5.0));

        let far = Rect::new(300.0, 40.0, 120.0, 60.0);
        assert_ne!(a.quantized(5.0), far.quantized(5.0));
    }

    #[test]
    fn test_partial_marker() {
        let result = DocumentAnalysisResult {
            content_hash: "abc".into(),
            pages: vec![],
            design: DesignDescriptor::default(),
            flags: ContentFlags::default(),
            degraded_pages: vec![3],
            truncated: false,
        };
        assert!(result.is_partial());
    }
}
