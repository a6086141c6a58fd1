use serde::{Deserialize, Serialize};

use super::analysis::{BlockKind, ContentFlags};

/// 占位符类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Text,
    Table,
    Image,
    /// 分页标记，渲染器据此复现分页
    PageBreak,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Text => "text",
            SlotKind::Table => "table",
            SlotKind::Image => "image",
            SlotKind::PageBreak => "page_break",
        }
    }
}

/// 占位符的可见性条件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityCondition {
    /// 仅当检测到logo区域时渲染
    LogoDetected,
    /// 仅当检测到表格时渲染
    TablesDetected,
    /// 仅多页文档渲染
    MultiPage,
}

/// 占位符样式规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleRule {
    /// 字号类别名（heading/body/caption）
    pub font_class: String,
    pub font_size_pt: Option<f32>,
    /// 占位符来源的版面区域
    pub region: BlockKind,
}

/// 模板占位符
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceholderSlot {
    /// 确定性标识符：相同的结构+设计输入产生相同的id序列
    pub id: String,
    pub kind: SlotKind,
    pub style: StyleRule,
    pub visibility: Option<VisibilityCondition>,
    /// 跨页重复元素（页眉/页脚）只出现一次，渲染时在每页重复
    pub repeat_on_every_page: bool,
}

/// 模板模式
///
/// 标识符为源文档内容哈希：字节相同的输入产生相同的模板。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePattern {
    pub pattern_id: String,
    pub name: String,
    pub slots: Vec<PlaceholderSlot>,
    /// 源分析结果的内容哈希
    pub source_hash: String,
    pub page_count: u32,
    pub flags: ContentFlags,
}

impl TemplatePattern {
    /// 统计实际内容占位符数量（不含分页标记）
    pub fn content_slot_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.kind != SlotKind::PageBreak)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_slot_count_excludes_page_breaks() {
        let slot = |id: &str, kind: SlotKind| PlaceholderSlot {
            id: id.to_string(),
            kind,
            style: StyleRule {
                font_class: "body".into(),
                font_size_pt: Some(12.0),
                region: BlockKind::Body,
            },
            visibility: None,
            repeat_on_every_page: false,
        };

        let pattern = TemplatePattern {
            pattern_id: "hash".into(),
            name: "t".into(),
            slots: vec![
                slot("s-000", SlotKind::Text),
                slot("s-001", SlotKind::PageBreak),
                slot("s-002", SlotKind::Table),
            ],
            source_hash: "hash".into(),
            page_count: 2,
            flags: ContentFlags::default(),
        };

        assert_eq!(pattern.content_slot_count(), 2);
    }
}
