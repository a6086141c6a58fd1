use std::collections::HashSet;

use docgen_domain::{
    BlockKind, DocumentAnalysisResult, PlaceholderSlot, SlotKind, StyleRule, TemplatePattern,
    VisibilityCondition,
};

use super::design::font_class_name;

/// 与设计提取阶段一致的量化网格（pt）
const MOTIF_GRID_PT: f32 = 5.0;

/// 阶段3：模板合成
///
/// 将结构+设计确定性地映射为有序占位符列表：跨页重复元素在
/// 列表头部出现一次并带每页重复标志；其余块按页序与阅读顺序
/// 展开，页与页之间保留分页标记。相同的输入总是产生相同的
/// 占位符序列与标识符。
pub(crate) fn synthesize(analysis: &DocumentAnalysisResult, name: Option<&str>) -> TemplatePattern {
    let mut slots: Vec<PlaceholderSlot> = Vec::new();
    let mut counter: usize = 0;

    let motif_keys: HashSet<(BlockKind, (i32, i32, i32, i32))> = analysis
        .design
        .motifs
        .iter()
        .map(|m| (m.kind, m.bbox.quantized(MOTIF_GRID_PT)))
        .collect();

    // 重复元素归档一次，置于占位符列表头部
    for motif in &analysis.design.motifs {
        slots.push(make_slot(
            &mut counter,
            motif.kind,
            None,
            analysis,
            true,
        ));
    }

    // 逐页展开非重复块，页间插入分页标记
    let mut emitted_pages = 0usize;
    for page in &analysis.pages {
        if emitted_pages > 0 {
            let id = format!("slot-{counter:03}-page_break");
            counter += 1;
            slots.push(PlaceholderSlot {
                id,
                kind: SlotKind::PageBreak,
                style: StyleRule {
                    font_class: "body".to_string(),
                    font_size_pt: None,
                    region: BlockKind::Body,
                },
                visibility: None,
                repeat_on_every_page: false,
            });
        }
        emitted_pages += 1;

        for block in &page.blocks {
            if motif_keys.contains(&(block.kind, block.bbox.quantized(MOTIF_GRID_PT))) {
                continue;
            }
            slots.push(make_slot(
                &mut counter,
                block.kind,
                block.font_size,
                analysis,
                false,
            ));
        }
    }

    let default_name = format!("pattern_{}", &analysis.content_hash[..12.min(analysis.content_hash.len())]);

    TemplatePattern {
        pattern_id: analysis.content_hash.clone(),
        name: name.map(str::to_string).unwrap_or(default_name),
        slots,
        source_hash: analysis.content_hash.clone(),
        page_count: analysis.pages.len() as u32,
        flags: analysis.flags,
    }
}

fn make_slot(
    counter: &mut usize,
    region: BlockKind,
    font_size: Option<f32>,
    analysis: &DocumentAnalysisResult,
    repeat_on_every_page: bool,
) -> PlaceholderSlot {
    let kind = match region {
        BlockKind::Table => SlotKind::Table,
        BlockKind::Image => SlotKind::Image,
        _ => SlotKind::Text,
    };

    let visibility = match kind {
        SlotKind::Image if analysis.flags.has_logo => Some(VisibilityCondition::LogoDetected),
        SlotKind::Table => Some(VisibilityCondition::TablesDetected),
        _ => None,
    };

    let id = format!("slot-{:03}-{}", counter, region.as_str());
    *counter += 1;

    PlaceholderSlot {
        id,
        kind,
        style: StyleRule {
            font_class: font_size
                .map(font_class_name)
                .unwrap_or("body")
                .to_string(),
            font_size_pt: font_size,
            region,
        },
        visibility,
        repeat_on_every_page,
    }
}
