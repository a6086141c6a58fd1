use std::collections::BTreeMap;

use docgen_domain::{
    BlockKind, DesignDescriptor, FontClass, Margins, MotifRegion, PageStructure,
};

/// 跨页重现检测的量化网格（pt）
const MOTIF_GRID_PT: f32 = 5.0;

/// 字号分类阈值，与模板合成阶段共用
pub(crate) fn font_class_name(size_pt: f32) -> &'static str {
    if size_pt >= 16.0 {
        "heading"
    } else if size_pt >= 12.0 {
        "body"
    } else {
        "caption"
    }
}

/// 阶段2：设计提取
///
/// 对阶段1的结构做频率分析：页边距、字号类别、跨页重复出现的
/// 视觉元素（页眉/页脚/logo区域）。重复元素只归档一次。
pub(crate) fn extract_design(pages: &[PageStructure]) -> DesignDescriptor {
    DesignDescriptor {
        margins: extract_margins(pages),
        font_classes: extract_font_classes(pages),
        motifs: extract_motifs(pages),
    }
}

/// 第一可用页的内容范围与页面尺寸之差即为边距
fn extract_margins(pages: &[PageStructure]) -> Option<Margins> {
    let page = pages.iter().find(|p| !p.blocks.is_empty())?;

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_r = f32::MIN;
    let mut max_b = f32::MIN;
    for block in &page.blocks {
        min_x = min_x.min(block.bbox.x);
        min_y = min_y.min(block.bbox.y);
        max_r = max_r.max(block.bbox.right());
        max_b = max_b.max(block.bbox.bottom());
    }

    Some(Margins {
        left: min_x.max(0.0),
        right: (page.width - max_r).max(0.0),
        top: min_y.max(0.0),
        bottom: (page.height - max_b).max(0.0),
    })
}

/// 按出现频率统计字号类别，字号降序排列保证输出确定
fn extract_font_classes(pages: &[PageStructure]) -> Vec<FontClass> {
    // 以0.5pt为粒度聚合字号
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for page in pages {
        for block in &page.blocks {
            if let Some(size) = block.font_size {
                *counts.entry((size * 2.0).round() as i64).or_default() += 1;
            }
        }
    }

    let mut classes: Vec<FontClass> = counts
        .into_iter()
        .map(|(half_pt, count)| {
            let size_pt = half_pt as f32 / 2.0;
            FontClass {
                name: font_class_name(size_pt).to_string(),
                size_pt,
                sample_count: count,
            }
        })
        .collect();

    classes.sort_by(|a, b| {
        b.size_pt
            .partial_cmp(&a.size_pt)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    classes
}

/// 在 ≥2 页上以相同量化包围盒出现的同类块视为重复元素
fn extract_motifs(pages: &[PageStructure]) -> Vec<MotifRegion> {
    if pages.len() < 2 {
        return Vec::new();
    }

    type MotifKey = (BlockKind, (i32, i32, i32, i32));
    let mut occurrences: BTreeMap<String, (MotifKey, Vec<u32>, docgen_domain::Rect)> =
        BTreeMap::new();

    for page in pages {
        for block in &page.blocks {
            // 表格内容逐页变化，不参与重复元素检测
            if block.kind == BlockKind::Table {
                continue;
            }
            let key: MotifKey = (block.kind, block.bbox.quantized(MOTIF_GRID_PT));
            let map_key = format!("{}:{:?}", block.kind.as_str(), key.1);
            let entry = occurrences
                .entry(map_key)
                .or_insert_with(|| (key, Vec::new(), block.bbox));
            if !entry.1.contains(&page.page_number) {
                entry.1.push(page.page_number);
            }
        }
    }

    occurrences
        .into_values()
        .filter(|(_, pages_seen, _)| pages_seen.len() >= 2)
        .map(|((kind, _), mut pages_seen, bbox)| {
            pages_seen.sort_unstable();
            MotifRegion {
                kind,
                bbox,
                pages: pages_seen,
            }
        })
        .collect()
}
