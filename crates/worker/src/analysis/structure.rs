use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use docgen_core::{AnalysisConfig, DocgenResult};
use docgen_domain::{BlockKind, DocumentParser, PageBlock, PageStructure, ParsedPage, Rect, TextSpan};

/// 阶段1产出：类型化的页面结构与降级页记录
pub(crate) struct StructureOutcome {
    pub pages: Vec<PageStructure>,
    pub degraded_pages: Vec<u32>,
    pub total_pages: u32,
    pub has_forms: bool,
}

/// 阶段1：结构提取
///
/// 逐页将解析引擎的原始片段分类为带几何信息的类型化块。
/// 单页解析失败记为降级页并跳过，流水线继续处理其余页面。
pub(crate) async fn extract_structure(
    parser: &dyn DocumentParser,
    document: &[u8],
    config: &AnalysisConfig,
) -> DocgenResult<StructureOutcome> {
    let total_pages = parser.page_count(document).await?;

    let mut pages = Vec::new();
    let mut degraded_pages = Vec::new();
    let mut has_forms = false;

    for page_number in 1..=total_pages {
        match parser.parse_page(document, page_number).await {
            Ok(parsed) => {
                has_forms = has_forms || !parsed.form_fields.is_empty();
                pages.push(classify_page(parsed, config));
            }
            Err(e) => {
                warn!("第{page_number}页解析失败，跳过: {e}");
                degraded_pages.push(page_number);
            }
        }
    }

    debug!(
        "结构提取完成: {}/{} 页可用",
        pages.len(),
        total_pages
    );

    Ok(StructureOutcome {
        pages,
        degraded_pages,
        total_pages,
        has_forms,
    })
}

/// 将单页原始片段分类为阅读顺序排列的类型化块
fn classify_page(parsed: ParsedPage, config: &AnalysisConfig) -> PageStructure {
    let header_limit = parsed.height * config.header_zone_ratio;
    let footer_start = parsed.height * config.footer_zone_ratio;

    let (table_blocks, consumed) = detect_table_rows(&parsed.spans, config);

    let mut blocks: Vec<PageBlock> = Vec::new();

    for (index, span) in parsed.spans.iter().enumerate() {
        if consumed.contains(&index) {
            continue;
        }
        let kind = if span.bbox.y < header_limit {
            BlockKind::Header
        } else if span.bbox.y > footer_start {
            BlockKind::Footer
        } else {
            BlockKind::Body
        };
        blocks.push(PageBlock {
            kind,
            bbox: span.bbox,
            text: Some(span.text.clone()),
            font_size: Some(span.font_size),
            columns: None,
        });
    }

    blocks.extend(table_blocks);

    for image in &parsed.images {
        blocks.push(PageBlock {
            kind: BlockKind::Image,
            bbox: image.bbox,
            text: None,
            font_size: None,
            columns: None,
        });
    }

    // 阅读顺序：先上后下，同行先左后右
    blocks.sort_by(|a, b| {
        let ya = (a.bbox.y / 5.0).round() as i32;
        let yb = (b.bbox.y / 5.0).round() as i32;
        ya.cmp(&yb).then_with(|| {
            a.bbox
                .x
                .partial_cmp(&b.bbox.x)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    PageStructure {
        page_number: parsed.page_number,
        width: parsed.width,
        height: parsed.height,
        blocks,
    }
}

/// 表格行检测：同一水平带上 ≥N 个等间距对齐的片段视为一行表格
fn detect_table_rows(
    spans: &[TextSpan],
    config: &AnalysisConfig,
) -> (Vec<PageBlock>, HashSet<usize>) {
    let mut rows: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (index, span) in spans.iter().enumerate() {
        let band = (span.bbox.y / 5.0) as i32;
        rows.entry(band).or_default().push(index);
    }

    let mut blocks = Vec::new();
    let mut consumed = HashSet::new();

    for indices in rows.values() {
        if indices.len() < config.table_min_columns {
            continue;
        }
        let mut sorted = indices.clone();
        sorted.sort_by(|a, b| {
            spans[*a]
                .bbox
                .x
                .partial_cmp(&spans[*b].bbox.x)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let positions: Vec<f32> = sorted.iter().map(|i| spans[*i].bbox.x).collect();
        if !has_regular_spacing(&positions, config.table_spacing_tolerance_pt) {
            continue;
        }

        let cells: Vec<String> = sorted.iter().map(|i| spans[*i].text.clone()).collect();
        let bbox = union_bbox(sorted.iter().map(|i| spans[*i].bbox));
        blocks.push(PageBlock {
            kind: BlockKind::Table,
            bbox,
            text: None,
            font_size: None,
            columns: Some(cells),
        });
        consumed.extend(sorted);
    }

    (blocks, consumed)
}

/// 检查位置序列是否等间距（允许容差）
fn has_regular_spacing(positions: &[f32], tolerance: f32) -> bool {
    if positions.len() < 3 {
        return false;
    }
    let spacings: Vec<f32> = positions.windows(2).map(|w| w[1] - w[0]).collect();
    let avg = spacings.iter().sum::<f32>() / spacings.len() as f32;
    spacings.iter().all(|s| (s - avg).abs() <= tolerance)
}

fn union_bbox(rects: impl Iterator<Item = Rect>) -> Rect {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_r = f32::MIN;
    let mut max_b = f32::MIN;
    for rect in rects {
        min_x = min_x.min(rect.x);
        min_y = min_y.min(rect.y);
        max_r = max_r.max(rect.right());
        max_b = max_b.max(rect.bottom());
    }
    Rect::new(min_x, min_y, max_r - min_x, max_b - min_y)
}
