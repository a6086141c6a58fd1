mod design;
mod structure;
mod synthesis;

use std::sync::Arc;

use tracing::{debug, info};

use docgen_core::{AnalysisConfig, DocgenResult};
use docgen_domain::{
    content_hash, BlockKind, CancellationFlag, ContentFlags, DesignDescriptor,
    DocumentAnalysisResult, DocumentParser, TemplatePattern,
};

/// 文档分析流水线
///
/// 三个阶段对单个文档严格串行：结构提取 -> 设计提取 -> 模板合成。
/// 输出是内容的纯函数：不引入随机性，不依赖墙钟时间。不同文档
/// 之间可以完全并行。
pub struct AnalysisPipeline {
    parser: Arc<dyn DocumentParser>,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(parser: Arc<dyn DocumentParser>, config: AnalysisConfig) -> Self {
        Self { parser, config }
    }

    /// 阶段1+2：分析文档结构与设计
    ///
    /// 单页解析失败记入 degraded_pages 并继续；取消信号在阶段
    /// 边界检查：当前阶段完成后中止后续阶段，返回带 truncated
    /// 标记的部分结果。
    pub async fn analyze(
        &self,
        document: &[u8],
        cancellation: &CancellationFlag,
    ) -> DocgenResult<DocumentAnalysisResult> {
        let hash = content_hash(document);
        debug!("开始分析文档: {}", &hash[..12.min(hash.len())]);

        // 阶段1：结构提取
        let outcome =
            structure::extract_structure(self.parser.as_ref(), document, &self.config).await?;
        let flags = self.classify_flags(&outcome);

        if cancellation.is_cancelled() {
            info!("分析在结构提取后被取消: {}", &hash[..12.min(hash.len())]);
            return Ok(DocumentAnalysisResult {
                content_hash: hash,
                pages: outcome.pages,
                design: DesignDescriptor::default(),
                flags,
                degraded_pages: outcome.degraded_pages,
                truncated: true,
            });
        }

        // 阶段2：设计提取
        let design = design::extract_design(&outcome.pages);

        if !outcome.degraded_pages.is_empty() {
            info!(
                "文档 {} 部分页面降级: {:?}",
                &hash[..12.min(hash.len())],
                outcome.degraded_pages
            );
        }

        Ok(DocumentAnalysisResult {
            content_hash: hash,
            pages: outcome.pages,
            design,
            flags,
            degraded_pages: outcome.degraded_pages,
            truncated: false,
        })
    }

    /// 阶段3：模板合成
    ///
    /// 结构+设计到占位符序列的确定性映射，相同输入产生相同的
    /// 标识符与顺序。
    pub fn synthesize_template(
        &self,
        analysis: &DocumentAnalysisResult,
        name: Option<&str>,
    ) -> TemplatePattern {
        synthesis::synthesize(analysis, name)
    }

    fn classify_flags(&self, outcome: &structure::StructureOutcome) -> ContentFlags {
        let has_logo = outcome.pages.iter().any(|page| {
            page.blocks.iter().any(|b| {
                b.kind == BlockKind::Image && b.bbox.max_side() < self.config.logo_max_side_pt
            })
        });
        let has_tables = outcome
            .pages
            .iter()
            .any(|page| page.blocks.iter().any(|b| b.kind == BlockKind::Table));

        ContentFlags {
            has_logo,
            has_tables,
            multipage: outcome.total_pages > 1,
            has_forms: outcome.has_forms,
        }
    }
}
