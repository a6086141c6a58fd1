use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use docgen_core::DocgenResult;
use docgen_domain::{DocumentRenderer, RenderedDocumentRef, TemplatePattern};

/// 渲染清单适配器
///
/// 字节级渲染由外部引擎完成：该适配器将模板模式与字段值落盘为
/// 渲染清单，外部引擎消费清单产出最终文档。返回的引用指向清单
/// 文件。
pub struct ManifestRenderer {
    output_folder: PathBuf,
}

impl ManifestRenderer {
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
        }
    }

    /// 输出文件名只保留字母数字与连字符
    fn sanitize(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        if cleaned.is_empty() {
            "document".to_string()
        } else {
            cleaned
        }
    }
}

#[async_trait]
impl DocumentRenderer for ManifestRenderer {
    async fn render(
        &self,
        pattern: &TemplatePattern,
        values: &serde_json::Value,
        output_name: &str,
    ) -> DocgenResult<RenderedDocumentRef> {
        tokio::fs::create_dir_all(&self.output_folder).await?;

        let manifest = serde_json::json!({
            "pattern": pattern,
            "values": values,
        });
        let bytes = serde_json::to_vec_pretty(&manifest)?;

        let path = self
            .output_folder
            .join(format!("{}.render.json", Self::sanitize(output_name)));
        tokio::fs::write(&path, &bytes).await?;

        info!(
            "渲染清单已生成: {} (模板 {})",
            path.display(),
            pattern.pattern_id
        );

        Ok(RenderedDocumentRef {
            path: path.to_string_lossy().into_owned(),
            pattern_id: pattern.pattern_id.clone(),
            size_bytes: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use docgen_domain::ContentFlags;

    use super::*;

    #[tokio::test]
    async fn test_render_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ManifestRenderer::new(dir.path());

        let pattern = TemplatePattern {
            pattern_id: "hash".to_string(),
            name: "t".to_string(),
            slots: vec![],
            source_hash: "hash".to_string(),
            page_count: 1,
            flags: ContentFlags::default(),
        };

        let doc_ref = renderer
            .render(
                &pattern,
                &serde_json::json!({"company_name": "Acme Pty Ltd"}),
                "Acme Pty Ltd",
            )
            .await
            .unwrap();

        assert!(doc_ref.path.ends_with("Acme_Pty_Ltd.render.json"));
        assert!(doc_ref.size_bytes > 0);
        assert!(std::path::Path::new(&doc_ref.path).exists());
    }
}
