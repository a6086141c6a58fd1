use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{DocgenError, DocgenResult};

/// 应用配置
///
/// 从 TOML 配置文件加载，支持 `DOCGEN_` 前缀的环境变量覆盖。
/// 未提供配置文件时使用内置默认值。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dispatcher: DispatcherConfig,
    pub providers: Vec<ProviderConfig>,
    pub gateway: GatewayConfig,
    pub analysis: AnalysisConfig,
    pub knowledge: KnowledgeConfig,
    pub generation: GenerationConfig,
}

/// 任务路由配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 批量子任务的并发上限
    pub max_concurrent_tasks: usize,
    /// 单个任务的调度超时时间（秒）
    pub dispatch_timeout_seconds: u64,
}

/// 内容生成服务节点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub api_base: String,
    /// API密钥所在的环境变量名，配置文件中不保存密钥本身
    pub api_key_env: String,
    pub model: String,
    /// 优先级，数值越小越优先
    pub priority: u32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub enabled: bool,
}

/// 服务网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// 切换到下一个服务前，同一服务的最大尝试次数
    pub max_attempts_per_provider: u32,
    /// 熔断触发的连续失败次数阈值
    pub failure_threshold: usize,
    /// 熔断冷却时间（秒）
    pub cooldown_seconds: u64,
    /// 重试基础间隔（毫秒）
    pub retry_base_ms: u64,
    /// 重试最大间隔（毫秒）
    pub retry_max_ms: u64,
}

/// 文档分析配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 样例PDF目录
    pub sample_folder: String,
    /// 页眉区域占页高的比例
    pub header_zone_ratio: f32,
    /// 页脚区域起始位置占页高的比例
    pub footer_zone_ratio: f32,
    /// Logo判定的最大边长（pt）
    pub logo_max_side_pt: f32,
    /// 表格行判定的最少列数
    pub table_min_columns: usize,
    /// 表格列间距的对齐容差（pt）
    pub table_spacing_tolerance_pt: f32,
}

/// 知识库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// 知识库持久化文件路径
    pub store_path: String,
    /// 后台刷盘间隔（秒），0 表示禁用后台刷盘
    pub flush_interval_seconds: u64,
    /// 版本冲突时的最大重试次数
    pub upsert_retry_limit: u32,
    /// 排序权重：上下文特征重合度
    pub weight_overlap: f64,
    /// 排序权重：时效性
    pub weight_recency: f64,
    /// 排序权重：使用频率
    pub weight_usage: f64,
}

/// 文档生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// 生成文档的输出目录
    pub output_folder: String,
    /// 默认文档类型
    pub default_document_type: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            providers: default_providers(),
            gateway: GatewayConfig::default(),
            analysis: AnalysisConfig::default(),
            knowledge: KnowledgeConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 8,
            dispatch_timeout_seconds: 300,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_provider: 2,
            failure_threshold: 3,
            cooldown_seconds: 60,
            retry_base_ms: 200,
            retry_max_ms: 5_000,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_folder: "sample".to_string(),
            header_zone_ratio: 0.15,
            footer_zone_ratio: 0.85,
            logo_max_side_pt: 200.0,
            table_min_columns: 3,
            table_spacing_tolerance_pt: 20.0,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            store_path: "knowledge_base.json".to_string(),
            flush_interval_seconds: 300,
            upsert_retry_limit: 3,
            weight_overlap: 0.5,
            weight_recency: 0.3,
            weight_usage: 0.2,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            output_folder: "output".to_string(),
            default_document_type: "liquidation_resolution".to_string(),
            max_tokens: 3_000,
            temperature: 0.4,
        }
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "openai".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "DOCGEN_OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            priority: 0,
            max_tokens: 4_000,
            timeout_seconds: 120,
            enabled: true,
        },
        ProviderConfig {
            name: "internal".to_string(),
            api_base: "http://localhost:8000/v1".to_string(),
            api_key_env: "DOCGEN_INTERNAL_API_KEY".to_string(),
            model: "internal-document-model".to_string(),
            priority: 1,
            max_tokens: 4_000,
            timeout_seconds: 60,
            enabled: true,
        },
    ]
}

impl AppConfig {
    /// 加载配置
    ///
    /// 查找顺序：显式路径 > 默认路径 > 内置默认值，最后应用环境变量覆盖。
    pub fn load(config_path: Option<&str>) -> DocgenResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(DocgenError::Configuration(format!(
                    "配置文件不存在: {path}"
                )));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            let default_paths = ["config/docgen.toml", "docgen.toml", "/etc/docgen/config.toml"];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DOCGEN")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .map_err(|e| DocgenError::Configuration(format!("构建配置失败: {e}")))?
            .try_deserialize()
            .map_err(|e| DocgenError::Configuration(format!("反序列化配置失败: {e}")))?;

        config.validate()?;

        Ok(config)
    }

    /// 校验配置的内部一致性
    pub fn validate(&self) -> DocgenResult<()> {
        if self.dispatcher.max_concurrent_tasks == 0 {
            return Err(DocgenError::Configuration(
                "dispatcher.max_concurrent_tasks 必须大于 0".to_string(),
            ));
        }
        if !self.providers.iter().any(|p| p.enabled) {
            return Err(DocgenError::Configuration(
                "至少需要启用一个内容生成服务".to_string(),
            ));
        }
        if self.gateway.max_attempts_per_provider == 0 {
            return Err(DocgenError::Configuration(
                "gateway.max_attempts_per_provider 必须大于 0".to_string(),
            ));
        }
        if self.analysis.header_zone_ratio <= 0.0
            || self.analysis.footer_zone_ratio >= 1.0
            || self.analysis.header_zone_ratio >= self.analysis.footer_zone_ratio
        {
            return Err(DocgenError::Configuration(
                "analysis 页眉/页脚区域比例配置无效".to_string(),
            ));
        }
        let weights = [
            self.knowledge.weight_overlap,
            self.knowledge.weight_recency,
            self.knowledge.weight_usage,
        ];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(DocgenError::Configuration(
                "knowledge 排序权重不能为负数".to_string(),
            ));
        }
        Ok(())
    }

    /// 按优先级排序后的可用服务列表
    pub fn enabled_providers(&self) -> Vec<ProviderConfig> {
        let mut providers: Vec<ProviderConfig> = self
            .providers
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .collect();
        providers.sort_by_key(|p| p.priority);
        providers
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.enabled_providers().len(), 2);
        assert_eq!(config.enabled_providers()[0].name, "openai");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
[dispatcher]
max_concurrent_tasks = 4

[[providers]]
name = "primary"
api_base = "http://localhost:9000/v1"
api_key_env = "PRIMARY_KEY"
model = "doc-model"
priority = 0
max_tokens = 2000
timeout_seconds = 30
enabled = true

[knowledge]
store_path = "kb/test.json"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.dispatcher.max_concurrent_tasks, 4);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, "primary");
        assert_eq!(config.knowledge.store_path, "kb/test.json");
        // 未指定的段落使用默认值
        assert_eq!(config.gateway.failure_threshold, 3);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = AppConfig::load(Some("/nonexistent/docgen.toml"));
        assert!(matches!(result, Err(DocgenError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.dispatcher.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_enabled_provider() {
        let mut config = AppConfig::default();
        for provider in &mut config.providers {
            provider.enabled = false;
        }
        assert!(config.validate().is_err());
    }
}
