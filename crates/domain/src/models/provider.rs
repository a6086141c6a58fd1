use chrono::{DateTime, Utc};
use docgen_core::CircuitState;
use serde::{Deserialize, Serialize};

/// 内容生成服务描述
///
/// 由服务网关持有并维护，熔断状态只随调用结果变化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    /// 优先级，数值越小越优先
    pub priority: u32,
    pub circuit_state: CircuitState,
    pub consecutive_failures: usize,
    /// 熔断冷却截止时间
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// 内容生成约束
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationConstraints {
    pub max_tokens: u32,
    /// 生成随机性（0.0-1.0）
    pub temperature: f32,
}

impl Default for GenerationConstraints {
    fn default() -> Self {
        Self {
            max_tokens: 2_000,
            temperature: 0.7,
        }
    }
}

/// 内容生成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_message: Option<String>,
    pub constraints: GenerationConstraints,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_message: None,
            constraints: GenerationConstraints::default(),
        }
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn with_constraints(mut self, constraints: GenerationConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// token用量
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 生成的内容，附带服务来源标记
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub content: String,
    /// 实际提供服务的节点名
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// 一次失败调用的记录，用于 ProviderUnavailable 报告
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    pub provider: String,
    pub circuit_state: CircuitState,
    pub error: String,
}

impl ProviderAttempt {
    /// 形如 "openai(open): 连接超时" 的摘要
    pub fn summary(&self) -> String {
        format!(
            "{}({}): {}",
            self.provider,
            self.circuit_state.as_str(),
            self.error
        )
    }
}
