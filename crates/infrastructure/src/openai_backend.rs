use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use docgen_core::{DocgenError, DocgenResult, ProviderConfig};
use docgen_domain::{ContentBackend, GeneratedContent, GenerationRequest, TokenUsage};

/// OpenAI兼容的 chat/completions 后端
///
/// 请求体在调用栈上构造、随响应释放，后端实例只保留连接配置，
/// 不保留任何请求内容。
pub struct OpenAiCompatBackend {
    name: String,
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<UsagePayload>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiCompatBackend {
    /// 根据服务配置构建后端，API密钥从环境变量读取
    pub fn from_config(config: &ProviderConfig) -> DocgenResult<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DocgenError::Network(format!("构建HTTP客户端失败: {e}")))?;

        Ok(Self {
            name: config.name.clone(),
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ContentBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> DocgenResult<GeneratedContent> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_message {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let payload = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.constraints.max_tokens.min(self.max_tokens),
            temperature: request.constraints.temperature,
            stream: false,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DocgenError::ExecutionTimeout
            } else {
                DocgenError::Network(format!("请求 {} 失败: {e}", self.name))
            }
        })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(DocgenError::RateLimited {
                    provider: self.name.clone(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DocgenError::AuthRejected {
                    provider: self.name.clone(),
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(DocgenError::Network(format!(
                    "{} 返回异常状态 {status}: {body}",
                    self.name
                )));
            }
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DocgenError::Serialization(format!("解析 {} 响应失败: {e}", self.name)))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            DocgenError::Serialization(format!("{} 响应缺少choices字段", self.name))
        })?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(GeneratedContent {
            content: choice.message.content,
            provider: self.name.clone(),
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            finish_reason: choice.finish_reason,
        })
    }
}
