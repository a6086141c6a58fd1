use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use docgen_core::{
    BackoffPolicy, CircuitBreaker, CircuitBreakerConfig, CircuitState, DocgenError, DocgenResult,
    GatewayConfig,
};
use docgen_domain::{
    AgentHealth, ContentBackend, GeneratedContent, GenerationRequest, HealthProbe,
    ProviderAttempt, ProviderDescriptor,
};

/// 网关内单个服务节点的运行时状态
struct ProviderRuntime {
    backend: Arc<dyn ContentBackend>,
    breaker: CircuitBreaker,
    priority: u32,
    call_timeout: Duration,
}

/// 内容生成服务网关
///
/// 持有按优先级排序的同构服务列表，对外暴露统一的 generate 操作。
/// 每个服务节点独立熔断，调用之间网关保留的状态仅限熔断簿记，
/// 从不保留请求内容或凭据。
pub struct ProviderGateway {
    providers: Vec<ProviderRuntime>,
    max_attempts_per_provider: u32,
    backoff: BackoffPolicy,
}

impl ProviderGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            providers: Vec::new(),
            max_attempts_per_provider: config.max_attempts_per_provider,
            backoff: BackoffPolicy {
                base_interval_ms: config.retry_base_ms,
                max_interval_ms: config.retry_max_ms,
                ..BackoffPolicy::default()
            },
        }
    }

    /// 注册一个服务节点，列表始终保持优先级有序
    pub fn register(
        &mut self,
        backend: Arc<dyn ContentBackend>,
        priority: u32,
        call_timeout: Duration,
        breaker_config: CircuitBreakerConfig,
    ) {
        self.providers.push(ProviderRuntime {
            backend,
            breaker: CircuitBreaker::new(breaker_config),
            priority,
            call_timeout,
        });
        self.providers.sort_by_key(|p| p.priority);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// 统一的内容生成入口
    ///
    /// 按优先级尝试每个未熔断的服务：同一服务最多重试
    /// max_attempts_per_provider 次（带退避），之后切换到下一个。
    /// 全部耗尽时返回 ProviderUnavailable，列出每个服务的最后
    /// 熔断状态。
    pub async fn generate(&self, request: &GenerationRequest) -> DocgenResult<GeneratedContent> {
        if self.providers.is_empty() {
            return Err(DocgenError::Internal(
                "没有注册任何内容生成服务".to_string(),
            ));
        }

        let mut attempts: Vec<ProviderAttempt> = Vec::new();

        for provider in &self.providers {
            let name = provider.backend.name().to_string();

            if !provider.breaker.allow_call().await {
                let snapshot = provider.breaker.snapshot().await;
                debug!(
                    "跳过熔断中的服务 {} (剩余冷却: {:?})",
                    name, snapshot.cooldown_remaining
                );
                attempts.push(ProviderAttempt {
                    provider: name,
                    circuit_state: snapshot.state,
                    error: "熔断中，本次调用跳过".to_string(),
                });
                continue;
            }

            match self.try_provider(provider, &name, request).await {
                Ok(content) => {
                    metrics::counter!("docgen_gateway_success_total").increment(1);
                    return Ok(content);
                }
                Err(last_error) => {
                    let snapshot = provider.breaker.snapshot().await;
                    attempts.push(ProviderAttempt {
                        provider: name,
                        circuit_state: snapshot.state,
                        error: last_error.to_string(),
                    });
                    metrics::counter!("docgen_gateway_failover_total").increment(1);
                }
            }
        }

        Err(DocgenError::ProviderUnavailable {
            attempted: attempts.iter().map(|a| a.summary()).collect(),
        })
    }

    /// 对单个服务执行带退避的有限次重试
    async fn try_provider(
        &self,
        provider: &ProviderRuntime,
        name: &str,
        request: &GenerationRequest,
    ) -> std::result::Result<GeneratedContent, DocgenError> {
        let mut last_error = DocgenError::Internal("未尝试任何调用".to_string());

        for attempt in 0..self.max_attempts_per_provider {
            if attempt > 0 {
                tokio::time::sleep(self.backoff.delay_for(attempt - 1)).await;
                // 重试期间熔断可能已经打开，不再继续该服务
                if !provider.breaker.allow_call().await {
                    break;
                }
            }

            let call = tokio::time::timeout(
                provider.call_timeout,
                provider.backend.generate(request),
            )
            .await;

            match call {
                Ok(Ok(mut content)) => {
                    provider.breaker.record_success().await;
                    content.provider = name.to_string();
                    info!("内容生成成功: provider={}, 第{}次尝试", name, attempt + 1);
                    return Ok(content);
                }
                Ok(Err(err)) => {
                    provider.breaker.record_failure().await;
                    warn!("服务 {} 调用失败 (第{}次): {}", name, attempt + 1, err);
                    // 认证/解析类错误重试无意义，直接切换下一个服务
                    let fatal = !err.is_retryable();
                    last_error = err;
                    if fatal {
                        break;
                    }
                }
                Err(_) => {
                    provider.breaker.record_failure().await;
                    warn!("服务 {} 调用超时 (第{}次)", name, attempt + 1);
                    last_error = DocgenError::ExecutionTimeout;
                }
            }
        }

        Err(last_error)
    }

    /// 全部服务节点的当前描述快照
    pub async fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let mut out = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let snapshot = provider.breaker.snapshot().await;
            out.push(ProviderDescriptor {
                name: provider.backend.name().to_string(),
                priority: provider.priority,
                circuit_state: snapshot.state,
                consecutive_failures: snapshot.consecutive_failures,
                cooldown_until: snapshot.cooldown_remaining.map(|d| {
                    Utc::now()
                        + chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
                }),
            });
        }
        out
    }
}

#[async_trait]
impl HealthProbe for ProviderGateway {
    fn component(&self) -> &str {
        "provider_gateway"
    }

    /// 网关健康度由最优可用熔断状态决定
    async fn health(&self) -> AgentHealth {
        let mut best = AgentHealth::Unavailable;
        for provider in &self.providers {
            let health = match provider.breaker.state().await {
                CircuitState::Closed => AgentHealth::Healthy,
                CircuitState::HalfOpen => AgentHealth::Degraded,
                CircuitState::Open => AgentHealth::Unavailable,
            };
            best = best.min(health);
        }
        best
    }
}
