use std::sync::Arc;

use serde::Serialize;

use docgen_domain::{AgentHealth, HealthProbe};

use crate::registry::CapabilityRegistry;

/// 单个组件的健康状况
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub health: AgentHealth,
    pub detail: Option<String>,
}

/// 系统整体健康
///
/// overall 取全部组件的最差值：unavailable 劣于 degraded 劣于
/// healthy。
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub overall: AgentHealth,
    pub components: Vec<ComponentHealth>,
}

pub(crate) async fn aggregate(
    registry: &CapabilityRegistry,
    probes: &[Arc<dyn HealthProbe>],
) -> SystemHealth {
    let mut overall = AgentHealth::Healthy;
    let mut components = Vec::new();

    for descriptor in registry.snapshot().await {
        overall = overall.worst(descriptor.health);
        components.push(ComponentHealth {
            name: format!("agent:{}", descriptor.name),
            health: descriptor.health,
            detail: Some(format!("负载 {:.0}%", descriptor.load_percentage())),
        });
    }

    for probe in probes {
        let health = probe.health().await;
        overall = overall.worst(health);
        components.push(ComponentHealth {
            name: probe.component().to_string(),
            health,
            detail: None,
        });
    }

    SystemHealth {
        overall,
        components,
    }
}
