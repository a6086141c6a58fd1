use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// worker健康状态
///
/// Unavailable 劣于 Degraded 劣于 Healthy，聚合时取最差值。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgentHealth {
    #[serde(rename = "HEALTHY")]
    Healthy,
    #[serde(rename = "DEGRADED")]
    Degraded,
    #[serde(rename = "UNAVAILABLE")]
    Unavailable,
}

impl AgentHealth {
    /// 两个健康状态中较差的一个
    pub fn worst(self, other: AgentHealth) -> AgentHealth {
        self.max(other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentHealth::Healthy => "healthy",
            AgentHealth::Degraded => "degraded",
            AgentHealth::Unavailable => "unavailable",
        }
    }
}

/// worker能力描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub supported_task_types: Vec<String>,
    pub health: AgentHealth,
    pub current_load: i32,
    pub max_concurrent_tasks: i32,
    pub registered_at: DateTime<Utc>,
    pub last_health_report: DateTime<Utc>,
}

impl AgentDescriptor {
    pub fn new(
        name: impl Into<String>,
        supported_task_types: Vec<String>,
        max_concurrent_tasks: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            supported_task_types,
            health: AgentHealth::Healthy,
            current_load: 0,
            max_concurrent_tasks,
            registered_at: now,
            last_health_report: now,
        }
    }

    /// 检查worker是否可以接受指定类型的新任务
    pub fn can_accept_task(&self, task_type: &str) -> bool {
        self.health != AgentHealth::Unavailable
            && self.current_load < self.max_concurrent_tasks
            && self
                .supported_task_types
                .iter()
                .any(|t| t == task_type)
    }

    /// 获取worker负载率
    pub fn load_percentage(&self) -> f64 {
        if self.max_concurrent_tasks == 0 {
            0.0
        } else {
            (self.current_load as f64 / self.max_concurrent_tasks as f64) * 100.0
        }
    }

    /// 更新健康上报
    pub fn update_health(&mut self, health: AgentHealth) {
        self.health = health;
        self.last_health_report = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_health_dominance() {
        assert_eq!(
            AgentHealth::Healthy.worst(AgentHealth::Degraded),
            AgentHealth::Degraded
        );
        assert_eq!(
            AgentHealth::Degraded.worst(AgentHealth::Unavailable),
            AgentHealth::Unavailable
        );
        assert_eq!(
            AgentHealth::Healthy.worst(AgentHealth::Healthy),
            AgentHealth::Healthy
        );
    }

    #[test]
    fn test_can_accept_task() {
        let mut agent = AgentDescriptor::new("analysis", vec!["analyze_pdf_document".into()], 2);
        assert!(agent.can_accept_task("analyze_pdf_document"));
        assert!(!agent.can_accept_task("generate_liquidation_documents"));

        agent.current_load = 2;
        assert!(!agent.can_accept_task("analyze_pdf_document"));

        agent.current_load = 0;
        agent.update_health(AgentHealth::Unavailable);
        assert!(!agent.can_accept_task("analyze_pdf_document"));
    }

    #[test]
    fn test_load_percentage() {
        let mut agent = AgentDescriptor::new("a", vec![], 4);
        agent.current_load = 1;
        assert!((agent.load_percentage() - 25.0).abs() < f64::EPSILON);
    }
}
