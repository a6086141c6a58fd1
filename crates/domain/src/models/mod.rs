pub mod agent;
pub mod analysis;
pub mod knowledge;
pub mod pattern;
pub mod provider;
pub mod task;

pub use agent::{AgentDescriptor, AgentHealth};
pub use analysis::{
    BlockKind, ContentFlags, DesignDescriptor, DocumentAnalysisResult, FontClass, Margins,
    MotifRegion, PageBlock, PageStructure, Rect,
};
pub use knowledge::{
    KnowledgeBaseFile, KnowledgeEntry, KnowledgeQuery, KnowledgeStats, PatternSuggestion,
};
pub use pattern::{PlaceholderSlot, SlotKind, StyleRule, TemplatePattern, VisibilityCondition};
pub use provider::{
    GeneratedContent, GenerationConstraints, GenerationRequest, ProviderAttempt,
    ProviderDescriptor, TokenUsage,
};
pub use task::{task_types, TaskOutcome, TaskPriority, TaskRequest, TaskStatus};
