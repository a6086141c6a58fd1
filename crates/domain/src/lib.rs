pub mod cancellation;
pub mod digest;
pub mod events;
pub mod models;
pub mod ports;

pub use cancellation::CancellationFlag;
pub use digest::content_hash;
pub use events::{DocgenEvent, DomainEvent};
pub use models::{
    task_types, AgentDescriptor, AgentHealth, BlockKind, ContentFlags, DesignDescriptor,
    DocumentAnalysisResult, FontClass, GeneratedContent, GenerationConstraints, GenerationRequest,
    KnowledgeBaseFile, KnowledgeEntry, KnowledgeQuery, KnowledgeStats, Margins, MotifRegion,
    PageBlock, PageStructure, PatternSuggestion, PlaceholderSlot, ProviderAttempt,
    ProviderDescriptor, Rect, SlotKind, StyleRule, TaskOutcome, TaskPriority, TaskRequest,
    TaskStatus, TemplatePattern, TokenUsage, VisibilityCondition,
};
pub use ports::{
    ContentBackend, DocumentParser, DocumentRenderer, FormField, HealthProbe, ImageRegion,
    ParsedPage, RenderedDocumentRef, TaskContext, TextSpan, WorkerAgent,
};
