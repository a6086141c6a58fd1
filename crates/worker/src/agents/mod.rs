pub mod analysis_agent;
pub mod generation_agent;
pub mod knowledge_agent;

pub use analysis_agent::DocumentAnalysisAgent;
pub use generation_agent::GenerationAgent;
pub use knowledge_agent::KnowledgeAgent;
