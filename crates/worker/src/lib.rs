pub mod agents;
pub mod analysis;

pub use agents::{DocumentAnalysisAgent, GenerationAgent, KnowledgeAgent};
pub use analysis::AnalysisPipeline;
