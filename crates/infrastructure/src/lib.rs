pub mod extracted_parser;
pub mod gateway;
pub mod knowledge_store;
pub mod manifest_renderer;
pub mod openai_backend;

pub use extracted_parser::ExtractedJsonParser;
pub use gateway::ProviderGateway;
pub use knowledge_store::KnowledgeStore;
pub use manifest_renderer::ManifestRenderer;
pub use openai_backend::OpenAiCompatBackend;
