pub mod content_backend;
pub mod document_parser;
pub mod renderer;
pub mod worker_agent;

pub use content_backend::ContentBackend;
pub use document_parser::{DocumentParser, FormField, ImageRegion, ParsedPage, TextSpan};
pub use renderer::{DocumentRenderer, RenderedDocumentRef};
pub use worker_agent::{HealthProbe, TaskContext, WorkerAgent};
