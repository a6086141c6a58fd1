pub mod batch;
pub mod health;
pub mod registry;
pub mod router;

pub use batch::{BatchItem, BatchSummary};
pub use health::{ComponentHealth, SystemHealth};
pub use registry::CapabilityRegistry;
pub use router::TaskRouter;
