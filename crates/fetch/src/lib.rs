pub mod http;
pub mod pipelines;
pub mod session;
pub mod traces;

pub use pipelines::PipelineDirectory;
pub use session::{Dashboard, Delivery, Selection, Snapshot};
pub use traces::{TraceClient, TraceSource};
