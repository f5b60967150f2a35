//! Client-side pipeline for the split engine: durable sessions, stable
//! variant assignment, and buffered event delivery.

pub mod config;
pub mod observer;
pub mod pipeline;
pub mod queue;
pub mod scrub;
pub mod session;
pub mod transport;
pub mod variant;

pub use config::PipelineConfig;
pub use observer::{VisibilityObserver, VisibilityTransition};
pub use pipeline::Pipeline;
pub use session::{
    CacheSessionStore, FileSessionStore, PageContext, SessionManager, SessionStore,
};
pub use transport::{HttpTransport, Transport};
pub use variant::VariantOverrides;
