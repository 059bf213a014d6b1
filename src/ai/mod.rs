//! AI provider routing core: role/provider/credential resolution, prompt
//! rendering, and the driver contract (spec §4.6–§4.9).

pub mod config;
pub mod driver;
pub mod drivers;
pub mod prompt;
pub mod registry;
pub mod renderer;
pub mod schema;
pub mod service;
pub mod tracer;

pub use config::{AiConfig, CredentialConfig, Depth, ProviderInstanceConfig, SelectionPolicy};
pub use driver::{Driver, DriverError, ProviderError, Request, Response};
pub use prompt::{Prompt, PromptRegistry, StaticPromptRegistry};
pub use registry::{DriverFactory, ProviderRegistry, ResolvedProvider, ResolveError};
pub use renderer::PromptRenderer;
pub use schema::{SchemaCatalog, StaticSchemaCatalog};
pub use service::{AiError, AiService, AiServiceConfig, BulkSearchRequest, CommonRequest, GenerateRequest, SearchRequest};
pub use tracer::{FileTraceSink, NoopTraceSink, TraceEntry, TraceSink};
