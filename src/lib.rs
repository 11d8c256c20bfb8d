//! Core library for the `sessionpool` provisioning tool.
//!
//! The crate drives three dependent stages against a resource-management
//! API: it creates a managed environment and polls it until it reports
//! success, creates a session pool inside it with a single upsert, and then
//! generates sessions in that pool on operator request.

pub mod config;
pub mod generate;
pub mod payload;
pub mod pipeline;
pub mod prompt;
pub mod provision;
pub mod resource;
pub mod session;
pub mod test_support;
pub mod transport;

pub use config::{ConfigError, ServiceConfig};
pub use generate::{GenerateError, GenerateRequest, LoopExit, SessionGenerator, SessionPoolRef};
pub use payload::{PayloadError, PoolSecret};
pub use pipeline::{
    ApiVersions, Pipeline, PipelineError, PipelineOutcome, PipelineRequest, SessionPoolError,
    SessionPoolSpec,
};
pub use prompt::{ConsoleInput, InputError, InputProvider};
pub use provision::{
    PollDeadline, ProvisionError, Provisioned, Provisioner, ProvisioningState, SUCCEEDED_STATE,
    WaitPolicy,
};
pub use resource::{ResourceClient, ResourceRequest, ResourceScope};
pub use session::{GenerateSessionsResponse, Session, SessionKind};
pub use transport::{HttpMethod, ReqwestTransport, ResourceResponse, Transport, TransportError};
