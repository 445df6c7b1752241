//! Credential pooling, failure classification, and generation orchestration.

pub mod batch;
pub mod capability;
pub mod classifier;
pub mod credential;
pub mod fallback;
pub mod http;
pub mod invoker;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod pool;
pub mod work;

pub use batch::{BatchOptions, BatchReport, BatchRunner, UnitResult, UnitStatus, load_batch, parse_batch};
pub use capability::{Capability, CapabilityMatrix, MatrixSummary};
pub use classifier::{ErrorSignal, FailureCategory, classify};
pub use credential::Credential;
pub use fallback::{ProviderFallbackController, ProviderRegistry, ProviderSnapshot};
pub use invoker::{HttpInvoker, Invoker, RequestStyle};
pub use models::{Classification, KeyEntry, ProviderKeys, RobotOutput};
pub use orchestrator::{
    AttemptObserver, GenerationOrchestrator, OrchestratorOptions, SchedulingMode,
};
pub use pool::{Claim, CredentialPool, CredentialState, Outcome, PoolOptions, PoolStatus};
pub use work::{
    AlternateProvider, Artifact, AttemptOutcome, AttemptSummary, Generated, GenerationOutcome,
    WorkUnit,
};
