//! Runtime: concrete implementations of the kernel's trait contracts plus
//! the orchestration loop that ties them together.
//!
//! [`registry`] and [`router`] implement [`taskweave_kernel::CapabilityRegistry`]
//! and [`taskweave_kernel::LLMTaskRouter`]; [`llm_client`] implements
//! [`taskweave_kernel::LLMClient`] against an OpenAI-compatible HTTP API;
//! [`events`] implements [`taskweave_kernel::EventPublisher`] over a
//! broadcast channel; [`history`] is the append/update store for
//! [`taskweave_kernel::ExecutionHistory`]; [`executor`] walks a validated
//! tree; [`planner`] drives the per-request attempt loop; [`lifecycle`] runs
//! the ordered shutdown sequence;
//! [`config`] loads an [`taskweave_kernel::OrchestratorConfig`] from a file
//! layered with environment variables; [`testkit`] holds the in-memory test
//! doubles the unit and integration tests build on.

pub mod config;
pub mod events;
pub mod executor;
pub mod history;
pub mod lifecycle;
pub mod llm_client;
pub mod planner;
pub mod registry;
pub mod router;
pub mod testkit;

pub use events::BroadcastEventPublisher;
pub use executor::{ExecutionOutcome, TransitionHook, TreeExecutor};
pub use history::HistoryManager;
pub use lifecycle::{ShutdownCoordinator, ShutdownHook, ShutdownOutcome};
pub use llm_client::HttpLlmClient;
pub use planner::Planner;
pub use registry::InMemoryCapabilityRegistry;
pub use router::DefaultLLMTaskRouter;
