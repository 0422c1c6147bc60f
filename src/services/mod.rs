pub mod orchestrator;
pub mod retry_scheduler;

pub use orchestrator::ActivationOrchestrator;
pub use retry_scheduler::{RetryScheduler, RetrySchedulerHandle, SweepReport};
