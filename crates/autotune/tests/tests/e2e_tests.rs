#[path = "e2e/stream_to_validation.rs"]
mod stream_to_validation;

#[path = "e2e/autonomous_cycle.rs"]
mod autonomous_cycle;

#[path = "e2e/rollback_on_degradation.rs"]
mod rollback_on_degradation;

#[path = "e2e/graceful_shutdown.rs"]
mod graceful_shutdown;

#[path = "e2e/concurrent_validations.rs"]
mod concurrent_validations;

#[path = "e2e/pause_and_resume.rs"]
mod pause_and_resume;
