#[path = "property/strategy_generation.rs"]
mod strategy_generation;

#[path = "property/rollback_inverse.rs"]
mod rollback_inverse;

#[path = "property/impact_math.rs"]
mod impact_math;

#[path = "property/event_lifecycle.rs"]
mod event_lifecycle;
