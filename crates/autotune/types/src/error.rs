/// Errors raised by data-model invariants.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("invalid event transition for {id}: {from} -> {to}")]
    InvalidEventTransition {
        id: String,
        from: String,
        to: String,
    },
    #[error("invalid operation transition for {id}: {from} -> {to}")]
    InvalidOperationTransition {
        id: String,
        from: String,
        to: String,
    },
    #[error("invalid engine transition: {from} -> {to}")]
    InvalidEngineTransition { from: String, to: String },
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
