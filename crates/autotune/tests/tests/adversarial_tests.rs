#[path = "adversarial/bypass_risk_gate.rs"]
mod bypass_risk_gate;

#[path = "adversarial/corrupt_config.rs"]
mod corrupt_config;

#[path = "adversarial/hostile_stream.rs"]
mod hostile_stream;
