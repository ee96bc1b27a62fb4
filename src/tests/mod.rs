// Crate-level scenario tests
//
// End-to-end flows over the public surface: full negotiation rounds,
// sparring exchanges under a controlled clock, and fuzzing campaigns
// against scripted defenses.

pub mod negotiation_flow;

/// Opt-in test logging: RUST_LOG=debug cargo test -- --nocapture
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
