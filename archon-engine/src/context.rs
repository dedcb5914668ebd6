//! `ServiceContext` (§9 design note on global statics): the engine has no
//! ambient global state — every subsystem that needs the simulation
//! tunables or a logging identity gets it threaded through construction via
//! this struct instead of reaching for a `static`/`lazy_static`.

use archon_core::SimConfig;

/// Carries the `SimConfig` tunables plus a `log` target prefix identifying
/// which embedding (client, dedicated server, headless test harness) is
/// running the engine, so log lines from a shared library can be filtered
/// per embedder without the engine hardcoding one target string.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    log_target: &'static str,
    config: SimConfig,
}

impl ServiceContext {
    pub fn new(log_target: &'static str, config: SimConfig) -> Self {
        Self { log_target, config }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn log_target(&self) -> &'static str {
        self.log_target
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self::new("archon_engine", SimConfig::default())
    }
}
