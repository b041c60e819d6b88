use std::time::Duration;

/// Knobs for the routing engine and turn graph.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Hand-offs allowed within one session before forced escalation.
    pub handoff_threshold: u32,
    /// Turn-level recovery retries before a fresh session is suggested.
    pub max_retries: u32,
    /// Supervisor re-execution rounds for insufficient agent coverage.
    pub supervisor_max_retries: u32,
    /// Per-judgment LLM timeout; an elapsed call is treated as absent.
    pub decision_timeout: Duration,
    /// Safety bound on graph node transitions within one turn.
    pub max_steps: usize,
    pub intent_cache_ttl: Duration,
    pub handoff_cache_ttl: Duration,
    pub temperature: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            handoff_threshold: 3,
            max_retries: 3,
            supervisor_max_retries: 2,
            decision_timeout: Duration::from_secs(8),
            max_steps: 25,
            intent_cache_ttl: Duration::from_secs(30 * 60),
            handoff_cache_ttl: Duration::from_secs(5 * 60),
            temperature: 0.1,
        }
    }
}

impl RouterConfig {
    pub fn with_handoff_threshold(mut self, threshold: u32) -> Self {
        self.handoff_threshold = threshold;
        self
    }

    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    pub fn with_supervisor_max_retries(mut self, retries: u32) -> Self {
        self.supervisor_max_retries = retries;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}
