//! Guards around text generation: per-capability circuit breakers and token
//! allowances.

mod budget;
mod circuit_breaker;

pub use budget::{BudgetTracker, LlmUsage};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
