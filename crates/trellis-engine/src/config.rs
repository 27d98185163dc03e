use std::collections::HashMap;
use std::time::Duration;

/// What the dispatcher does when a node's type has no registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownNodePolicy {
  /// Produce a failed node result. Canonical behavior.
  #[default]
  Fail,
  /// Echo the input as the node's output. Compatibility with the legacy
  /// recursive walker, which treated unregistered types as transparent.
  PassThrough,
}

/// Engine configuration, passed explicitly at construction.
///
/// Nothing in the engine or its handlers reads the process environment;
/// credentials and endpoints travel inside node config, and these knobs
/// travel here.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Per-invocation handler timeout. A timed-out attempt counts against
  /// the retry budget like any other failure.
  pub handler_timeout: Duration,
  /// Fixed delay between failed attempts.
  pub retry_backoff: Duration,
  /// Retry budget for node types not listed in `retry_budgets`.
  pub default_retry_budget: u32,
  /// Per-node-type retry budgets (attempts beyond the first).
  pub retry_budgets: HashMap<String, u32>,
  pub unknown_node_policy: UnknownNodePolicy,
}

impl EngineConfig {
  /// Retry budget for a node type.
  pub fn retry_budget(&self, node_type: &str) -> u32 {
    self
      .retry_budgets
      .get(node_type)
      .copied()
      .unwrap_or(self.default_retry_budget)
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    // Network-facing handlers get retries; pure in-memory transforms fail
    // fast. Budgets count attempts beyond the first.
    let retry_budgets = HashMap::from([
      ("http".to_string(), 2),
      ("llm".to_string(), 2),
      ("email".to_string(), 1),
      ("sms".to_string(), 1),
      ("slack".to_string(), 1),
      ("discord".to_string(), 1),
      ("teams".to_string(), 1),
      ("sql".to_string(), 1),
      ("spreadsheet".to_string(), 1),
    ]);

    Self {
      handler_timeout: Duration::from_secs(30),
      retry_backoff: Duration::from_secs(5),
      default_retry_budget: 0,
      retry_budgets,
      unknown_node_policy: UnknownNodePolicy::Fail,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retry_budget_falls_back_to_default() {
    let config = EngineConfig::default();
    assert_eq!(config.retry_budget("http"), 2);
    assert_eq!(config.retry_budget("addField"), 0);

    let mut custom = EngineConfig::default();
    custom.default_retry_budget = 3;
    assert_eq!(custom.retry_budget("somethingNew"), 3);
  }
}
