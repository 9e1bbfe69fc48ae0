//! Token accounting for generation calls.
//!
//! One global allowance bounds a `process` run. A capability may also carry
//! its own allowance so that script generation, the most verbose caller,
//! cannot starve plausibility checks.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::BudgetConfig;
use crate::generation::Capability;
use crate::providers::TokenUsage;

struct Allowance {
    ceiling: u32,
    spent: AtomicU32,
}

impl Allowance {
    fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            spent: AtomicU32::new(0),
        }
    }

    fn left(&self) -> u32 {
        self.ceiling.saturating_sub(self.spent.load(Ordering::SeqCst))
    }

    fn spend(&self, tokens: u32) {
        self.spent.fetch_add(tokens, Ordering::SeqCst);
    }

    fn refill(&self) {
        self.spent.store(0, Ordering::SeqCst);
    }
}

/// Generation usage for one run, reported next to the verdicts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub llm_calls: u32,

    /// USD, from list prices
    pub estimated_cost: f64,

    pub cache_hits: u32,
    pub cache_creation_tokens: u32,
    pub cache_read_tokens: u32,

    #[serde(default)]
    pub calls_by_capability: BTreeMap<String, u32>,
}

/// USD per million tokens: input, output, cache write, cache read.
struct Pricing(f64, f64, f64, f64);

/// First fragment contained in the model name wins, so `gpt-4o-mini` sits
/// before `gpt-4o`.
const PRICES: &[(&str, Pricing)] = &[
    ("haiku-4", Pricing(1.0, 5.0, 1.25, 0.1)),
    ("sonnet-4", Pricing(3.0, 15.0, 3.75, 0.3)),
    ("opus-4", Pricing(5.0, 25.0, 6.25, 0.5)),
    ("gpt-4o-mini", Pricing(0.15, 0.6, 0.0, 0.075)),
    ("gpt-4o", Pricing(2.5, 10.0, 0.0, 1.25)),
];

const FALLBACK_PRICE: Pricing = Pricing(3.0, 15.0, 3.75, 0.3);

fn cost_of(usage: &TokenUsage, model: &str) -> f64 {
    let Pricing(input, output, write, read) = PRICES
        .iter()
        .find(|(fragment, _)| model.contains(fragment))
        .map_or(&FALLBACK_PRICE, |(_, price)| price);

    [
        (usage.prompt_tokens, input),
        (usage.completion_tokens, output),
        (usage.cache_creation_tokens, write),
        (usage.cache_read_tokens, read),
    ]
    .iter()
    .map(|(tokens, rate)| f64::from(*tokens) * **rate / 1_000_000.0)
    .sum()
}

impl LlmUsage {
    pub fn add(&mut self, capability: Capability, usage: &TokenUsage, model: &str) {
        self.llm_calls += 1;
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.cache_creation_tokens += usage.cache_creation_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;
        self.cache_hits += u32::from(usage.cache_read_tokens > 0);
        self.estimated_cost += cost_of(usage, model);
        *self
            .calls_by_capability
            .entry(capability.to_string())
            .or_default() += 1;
    }
}

/// Shared by every generation call of a run.
pub struct BudgetTracker {
    global: Allowance,
    per_capability: HashMap<Capability, Allowance>,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    /// Global ceiling only.
    pub fn new(global_max_tokens: u32) -> Self {
        Self {
            global: Allowance::new(global_max_tokens),
            per_capability: HashMap::new(),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn from_config(config: &BudgetConfig) -> Self {
        let mut tracker = Self::new(config.global_max_tokens);
        tracker.per_capability = config
            .per_capability
            .iter()
            .map(|(capability, ceiling)| (*capability, Allowance::new(*ceiling)))
            .collect();
        tracker
    }

    /// Tokens `capability` may still spend.
    pub fn remaining_for(&self, capability: Capability) -> u32 {
        let global = self.global.left();
        self.per_capability
            .get(&capability)
            .map_or(global, |own| own.left().min(global))
    }

    pub fn can_afford(&self, capability: Capability, estimated_tokens: u32) -> bool {
        self.remaining_for(capability) >= estimated_tokens
    }

    pub fn record_usage(&self, capability: Capability, usage: &TokenUsage, model: &str) {
        let tokens = usage.total();
        self.global.spend(tokens);
        if let Some(own) = self.per_capability.get(&capability) {
            own.spend(tokens);
        }
        self.usage.write().add(capability, usage, model);
    }

    pub fn get_usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    /// Refill every allowance and clear usage for the next run.
    pub fn reset(&self) {
        self.global.refill();
        self.per_capability.values().for_each(Allowance::refill);
        *self.usage.write() = LlmUsage::default();
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::from_config(&BudgetConfig::default())
    }
}
