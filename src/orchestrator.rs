//! # Orchestrator
//!
//! Tries strategies strictly in priority order on the calling thread and stops at the first
//! success.

use log::{error, info, warn};
use thiserror::Error;

use crate::strategy::{Strategy, StrategyResult};

/// Errors from [`Orchestrator::run`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Every strategy failed
    #[error("all {0} strategies failed to get root access")]
    Exhausted(usize),
}

/// Ordered list of strategies
#[derive(Default)]
pub struct Orchestrator {
    /// Strategies, highest confidence first
    strategies: Vec<Box<dyn Strategy>>,
}

impl Orchestrator {
    /// Creates an orchestrator with no strategies
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `strategy` after those already registered
    pub fn with_strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the registered strategies in the order they are tried
    pub fn strategies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.iter().map(|strategy| strategy.name())
    }

    /// Runs strategies until one succeeds, returning its name
    pub fn run(&mut self) -> Result<&'static str, OrchestratorError> {
        for strategy in &mut self.strategies {
            let name = strategy.name();
            match strategy.attempt() {
                StrategyResult::Succeeded => {
                    info!("{name}: got root access");
                    return Ok(name);
                }
                StrategyResult::FailedToPatch => warn!("{name}: could not patch, falling back"),
                StrategyResult::FailedPrivilegeCall => {
                    warn!("{name}: patched but privileged call failed, falling back")
                }
            }
        }
        error!("failed to get root access");
        Err(OrchestratorError::Exhausted(self.strategies.len()))
    }
}
