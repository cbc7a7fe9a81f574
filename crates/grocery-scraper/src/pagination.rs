//! Page-count and result-count pagination with a mandatory ceiling.
//!
//! Adapters drive their fetch loops with
//! `while let Some(page) = controller.next_page(&collected).await`, so the
//! stopping rules live here instead of in each source.

use async_trait::async_trait;
use grocery_core::{PaginationTarget, Product};

/// Absolute maximum page fetches (or scroll cycles) for one source run.
///
/// Each page fetch may be retried on transient errors, so the worst-case
/// request count is `HARD_PAGE_CEILING * (1 + max_retries)`.
pub const HARD_PAGE_CEILING: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Stop,
}

/// Operator confirmation consulted between pages.
///
/// Only the interactive CLI installs one; automated searches never do.
#[async_trait]
pub trait PageGate: Send {
    /// Called after `completed_page` with everything collected so far.
    async fn confirm(&mut self, completed_page: u32, collected: &[Product]) -> GateDecision;
}

pub struct PaginationController {
    target: PaginationTarget,
    ceiling: u32,
    pages_fetched: u32,
    exhausted: bool,
    gate: Option<Box<dyn PageGate>>,
}

impl std::fmt::Debug for PaginationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationController")
            .field("target", &self.target)
            .field("ceiling", &self.ceiling)
            .field("pages_fetched", &self.pages_fetched)
            .field("exhausted", &self.exhausted)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

impl PaginationController {
    #[must_use]
    pub fn new(target: PaginationTarget) -> Self {
        Self {
            target,
            ceiling: HARD_PAGE_CEILING,
            pages_fetched: 0,
            exhausted: false,
            gate: None,
        }
    }

    /// Lower the page ceiling for this run. It can never exceed
    /// [`HARD_PAGE_CEILING`] or drop below one page.
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = ceiling.clamp(1, HARD_PAGE_CEILING);
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Box<dyn PageGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    #[must_use]
    pub fn target(&self) -> PaginationTarget {
        self.target
    }

    #[must_use]
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// `true` once the source signalled there is nothing more to fetch.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Item count wanted by a result-bounded run.
    #[must_use]
    pub fn result_target(&self) -> Option<usize> {
        match self.target {
            PaginationTarget::Results(n) => Some(n),
            PaginationTarget::Pages(_) => None,
        }
    }

    /// Record that the source has no further pages.
    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    /// Returns the 1-based number of the next page to fetch, or `None` when
    /// the run should stop.
    pub async fn next_page(&mut self, collected: &[Product]) -> Option<u32> {
        if self.exhausted {
            return None;
        }
        if self.pages_fetched >= self.ceiling {
            tracing::debug!(ceiling = self.ceiling, "pagination ceiling reached");
            return None;
        }
        let target_met = match self.target {
            PaginationTarget::Pages(max_pages) => self.pages_fetched >= max_pages,
            PaginationTarget::Results(count) => collected.len() >= count,
        };
        if target_met {
            return None;
        }
        if self.pages_fetched > 0 {
            if let Some(gate) = self.gate.as_mut() {
                if gate.confirm(self.pages_fetched, collected).await == GateDecision::Stop {
                    self.exhausted = true;
                    return None;
                }
            }
        }
        self.pages_fetched += 1;
        Some(self.pages_fetched)
    }

    /// Trim a result-bounded run to its target count.
    #[must_use]
    pub fn finish(&self, mut products: Vec<Product>) -> Vec<Product> {
        if let Some(count) = self.result_target() {
            products.truncate(count);
        }
        products
    }
}
