//! Rewrite step counters.
//!
//! Every module owns one `RewriteCounters`; reduction, rule rewriting,
//! narrowing and variant generation bump the matching counter. Callers take a
//! `CountersReport` snapshot before and after an operation to learn how many
//! steps it cost.
//!
//! ```rust,ignore
//! let before = module.counters().report();
//! let nf = module.reduce(t);
//! let spent = module.counters().report().since(&before);
//! println!("equational steps: {}", spent.equation_steps);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate step counters.
///
/// All counters use relaxed ordering for minimal overhead.
/// Values may be slightly stale while other threads are searching the same
/// module, but a report taken after a search completes is accurate.
#[derive(Debug, Default)]
pub struct RewriteCounters {
    /// Equation applications during reduction (hooks included)
    pub equation_steps: AtomicU64,
    /// Rule applications during rewriting and search
    pub rule_steps: AtomicU64,
    /// Narrowing steps
    pub narrowing_steps: AtomicU64,
    /// Variant narrowing steps
    pub variant_steps: AtomicU64,
    /// Membership axioms that refined a sort
    pub membership_steps: AtomicU64,
    /// Strategy rule applications
    pub strategy_steps: AtomicU64,
}

impl RewriteCounters {
    /// Create a new collector with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_equation(&self) {
        self.equation_steps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rule(&self) {
        self.rule_steps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_narrowing(&self) {
        self.narrowing_steps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_variant(&self) {
        self.variant_steps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_membership(&self) {
        self.membership_steps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_strategy(&self) {
        self.strategy_steps.fetch_add(1, Ordering::Relaxed);
    }

    /// Generate a snapshot report of all counters.
    pub fn report(&self) -> CountersReport {
        CountersReport {
            equation_steps: self.equation_steps.load(Ordering::Relaxed),
            rule_steps: self.rule_steps.load(Ordering::Relaxed),
            narrowing_steps: self.narrowing_steps.load(Ordering::Relaxed),
            variant_steps: self.variant_steps.load(Ordering::Relaxed),
            membership_steps: self.membership_steps.load(Ordering::Relaxed),
            strategy_steps: self.strategy_steps.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.equation_steps.store(0, Ordering::Relaxed);
        self.rule_steps.store(0, Ordering::Relaxed);
        self.narrowing_steps.store(0, Ordering::Relaxed);
        self.variant_steps.store(0, Ordering::Relaxed);
        self.membership_steps.store(0, Ordering::Relaxed);
        self.strategy_steps.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of the counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersReport {
    pub equation_steps: u64,
    pub rule_steps: u64,
    pub narrowing_steps: u64,
    pub variant_steps: u64,
    pub membership_steps: u64,
    pub strategy_steps: u64,
}

impl CountersReport {
    /// Steps taken between `earlier` and this snapshot.
    pub fn since(&self, earlier: &CountersReport) -> CountersReport {
        CountersReport {
            equation_steps: self.equation_steps.saturating_sub(earlier.equation_steps),
            rule_steps: self.rule_steps.saturating_sub(earlier.rule_steps),
            narrowing_steps: self.narrowing_steps.saturating_sub(earlier.narrowing_steps),
            variant_steps: self.variant_steps.saturating_sub(earlier.variant_steps),
            membership_steps: self.membership_steps.saturating_sub(earlier.membership_steps),
            strategy_steps: self.strategy_steps.saturating_sub(earlier.strategy_steps),
        }
    }

    /// Equation and rule steps together, the count reported for `rewrite`.
    pub fn total(&self) -> u64 {
        self.equation_steps + self.rule_steps
    }
}

impl std::fmt::Display for CountersReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Rewrite Counters ===")?;
        writeln!(f, "Equations:   {}", self.equation_steps)?;
        writeln!(f, "Rules:       {}", self.rule_steps)?;
        writeln!(f, "Narrowing:   {}", self.narrowing_steps)?;
        writeln!(f, "Variants:    {}", self.variant_steps)?;
        writeln!(f, "Memberships: {}", self.membership_steps)?;
        write!(f, "Strategy:    {}", self.strategy_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let c = RewriteCounters::new();
        assert_eq!(c.report(), CountersReport::default());
    }

    #[test]
    fn since_subtracts_snapshots() {
        let c = RewriteCounters::new();
        c.record_equation();
        let before = c.report();
        c.record_equation();
        c.record_rule();
        c.record_rule();
        let spent = c.report().since(&before);
        assert_eq!(spent.equation_steps, 1);
        assert_eq!(spent.rule_steps, 2);
        assert_eq!(spent.total(), 3);
    }

    #[test]
    fn reset_clears_everything() {
        let c = RewriteCounters::new();
        c.record_narrowing();
        c.record_variant();
        c.record_membership();
        c.record_strategy();
        c.reset();
        assert_eq!(c.report(), CountersReport::default());
    }

    #[test]
    fn display_lists_each_counter() {
        let c = RewriteCounters::new();
        c.record_rule();
        let text = c.report().to_string();
        assert!(text.contains("Rules:       1"));
    }
}
