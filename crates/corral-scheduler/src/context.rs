//! Evaluation context: the scheduler loop's view of one evaluation.
//!
//! The `EvalContext` is owned by the single worker processing an
//! evaluation. It holds:
//! - A read handle on durable state (`AllocationSource`)
//! - The plan being built, which grows as placements are decided
//! - The eligibility cache for the job under evaluation
//! - Per-placement metrics and compiled constraint operands
//!
//! It is discarded when the evaluation ends; nothing in it outlives that.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use semver::{Version, VersionReq};
use tracing::{Span, debug, warn};

use corral_state::{Allocation, AllocationSource};

use crate::eligibility::EvalEligibility;
use crate::error::{EvalError, EvalResult};
use crate::metrics::AllocMetric;
use crate::plan::Plan;

/// Compiled regexes and version requirements, keyed by their source text.
///
/// Failed compilations are cached too, so a bad operand is parsed once.
#[derive(Debug, Default)]
pub struct MatchCache {
    regexes: HashMap<String, Option<Regex>>,
    versions: HashMap<String, Option<VersionReq>>,
}

impl MatchCache {
    pub fn regex(&mut self, pattern: &str) -> Option<&Regex> {
        self.regexes
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(pattern).ok())
            .as_ref()
    }

    pub fn version_req(&mut self, requirement: &str) -> Option<&VersionReq> {
        self.versions
            .entry(requirement.to_string())
            .or_insert_with(|| VersionReq::parse(requirement).ok())
            .as_ref()
    }
}

/// Parse a version, padding a missing minor or patch component with zeros.
pub(crate) fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }
    let (core, rest) = match raw.find(['-', '+']) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// State for one evaluation of one job.
pub struct EvalContext<S> {
    state: S,
    plan: Plan,
    span: Span,
    eligibility: EvalEligibility,
    metrics: AllocMetric,
    match_cache: MatchCache,
}

impl<S: AllocationSource> EvalContext<S> {
    /// Create a context over durable `state` and a (usually empty) `plan`.
    ///
    /// Log lines emitted through the context are recorded inside `span`.
    pub fn new(state: S, plan: Plan, span: Span) -> Self {
        Self {
            state,
            plan,
            span,
            eligibility: EvalEligibility::new(),
            metrics: AllocMetric::default(),
            match_cache: MatchCache::default(),
        }
    }

    /// Replace the eligibility cache, e.g. with one using a configured registry.
    pub fn with_eligibility(mut self, eligibility: EvalEligibility) -> Self {
        self.eligibility = eligibility;
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut Plan {
        &mut self.plan
    }

    /// Hand the finished plan to the committer, discarding everything else.
    pub fn into_plan(self) -> Plan {
        self.plan
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn eligibility(&self) -> &EvalEligibility {
        &self.eligibility
    }

    pub fn eligibility_mut(&mut self) -> &mut EvalEligibility {
        &mut self.eligibility
    }

    pub fn metrics(&self) -> &AllocMetric {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut AllocMetric {
        &mut self.metrics
    }

    pub fn match_cache_mut(&mut self) -> &mut MatchCache {
        &mut self.match_cache
    }

    /// Start a fresh placement attempt. The plan and eligibility survive.
    pub fn reset(&mut self) {
        self.metrics = AllocMetric::default();
    }

    /// The allocations that would be live on `node_id` once the plan commits.
    ///
    /// Reads the durable set, drops terminal allocations and those the plan
    /// evicts, then adds the plan's placements. The overlay is recomputed
    /// from a fresh read on every call. Storage errors are returned as-is.
    pub fn proposed_allocs(&self, node_id: &str) -> EvalResult<Vec<Allocation>> {
        let _enter = self.span.enter();

        let existing = self.state.allocs_by_node(node_id).map_err(|err| {
            warn!(%node_id, error = %err, "failed to read allocations for node");
            EvalError::Storage(err)
        })?;

        let evicted: HashSet<&str> = self
            .plan
            .updates_for(node_id)
            .iter()
            .map(|a| a.id.as_str())
            .collect();

        let mut proposed: Vec<Allocation> = existing
            .into_iter()
            .filter(|a| !a.is_terminal() && !evicted.contains(a.id.as_str()))
            .collect();
        let placed = self.plan.allocs_for(node_id);
        proposed.extend(placed.iter().cloned());

        debug!(
            %node_id,
            evicted = evicted.len(),
            placed = placed.len(),
            proposed = proposed.len(),
            "computed proposed allocations"
        );
        Ok(proposed)
    }
}
