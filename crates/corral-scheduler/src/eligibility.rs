//! Per-evaluation eligibility cache keyed by computed node class.
//!
//! Once a job (or task group) has been checked against one node of a class,
//! the answer is recorded here so that the remaining nodes of that class can
//! be accepted or skipped without running constraint matching again. Units
//! with escaping constraints must bypass the cache; `set_job` records which.

use std::collections::HashMap;

use tracing::{debug, warn};

use corral_state::Job;

use crate::class::ComputedClass;
use crate::escape::EscapeAnalyzer;

/// Eligibility of a job or task group for a computed class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassEligibility {
    /// Not yet computed for this class in this evaluation.
    Unknown,
    Eligible,
    Ineligible,
    /// The class cannot be trusted; check the node directly.
    Escaped,
}

impl ClassEligibility {
    fn from_bool(eligible: bool) -> Self {
        if eligible {
            ClassEligibility::Eligible
        } else {
            ClassEligibility::Ineligible
        }
    }
}

/// Eligibility state for one job within one evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvalEligibility {
    analyzer: EscapeAnalyzer,
    job: HashMap<ComputedClass, ClassEligibility>,
    job_escaped: bool,
    task_groups: HashMap<String, HashMap<ComputedClass, ClassEligibility>>,
    tg_escaped: HashMap<String, bool>,
}

impl EvalEligibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache whose escape decisions use a configured registry.
    pub fn with_analyzer(analyzer: EscapeAnalyzer) -> Self {
        Self {
            analyzer,
            ..Self::default()
        }
    }

    /// Register the job being evaluated and derive its escape flags.
    ///
    /// Job-level constraints escape the whole job. A task group escapes when
    /// its own constraints or those of any of its tasks escape; that does
    /// not escape the job or sibling groups.
    pub fn set_job(&mut self, job: &Job) {
        self.job_escaped = self.analyzer.constraints_escape(&job.constraints);

        self.tg_escaped.clear();
        for tg in &job.task_groups {
            let escaped = self.analyzer.constraints_escape(&tg.constraints)
                || tg
                    .tasks
                    .iter()
                    .any(|task| self.analyzer.constraints_escape(&task.constraints));
            self.tg_escaped.insert(tg.name.clone(), escaped);
        }

        debug!(
            job_id = %job.id,
            job_escaped = self.job_escaped,
            escaped_groups = self.tg_escaped.values().filter(|e| **e).count(),
            "eligibility registered job"
        );
    }

    /// Whether the job or any of its task groups escaped class caching.
    pub fn has_escaped(&self) -> bool {
        self.job_escaped || self.tg_escaped.values().any(|escaped| *escaped)
    }

    /// Whether job-level constraints escaped.
    pub fn job_escaped(&self) -> bool {
        self.job_escaped
    }

    /// Whether the named task group escaped. Unknown groups report `false`.
    pub fn task_group_escaped(&self, tg: &str) -> bool {
        self.tg_escaped.get(tg).copied().unwrap_or(false)
    }

    /// Job eligibility for `class`.
    pub fn job_status(&self, class: ComputedClass) -> ClassEligibility {
        if class.is_none() {
            return ClassEligibility::Escaped;
        }
        self.job
            .get(&class)
            .copied()
            .unwrap_or(ClassEligibility::Unknown)
    }

    /// Record job eligibility for `class`. Later calls overwrite.
    pub fn set_job_eligibility(&mut self, eligible: bool, class: ComputedClass) {
        if class.is_none() {
            warn!(eligible, "ignoring job eligibility for node without a computed class");
            return;
        }
        self.job.insert(class, ClassEligibility::from_bool(eligible));
    }

    /// Task group eligibility for `class`.
    pub fn task_group_status(&self, tg: &str, class: ComputedClass) -> ClassEligibility {
        if class.is_none() {
            return ClassEligibility::Escaped;
        }
        self.task_groups
            .get(tg)
            .and_then(|classes| classes.get(&class))
            .copied()
            .unwrap_or(ClassEligibility::Unknown)
    }

    /// Record task group eligibility for `class`. Later calls overwrite.
    pub fn set_task_group_eligibility(&mut self, eligible: bool, tg: &str, class: ComputedClass) {
        if class.is_none() {
            warn!(
                eligible,
                task_group = tg,
                "ignoring task group eligibility for node without a computed class"
            );
            return;
        }
        self.task_groups
            .entry(tg.to_string())
            .or_default()
            .insert(class, ClassEligibility::from_bool(eligible));
    }

    /// Classes with a recorded job-level answer.
    pub fn job_eligibility_snapshot(&self) -> HashMap<ComputedClass, bool> {
        self.job
            .iter()
            .map(|(class, status)| (*class, *status == ClassEligibility::Eligible))
            .collect()
    }

    /// Classes with a recorded answer, per task group.
    pub fn task_group_eligibility_snapshot(&self) -> HashMap<String, HashMap<ComputedClass, bool>> {
        self.task_groups
            .iter()
            .map(|(tg, classes)| {
                let classes = classes
                    .iter()
                    .map(|(class, status)| (*class, *status == ClassEligibility::Eligible))
                    .collect();
                (tg.clone(), classes)
            })
            .collect()
    }
}
