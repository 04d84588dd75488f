//! Feasibility checking of nodes against a job and task group.
//!
//! Checkers answer "can this node run it at all" for a single node. The
//! `FeasibilityWrapper` runs them behind the evaluation's eligibility cache,
//! so that once one node of a computed class has been judged, the rest of
//! the class is judged the same way without re-running the checkers.
//! Escaped units are always checked node by node.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use corral_core::AttributeTarget;
use corral_state::{AllocationSource, Constraint, Job, Node, TaskGroup};

use crate::class::ComputedClass;
use crate::context::{EvalContext, MatchCache, parse_version};
use crate::eligibility::ClassEligibility;

/// A single feasibility test against one node.
pub trait FeasibilityChecker: Send + Sync {
    /// `None` if the node passes, otherwise a short reason for metrics.
    fn check(&self, node: &Node, cache: &mut MatchCache) -> Option<String>;
}

/// Requires every constraint to hold on the node.
#[derive(Debug, Clone, Default)]
pub struct ConstraintChecker {
    constraints: Vec<Constraint>,
}

impl ConstraintChecker {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }
}

impl FeasibilityChecker for ConstraintChecker {
    fn check(&self, node: &Node, cache: &mut MatchCache) -> Option<String> {
        self.constraints
            .iter()
            .find(|c| !meets_constraint(c, node, cache))
            .map(|c| c.to_string())
    }
}

/// Whether `constraint` holds on `node`. Unresolvable targets fail.
pub fn meets_constraint(constraint: &Constraint, node: &Node, cache: &mut MatchCache) -> bool {
    let Some(lval) = resolve_target(&constraint.l_target, node) else {
        trace!(constraint_target = %constraint.l_target, node_id = %node.id, "unresolved constraint target");
        return false;
    };
    let Some(rval) = resolve_target(&constraint.r_target, node) else {
        trace!(constraint_target = %constraint.r_target, node_id = %node.id, "unresolved constraint target");
        return false;
    };
    check_operand(&constraint.operand, lval, rval, cache)
}

/// Resolve a constraint target to its value on `node`.
fn resolve_target<'a>(target: &'a str, node: &'a Node) -> Option<&'a str> {
    match AttributeTarget::parse(target) {
        AttributeTarget::Literal(value) => Some(value),
        AttributeTarget::Attr(key) => node.attributes.get(key).map(String::as_str),
        AttributeTarget::Meta(key) => node.meta.get(key).map(String::as_str),
        AttributeTarget::Node(field) => match field {
            "unique.id" => Some(node.id.as_str()),
            "unique.name" => Some(node.name.as_str()),
            "datacenter" => Some(node.datacenter.as_str()),
            "class" => Some(node.node_class.as_str()),
            _ => None,
        },
        AttributeTarget::Unresolved(_) => None,
    }
}

fn check_operand(operand: &str, lval: &str, rval: &str, cache: &mut MatchCache) -> bool {
    match operand {
        "=" | "==" | "is" => lval == rval,
        "!=" | "not" => lval != rval,
        "<" => lval < rval,
        "<=" => lval <= rval,
        ">" => lval > rval,
        ">=" => lval >= rval,
        "version" => {
            let Some(version) = parse_version(lval) else {
                return false;
            };
            cache
                .version_req(rval)
                .is_some_and(|req| req.matches(&version))
        }
        "regexp" => cache.regex(rval).is_some_and(|re| re.is_match(lval)),
        _ => {
            debug!(%operand, "unknown constraint operand");
            false
        }
    }
}

/// Requires every task's driver to be present on the node.
///
/// Drivers advertise themselves as a truthy `driver.<name>` attribute.
#[derive(Debug, Clone, Default)]
pub struct DriverChecker {
    drivers: BTreeSet<String>,
}

impl DriverChecker {
    pub fn new(drivers: impl IntoIterator<Item = String>) -> Self {
        Self {
            drivers: drivers.into_iter().collect(),
        }
    }
}

impl FeasibilityChecker for DriverChecker {
    fn check(&self, node: &Node, _cache: &mut MatchCache) -> Option<String> {
        let missing = self.drivers.iter().find(|driver| {
            let enabled = node
                .attributes
                .get(&format!("driver.{driver}"))
                .map(|v| matches!(v.as_str(), "1" | "true" | "True" | "TRUE"));
            enabled != Some(true)
        })?;
        Some(format!("missing driver {missing}"))
    }
}

/// Runs job and task group checkers behind the eligibility cache.
pub struct FeasibilityWrapper {
    task_group: String,
    job_checkers: Vec<Box<dyn FeasibilityChecker>>,
    tg_checkers: Vec<Box<dyn FeasibilityChecker>>,
}

impl FeasibilityWrapper {
    pub fn new(
        task_group: &str,
        job_checkers: Vec<Box<dyn FeasibilityChecker>>,
        tg_checkers: Vec<Box<dyn FeasibilityChecker>>,
    ) -> Self {
        Self {
            task_group: task_group.to_string(),
            job_checkers,
            tg_checkers,
        }
    }

    /// The standard checkers for placing `tg` of `job`: job constraints at
    /// job level; drivers plus group and task constraints at group level.
    pub fn for_task_group(job: &Job, tg: &TaskGroup) -> Self {
        let tg_constraints: Vec<Constraint> = tg
            .constraints
            .iter()
            .chain(tg.tasks.iter().flat_map(|t| t.constraints.iter()))
            .cloned()
            .collect();
        let drivers = tg.tasks.iter().map(|t| t.driver.clone());

        let job_constraints: Box<dyn FeasibilityChecker> =
            Box::new(ConstraintChecker::new(job.constraints.clone()));
        let tg_drivers: Box<dyn FeasibilityChecker> = Box::new(DriverChecker::new(drivers));
        let tg_constraints: Box<dyn FeasibilityChecker> =
            Box::new(ConstraintChecker::new(tg_constraints));

        Self::new(&tg.name, vec![job_constraints], vec![tg_drivers, tg_constraints])
    }

    pub fn task_group(&self) -> &str {
        &self.task_group
    }

    /// Whether the job and task group may run on `node`.
    ///
    /// Reads and fills the class cache unless the unit escaped or the node
    /// has no computed class. Rejections are recorded in the context metrics.
    pub fn feasible<S: AllocationSource>(&self, ctx: &mut EvalContext<S>, node: &Node) -> bool {
        let class = ComputedClass::of(node);
        ctx.metrics_mut().evaluate_node();

        let job_status = if ctx.eligibility().job_escaped() {
            ClassEligibility::Escaped
        } else {
            ctx.eligibility().job_status(class)
        };
        match job_status {
            ClassEligibility::Ineligible => {
                ctx.metrics_mut().filter_node(node, "computed class ineligible");
                return false;
            }
            ClassEligibility::Eligible => {}
            ClassEligibility::Unknown | ClassEligibility::Escaped => {
                let rejection = run_checkers(&self.job_checkers, node, ctx.match_cache_mut());
                if job_status == ClassEligibility::Unknown {
                    ctx.eligibility_mut()
                        .set_job_eligibility(rejection.is_none(), class);
                }
                if let Some(reason) = rejection {
                    ctx.metrics_mut().filter_node(node, &reason);
                    return false;
                }
            }
        }

        let tg_status = if ctx.eligibility().task_group_escaped(&self.task_group) {
            ClassEligibility::Escaped
        } else {
            ctx.eligibility().task_group_status(&self.task_group, class)
        };
        match tg_status {
            ClassEligibility::Ineligible => {
                ctx.metrics_mut().filter_node(node, "computed class ineligible");
                false
            }
            ClassEligibility::Eligible => true,
            ClassEligibility::Unknown | ClassEligibility::Escaped => {
                let rejection = run_checkers(&self.tg_checkers, node, ctx.match_cache_mut());
                if tg_status == ClassEligibility::Unknown {
                    ctx.eligibility_mut().set_task_group_eligibility(
                        rejection.is_none(),
                        &self.task_group,
                        class,
                    );
                }
                match rejection {
                    Some(reason) => {
                        ctx.metrics_mut().filter_node(node, &reason);
                        false
                    }
                    None => true,
                }
            }
        }
    }

    /// The subset of `nodes` that pass, in order.
    pub fn filter<'n, S: AllocationSource>(
        &self,
        ctx: &mut EvalContext<S>,
        nodes: &'n [Node],
    ) -> Vec<&'n Node> {
        nodes.iter().filter(|node| self.feasible(ctx, node)).collect()
    }
}

fn run_checkers(
    checkers: &[Box<dyn FeasibilityChecker>],
    node: &Node,
    cache: &mut MatchCache,
) -> Option<String> {
    checkers.iter().find_map(|checker| checker.check(node, cache))
}
