// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-policy
//!
//! Tenant-rule allow/deny evaluation (`spec.md` §4.3.1 step 8). Operates on
//! the [`TenantRule`] rows a [`Repository`](../capreg_repo/trait.Repository.html)
//! implementation returns for a given capability and [`ResolutionContext`];
//! contains no I/O of its own, mirroring the teacher's `abp-policy` crate,
//! which evaluates a `PolicyProfile` against a single decision point and
//! returns a `Decision` rather than reaching back into storage itself.

use capreg_core::{ResolutionContext, RuleType, TenantRule};

/// The outcome of evaluating a tenant's rule set against a resolved major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the resolved major is permitted.
    pub allowed: bool,
    /// The denying rule's reason, present only when `allowed == false`.
    pub reason: Option<String>,
}

impl Decision {
    /// An unconditional allow.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// A denial carrying the rule's reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Evaluate `rules` (already filtered to one capability, priority ascending)
/// against `major` and the caller's `ctx`.
///
/// Rules are walked in the order given; the first denial wins. A rule whose
/// `required_features` names a feature absent from `ctx.features` is
/// skipped entirely, regardless of its `rule_type`. Absent any denying
/// rule, the major is allowed — including the case of an empty rule set.
#[must_use]
pub fn evaluate(rules: &[TenantRule], major: u32, ctx: &ResolutionContext) -> Decision {
    for rule in rules {
        if rule
            .required_features
            .iter()
            .any(|f| !ctx.features.iter().any(|have| have == f))
        {
            continue;
        }

        let denies = match rule.rule_type {
            RuleType::Deny => {
                rule.denied_majors.is_empty() || rule.denied_majors.contains(&major)
            }
            RuleType::Allow => {
                !rule.allowed_majors.is_empty() && !rule.allowed_majors.contains(&major)
            }
        };

        if denies {
            let reason = match rule.rule_type {
                RuleType::Deny if rule.denied_majors.is_empty() => {
                    format!("tenant rule {} denies all majors", rule.id)
                }
                RuleType::Deny => format!(
                    "tenant rule {} denies major {major}",
                    rule.id
                ),
                RuleType::Allow => format!(
                    "tenant rule {} does not allow major {major}",
                    rule.id
                ),
            };
            return Decision::deny(reason);
        }
    }

    Decision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(
        id: &str,
        rule_type: RuleType,
        allowed_majors: Vec<u32>,
        denied_majors: Vec<u32>,
        required_features: Vec<String>,
        priority: i64,
    ) -> TenantRule {
        TenantRule {
            id: id.to_string(),
            capability_id: "cap-1".into(),
            tenant_id: Some("acme".into()),
            env: None,
            aud: None,
            rule_type,
            allowed_majors,
            denied_majors,
            required_features,
            priority,
        }
    }

    fn ctx(features: Vec<&str>) -> ResolutionContext {
        ResolutionContext {
            tenant_id: Some("acme".into()),
            env: None,
            aud: None,
            features: features.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn empty_rules_allow() {
        let d = evaluate(&[], 3, &ctx(vec![]));
        assert!(d.allowed);
        assert!(d.reason.is_none());
    }

    #[test]
    fn deny_all_with_empty_denied_majors() {
        let rules = vec![rule("r1", RuleType::Deny, vec![], vec![], vec![], 0)];
        let d = evaluate(&rules, 3, &ctx(vec![]));
        assert!(!d.allowed);
        assert!(d.reason.unwrap().contains("denies all majors"));
    }

    #[test]
    fn deny_specific_major() {
        let rules = vec![rule("r1", RuleType::Deny, vec![], vec![3, 4], vec![], 0)];
        assert!(!evaluate(&rules, 3, &ctx(vec![])).allowed);
        assert!(evaluate(&rules, 2, &ctx(vec![])).allowed);
    }

    #[test]
    fn allow_rule_denies_majors_outside_allowed_set() {
        let rules = vec![rule("r1", RuleType::Allow, vec![1, 2], vec![], vec![], 0)];
        assert!(evaluate(&rules, 1, &ctx(vec![])).allowed);
        assert!(!evaluate(&rules, 3, &ctx(vec![])).allowed);
    }

    #[test]
    fn allow_rule_with_empty_allowed_majors_allows_everything() {
        let rules = vec![rule("r1", RuleType::Allow, vec![], vec![], vec![], 0)];
        assert!(evaluate(&rules, 99, &ctx(vec![])).allowed);
    }

    #[test]
    fn rule_skipped_when_required_feature_missing() {
        let rules = vec![rule(
            "r1",
            RuleType::Deny,
            vec![],
            vec![],
            vec!["beta".into()],
            0,
        )];
        assert!(evaluate(&rules, 3, &ctx(vec![])).allowed);
        assert!(!evaluate(&rules, 3, &ctx(vec!["beta"])).allowed);
    }

    #[test]
    fn first_denial_wins_in_priority_order() {
        let rules = vec![
            rule("r1", RuleType::Allow, vec![1, 2], vec![], vec![], 0),
            rule("r2", RuleType::Deny, vec![], vec![2], vec![], 1),
        ];
        // major 1: r1 allows it (no denial), r2's denied_majors doesn't include it -> allowed.
        assert!(evaluate(&rules, 1, &ctx(vec![])).allowed);
        // major 2: r1 allows it, but r2 denies it -> denied by r2.
        let d = evaluate(&rules, 2, &ctx(vec![]));
        assert!(!d.allowed);
        assert!(d.reason.unwrap().contains("r2"));
    }
}
