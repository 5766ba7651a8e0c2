// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-semver
//!
//! The SemVer resolver (`spec.md` §4.2, component C2): picks at most one
//! [`Version`] out of a candidate set given a range string, a default major,
//! and a pair of status-filter flags.

use capreg_core::{Version, VersionStatus};

/// Inputs to [`resolve`] beyond the candidate set itself.
#[derive(Debug, Clone)]
pub struct ResolveParams<'a> {
    /// Raw range string: empty, major-only (`"3"`), exact (`"1.2.3"`), or a
    /// caret/tilde/comparator expression (`"^3.2.0"`).
    pub range: &'a str,
    /// The environment's configured default major, if any.
    pub default_major: Option<u32>,
    /// Whether `deprecated` versions remain eligible once a single
    /// candidate must be chosen among ties (see [`resolve`]'s step 2/4).
    pub include_deprecated: bool,
    /// Whether `disabled` versions are excluded from consideration entirely.
    pub exclude_disabled: bool,
}

/// Resolve a single [`Version`] out of `candidates`, or `None` if nothing
/// matches. Mirrors `spec.md` §4.2's four-step algorithm exactly.
#[must_use]
pub fn resolve<'a>(candidates: &'a [Version], params: &ResolveParams<'_>) -> Option<&'a Version> {
    let pool: Vec<&Version> = if params.exclude_disabled {
        candidates
            .iter()
            .filter(|v| v.status != VersionStatus::Disabled)
            .collect()
    } else {
        candidates.iter().collect()
    };
    if pool.is_empty() {
        return None;
    }

    let range = params.range.trim();
    if range.is_empty() {
        return resolve_within_major(&pool, params.default_major, params.include_deprecated);
    }
    if let Ok(major) = range.parse::<u32>() {
        return resolve_within_major(&pool, Some(major), params.include_deprecated);
    }

    resolve_expression(&pool, range, params.include_deprecated)
}

/// Step 2/3: empty range or major-only range. Picks the target major (the
/// configured default, or else the highest major present), prefers stable
/// releases within it, sorts by `(minor desc, patch desc)`, then applies
/// the active-preferred tie-break.
fn resolve_within_major<'a>(
    pool: &[&'a Version],
    target_major: Option<u32>,
    include_deprecated: bool,
) -> Option<&'a Version> {
    let major = match target_major {
        Some(m) => m,
        None => unique_majors_desc(pool).into_iter().next()?,
    };

    let in_major: Vec<&Version> = pool.iter().copied().filter(|v| v.major == major).collect();
    if in_major.is_empty() {
        return None;
    }

    let stable: Vec<&Version> = in_major.iter().copied().filter(|v| v.is_stable()).collect();
    let working_set = if stable.is_empty() { in_major } else { stable };

    let mut sorted = working_set;
    sorted.sort_by(|a, b| b.minor.cmp(&a.minor).then(b.patch.cmp(&a.patch)));

    pick_active_preferred(&sorted, include_deprecated)
}

/// Step 4: a SemVer constraint expression. Falls back to an exact
/// `version_string` match if the expression fails to parse as a
/// `semver::VersionReq`.
fn resolve_expression<'a>(
    pool: &[&'a Version],
    range: &str,
    include_deprecated: bool,
) -> Option<&'a Version> {
    match semver::VersionReq::parse(range) {
        Ok(req) => {
            let mut satisfying: Vec<&Version> = pool
                .iter()
                .copied()
                .filter(|v| version_satisfies(v, &req))
                .collect();
            satisfying.sort_by(|a, b| compare_semver_precedence(b, a));
            pick_active_preferred(&satisfying, include_deprecated)
        }
        Err(_) => pool.iter().copied().find(|v| v.version_string == range),
    }
}

/// Whether `v` satisfies `req`, evaluated via `semver::Version`. Versions
/// with a prerelease label are matched against the base `major.minor.patch`
/// the way the caret/tilde grammar does, since `semver::VersionReq` by
/// default excludes prerelease matches unless the requirement itself names
/// one; the resolver is permissive here — status filtering, not prerelease
/// opt-in, is what gates eligibility in this registry.
fn version_satisfies(v: &Version, req: &semver::VersionReq) -> bool {
    let Some(sv) = to_semver(v) else {
        return false;
    };
    if req.matches(&sv) {
        return true;
    }
    // Retry against the stable-equivalent version so that a prerelease
    // candidate is not silently dropped purely because semver::VersionReq
    // treats prereleases as opt-in.
    if sv.pre.is_empty() {
        return false;
    }
    let stable_sv = semver::Version::new(sv.major, sv.minor, sv.patch);
    req.matches(&stable_sv)
}

fn to_semver(v: &Version) -> Option<semver::Version> {
    let mut sv = semver::Version::new(u64::from(v.major), u64::from(v.minor), u64::from(v.patch));
    if let Some(pre) = &v.prerelease {
        sv.pre = semver::Prerelease::new(pre).ok()?;
    }
    Some(sv)
}

/// Full SemVer precedence comparison (major, minor, patch, then
/// prerelease-before-stable), used for the descending sort in step 4.
fn compare_semver_precedence(a: &Version, b: &Version) -> std::cmp::Ordering {
    match (to_semver(a), to_semver(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a
            .major
            .cmp(&b.major)
            .then(a.minor.cmp(&b.minor))
            .then(a.patch.cmp(&b.patch)),
    }
}

/// Given a list already sorted in the caller's preferred precedence order
/// (highest first), return the first `active` candidate when
/// `!include_deprecated`, falling back to the very first candidate
/// otherwise — the active-preferred tie-break named in `spec.md` §4.2.
fn pick_active_preferred<'a>(
    sorted: &[&'a Version],
    include_deprecated: bool,
) -> Option<&'a Version> {
    if sorted.is_empty() {
        return None;
    }
    if !include_deprecated {
        if let Some(active) = sorted.iter().copied().find(|v| v.status == VersionStatus::Active) {
            return Some(active);
        }
    }
    sorted.first().copied()
}

/// `GetUniqueMajors`: the sorted-descending distinct majors present among
/// `candidates`.
#[must_use]
pub fn unique_majors(candidates: &[Version]) -> Vec<u32> {
    unique_majors_desc(&candidates.iter().collect::<Vec<_>>())
}

fn unique_majors_desc(pool: &[&Version]) -> Vec<u32> {
    let mut majors: Vec<u32> = pool.iter().map(|v| v.major).collect();
    majors.sort_unstable_by(|a, b| b.cmp(a));
    majors.dedup();
    majors
}
