// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-capref
//!
//! Parses and validates capability references: `app.name`,
//! `app.name@range`, and `@alias/app.name[@range]` (`spec.md` §4.1,
//! component C1).

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors raised while parsing or validating a capability reference.
///
/// All of these map to the wire code `INVALID_ARGUMENT` at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapRefError {
    /// No `.` separates the `app` and `name` components.
    #[error("capability reference {0:?} has no '.' separating app and name")]
    MissingSeparator(String),
    /// The `app` or `name` component was empty.
    #[error("capability reference {0:?} has an empty app or name component")]
    EmptyComponent(String),
    /// `app` failed `^[a-z][a-z0-9-]*$`.
    #[error("invalid app {0:?}: must match ^[a-z][a-z0-9-]*$")]
    InvalidApp(String),
    /// `name` failed `^[A-Za-z][A-Za-z0-9._-]*$`.
    #[error("invalid name {0:?}: must match ^[A-Za-z][A-Za-z0-9._-]*$")]
    InvalidName(String),
}

/// A version-range expression attached to a capability reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RangeSpec {
    /// No range was specified.
    Empty,
    /// A bare major version, e.g. `"3"`.
    Major(u32),
    /// An exact `M.m.p[-pre][+build]` version string.
    Exact(String),
    /// A caret/tilde/comparator expression, passed verbatim to the resolver (C2).
    Expression(String),
}

impl RangeSpec {
    /// Classify a raw range string into a [`RangeSpec`], per `spec.md` §4.1's
    /// recognized forms. This never fails: anything that is not empty,
    /// major-only, or an exact version is classified as a generic
    /// [`RangeSpec::Expression`] and handed to C2 verbatim.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        if raw.is_empty() {
            return RangeSpec::Empty;
        }
        if major_only_re().is_match(raw) {
            // Safe: regex guarantees only ASCII digits.
            if let Ok(m) = raw.parse::<u32>() {
                return RangeSpec::Major(m);
            }
        }
        if exact_version_re().is_match(raw) {
            return RangeSpec::Exact(raw.to_string());
        }
        RangeSpec::Expression(raw.to_string())
    }

    /// Render back to the original wire representation.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            RangeSpec::Empty => String::new(),
            RangeSpec::Major(m) => m.to_string(),
            RangeSpec::Exact(s) | RangeSpec::Expression(s) => s.clone(),
        }
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A fully parsed capability reference, excluding any alias prefix (which is
/// extracted separately via [`extract_alias`] before this is parsed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapRef {
    /// Application/namespace component.
    pub app: String,
    /// Name component (may itself contain dots).
    pub name: String,
    /// The parsed range expression.
    pub range: RangeSpec,
}

fn app_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid app regex"))
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9._-]*$").expect("valid name regex"))
}

/// `true` iff `app` matches `^[a-z][a-z0-9-]*$` (`spec.md` §4.1).
///
/// Exposed standalone for callers validating an `app` component before it is
/// joined with a `name` into a full reference (`capreg-registry`'s `upsert`
/// validation, `spec.md` §4.3.4).
#[must_use]
pub fn validate_app(app: &str) -> bool {
    app_re().is_match(app)
}

/// `true` iff `name` matches `^[A-Za-z][A-Za-z0-9._-]*$` (`spec.md` §4.1).
///
/// Exposed standalone for the same reason as [`validate_app`]; also used to
/// validate method names, which share the same character class.
#[must_use]
pub fn validate_name(name: &str) -> bool {
    name_re().is_match(name)
}

fn major_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("valid major-only regex"))
}

fn exact_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+(-[\w.]+)?(\+[\w.]+)?$").expect("valid exact-version regex")
    })
}

/// Strip an optional leading `@alias/` prefix from a capability reference.
///
/// Alias extraction only fires when `input` begins with `@` *and* contains a
/// `/`: the alias is everything between `@` and the first `/`, and the
/// remainder is everything after it. A literal `@` with no `/` anywhere is
/// treated as alias-only with an empty capability remainder (`spec.md` §9) —
/// callers should route that case to the federation path (if the alias
/// differs from the registry's default) rather than eagerly raising a parse
/// error, since a downstream registry is expected to report `NOT_FOUND`.
///
/// Returns `(None, input)` unchanged when `input` does not start with `@`.
#[must_use]
pub fn extract_alias(input: &str) -> (Option<String>, &str) {
    let Some(after_at) = input.strip_prefix('@') else {
        return (None, input);
    };
    match after_at.find('/') {
        Some(idx) => (
            Some(after_at[..idx].to_string()),
            &after_at[idx + 1..],
        ),
        None => (Some(after_at.to_string()), ""),
    }
}

/// Parse a capability reference *excluding* any alias prefix (call
/// [`extract_alias`] first if the original input might carry one).
///
/// # Errors
///
/// Returns [`CapRefError`] if no `.` separates `app` from `name`, either
/// component is empty, or either component fails its validation regex.
pub fn parse(remainder: &str) -> Result<CapRef, CapRefError> {
    let (full, range_raw) = match remainder.find('@') {
        Some(idx) => (&remainder[..idx], &remainder[idx + 1..]),
        None => (remainder, ""),
    };

    let dot_idx = full
        .find('.')
        .ok_or_else(|| CapRefError::MissingSeparator(remainder.to_string()))?;
    let app = &full[..dot_idx];
    let name = &full[dot_idx + 1..];

    if app.is_empty() || name.is_empty() {
        return Err(CapRefError::EmptyComponent(remainder.to_string()));
    }
    if !app_re().is_match(app) {
        return Err(CapRefError::InvalidApp(app.to_string()));
    }
    if !name_re().is_match(name) {
        return Err(CapRefError::InvalidName(name.to_string()));
    }

    Ok(CapRef {
        app: app.to_string(),
        name: name.to_string(),
        range: RangeSpec::classify(range_raw),
    })
}

/// Parse a full capability reference, including an optional `@alias/` prefix.
///
/// Returns `(alias, CapRef)`. This is the convenience entry point for
/// callers that do not need to special-case federation before parsing; the
/// registry core instead calls [`extract_alias`] and [`parse`] separately so
/// it can route to the federation pool *before* the stricter app/name
/// validation in [`parse`] runs (`spec.md` §4.3.1 step 1 vs step 2).
///
/// # Errors
///
/// Returns [`CapRefError`] under the same conditions as [`parse`].
pub fn parse_full(input: &str) -> Result<(Option<String>, CapRef), CapRefError> {
    let (alias, remainder) = extract_alias(input);
    let cap_ref = parse(remainder)?;
    Ok((alias, cap_ref))
}

/// Render a capability reference back to wire form:
/// `[@alias/]app.name[@range]`.
#[must_use]
pub fn build(alias: Option<&str>, app: &str, name: &str, range: &RangeSpec) -> String {
    let mut out = String::new();
    if let Some(alias) = alias {
        out.push('@');
        out.push_str(alias);
        out.push('/');
    }
    out.push_str(app);
    out.push('.');
    out.push_str(name);
    let rendered_range = range.render();
    if !rendered_range.is_empty() {
        out.push('@');
        out.push_str(&rendered_range);
    }
    out
}
