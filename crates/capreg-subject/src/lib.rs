// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! capreg-subject
//!
//! The capability subject builder (`spec.md` §4.3.1, §6, §4.9 component C11):
//! a single deterministic, pure function turning `(prefix, app, name, major)`
//! into the bus subject clients send `resolve`d requests to.

/// Build `"{prefix}.{app}.{safe_name}.v{major}"`, where `safe_name` replaces
/// every `.` in `name` with `_`.
///
/// This is a pure function: the same inputs always produce the same
/// subject, and the dots→underscores normalization means any two `name`s
/// that differ only by a dot/underscore swap collide onto the same subject
/// (`spec.md` §8's subject-builder purity property).
#[must_use]
pub fn build_subject(prefix: &str, app: &str, name: &str, major: u32) -> String {
    let safe_name = name.replace('.', "_");
    format!("{prefix}.{app}.{safe_name}.v{major}")
}

/// Build the canonical identity string `"cap:@{alias}/{app}/{name}@{version}"`
/// (`spec.md` §4.3.1, §6).
#[must_use]
pub fn canonical_identity(alias: &str, app: &str, name: &str, version: &str) -> String {
    format!("cap:@{alias}/{app}/{name}@{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_subject() {
        assert_eq!(
            build_subject("cap", "intg", "resolve_cap", 1),
            "cap.intg.resolve_cap.v1"
        );
    }

    #[test]
    fn dots_in_name_become_underscores() {
        assert_eq!(
            build_subject("cap", "intg", "resolve.cap", 1),
            "cap.intg.resolve_cap.v1"
        );
    }

    #[test]
    fn purity_under_dots_underscores_round_trip() {
        // spec.md §8: build(app, name, major) == build(app, name.replace('.','_').replace('_','.'), major)
        for name in ["foo.bar", "foo_bar", "a.b.c", "plain"] {
            let round_tripped = name.replace('.', "_").replace('_', ".");
            assert_eq!(
                build_subject("cap", "app", name, 2),
                build_subject("cap", "app", &round_tripped, 2),
                "mismatch for name {name:?}"
            );
        }
    }

    #[test]
    fn canonical_identity_format() {
        assert_eq!(
            canonical_identity("main", "intg", "resolve.cap", "1.0.0"),
            "cap:@main/intg/resolve.cap@1.0.0"
        );
    }
}
