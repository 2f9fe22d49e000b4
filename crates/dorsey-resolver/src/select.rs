use semver::{Version, VersionReq};

/// Parses registry version keys, silently dropping ones that are not valid
/// semantic versions.
pub fn parse_versions<S: AsRef<str>>(raw: &[S]) -> Vec<Version> {
    raw.iter()
        .filter_map(|value| Version::parse(value.as_ref().trim()).ok())
        .collect()
}

/// Highest published version by semver ordering, pre-releases included.
pub fn select_latest(candidates: &[Version]) -> Option<&Version> {
    candidates.iter().max()
}

pub fn select_highest_matching<'a>(
    candidates: &'a [Version],
    requirement: &VersionReq,
) -> Option<&'a Version> {
    candidates
        .iter()
        .filter(|version| requirement.matches(version))
        .max()
}

/// Highest version caret-compatible with `base` (`^base`).
pub fn select_highest_compatible<'a>(
    candidates: &'a [Version],
    base: &Version,
) -> Option<&'a Version> {
    let requirement = caret_requirement(base);
    select_highest_matching(candidates, &requirement)
}

fn caret_requirement(base: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![semver::Comparator {
            op: semver::Op::Caret,
            major: base.major,
            minor: Some(base.minor),
            patch: Some(base.patch),
            pre: base.pre.clone(),
        }],
    }
}
