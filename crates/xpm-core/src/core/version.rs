use crate::core::error::{XpmError, XpmResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Version constraint types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version: "*"
    Any,
    /// Exact version: "1.2.3", "=1.2.3"
    Exact(Version),
    /// Not equal: "!=1.2.3"
    NotEqual(Version),
    /// Greater than: ">1.2.3"
    Greater(Version),
    /// Greater than or equal: ">=1.2.3"
    GreaterOrEqual(Version),
    /// Less than: "<2.0.0"
    LessThan(Version),
    /// Less than or equal: "<=2.0.0"
    LessOrEqual(Version),
    /// Caret: "^1.2.3" (>=1.2.3 <2.0.0, leftmost non-zero component is fixed)
    Compatible(Version),
    /// Tilde: "~1.2" (>=1.2 <2.0) or "~1.2.3" (>=1.2.3 <1.3.0)
    Tilde { version: Version, parts: usize },
    /// Wildcard: "1.*", "1.2.*", "1.2.x"
    Wildcard { major: u64, minor: Option<u64> },
    /// All of the given constraints (AND semantics)
    All(Vec<VersionConstraint>),
    /// Any of the given constraints (OR semantics)
    AnyOf(Vec<VersionConstraint>),
}

/// Serialized as its string form so lock and state files stay readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Pre-release version (e.g., "alpha.1", "beta.2", "rc.1")
    pub prerelease: Option<String>,
    /// Build metadata (e.g., "build.123")
    pub build_metadata: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build_metadata: None,
        }
    }

    /// Parse a version string ("1", "1.2", "1.2.3", "v1.2.3-rc.1+build.5")
    pub fn parse(s: &str) -> XpmResult<Self> {
        Self::parse_with_parts(s).map(|(version, _)| version)
    }

    /// Parse a version and report how many numeric components were written.
    fn parse_with_parts(s: &str) -> XpmResult<(Self, usize)> {
        let trimmed = s.trim();
        let s = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        if s.is_empty() {
            return Err(XpmError::Version("Empty version string".to_string()));
        }

        let (rest, build_metadata) = match s.split_once('+') {
            Some((rest, build)) if !build.is_empty() => (rest, Some(build.to_string())),
            Some(_) => {
                return Err(XpmError::Version(format!(
                    "Invalid build metadata in '{}'",
                    trimmed
                )))
            }
            None => (s, None),
        };

        let (numbers, prerelease) = match rest.split_once('-') {
            Some((numbers, pre)) if !pre.is_empty() => (numbers, Some(pre.to_string())),
            Some(_) => {
                return Err(XpmError::Version(format!(
                    "Invalid pre-release in '{}'",
                    trimmed
                )))
            }
            None => (rest, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() > 3 {
            return Err(XpmError::Version(format!(
                "Too many version components in '{}'",
                trimmed
            )));
        }

        let mut components = [0u64; 3];
        for (slot, part) in components.iter_mut().zip(parts.iter()) {
            *slot = part
                .parse()
                .map_err(|_| XpmError::Version(format!("Invalid version: {}", trimmed)))?;
        }

        Ok((
            Self {
                major: components[0],
                minor: components[1],
                patch: components[2],
                prerelease,
                build_metadata,
            },
            parts.len(),
        ))
    }

    /// Check if this version satisfies a constraint
    pub fn satisfies(&self, constraint: &VersionConstraint) -> bool {
        match constraint {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => self == v,
            VersionConstraint::NotEqual(v) => self != v,
            VersionConstraint::Greater(v) => self > v,
            VersionConstraint::GreaterOrEqual(v) => self >= v,
            VersionConstraint::LessThan(v) => self < v,
            VersionConstraint::LessOrEqual(v) => self <= v,
            VersionConstraint::Compatible(v) => self >= v && *self < caret_upper_bound(v),
            VersionConstraint::Tilde { version, parts } => {
                self >= version && *self < tilde_upper_bound(version, *parts)
            }
            VersionConstraint::Wildcard { major, minor } => {
                self.major == *major && minor.map_or(true, |m| self.minor == m)
            }
            VersionConstraint::All(constraints) => constraints.iter().all(|c| self.satisfies(c)),
            VersionConstraint::AnyOf(constraints) => constraints.iter().any(|c| self.satisfies(c)),
        }
    }
}

impl TryFrom<String> for Version {
    type Error = XpmError;

    fn try_from(value: String) -> XpmResult<Self> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

fn caret_upper_bound(v: &Version) -> Version {
    if v.major > 0 {
        Version::new(v.major.saturating_add(1), 0, 0)
    } else if v.minor > 0 {
        Version::new(0, v.minor.saturating_add(1), 0)
    } else {
        Version::new(0, 0, v.patch.saturating_add(1))
    }
}

fn tilde_upper_bound(v: &Version, parts: usize) -> Version {
    match parts {
        0 | 1 | 2 => Version::new(v.major.saturating_add(1), 0, 0),
        _ => Version::new(v.major, v.minor.saturating_add(1), 0),
    }
}

// Build metadata does not take part in equality or precedence
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.major == other.major
            && self.minor == other.minor
            && self.patch == other.patch
            && self.prerelease == other.prerelease
    }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch)) {
            Ordering::Equal => match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease_identifiers(a, b),
            },
            other => other,
        }
    }
}

/// Compare pre-release identifiers according to SemVer precedence rules
fn compare_prerelease_identifiers(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();

    for (a_part, b_part) in a_parts.iter().zip(b_parts.iter()) {
        let ordering = match (a_part.parse::<u64>(), b_part.parse::<u64>()) {
            (Ok(a_num), Ok(b_num)) => a_num.cmp(&b_num),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a_part.cmp(b_part),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a_parts.len().cmp(&b_parts.len())
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build_metadata {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// Normalized rendering, used for lock fingerprints and diagnostics.
impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "={}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!={}", v),
            VersionConstraint::Greater(v) => write!(f, ">{}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionConstraint::LessThan(v) => write!(f, "<{}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<={}", v),
            VersionConstraint::Compatible(v) => write!(f, "^{}", v),
            VersionConstraint::Tilde { version, parts } => match parts {
                0 | 1 | 2 => write!(f, "~{}.{}", version.major, version.minor),
                _ => write!(f, "~{}", version),
            },
            VersionConstraint::Wildcard { major, minor } => match minor {
                Some(minor) => write!(f, "{}.{}.*", major, minor),
                None => write!(f, "{}.*", major),
            },
            VersionConstraint::All(constraints) => {
                let parts: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            VersionConstraint::AnyOf(constraints) => {
                let parts: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" || "))
            }
        }
    }
}

const OPERATORS: [&str; 9] = [">=", "<=", "!=", "==", ">", "<", "=", "^", "~"];

/// Parse a single comparator ("^1.2", ">=1.0", "1.2.*", "*", "1.0")
pub fn parse_constraint(s: &str) -> XpmResult<VersionConstraint> {
    let s = s.trim();

    if s.is_empty() {
        return Err(XpmError::Version("Empty version constraint".to_string()));
    }
    if s == "*" {
        return Ok(VersionConstraint::Any);
    }

    if let Some(rest) = s.strip_prefix(">=") {
        Ok(VersionConstraint::GreaterOrEqual(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix("<=") {
        Ok(VersionConstraint::LessOrEqual(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix("!=") {
        Ok(VersionConstraint::NotEqual(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix("==") {
        Ok(VersionConstraint::Exact(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix('>') {
        Ok(VersionConstraint::Greater(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix('<') {
        Ok(VersionConstraint::LessThan(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix('=') {
        Ok(VersionConstraint::Exact(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix('^') {
        Ok(VersionConstraint::Compatible(Version::parse(rest)?))
    } else if let Some(rest) = s.strip_prefix('~') {
        let (version, parts) = Version::parse_with_parts(rest)?;
        Ok(VersionConstraint::Tilde { version, parts })
    } else if let Some(base) = s.strip_suffix(".*").or_else(|| s.strip_suffix(".x")) {
        parse_wildcard(base, s)
    } else {
        Ok(VersionConstraint::Exact(Version::parse(s)?))
    }
}

fn parse_wildcard(base: &str, original: &str) -> XpmResult<VersionConstraint> {
    let invalid = || XpmError::Version(format!("Invalid wildcard constraint: {}", original));
    let base = base.trim().trim_start_matches('v');
    let parts: Vec<&str> = base.split('.').collect();
    match parts.as_slice() {
        [major] => Ok(VersionConstraint::Wildcard {
            major: major.parse().map_err(|_| invalid())?,
            minor: None,
        }),
        [major, minor] => Ok(VersionConstraint::Wildcard {
            major: major.parse().map_err(|_| invalid())?,
            minor: Some(minor.parse().map_err(|_| invalid())?),
        }),
        _ => Err(invalid()),
    }
}

/// Parse a full constraint expression.
///
/// Comparators separated by `,` or whitespace must all hold; alternatives
/// separated by `||` (or `|`) are OR-ed.
///
/// Examples: `1.0`, `>=1.0,<2.0`, `>=1.0 <2.0`, `^1.2 || ^2.0`, `1.2.*`
pub fn parse_compound_constraint(s: &str) -> XpmResult<VersionConstraint> {
    let s = s.trim();
    if s.is_empty() {
        return Err(XpmError::Version("Empty version constraint".to_string()));
    }

    let normalized = s.replace("||", "|");
    let mut alternatives = Vec::new();
    for alternative in normalized.split('|') {
        alternatives.push(parse_conjunction(alternative, s)?);
    }

    Ok(if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        VersionConstraint::AnyOf(alternatives)
    })
}

fn parse_conjunction(part: &str, original: &str) -> XpmResult<VersionConstraint> {
    let mut comparators = Vec::new();
    let mut pending_operator: Option<&str> = None;

    for token in part
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        if OPERATORS.contains(&token) {
            if pending_operator.is_some() {
                return Err(XpmError::Version(format!(
                    "Dangling operator in constraint: {}",
                    original
                )));
            }
            pending_operator = Some(token);
            continue;
        }

        let comparator = match pending_operator.take() {
            Some(op) => parse_constraint(&format!("{}{}", op, token))?,
            None => parse_constraint(token)?,
        };
        comparators.push(comparator);
    }

    if pending_operator.is_some() || comparators.is_empty() {
        return Err(XpmError::Version(format!(
            "Incomplete constraint: {}",
            original
        )));
    }

    Ok(if comparators.len() == 1 {
        comparators.remove(0)
    } else {
        VersionConstraint::All(comparators)
    })
}
