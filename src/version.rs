use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Dotted numeric body of a version, after any leading marker is removed.
static VERSION_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("version pattern is valid"));

/// A dotted numeric version such as `1.2.3`.
///
/// Missing trailing components compare as zero, so `1.2` and `1.2.0` are
/// equal.
///
/// # Examples
///
/// ```
/// use release_checker::Version;
///
/// let tagged = Version::parse("v2.0").unwrap();
/// let running = Version::parse("1.9.9").unwrap();
/// assert!(tagged > running);
/// assert_eq!(Version::parse("V1.2.3").unwrap(), Version::parse("1.2.3").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Parses a version string, stripping one leading `v` or `V`.
    ///
    /// Any number of dot-separated components is accepted, so `v2` and
    /// `1.2.3.4.5` both parse. Missing components compare as zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the body is empty, has a non-numeric
    /// component, or a component overflows `u64`.
    pub fn parse(s: &str) -> Result<Self> {
        let body = strip_marker(s.trim());

        if body.is_empty() {
            return Err(Error::parse(s, "empty version"));
        }
        if !VERSION_BODY.is_match(body) {
            return Err(Error::parse(s, "expected dot-separated numbers"));
        }

        let components = body
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|e| Error::parse(s, format!("component {part:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { components })
    }

    /// The numeric components, as written.
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

/// Removes a single leading case-insensitive `v`.
fn strip_marker(s: &str) -> &str {
    s.strip_prefix(['v', 'V']).unwrap_or(s)
}

/// Parses both strings and orders them.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl std::str::FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.components {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}
