use crate::error::MalformedOidError;
use std::fmt;
use std::str::FromStr;

/// Object identifier as a sequence of sub-identifiers.
///
/// Ordering is lexicographic over the sub-identifiers, which is the order an
/// agent returns objects in during a walk (a prefix sorts before its children).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OidPath(Vec<u32>);

impl OidPath {
    pub fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` lies in the subtree rooted at `root` (strictly below it).
    pub fn is_under(&self, root: &OidPath) -> bool {
        self.0.len() > root.0.len() && self.0.starts_with(&root.0)
    }

    /// Trailing sub-identifier; for a table column this is the row index.
    pub fn table_index(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// The last `n` sub-identifiers, if there are that many.
    pub fn suffix(&self, n: usize) -> Option<&[u32]> {
        self.0.len().checked_sub(n).map(|start| &self.0[start..])
    }

    /// New OID with `sub` appended.
    pub fn child(&self, sub: u32) -> OidPath {
        let mut components = self.0.clone();
        components.push(sub);
        OidPath(components)
    }
}

impl fmt::Display for OidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for OidPath {
    type Err = MalformedOidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(MalformedOidError::new(s, "empty OID"));
        }

        body.split('.')
            .map(|part| {
                part.parse::<u32>().map_err(|e| {
                    MalformedOidError::new(s, format!("invalid sub-identifier '{}': {}", part, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(OidPath)
    }
}

impl From<&[u32]> for OidPath {
    fn from(components: &[u32]) -> Self {
        OidPath(components.to_vec())
    }
}
