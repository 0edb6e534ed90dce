use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::staging::STAGING_PREFIX;

/// A validated, path-like resource name.
///
/// The name maps verbatim onto a relative path under the storage root. A
/// leading `/` is ignored (names usually arrive as URL paths). Components
/// must be non-empty, must not be `.` or `..`, and must not start with the
/// staging prefix. This keeps every resource strictly inside the root and
/// keeps staged files unreachable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let name = raw.trim_start_matches('/');
        if name.is_empty() {
            return Err(StoreError::BadInput("empty resource name".into()));
        }
        if name.contains('\0') {
            return Err(StoreError::BadInput("resource name contains NUL".into()));
        }
        for component in name.split('/') {
            match component {
                "" => return Err(invalid(name, "empty path component")),
                "." | ".." => return Err(invalid(name, "relative path component")),
                c if c.starts_with(STAGING_PREFIX) => {
                    return Err(invalid(name, "reserved staging prefix"))
                }
                c if c.contains('\\') => return Err(invalid(name, "backslash in component")),
                _ => {}
            }
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of this resource under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |path, c| path.join(c))
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn invalid(name: &str, reason: &str) -> StoreError {
    StoreError::BadInput(format!("invalid resource name {name:?}: {reason}"))
}
