//! Domain types shared by the sandbox, surface and host crates.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ── Tools ───────────────────────────────────────────────────────────────────

/// Where a tool's files live on disk.
///
/// Resolved once when the catalog loads a tool; the content server never
/// re-infers the install kind per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum AssetRootKind {
    /// A development checkout registered by path.
    Local(PathBuf),
    /// Installed through the package manager.
    Packaged(PathBuf),
    /// Installed from the tool registry.
    Registry(PathBuf),
}

impl AssetRootKind {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(p) | Self::Packaged(p) | Self::Registry(p) => p,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Packaged(_) => "packaged",
            Self::Registry(_) => "registry",
        }
    }
}

/// An installed tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub version: String,
    pub asset_root: AssetRootKind,
    /// Subdirectory of the root holding the built UI, usually `dist`.
    pub asset_dir: String,
    /// Content-security-policy relaxations the tool asks for. Only applied
    /// once the user has consented.
    #[serde(default)]
    pub policy_exceptions: BTreeMap<String, Vec<String>>,
}

impl Tool {
    /// Directory that content requests for this tool are confined to.
    #[must_use]
    pub fn content_base(&self) -> PathBuf {
        self.asset_root.path().join(&self.asset_dir)
    }
}

/// A connection the host knows how to reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub url: String,
}

// ── Instances ───────────────────────────────────────────────────────────────

/// Identifier of one running launch of a tool.
///
/// Generated ids look like `<toolId>-<unixMillis>-<suffix>`. A bare tool id
/// is also a valid instance id for single-instance launches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(['/', '\\']) || id.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInstanceId(id));
        }
        Ok(Self(id))
    }

    /// Mint a fresh id for a new launch of `tool_id`.
    pub fn generate(tool_id: &str) -> Result<Self> {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self::new(format!("{tool_id}-{millis}-{}", &suffix[..8]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tool this instance was launched from.
    ///
    /// Strips a trailing `-<digits>-<suffix>` pair; ids without one are
    /// returned whole.
    #[must_use]
    pub fn base_tool_id(&self) -> &str {
        let mut parts = self.0.rsplitn(3, '-');
        let (Some(suffix), Some(stamp), Some(base)) = (parts.next(), parts.next(), parts.next())
        else {
            return &self.0;
        };
        let stamp_ok = !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit());
        if stamp_ok && !suffix.is_empty() && !base.is_empty() {
            base
        } else {
            &self.0
        }
    }

    /// Whether this instance was launched from `tool_id`.
    ///
    /// A bare tool id matches first, so tool ids that happen to end in
    /// `-<digits>-<word>` still own their single-instance launches.
    #[must_use]
    pub fn belongs_to(&self, tool_id: &str) -> bool {
        self.0 == tool_id || self.base_tool_id() == tool_id
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
