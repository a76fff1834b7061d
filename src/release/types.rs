//! Release states, flags, review categories and the rows the lifecycle works on.

use serde::Serialize;

/// Review lifecycle state. Ordering follows the numeric value, so
/// `state >= ReleaseState::Voted` reads the way the review process does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(i16)]
pub enum ReleaseState {
    Draft = 0,
    Submitted = 1,
    Checked = 2,
    Voted = 3,
    Approved = 4,
    Featured = 5,
}

impl ReleaseState {
    pub const ALL: [ReleaseState; 6] = [
        ReleaseState::Draft,
        ReleaseState::Submitted,
        ReleaseState::Checked,
        ReleaseState::Voted,
        ReleaseState::Approved,
        ReleaseState::Featured,
    ];

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as i64 == value)
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Human-readable name used in announcements and audit logs.
    pub fn human_name(self) -> &'static str {
        match self {
            ReleaseState::Draft => "Draft",
            ReleaseState::Submitted => "Submitted",
            ReleaseState::Checked => "Checked",
            ReleaseState::Voted => "Voted",
            ReleaseState::Approved => "Approved",
            ReleaseState::Featured => "Featured",
        }
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.human_name())
    }
}

/// Bit flags stored in `releases.flags`.
pub struct ReleaseFlags;

impl ReleaseFlags {
    pub const OBSOLETE: i32 = 0x02;
}

/// Privilege level of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    None,
    Moderator,
    Admin,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Moderator => "moderator",
            AccessLevel::Admin => "admin",
        }
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AccessLevel::None),
            "moderator" => Ok(AccessLevel::Moderator),
            "admin" => Ok(AccessLevel::Admin),
            other => Err(anyhow::anyhow!("unknown access level: {}", other)),
        }
    }
}

/// Plugin category, used to pick the per-category announcement thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category(pub i32);

const CATEGORY_NAMES: [(i32, &str); 17] = [
    (1, "General"),
    (2, "Admin Tools"),
    (3, "Informational"),
    (4, "Anti-Griefing Tools"),
    (5, "Chat-Related"),
    (6, "Teleportation"),
    (7, "Mechanics"),
    (8, "Economy"),
    (9, "Minigame"),
    (10, "Fun"),
    (11, "World Editing and Management"),
    (12, "World Generators"),
    (13, "Developer Tools"),
    (14, "Educational"),
    (15, "Miscellaneous"),
    (16, "Permission"),
    (17, "API plugins"),
];

impl Category {
    pub fn name(self) -> Option<&'static str> {
        CATEGORY_NAMES
            .iter()
            .find(|(id, _)| *id == self.0)
            .map(|(_, name)| *name)
    }

    /// Category ids double as issue numbers in the announcement repository.
    pub fn issue_number(self) -> Option<u64> {
        u64::try_from(self.0).ok().filter(|_| self.name().is_some())
    }
}

/// One release of a project as seen by the obsolete-flag recomputation.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SiblingRelease {
    pub release_id: i64,
    pub state: i16,
    pub flags: i32,
}

/// A flag rewrite produced by [`super::recompute_obsolete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagUpdate {
    pub release_id: i64,
    pub flags: i32,
}

/// Result of recomputing the obsolete flag across a project's releases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObsoletePlan {
    /// Highest release id at or above the head threshold, if any.
    pub head: Option<i64>,
    /// Only rows whose flags actually change.
    pub updates: Vec<FlagUpdate>,
}
