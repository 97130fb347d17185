//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time, and the serde
//! representations validate on the way in so that malformed wire data never
//! reaches the resolver.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Longest accepted filename, in bytes (matches common filesystem limits)
const MAX_FILENAME_LEN: usize = 255;

/// Longest accepted checksum string
const MAX_CHECKSUM_LEN: usize = 128;

/// Longest accepted game or account identifier
const MAX_ID_LEN: usize = 128;

// ============================================================================
// Filename
// ============================================================================

/// Name of a tracked save file, relative to the save directory
///
/// Filenames are single path components: no separators, no `.`/`..`, and no
/// leading dot (hidden files and the backup directory are never tracked).
/// Ordering is byte-lexicographic, which fixes the order of every plan list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Filename(String);

impl Filename {
    /// Create a new Filename
    ///
    /// # Errors
    /// Returns error if the name is empty, too long, hidden, or contains a path separator
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();

        if name.is_empty() {
            return Err(DomainError::InvalidFilename(
                "Filename cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_FILENAME_LEN {
            return Err(DomainError::InvalidFilename(format!(
                "Filename exceeds {MAX_FILENAME_LEN} bytes"
            )));
        }

        if name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
            return Err(DomainError::InvalidFilename(format!(
                "Filename must be a single path component: {name}"
            )));
        }

        if name.starts_with('.') {
            return Err(DomainError::InvalidFilename(format!(
                "Hidden files are not tracked: {name}"
            )));
        }

        Ok(Self(name))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Filename {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Filename {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Filename {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Filename> for String {
    fn from(name: Filename) -> Self {
        name.0
    }
}

// ============================================================================
// Checksum
// ============================================================================

/// Content-derived digest of a file's bytes
///
/// Locally built manifests use lowercase hex SHA-256, but the value is
/// treated as opaque: equal checksums mean identical content, and ordering
/// (used by the tie-break) is plain string ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    /// Create a new Checksum
    ///
    /// # Errors
    /// Returns error if the checksum is empty, too long, or contains whitespace
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.is_empty() {
            return Err(DomainError::InvalidChecksum(
                "Checksum cannot be empty".to_string(),
            ));
        }

        if value.len() > MAX_CHECKSUM_LEN {
            return Err(DomainError::InvalidChecksum(format!(
                "Checksum exceeds {MAX_CHECKSUM_LEN} characters"
            )));
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(DomainError::InvalidChecksum(format!(
                "Checksum must be printable ASCII without whitespace: {value:?}"
            )));
        }

        Ok(Self(value))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

// ============================================================================
// Timestamp
// ============================================================================

/// Wall-clock modification time in seconds since the Unix epoch
///
/// Always finite, so it has a total order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Timestamp(f64);

impl Timestamp {
    /// Create a new Timestamp
    ///
    /// # Errors
    /// Returns error if the value is NaN or infinite
    pub fn new(seconds: f64) -> Result<Self, DomainError> {
        if !seconds.is_finite() {
            return Err(DomainError::InvalidTimestamp(format!(
                "Timestamp must be finite, got {seconds}"
            )));
        }
        Ok(Self(seconds))
    }

    /// Build a timestamp from a [`std::time::SystemTime`]
    ///
    /// Times before the epoch are represented as negative seconds.
    #[must_use]
    pub fn from_system_time(time: std::time::SystemTime) -> Self {
        match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => Self(d.as_secs_f64()),
            Err(e) => Self(-e.duration().as_secs_f64()),
        }
    }

    /// Seconds since the Unix epoch
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }

    /// The inverse of [`Timestamp::from_system_time`]
    ///
    /// `None` if the value does not fit a `SystemTime` on this platform.
    #[must_use]
    pub fn to_system_time(&self) -> Option<std::time::SystemTime> {
        let magnitude = std::time::Duration::try_from_secs_f64(self.0.abs()).ok()?;
        if self.0 >= 0.0 {
            std::time::UNIX_EPOCH.checked_add(magnitude)
        } else {
            std::time::UNIX_EPOCH.checked_sub(magnitude)
        }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Timestamp {
    type Error = DomainError;

    fn try_from(seconds: f64) -> Result<Self, Self::Error> {
        Self::new(seconds)
    }
}

impl From<Timestamp> for f64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================================================
// GameId / AccountId
// ============================================================================

/// Identifier of a game whose saves are synchronized
///
/// Used as a storage key component, so only `[A-Za-z0-9._-]` is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

impl GameId {
    /// Create a new GameId
    ///
    /// # Errors
    /// Returns error if the id is empty, too long, or has characters outside `[A-Za-z0-9._-]`
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::InvalidGameId(
                "Game id cannot be empty".to_string(),
            ));
        }

        if id.len() > MAX_ID_LEN {
            return Err(DomainError::InvalidGameId(format!(
                "Game id exceeds {MAX_ID_LEN} characters"
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(DomainError::InvalidGameId(format!(
                "Game id may only contain letters, digits, '.', '-' and '_': {id}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GameId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GameId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

/// Identifier of the account owning a set of saves
///
/// This is the identity provider's subject claim. It is opaque apart from
/// being non-empty and free of path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Create a new AccountId
    ///
    /// # Errors
    /// Returns error if the id is empty, too long, or contains `/`, `\` or whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::InvalidAccountId(
                "Account id cannot be empty".to_string(),
            ));
        }

        if id.len() > MAX_ID_LEN {
            return Err(DomainError::InvalidAccountId(format!(
                "Account id exceeds {MAX_ID_LEN} characters"
            )));
        }

        if id
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
        {
            return Err(DomainError::InvalidAccountId(format!(
                "Account id contains forbidden characters: {id:?}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

// ============================================================================
// PlanId
// ============================================================================

/// Identifier of one issued plan, echoed back in its acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(Uuid);

impl PlanId {
    /// Create a new random PlanId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a PlanId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PlanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlanId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidPlanId(format!("{s}: {e}")))
    }
}

// ============================================================================
// ManifestVersion
// ============================================================================

/// Optimistic-concurrency token of a remote manifest record
///
/// Version 0 means "no record yet"; the first commit produces version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestVersion(u64);

impl ManifestVersion {
    /// The version of a record that does not exist yet
    pub const ABSENT: Self = Self(0);

    /// Wrap a raw version number
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// The version a successful commit on top of this one produces
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Get the raw version number
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true if this is the version of a missing record
    #[must_use]
    pub const fn is_absent(self) -> bool {
        self.0 == 0
    }
}

impl Display for ManifestVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
