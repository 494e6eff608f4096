use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Pending,
    InProgress,
    Done,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "PENDING",
            ScanStatus::InProgress => "IN_PROGRESS",
            ScanStatus::Done => "DONE",
        }
    }

    /// Forward-only transitions. Going back to `Pending` is reserved for the
    /// bulk reset and is not expressed here.
    pub fn can_advance_to(self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::InProgress)
                | (ScanStatus::InProgress, ScanStatus::Done)
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown scan status {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ScanStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScanStatus::Pending),
            "IN_PROGRESS" => Ok(ScanStatus::InProgress),
            "DONE" => Ok(ScanStatus::Done),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveFlag {
    Active,
    Inactive,
}

/// One repository tracked for periodic drift scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogItem {
    pub repo_url: String,
    pub active: ActiveFlag,
    pub scan_status: ScanStatus,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub last_scan_at: Option<String>,
}

impl BacklogItem {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            active: ActiveFlag::Active,
            scan_status: ScanStatus::Pending,
            updated_at: None,
            last_scan_at: None,
        }
    }

    pub fn with_status(mut self, status: ScanStatus) -> Self {
        self.scan_status = status;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = ActiveFlag::Inactive;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active == ActiveFlag::Active
    }

    /// Eligible for the next drain: active and still pending.
    pub fn is_drainable(&self) -> bool {
        self.is_active() && self.scan_status == ScanStatus::Pending
    }

    /// Applies a field update to this row.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.scan_status = update.status;
        self.updated_at = Some(update.at.clone());
        if update.stamp_last_scan {
            self.last_scan_at = Some(update.at.clone());
        }
    }
}

/// Point update of the status fields of one row, keyed by `repo_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub repo_url: String,
    pub status: ScanStatus,
    pub at: String,
    pub stamp_last_scan: bool,
}
