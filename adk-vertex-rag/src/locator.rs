//! Classification and normalization of document locators.
//!
//! A locator is a user-supplied string pointing at a file to ingest. Three
//! shapes are accepted:
//!
//! - Google Docs, Sheets, and Slides links, rewritten to the Drive file form
//! - Google Drive file links (`file/d/<id>` or `open?id=<id>`), normalized to
//!   `https://drive.google.com/file/d/<id>/view`
//! - Cloud Storage URIs (`gs://bucket/path`), kept unchanged
//!
//! Anything else is rejected individually so that the valid part of a batch
//! can still be imported.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reason attached to locators matching none of the accepted shapes.
pub const UNRECOGNIZED_FORMAT: &str = "unrecognized format";

const CLOUD_STORAGE_SCHEME: &str = "gs://";

// Office links must be matched before Drive links.
static OFFICE_DOCUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https://docs\.google\.com/(?:document|spreadsheets|presentation)/d/([a-zA-Z0-9_-]+)(?:[/?#]|$)",
    )
    .expect("office document pattern is valid")
});

static DRIVE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://drive\.google\.com/(?:file/d/|open\?id=)([a-zA-Z0-9_-]+)(?:[/?&#]|$)")
        .expect("drive file pattern is valid")
});

/// A recognized document locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A Docs/Sheets/Slides link; imported through its Drive file id.
    OfficeDocument { file_id: String },
    /// A Drive file link.
    DriveFile { file_id: String },
    /// A Cloud Storage URI.
    CloudStorage { uri: String },
}

impl Locator {
    /// Classify a trimmed locator string, or `None` when unrecognized.
    pub fn parse(path: &str) -> Option<Self> {
        if let Some(caps) = OFFICE_DOCUMENT.captures(path) {
            return Some(Self::OfficeDocument { file_id: caps[1].to_string() });
        }
        if let Some(caps) = DRIVE_FILE.captures(path) {
            return Some(Self::DriveFile { file_id: caps[1].to_string() });
        }
        if path.starts_with(CLOUD_STORAGE_SCHEME) {
            return Some(Self::CloudStorage { uri: path.to_string() });
        }
        None
    }

    /// The Drive file id for Drive-backed locators.
    pub fn drive_file_id(&self) -> Option<&str> {
        match self {
            Self::OfficeDocument { file_id } | Self::DriveFile { file_id } => Some(file_id),
            Self::CloudStorage { .. } => None,
        }
    }

    /// The form handed to the ingestion service.
    pub fn to_uri(&self) -> String {
        match self {
            Self::OfficeDocument { file_id } | Self::DriveFile { file_id } => {
                drive_file_url(file_id)
            }
            Self::CloudStorage { uri } => uri.clone(),
        }
    }
}

/// Canonical Drive URL of a file id.
pub fn drive_file_url(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{file_id}/view")
}

/// A locator that was rejected, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvalidPath {
    pub path: String,
    pub reason: String,
}

/// A locator that was rewritten before use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversion {
    pub original: String,
    pub converted: String,
}

/// Result of [`validate_paths`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathValidation {
    /// Accepted locators, in input order, in the form to import.
    pub validated: Vec<String>,
    pub invalid: Vec<InvalidPath>,
    pub conversions: Vec<Conversion>,
}

impl PathValidation {
    /// Whether no locator was accepted.
    pub fn is_empty(&self) -> bool {
        self.validated.is_empty()
    }
}

/// Validate and normalize a batch of locators.
///
/// Entries are trimmed and empty ones skipped. Never fails: a batch with no
/// valid entry yields an empty `validated` list, and the caller decides
/// whether that is an error.
pub fn validate_paths<I, S>(paths: I) -> PathValidation
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = PathValidation::default();

    for raw in paths {
        let path = raw.as_ref().trim();
        if path.is_empty() {
            continue;
        }

        match Locator::parse(path) {
            Some(locator) => {
                let uri = locator.to_uri();
                let rewritten = match locator {
                    Locator::OfficeDocument { .. } => true,
                    Locator::DriveFile { .. } => uri != path,
                    Locator::CloudStorage { .. } => false,
                };
                if rewritten {
                    result
                        .conversions
                        .push(Conversion { original: path.to_string(), converted: uri.clone() });
                }
                result.validated.push(uri);
            }
            None => result.invalid.push(InvalidPath {
                path: path.to_string(),
                reason: UNRECOGNIZED_FORMAT.to_string(),
            }),
        }
    }

    result
}
