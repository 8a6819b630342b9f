//! # Shared Constants
//!
//! Markers and defaults shared by the core uploader and the service plugins.

/// Body marker the knowledge-base services return when content was already ingested.
pub const DUPLICATE_CONTENT_MARKER: &str = "Duplicate content detected";

/// Body marker for an upload that timed out while the service was streaming it.
/// Matched case-insensitively.
pub const STREAM_TIMEOUT_MARKER: &str = "stream timeout";

/// Files with this extension are treated as metadata and never uploaded.
pub const DEFAULT_EXCLUDED_EXTENSION: &str = ".json";

/// Suffix of the companion log that records the source path of each uploaded identifier.
pub const PATH_LOG_SUFFIX: &str = ".path";

pub const DEFAULT_LOG_FILE: &str = "kbload.log";
pub const DEFAULT_FILE_LIST: &str = "filelist.txt";
pub const DEFAULT_UPLOADED: &str = "uploaded.txt";
pub const DEFAULT_COMPLETED: &str = "completed.txt";
pub const DEFAULT_ERRORED: &str = "errored.txt";

/// Consecutive counted failures tolerated before a run is aborted.
pub const DEFAULT_MAX_FAILURES: u32 = 5;
/// Time units slept per accumulated failure.
pub const DEFAULT_BACKOFF_UNITS: u64 = 60;
/// Time units slept before every network call.
pub const DEFAULT_RATE_LIMIT_UNITS: u64 = 1;
/// Length of one time unit in milliseconds.
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;
pub const DEFAULT_REGISTER_TIMEOUT_SECS: u64 = 30;
