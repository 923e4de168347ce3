use chrono::{DateTime, Local, LocalResult, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

static LEADING_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)").unwrap());
static ALL_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// Metadata recovered from a submission filename.
///
/// Submission uploaders have produced two naming conventions over time:
///
/// * standard: `userId_deviceId_eventId_cameraModel_YYYY-MM-DD-HH-MM-SS.ext`
/// * combined: `userId_deviceId_eventIdCameraModel_YYYY-MM-DD-HH-MM-SS.ext`
///
/// plus a legacy batch-ingest variant where the third segment is a dashed
/// compound whose first part is the event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub event_id: String,
    pub user_id: String,
    pub device_id: String,
    pub camera_model: String,
    pub timestamp: DateTime<Utc>,
}

/// Returns the final path component of an object key.
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Parse a submission filename into its metadata fields.
///
/// Never fails: anything that does not fit a known convention degrades to
/// per-field defaults (the whole filename as event id, "Unknown" identifiers,
/// epoch timestamp).
pub fn parse_filename(filename: &str) -> FileMetadata {
    let segments: Vec<&str> = filename.split('_').collect();

    let mut meta = FileMetadata {
        event_id: filename.to_string(),
        user_id: segments.first().copied().unwrap_or("Unknown").to_string(),
        device_id: segments.get(1).copied().unwrap_or("Unknown").to_string(),
        camera_model: "Unknown".to_string(),
        timestamp: DateTime::<Utc>::UNIX_EPOCH,
    };

    if segments.len() < 3 {
        return meta;
    }

    let segment2 = segments[2];

    if ALL_DIGITS.is_match(segment2) {
        // Standard format: the event id is its own segment
        meta.event_id = segment2.to_string();
        if segments.len() >= 4 {
            meta.camera_model = segments[3].to_string();
        }
        if segments.len() >= 5 {
            meta.timestamp = parse_wall_clock(strip_extension(segments[4]));
        }
    } else if let Some(caps) = LEADING_DIGITS.captures(segment2) {
        // Combined format: leading digits are the event id, the rest names the camera
        let digits = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        meta.event_id = digits.to_string();
        meta.camera_model = segment2[digits.len()..].to_string();
        if segments.len() >= 4 {
            meta.timestamp = parse_wall_clock(strip_extension(segments[3]));
        }
    } else {
        // Legacy batch-ingest variant: dashed compound, first part is the event id
        let first = segment2.split('-').next().unwrap_or("");
        if !first.is_empty() {
            meta.event_id = first.to_string();
        }
        if segments.len() >= 4 {
            meta.timestamp = parse_wall_clock(strip_extension(segments[3]));
        }
    }

    meta
}

fn strip_extension(segment: &str) -> &str {
    segment.split('.').next().unwrap_or(segment)
}

/// Parse a `YYYY-MM-DD-HH-MM-SS` wall-clock string as local time.
/// Anything short of six numeric parts yields the epoch.
fn parse_wall_clock(s: &str) -> DateTime<Utc> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() < 6 {
        return DateTime::<Utc>::UNIX_EPOCH;
    }

    let numbers: Option<Vec<u32>> = parts[..6].iter().map(|p| p.parse::<u32>().ok()).collect();
    let Some(n) = numbers else {
        return DateTime::<Utc>::UNIX_EPOCH;
    };

    match Local.with_ymd_and_hms(n[0] as i32, n[1], n[2], n[3], n[4], n[5]) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => DateTime::<Utc>::UNIX_EPOCH,
    }
}
