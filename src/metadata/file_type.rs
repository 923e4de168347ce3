use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a submission file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "json.gz")]
    JsonGz,
    #[serde(rename = "jpg")]
    Jpg,
    #[serde(rename = "other")]
    Other,
}

impl FileType {
    /// Classify a filename by extension, case-insensitively.
    /// The `.json.gz` suffix is checked before plain `.json`.
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".json.gz") {
            FileType::JsonGz
        } else if lower.ends_with(".mp4") {
            FileType::Video
        } else if lower.ends_with(".json") {
            FileType::Json
        } else if lower.ends_with(".jpg") {
            FileType::Jpg
        } else {
            FileType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Video => "video",
            FileType::Json => "json",
            FileType::JsonGz => "json.gz",
            FileType::Jpg => "jpg",
            FileType::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(FileType::Video),
            "json" => Ok(FileType::Json),
            "json.gz" => Ok(FileType::JsonGz),
            "jpg" => Ok(FileType::Jpg),
            "other" => Ok(FileType::Other),
            _ => Err(format!("Invalid file type: {s}")),
        }
    }
}
