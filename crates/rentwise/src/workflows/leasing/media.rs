use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object-storage folder a file is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    PropertyImage,
    PropertyVideo,
    ProfileImage,
}

impl MediaKind {
    pub const fn entity_type(self) -> &'static str {
        match self {
            Self::PropertyImage => "property_images",
            Self::PropertyVideo => "property_videos",
            Self::ProfileImage => "profile_images",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUpload {
    pub kind: MediaKind,
    pub file_name: String,
}

/// `{entityType}/{ownerId}/{timestamp}_{filename}` with a millisecond timestamp.
pub fn storage_path(
    kind: MediaKind,
    owner_id: &str,
    uploaded_at: DateTime<Utc>,
    file_name: &str,
) -> String {
    format!(
        "{}/{}/{}_{}",
        kind.entity_type(),
        owner_id,
        uploaded_at.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
