use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::VideoDescriptor;

use super::{Bookmark, BookmarkList};

/// Portable bookmark document: the list plus provenance for the video it was
/// taken from. The same shape is accepted back on import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub video_id: String,
    #[serde(default)]
    pub video_title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
    pub bookmarks: Vec<Bookmark>,
}

impl ExportDocument {
    /// Pure snapshot of the current list; no persistence side effect.
    pub fn snapshot(descriptor: &VideoDescriptor, list: &BookmarkList) -> Self {
        Self {
            video_id: descriptor.video_id.clone(),
            video_title: descriptor.title.clone(),
            url: descriptor.url.clone(),
            export_date: Utc::now(),
            bookmarks: list.to_vec(),
        }
    }

    /// Parses an import document. The only hard requirement is a `bookmarks`
    /// array; provenance fields are optional so files from older exports (or
    /// hand-edited ones) still load.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).context("import file is not valid JSON")?;

        match value.get("bookmarks") {
            None => bail!("import file has no 'bookmarks' list"),
            Some(bookmarks) if !bookmarks.is_array() => {
                bail!("import file's 'bookmarks' field is not a list")
            }
            Some(_) => {}
        }

        serde_json::from_value(value).context("import file has an unexpected shape")
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize export document")
    }

    /// File name offered for the download: video id plus export timestamp.
    pub fn suggested_filename(&self) -> String {
        format!(
            "{}_{}.json",
            self.video_id,
            self.export_date.format("%Y%m%d_%H%M%S")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_document_without_a_bookmark_list() {
        let err = ExportDocument::parse(r#"{"videoId": "abc123"}"#).unwrap_err();
        assert!(err.to_string().contains("bookmarks"));

        let err = ExportDocument::parse(r#"{"bookmarks": "nope"}"#).unwrap_err();
        assert!(err.to_string().contains("not a list"));
    }

    #[test]
    fn accepts_a_minimal_document() {
        let doc =
            ExportDocument::parse(r#"{"videoId": "abc123", "bookmarks": [{"time": 30}]}"#)
                .unwrap();
        assert_eq!(doc.video_id, "abc123");
        assert_eq!(doc.bookmarks.len(), 1);
        assert_eq!(doc.bookmarks[0].label, "");
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let descriptor = VideoDescriptor {
            video_id: "abc123".into(),
            title: "A video".into(),
            url: "https://example.com/watch?v=abc123".into(),
        };
        let mut list = BookmarkList::new();
        list.add(30.0);
        list.set_label(30, "Intro ends");

        let doc = ExportDocument::snapshot(&descriptor, &list);
        let text = doc.to_json_pretty().unwrap();
        let parsed = ExportDocument::parse(&text).unwrap();

        assert_eq!(parsed.video_id, "abc123");
        assert_eq!(parsed.bookmarks, list.to_vec());
        assert!(parsed.suggested_filename().starts_with("abc123_"));
    }
}
