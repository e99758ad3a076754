use serde::{Deserialize, Serialize};

use crate::bookmarks::{BookmarkList, UndoStack};

/// Identity and provenance of the video a session is scoped to. The host
/// supplies it when it detects the current video; `title` and `url` only
/// feed export documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl VideoDescriptor {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            title: String::new(),
            url: String::new(),
        }
    }

    pub fn storage_key(&self) -> String {
        storage_key(&self.video_id)
    }
}

/// Key of a video's bookmark list in the per-video partition.
pub fn storage_key(video_id: &str) -> String {
    format!("bm_{video_id}")
}

/// Everything scoped to one actively viewed video: the bookmark list, the
/// navigation cursor, and the undo stack. Replaced wholesale when the page
/// navigates to a different video; `epoch` lets a load completion from a
/// previous session recognize that it is stale.
#[derive(Debug)]
pub struct SessionState {
    pub descriptor: VideoDescriptor,
    pub storage_key: String,
    pub bookmarks: BookmarkList,
    pub cursor: Option<usize>,
    pub undo: UndoStack,
    pub epoch: u64,
}

impl SessionState {
    pub fn new(descriptor: VideoDescriptor, epoch: u64) -> Self {
        let storage_key = descriptor.storage_key();
        Self {
            descriptor,
            storage_key,
            bookmarks: BookmarkList::new(),
            cursor: None,
            undo: UndoStack::new(),
            epoch,
        }
    }

    /// Advances the cursor, clamped to the end of the list, and returns the
    /// target time. A fresh cursor lands on the first bookmark.
    pub fn navigate_next(&mut self) -> Option<u32> {
        if self.bookmarks.is_empty() {
            return None;
        }
        let last = self.bookmarks.len() - 1;
        let next = match self.cursor {
            Some(current) => (current + 1).min(last),
            None => 0,
        };
        self.cursor = Some(next);
        self.bookmarks.get(next).map(|bm| bm.time)
    }

    /// Retreats the cursor, clamped to the start of the list.
    pub fn navigate_prev(&mut self) -> Option<u32> {
        if self.bookmarks.is_empty() {
            return None;
        }
        let last = self.bookmarks.len() - 1;
        let prev = match self.cursor {
            Some(current) => current.saturating_sub(1).min(last),
            None => 0,
        };
        self.cursor = Some(prev);
        self.bookmarks.get(prev).map(|bm| bm.time)
    }

    /// Keeps the cursor meaningful after removals.
    pub fn clamp_cursor(&mut self) {
        self.cursor = match (self.cursor, self.bookmarks.len()) {
            (_, 0) => None,
            (Some(current), len) => Some(current.min(len - 1)),
            (None, _) => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(times: &[f64]) -> SessionState {
        let mut state = SessionState::new(VideoDescriptor::new("abc123"), 1);
        for &t in times {
            state.bookmarks.add(t);
        }
        state
    }

    #[test]
    fn storage_key_is_prefixed_with_the_video_id() {
        assert_eq!(storage_key("abc123"), "bm_abc123");
    }

    #[test]
    fn navigation_on_an_empty_list_is_a_no_op() {
        let mut state = session_with(&[]);
        assert_eq!(state.navigate_next(), None);
        assert_eq!(state.navigate_prev(), None);
        assert_eq!(state.cursor, None);
    }

    #[test]
    fn first_navigation_lands_on_the_first_bookmark() {
        let mut state = session_with(&[10.0, 30.0, 90.0]);
        assert_eq!(state.navigate_next(), Some(10));
        assert_eq!(state.navigate_next(), Some(30));
        assert_eq!(state.navigate_next(), Some(90));
        // Clamped at the end.
        assert_eq!(state.navigate_next(), Some(90));
    }

    #[test]
    fn prev_clamps_at_the_start() {
        let mut state = session_with(&[10.0, 30.0]);
        assert_eq!(state.navigate_prev(), Some(10));
        assert_eq!(state.navigate_prev(), Some(10));
    }

    #[test]
    fn clamp_cursor_tracks_removals() {
        let mut state = session_with(&[10.0, 30.0, 90.0]);
        state.cursor = Some(2);
        state.bookmarks.remove_at(2);
        state.clamp_cursor();
        assert_eq!(state.cursor, Some(1));

        state.bookmarks.clear();
        state.clamp_cursor();
        assert_eq!(state.cursor, None);
    }
}
