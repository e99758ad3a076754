use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A labeled timestamp on one video. Identity is the whole second: two
/// bookmarks in one list never share a `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub time: u32,
    #[serde(default)]
    pub label: String,
}

impl Bookmark {
    pub fn at(time: u32) -> Self {
        Self {
            time,
            label: String::new(),
        }
    }
}

/// Floors a playhead position to the whole second used as bookmark identity.
/// `None` for positions that cannot name a second (negative, NaN, infinite).
pub fn floor_time(time: f64) -> Option<u32> {
    if !time.is_finite() || time < 0.0 {
        return None;
    }
    Some(time.floor() as u32)
}

/// The bookmark list for the active video, kept sorted ascending by `time`
/// with no duplicate times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkList {
    entries: Vec<Bookmark>,
}

impl BookmarkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the list from a stored value. Anything that is not a JSON
    /// array of bookmarks decodes to an empty list.
    pub fn from_stored(value: Option<Value>) -> Self {
        let entries = value
            .and_then(|v| serde_json::from_value::<Vec<Bookmark>>(v).ok())
            .unwrap_or_default();
        let mut list = Self { entries };
        list.normalize();
        list
    }

    fn normalize(&mut self) {
        self.entries.sort_by_key(|bm| bm.time);
        self.entries.dedup_by_key(|bm| bm.time);
    }

    /// Floors `time` to a whole second and inserts a fresh unlabeled bookmark.
    /// Returns the new entry's index, or `None` when a bookmark already exists
    /// at that second (or the time is not a finite value).
    pub fn add(&mut self, time: f64) -> Option<usize> {
        let secs = floor_time(time)?;
        if self.entries.iter().any(|bm| bm.time == secs) {
            return None;
        }
        self.entries.push(Bookmark::at(secs));
        self.normalize();
        self.entries.iter().position(|bm| bm.time == secs)
    }

    /// Overwrites the label of the bookmark at `time`. Empty labels and
    /// missing times leave the list untouched.
    pub fn set_label(&mut self, time: u32, label: &str) -> bool {
        if label.is_empty() {
            return false;
        }
        match self.entries.iter_mut().find(|bm| bm.time == time) {
            Some(bookmark) => {
                bookmark.label = label.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Bookmark> {
        if index >= self.entries.len() {
            return None;
        }
        Some(self.entries.remove(index))
    }

    pub fn remove_at_time(&mut self, time: u32) -> bool {
        let before = self.entries.len();
        self.entries.retain(|bm| bm.time != time);
        self.entries.len() != before
    }

    /// Re-inserts a previously deleted bookmark at its original position
    /// (clamped to the current length), then re-establishes the ordering
    /// invariant.
    pub fn restore(&mut self, bookmark: Bookmark, original_index: usize) {
        let index = original_index.min(self.entries.len());
        self.entries.insert(index, bookmark);
        self.normalize();
    }

    /// Merges an imported list into this one. Existing bookmarks win over
    /// imported ones at the same timestamp. Returns how many entries were
    /// actually taken from the import.
    pub fn merge_import(&mut self, external: Vec<Bookmark>) -> usize {
        let mut taken = 0;
        for bookmark in external {
            if !self.entries.iter().any(|bm| bm.time == bookmark.time) {
                self.entries.push(bookmark);
                taken += 1;
            }
        }
        self.normalize();
        taken
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Bookmark> {
        self.entries.get(index)
    }

    pub fn find_index(&self, time: u32) -> Option<usize> {
        self.entries.iter().position(|bm| bm.time == time)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Bookmark] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<Bookmark> {
        self.entries.clone()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.entries).unwrap_or(Value::Array(Vec::new()))
    }
}
