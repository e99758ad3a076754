mod list;
mod transfer;
mod undo;

pub use list::{floor_time, Bookmark, BookmarkList};
pub use transfer::ExportDocument;
pub use undo::{DeletedEntry, UndoStack};
