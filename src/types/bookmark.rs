use serde::{Deserialize, Serialize};

/// A saved bookmark as persisted by the store.
///
/// `id` and `created_at` are assigned by the store on insert; clients never
/// pick them. `created_at` (UNIX seconds) is the sole sort key, descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub user_id: String,
    pub created_at: i64,
}

/// Client-supplied fields for a bookmark about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}
