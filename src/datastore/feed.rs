//! The different listings of posts the site can show. Every feed is ordered newest first.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Every post on the site.
    Index,
    /// Posts in one group.
    Group(Uuid),
    /// Posts written by one user.
    Author(Uuid),
    /// Posts by any author the given user follows.
    Following(Uuid),
}

impl Feed {
    /// Short label, used for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Feed::Index => "index",
            Feed::Group(_) => "group",
            Feed::Author(_) => "author",
            Feed::Following(_) => "following",
        }
    }
}
