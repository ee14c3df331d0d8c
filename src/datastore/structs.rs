use crate::datastore::feed::Feed;
use crate::datastore::tables::{comments, follows, groups, posts, users};
use chrono::{offset::Utc, DateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How many characters of a post's text its short form shows.
pub const POST_STR_LEN: usize = 15;

/// A user of the website.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for the database statement which inserts new users.
#[derive(Insertable, Deserialize, Debug)]
#[table_name = "users"]
pub struct NewUser {
    pub username: String,
}

/// A named category that posts can optionally belong to.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Group {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

#[derive(Insertable, Deserialize, Debug)]
#[table_name = "groups"]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

/// A post from a user
#[derive(
    Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, Associations,
)]
#[belongs_to(User, foreign_key = "author_id")]
pub struct Post {
    pub id: Uuid,
    pub text: String,
    /// Set by the database on insert and never updated.
    pub pub_date: DateTime<Utc>,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    /// Opaque reference to an uploaded image, e.g. "posts/small.gif"
    pub image: Option<String>,
    /// Insertion order, assigned by the datastore. Breaks ties between equal `pub_date`s.
    #[serde(skip)]
    pub seq: i64,
}

impl Post {
    /// Does this post belong on the given feed? `followed` lists the authors the feed's viewer
    /// follows, and is only consulted for `Feed::Following`.
    pub fn in_feed(&self, feed: &Feed, followed: &[Uuid]) -> bool {
        match *feed {
            Feed::Index => true,
            Feed::Group(group_id) => self.group_id == Some(group_id),
            Feed::Author(author_id) => self.author_id == author_id,
            Feed::Following(_) => followed.contains(&self.author_id),
        }
    }
}

/// Posts are shown in admin lists and logs by the start of their text.
impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.text.chars().take(POST_STR_LEN).collect();
        write!(f, "{}", short)
    }
}

/// Parameters for the database statement which inserts new posts.
#[derive(Insertable, Debug, Clone)]
#[table_name = "posts"]
pub struct NewPost {
    pub text: String,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

/// The fields an author may change on an existing post. `pub_date` and the author are fixed.
#[derive(AsChangeset, Debug, Clone)]
#[table_name = "posts"]
#[changeset_options(treat_none_as_null = "true")]
pub struct PostEdit {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

#[derive(
    Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, Associations,
)]
#[belongs_to(Post)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[table_name = "comments"]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
}

/// `user_id` reads everything `author_id` posts.
#[derive(Queryable, Insertable, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[table_name = "follows"]
pub struct Follow {
    pub user_id: Uuid,
    pub author_id: Uuid,
}
