pub mod feed;
#[cfg(test)]
pub mod mock;
pub mod postgres;
pub mod structs;
pub mod tables;

use crate::datastore::structs::{
    Comment, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostEdit, User,
};
use crate::paginator::Page;
use crate::twoface::Fallible;
use async_trait::async_trait;
use feed::Feed;
use uuid::Uuid;

#[async_trait]
/// The interface for storing users, groups, posts, comments and follows.
///
/// Deleting a row also deletes everything that depends on it (see each `delete_*` method), so
/// callers never have to clean up after themselves.
pub trait Client: Clone {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User>;
    async fn find_user(&self, username: &str) -> Fallible<Option<User>>;
    /// Deletes the user along with their posts, comments on those posts, their own comments and
    /// every follow they're part of.
    async fn delete_user(&self, username: &str) -> Fallible<Option<User>>;

    async fn new_group(&self, new_group: NewGroup) -> Fallible<Group>;
    async fn find_group(&self, slug: &str) -> Fallible<Option<Group>>;
    async fn list_groups(&self) -> Fallible<Vec<Group>>;
    /// Deletes the group along with its posts and their comments.
    async fn delete_group(&self, slug: &str) -> Fallible<Option<Group>>;

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post>;
    async fn find_post(&self, post_id: Uuid) -> Fallible<Option<Post>>;
    async fn edit_post(&self, post_id: Uuid, edit: PostEdit) -> Fallible<Option<Post>>;
    /// Deletes the post along with its comments.
    async fn delete_post(&self, post_id: Uuid) -> Fallible<Option<Post>>;
    /// One page of the feed, newest posts first.
    async fn feed_page(
        &self,
        feed: Feed,
        per_page: usize,
        requested_page: Option<&str>,
    ) -> Fallible<Page<Post>>;
    async fn count_posts(&self, feed: Feed) -> Fallible<usize>;

    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment>;
    /// Comments on the post, oldest first.
    async fn list_comments(&self, post_id: Uuid) -> Fallible<Vec<Comment>>;

    /// Returns false if `user_id` already followed `author_id`.
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool>;
    /// Returns false if there was no follow to remove.
    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool>;
    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool>;
}
