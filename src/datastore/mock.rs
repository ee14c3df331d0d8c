use crate::datastore::{
    feed::Feed,
    structs::{Comment, Follow, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostEdit, User},
};
use crate::paginator::{paginate, Page};
use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::offset::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default, Debug)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    next_seq: i64,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
}

impl Tables {
    fn followed_by(&self, user_id: Uuid) -> Vec<Uuid> {
        self.follows
            .iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.author_id)
            .collect()
    }

    fn push_post(&mut self, mut post: Post) -> Post {
        self.next_seq += 1;
        post.seq = self.next_seq;
        self.posts.push(post.clone());
        post
    }

    /// Posts on the feed, newest first. Posts with equal timestamps put the newest insert first.
    fn feed(&self, feed: &Feed) -> Vec<Post> {
        let followed = match *feed {
            Feed::Following(user_id) => self.followed_by(user_id),
            _ => Vec::new(),
        };
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| p.in_feed(feed, &followed))
            .cloned()
            .collect();
        posts.sort_by(|a, b| (b.pub_date, b.seq).cmp(&(a.pub_date, a.seq)));
        posts
    }

    fn remove_posts_where(&mut self, pred: impl Fn(&Post) -> bool) {
        let doomed: Vec<Uuid> = self.posts.iter().filter(|p| pred(p)).map(|p| p.id).collect();
        self.comments.retain(|c| !doomed.contains(&c.post_id));
        self.posts.retain(|p| !doomed.contains(&p.id));
    }
}

/// A mock implementation of datastore::Client
#[derive(Clone, Default, Debug)]
pub struct Client {
    tables: Arc<Mutex<Tables>>,
}

impl Client {
    /// Insert a post with a chosen timestamp, bypassing `new_post`.
    pub fn insert_post(&self, post: Post) -> Post {
        self.tables.lock().unwrap().push_post(post)
    }

    pub fn follow_count(&self) -> usize {
        self.tables.lock().unwrap().follows.len()
    }

    pub fn comment_count(&self) -> usize {
        self.tables.lock().unwrap().comments.len()
    }

    pub fn post_count(&self) -> usize {
        self.tables.lock().unwrap().posts.len()
    }
}

fn conflict(text: &'static str) -> Fallible<()> {
    Err(anyhow!(text)).describe_err(ExternalError {
        cause: Cause::UserConflict,
        text,
    })
}

#[async_trait]
impl super::Client for Client {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.username == new_user.username) {
            conflict("Username is taken")?;
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, username: &str) -> Fallible<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn delete_user(&self, username: &str) -> Fallible<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        let user = tables.users.iter().find(|u| u.username == username).cloned();
        guard!(let Some(user) = user else {
            return Ok(None)
        });
        tables.remove_posts_where(|p| p.author_id == user.id);
        tables.comments.retain(|c| c.author_id != user.id);
        tables
            .follows
            .retain(|f| f.user_id != user.id && f.author_id != user.id);
        tables.users.retain(|u| u.id != user.id);
        Ok(Some(user))
    }

    async fn new_group(&self, new_group: NewGroup) -> Fallible<Group> {
        let mut tables = self.tables.lock().unwrap();
        if tables.groups.iter().any(|g| g.slug == new_group.slug) {
            conflict("Group slug is taken")?;
        }
        let group = Group {
            id: Uuid::new_v4(),
            title: new_group.title,
            slug: new_group.slug,
            description: new_group.description,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn find_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn list_groups(&self) -> Fallible<Vec<Group>> {
        Ok(self.tables.lock().unwrap().groups.clone())
    }

    async fn delete_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let mut tables = self.tables.lock().unwrap();
        let group = tables.groups.iter().find(|g| g.slug == slug).cloned();
        guard!(let Some(group) = group else {
            return Ok(None)
        });
        tables.remove_posts_where(|p| p.group_id == Some(group.id));
        tables.groups.retain(|g| g.id != group.id);
        Ok(Some(group))
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        let post = Post {
            id: Uuid::new_v4(),
            text: new_post.text,
            pub_date: Utc::now(),
            author_id: new_post.author_id,
            group_id: new_post.group_id,
            image: new_post.image,
            seq: 0,
        };
        Ok(self.tables.lock().unwrap().push_post(post))
    }

    async fn find_post(&self, post_id: Uuid) -> Fallible<Option<Post>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn edit_post(&self, post_id: Uuid, edit: PostEdit) -> Fallible<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        let post = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .map(|post| {
                post.text = edit.text;
                post.group_id = edit.group_id;
                post.image = edit.image;
                post.clone()
            });
        Ok(post)
    }

    async fn delete_post(&self, post_id: Uuid) -> Fallible<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        let post = tables.posts.iter().find(|p| p.id == post_id).cloned();
        tables.remove_posts_where(|p| p.id == post_id);
        Ok(post)
    }

    async fn feed_page(
        &self,
        feed: Feed,
        per_page: usize,
        requested_page: Option<&str>,
    ) -> Fallible<Page<Post>> {
        let posts = self.tables.lock().unwrap().feed(&feed);
        Ok(paginate(posts, per_page, requested_page))
    }

    async fn count_posts(&self, feed: Feed) -> Fallible<usize> {
        Ok(self.tables.lock().unwrap().feed(&feed).len())
    }

    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: new_comment.post_id,
            author_id: new_comment.author_id,
            text: new_comment.text,
            created: Utc::now(),
        };
        self.tables.lock().unwrap().comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, post_id: Uuid) -> Fallible<Vec<Comment>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let mut tables = self.tables.lock().unwrap();
        let follow = Follow { user_id, author_id };
        if tables.follows.contains(&follow) {
            return Ok(false);
        }
        tables.follows.push(follow);
        Ok(true)
    }

    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(tables.follows.len() != before)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let follow = Follow { user_id, author_id };
        Ok(self.tables.lock().unwrap().follows.contains(&follow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::Client as _;
    use chrono::Duration;

    async fn user(ds: &Client, name: &str) -> User {
        ds.new_user(NewUser {
            username: name.to_owned(),
        })
        .await
        .unwrap()
    }

    async fn group(ds: &Client, slug: &str) -> Group {
        ds.new_group(NewGroup {
            title: format!("Group {}", slug),
            slug: slug.to_owned(),
            description: String::new(),
        })
        .await
        .unwrap()
    }

    /// Posts `n` posts one minute apart, returned oldest first.
    fn post_many(ds: &Client, n: i64, author_id: Uuid, group_id: Option<Uuid>) -> Vec<Post> {
        let start = Utc::now() - Duration::days(1);
        (0..n)
            .map(|i| {
                let post = Post {
                    id: Uuid::new_v4(),
                    text: format!("post number {}", i),
                    pub_date: start + Duration::minutes(i),
                    author_id,
                    group_id,
                    image: None,
                    seq: 0,
                };
                ds.insert_post(post)
            })
            .collect()
    }

    fn newest_ids(posts: &[Post], n: usize) -> Vec<Uuid> {
        posts.iter().rev().take(n).map(|p| p.id).collect()
    }

    #[actix_rt::test]
    async fn test_group_feed_is_newest_posts_in_group() {
        let ds = Client::default();
        let author = user(&ds, "IvanMakarov").await;
        let cats = group(&ds, "cats").await;
        let dogs = group(&ds, "dogs").await;
        let cat_posts = post_many(&ds, 13, author.id, Some(cats.id));
        post_many(&ds, 4, author.id, Some(dogs.id));

        let page = ds.feed_page(Feed::Group(cats.id), 10, None).await.unwrap();
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, newest_ids(&cat_posts, 10));
        assert_eq!(page.window.count, 13);

        let second = ds.feed_page(Feed::Group(cats.id), 10, Some("2")).await.unwrap();
        assert_eq!(second.items.len(), 3);
    }

    #[actix_rt::test]
    async fn test_equal_timestamps_put_newest_insert_first() {
        let ds = Client::default();
        let author = user(&ds, "IvanMakarov").await;
        let pub_date = Utc::now();
        let posts: Vec<Post> = (0..3)
            .map(|i| {
                ds.insert_post(Post {
                    id: Uuid::new_v4(),
                    text: format!("same instant {}", i),
                    pub_date,
                    author_id: author.id,
                    group_id: None,
                    image: None,
                    seq: 0,
                })
            })
            .collect();
        assert!(posts[0].seq < posts[1].seq && posts[1].seq < posts[2].seq);

        let page = ds.feed_page(Feed::Index, 10, None).await.unwrap();
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, newest_ids(&posts, 3));
    }

    #[actix_rt::test]
    async fn test_author_feed_is_newest_posts_by_author() {
        let ds = Client::default();
        let ivan = user(&ds, "IvanMakarov").await;
        let alex = user(&ds, "AlexPushkin").await;
        let ivans = post_many(&ds, 12, ivan.id, None);
        post_many(&ds, 5, alex.id, None);

        let page = ds.feed_page(Feed::Author(ivan.id), 10, None).await.unwrap();
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, newest_ids(&ivans, 10));
        assert_eq!(ds.count_posts(Feed::Author(alex.id)).await.unwrap(), 5);
        assert_eq!(ds.count_posts(Feed::Index).await.unwrap(), 17);
    }

    #[actix_rt::test]
    async fn test_following_feed_only_has_followed_authors() {
        let ds = Client::default();
        let reader = user(&ds, "IvanSergeev").await;
        let followed = user(&ds, "AlexVasnetsov").await;
        let other = user(&ds, "MikeLermontov").await;
        let wanted = post_many(&ds, 2, followed.id, None);
        post_many(&ds, 2, other.id, None);

        assert!(ds.follow(reader.id, followed.id).await.unwrap());
        let page = ds.feed_page(Feed::Following(reader.id), 10, None).await.unwrap();
        let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, newest_ids(&wanted, 10));

        let page = ds.feed_page(Feed::Following(other.id), 10, None).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[actix_rt::test]
    async fn test_follow_is_idempotent_and_unfollow_restores_count() {
        let ds = Client::default();
        let reader = user(&ds, "IvanSergeev").await;
        let author = user(&ds, "AlexVasnetsov").await;
        let before = ds.follow_count();

        assert!(ds.follow(reader.id, author.id).await.unwrap());
        assert!(!ds.follow(reader.id, author.id).await.unwrap());
        assert_eq!(ds.follow_count(), before + 1);
        assert!(ds.is_following(reader.id, author.id).await.unwrap());

        assert!(ds.unfollow(reader.id, author.id).await.unwrap());
        assert!(!ds.unfollow(reader.id, author.id).await.unwrap());
        assert_eq!(ds.follow_count(), before);
    }

    #[actix_rt::test]
    async fn test_deleting_user_cascades() {
        let ds = Client::default();
        let ivan = user(&ds, "IvanMakarov").await;
        let alex = user(&ds, "AlexPushkin").await;
        let ivans = post_many(&ds, 3, ivan.id, None);
        let alexs = post_many(&ds, 1, alex.id, None);
        // Alex comments on Ivan's post, Ivan comments on Alex's post.
        for (post, author) in &[(&ivans[0], alex.id), (&alexs[0], ivan.id)] {
            ds.new_comment(NewComment {
                post_id: post.id,
                author_id: *author,
                text: "nice".to_owned(),
            })
            .await
            .unwrap();
        }
        ds.follow(alex.id, ivan.id).await.unwrap();

        let deleted = ds.delete_user("IvanMakarov").await.unwrap();
        assert_eq!(deleted, Some(ivan));
        assert_eq!(ds.post_count(), 1);
        assert_eq!(ds.comment_count(), 0);
        assert_eq!(ds.follow_count(), 0);
        assert_eq!(ds.delete_user("IvanMakarov").await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn test_deleting_group_cascades() {
        let ds = Client::default();
        let author = user(&ds, "IvanMakarov").await;
        let cats = group(&ds, "cats").await;
        let grouped = post_many(&ds, 2, author.id, Some(cats.id));
        post_many(&ds, 1, author.id, None);
        ds.new_comment(NewComment {
            post_id: grouped[0].id,
            author_id: author.id,
            text: "meow".to_owned(),
        })
        .await
        .unwrap();

        assert!(ds.delete_group("cats").await.unwrap().is_some());
        assert_eq!(ds.post_count(), 1);
        assert_eq!(ds.comment_count(), 0);
        assert!(ds.find_group("cats").await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_duplicate_slug_conflicts() {
        let ds = Client::default();
        group(&ds, "cats").await;
        let err = ds
            .new_group(NewGroup {
                title: "Cats again".to_owned(),
                slug: "cats".to_owned(),
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "UserConflict: Group slug is taken");
    }
}
