use crate::datastore::{
    feed::Feed,
    postgres::{
        errors::{BlockingResp, DbPoolResult, UniqueViolation},
        PostgresStore,
    },
    structs::{Comment, Follow, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostEdit, User},
    tables::{comments, follows, groups, posts, users},
    Client,
};
use crate::paginator::{Page, PageWindow};
use crate::twoface::{Fallible, TfError};
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    pg::Pg,
    query_dsl::{QueryDsl, RunQueryDsl},
    result::Error as DieselError,
    BelongingToDsl, BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension,
};
use tracing::{debug, info};
use uuid::Uuid;

/// All posts on the feed, unordered and unpaginated.
fn feed_query(feed: Feed) -> posts::BoxedQuery<'static, Pg> {
    let query = posts::table.into_boxed();
    match feed {
        Feed::Index => query,
        Feed::Group(group_id) => query.filter(posts::group_id.eq(group_id)),
        Feed::Author(author_id) => query.filter(posts::author_id.eq(author_id)),
        Feed::Following(user_id) => query.filter(
            posts::author_id.eq_any(
                follows::table
                    .filter(follows::user_id.eq(user_id))
                    .select(follows::author_id),
            ),
        ),
    }
}

#[async_trait]
impl Client for PostgresStore {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(&conn)
                .conflict_as("Username is taken")
        })
        .await
        .to_resp()
    }

    async fn find_user(&self, username: &str) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        let username = username.to_owned();
        let query_result: DbPoolResult<_> = block(move || {
            users::table
                .filter(users::username.eq(username))
                .first::<User>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn delete_user(&self, username: &str) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        let username = username.to_owned();
        let user = block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let user: Option<User> = users::table
                    .filter(users::username.eq(username.as_str()))
                    .first(&conn)
                    .optional()?;
                guard!(let Some(user) = user else {
                    return Ok(None);
                });

                let their_posts = posts::table
                    .filter(posts::author_id.eq(user.id))
                    .select(posts::id);
                diesel::delete(
                    comments::table.filter(
                        comments::author_id
                            .eq(user.id)
                            .or(comments::post_id.eq_any(their_posts)),
                    ),
                )
                .execute(&conn)?;
                let num_posts =
                    diesel::delete(posts::table.filter(posts::author_id.eq(user.id)))
                        .execute(&conn)?;
                diesel::delete(
                    follows::table.filter(
                        follows::user_id
                            .eq(user.id)
                            .or(follows::author_id.eq(user.id)),
                    ),
                )
                .execute(&conn)?;
                diesel::delete(users::table.find(user.id)).execute(&conn)?;

                info!(username = &user.username[..], num_posts, "deleted user");
                Ok(Some(user))
            })
        })
        .await
        .to_resp()?;
        Ok(user)
    }

    async fn new_group(&self, new_group: NewGroup) -> Fallible<Group> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(groups::table)
                .values(&new_group)
                .get_result::<Group>(&conn)
                .conflict_as("Group slug is taken")
        })
        .await
        .to_resp()
    }

    async fn find_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let conn = self.pool.get()?;
        let slug = slug.to_owned();
        let query_result: DbPoolResult<_> = block(move || {
            groups::table
                .filter(groups::slug.eq(slug))
                .first::<Group>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn list_groups(&self) -> Fallible<Vec<Group>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> =
            block(move || groups::table.order_by(groups::title).load::<Group>(&conn)).await;
        query_result.to_resp()
    }

    async fn delete_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let conn = self.pool.get()?;
        let slug = slug.to_owned();
        let group = block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let group: Option<Group> = groups::table
                    .filter(groups::slug.eq(slug.as_str()))
                    .first(&conn)
                    .optional()?;
                guard!(let Some(group) = group else {
                    return Ok(None);
                });

                let group_posts = posts::table
                    .filter(posts::group_id.eq(group.id))
                    .select(posts::id);
                diesel::delete(comments::table.filter(comments::post_id.eq_any(group_posts)))
                    .execute(&conn)?;
                let num_posts =
                    diesel::delete(posts::table.filter(posts::group_id.eq(group.id)))
                        .execute(&conn)?;
                diesel::delete(groups::table.find(group.id)).execute(&conn)?;

                info!(slug = &group.slug[..], num_posts, "deleted group");
                Ok(Some(group))
            })
        })
        .await
        .to_resp()?;
        Ok(group)
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::insert_into(posts::table)
                .values(&new_post)
                .get_result::<Post>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn find_post(&self, post_id: Uuid) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> =
            block(move || posts::table.find(post_id).first::<Post>(&conn).optional()).await;
        query_result.to_resp()
    }

    async fn edit_post(&self, post_id: Uuid, edit: PostEdit) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::update(posts::table.find(post_id))
                .set(&edit)
                .get_result::<Post>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn delete_post(&self, post_id: Uuid) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        let post = block(move || {
            conn.transaction::<_, TfError, _>(|| {
                let post: Option<Post> = posts::table.find(post_id).first(&conn).optional()?;
                guard!(let Some(post) = post else {
                    return Ok(None);
                });
                diesel::delete(Comment::belonging_to(&post)).execute(&conn)?;
                diesel::delete(posts::table.find(post.id)).execute(&conn)?;
                Ok(Some(post))
            })
        })
        .await
        .to_resp()?;
        Ok(post)
    }

    async fn feed_page(
        &self,
        feed: Feed,
        per_page: usize,
        requested_page: Option<&str>,
    ) -> Fallible<Page<Post>> {
        let conn = self.pool.get()?;
        let requested_page = requested_page.map(str::to_owned);
        let query_result: DbPoolResult<_> = block(move || {
            let count: i64 = feed_query(feed).count().get_result(&conn)?;
            let window = PageWindow::resolve(count as usize, per_page, requested_page.as_deref());
            let items = feed_query(feed)
                .order_by((posts::pub_date.desc(), posts::seq.desc()))
                .limit(window.per_page as i64)
                .offset(window.offset() as i64)
                .load::<Post>(&conn)?;
            Ok::<_, DieselError>(Page { items, window })
        })
        .await;
        let page = query_result.to_resp()?;
        debug!(
            feed = feed.name(),
            page = page.window.number,
            num_pages = page.window.num_pages,
            "loaded feed page"
        );
        Ok(page)
    }

    async fn count_posts(&self, feed: Feed) -> Fallible<usize> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> =
            block(move || feed_query(feed).count().get_result::<i64>(&conn)).await;
        Ok(query_result.to_resp()? as usize)
    }

    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::insert_into(comments::table)
                .values(&new_comment)
                .get_result::<Comment>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn list_comments(&self, post_id: Uuid) -> Fallible<Vec<Comment>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            comments::table
                .filter(comments::post_id.eq(post_id))
                .order_by(comments::created)
                .load::<Comment>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::insert_into(follows::table)
                .values(&Follow { user_id, author_id })
                .on_conflict_do_nothing()
                .execute(&conn)
        })
        .await;
        Ok(query_result.to_resp()? > 0)
    }

    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::delete(follows::table.find((user_id, author_id))).execute(&conn)
        })
        .await;
        Ok(query_result.to_resp()? > 0)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            follows::table
                .find((user_id, author_id))
                .first::<Follow>(&conn)
                .optional()
        })
        .await;
        Ok(query_result.to_resp()?.is_some())
    }
}
