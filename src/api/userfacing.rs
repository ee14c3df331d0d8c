//! The public site: feeds, post pages, writing posts and comments, following authors.
//!
//! Reads are open to everyone. Writes need `Authorization: Basic` credentials naming an existing
//! user. For every business-logic struct in `datastore`, this module has a matching struct
//! which redacts some business-sensitive fields.
use crate::api::{
    clean_text, json_body, observe, viewer, PageQuery, PageView, State, UserFacingPost,
    UserFacingUser,
};
use crate::datastore::{
    feed::Feed,
    structs::{Comment, NewComment, NewPost, PostEdit},
    Client,
};
use crate::metrics;
use crate::twoface::{Cause, Fallible, OrNotFound, TfError};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_httpauth::extractors::basic::BasicAuth;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

pub fn configure<DS: Client + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index::<DS>))
        .route("/create/", web::post().to(post_create::<DS>))
        .route("/follow/", web::get().to(follow_index::<DS>))
        .route("/group/{slug}/", web::get().to(group_posts::<DS>))
        .route("/profile/{username}/", web::get().to(profile::<DS>))
        .route("/profile/{username}/follow/", web::post().to(profile_follow::<DS>))
        .route("/profile/{username}/unfollow/", web::post().to(profile_unfollow::<DS>))
        .route("/posts/{post_id}/", web::get().to(post_detail::<DS>))
        .route("/posts/{post_id}/", web::delete().to(post_delete::<DS>))
        .route("/posts/{post_id}/edit/", web::post().to(post_edit::<DS>))
        .route("/posts/{post_id}/comment/", web::post().to(add_comment::<DS>));
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GroupPage {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub page: PageView<UserFacingPost>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProfilePage {
    pub author: UserFacingUser,
    /// Does the requesting user follow this author? False for anonymous requests.
    pub following: bool,
    pub page: PageView<UserFacingPost>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PostDetail {
    pub post: UserFacingPost,
    pub author_post_count: usize,
    pub comments: Vec<Comment>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WritePostBody {
    pub text: String,
    /// Slug of the group to post in.
    #[serde(default)]
    pub group: Option<String>,
    /// Reference to an image that's already been uploaded. When editing, leaving it out keeps the
    /// post's current image.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WriteCommentBody {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct FollowStatus {
    pub author: String,
    pub following: bool,
}

// Every post on the site. The rendered page is cached, so new posts take a while to show up here.
async fn index<DS: Client>(
    state: web::Data<State<DS>>,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Fallible<HttpResponse> {
    observe("index", || async {
        let key = req.uri().to_string();
        if let Some(body) = state.cache.get(&key) {
            metrics::PAGE_CACHE.with_label_values(&["hit"]).inc();
            return Ok(json_body(body));
        }
        metrics::PAGE_CACHE.with_label_values(&["miss"]).inc();

        let page = state
            .ds
            .feed_page(Feed::Index, state.per_page, query.page.as_deref())
            .await?;
        let body = Bytes::from(serde_json::to_vec(&PageView::from(page))?);
        state.cache.set(key, body.clone());
        Ok(json_body(body))
    })
    .await
}

async fn group_posts<DS: Client>(
    state: web::Data<State<DS>>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Fallible<web::Json<GroupPage>> {
    observe("group_posts", || async {
        let group = state
            .ds
            .find_group(slug.as_str())
            .await?
            .or_not_found("Group not found")?;
        let page = state
            .ds
            .feed_page(Feed::Group(group.id), state.per_page, query.page.as_deref())
            .await?;
        Ok(web::Json(GroupPage {
            title: group.title,
            slug: group.slug,
            description: group.description,
            page: page.into(),
        }))
    })
    .await
}

async fn profile<DS: Client>(
    state: web::Data<State<DS>>,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
    auth: Option<BasicAuth>,
) -> Fallible<web::Json<ProfilePage>> {
    observe("profile", || async {
        let author = state
            .ds
            .find_user(username.as_str())
            .await?
            .or_not_found("User not found")?;
        // Profiles are public, so credentials naming nobody just mean an anonymous reader.
        let reader = match &auth {
            Some(auth) => {
                let username: &str = &auth.user_id();
                state.ds.find_user(username).await?
            }
            None => None,
        };
        let following = match reader {
            Some(reader) => state.ds.is_following(reader.id, author.id).await?,
            None => false,
        };
        let page = state
            .ds
            .feed_page(Feed::Author(author.id), state.per_page, query.page.as_deref())
            .await?;
        Ok(web::Json(ProfilePage {
            author: author.into(),
            following,
            page: page.into(),
        }))
    })
    .await
}

async fn post_detail<DS: Client>(
    state: web::Data<State<DS>>,
    post_id: web::Path<Uuid>,
) -> Fallible<web::Json<PostDetail>> {
    observe("post_detail", || async {
        let post = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found("Post not found")?;
        let author_post_count = state.ds.count_posts(Feed::Author(post.author_id)).await?;
        let comments = state.ds.list_comments(post.id).await?;
        Ok(web::Json(PostDetail {
            post: post.into(),
            author_post_count,
            comments,
        }))
    })
    .await
}

/// Turn an optional group slug from a form into a group ID. An empty slug means "no group".
async fn resolve_group<DS: Client>(ds: &DS, slug: Option<&str>) -> Fallible<Option<Uuid>> {
    let slug = match slug.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(slug) => slug,
    };
    guard!(let Some(group) = ds.find_group(slug).await? else {
        return Err(TfError::user(Cause::UserInvalidField, "No such group"));
    });
    Ok(Some(group.id))
}

async fn post_create<DS: Client>(
    state: web::Data<State<DS>>,
    auth: BasicAuth,
    body: web::Json<WritePostBody>,
) -> Fallible<web::Json<UserFacingPost>> {
    observe("post_create", || async {
        let author = viewer(&state.ds, &auth).await?;
        let new_post = NewPost {
            text: clean_text(&body.text)?,
            author_id: author.id,
            group_id: resolve_group(&state.ds, body.group.as_deref()).await?,
            image: body.image.clone(),
        };
        let post = state.ds.new_post(new_post).await?;
        info!(post_id = %post.id, author = &author.username[..], "created post");
        Ok(web::Json(post.into()))
    })
    .await
}

async fn post_edit<DS: Client>(
    state: web::Data<State<DS>>,
    auth: BasicAuth,
    post_id: web::Path<Uuid>,
    body: web::Json<WritePostBody>,
) -> Fallible<web::Json<UserFacingPost>> {
    observe("post_edit", || async {
        let editor = viewer(&state.ds, &auth).await?;
        let post = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found("Post not found")?;
        if post.author_id != editor.id {
            return Err(TfError::user(
                Cause::UserForbidden,
                "Only the author can edit a post",
            ));
        }
        let edit = PostEdit {
            text: clean_text(&body.text)?,
            group_id: resolve_group(&state.ds, body.group.as_deref()).await?,
            image: body.image.clone().or(post.image),
        };
        let post = state
            .ds
            .edit_post(post.id, edit)
            .await?
            .or_not_found("Post not found")?;
        debug!(post_id = %post.id, "edited post");
        Ok(web::Json(post.into()))
    })
    .await
}

async fn post_delete<DS: Client>(
    state: web::Data<State<DS>>,
    auth: BasicAuth,
    post_id: web::Path<Uuid>,
) -> Fallible<web::Json<UserFacingPost>> {
    observe("post_delete", || async {
        let author = viewer(&state.ds, &auth).await?;
        let post = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found("Post not found")?;
        if post.author_id != author.id {
            return Err(TfError::user(
                Cause::UserForbidden,
                "Only the author can delete a post",
            ));
        }
        let post = state
            .ds
            .delete_post(post.id)
            .await?
            .or_not_found("Post not found")?;
        info!(post_id = %post.id, "deleted post");
        Ok(web::Json(post.into()))
    })
    .await
}

async fn add_comment<DS: Client>(
    state: web::Data<State<DS>>,
    auth: BasicAuth,
    post_id: web::Path<Uuid>,
    body: web::Json<WriteCommentBody>,
) -> Fallible<web::Json<Comment>> {
    observe("add_comment", || async {
        let author = viewer(&state.ds, &auth).await?;
        let post = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found("Post not found")?;
        let comment = state
            .ds
            .new_comment(NewComment {
                post_id: post.id,
                author_id: author.id,
                text: clean_text(&body.text)?,
            })
            .await?;
        Ok(web::Json(comment))
    })
    .await
}

// Posts by every author the requesting user follows.
async fn follow_index<DS: Client>(
    state: web::Data<State<DS>>,
    auth: BasicAuth,
    query: web::Query<PageQuery>,
) -> Fallible<web::Json<PageView<UserFacingPost>>> {
    observe("follow_index", || async {
        let reader = viewer(&state.ds, &auth).await?;
        let page = state
            .ds
            .feed_page(Feed::Following(reader.id), state.per_page, query.page.as_deref())
            .await?;
        Ok(web::Json(page.into()))
    })
    .await
}

async fn profile_follow<DS: Client>(
    state: web::Data<State<DS>>,
    auth: BasicAuth,
    username: web::Path<String>,
) -> Fallible<web::Json<FollowStatus>> {
    observe("profile_follow", || async {
        let reader = viewer(&state.ds, &auth).await?;
        let author = state
            .ds
            .find_user(username.as_str())
            .await?
            .or_not_found("User not found")?;
        if author.id == reader.id {
            return Err(TfError::user(
                Cause::UserActionInvalid,
                "You can't follow yourself",
            ));
        }
        if state.ds.follow(reader.id, author.id).await? {
            info!(reader = &reader.username[..], author = &author.username[..], "followed");
        }
        Ok(web::Json(FollowStatus {
            author: author.username,
            following: true,
        }))
    })
    .await
}

async fn profile_unfollow<DS: Client>(
    state: web::Data<State<DS>>,
    auth: BasicAuth,
    username: web::Path<String>,
) -> Fallible<web::Json<FollowStatus>> {
    observe("profile_unfollow", || async {
        let reader = viewer(&state.ds, &auth).await?;
        let author = state
            .ds
            .find_user(username.as_str())
            .await?
            .or_not_found("User not found")?;
        if state.ds.unfollow(reader.id, author.id).await? {
            info!(reader = &reader.username[..], author = &author.username[..], "unfollowed");
        }
        Ok(web::Json(FollowStatus {
            author: author.username,
            following: false,
        }))
    })
    .await
}
