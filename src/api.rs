use crate::cache::PageCache;
use crate::datastore::{
    structs::{Post, User},
    Client,
};
use crate::metrics;
use crate::paginator::Page;
use crate::twoface::{Cause, Fallible, TfError};
use actix_web::HttpResponse;
use actix_web_httpauth::extractors::basic::BasicAuth;
use bytes::Bytes;
use chrono::{offset::Utc, DateTime};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub mod admin;
pub mod userfacing;

/// Everything the handlers share. Cloned into every worker of every server.
pub struct State<DS> {
    pub ds: DS,
    pub cache: Arc<dyn PageCache>,
    pub per_page: usize,
}

impl<DS: Clone> Clone for State<DS> {
    fn clone(&self) -> Self {
        Self {
            ds: self.ds.clone(),
            cache: Arc::clone(&self.cache),
            per_page: self.per_page,
        }
    }
}

/// The `?page=` parameter of every paginated listing. Kept as a raw string, because the paginator
/// decides what to do with garbage.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// A subset of Post that doesn't include business-sensitive fields
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
pub struct UserFacingPost {
    pub id: Uuid,
    /// Start of the text, for link titles.
    pub preview: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

impl From<Post> for UserFacingPost {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            preview: p.to_string(),
            text: p.text,
            pub_date: p.pub_date,
            author_id: p.author_id,
            group_id: p.group_id,
            image: p.image,
        }
    }
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug, Clone)]
pub struct UserFacingUser {
    pub id: Uuid,
    pub username: String,
}

impl From<User> for UserFacingUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
        }
    }
}

/// One page of a listing, with everything needed to render "page N of M" and next/previous links.
#[derive(Serialize, Deserialize, Debug)]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<usize>,
    pub previous_page_number: Option<usize>,
}

impl From<Page<Post>> for PageView<UserFacingPost> {
    fn from(page: Page<Post>) -> Self {
        let w = page.window;
        Self {
            items: page.items.coerce_into(),
            number: w.number,
            num_pages: w.num_pages,
            count: w.count,
            has_next: w.has_next(),
            has_previous: w.has_previous(),
            next_page_number: w.next_page_number(),
            previous_page_number: w.previous_page_number(),
        }
    }
}

pub trait CoerceColl<T>
where
    Self: IntoIterator<Item = T>,
{
    fn coerce_into<U: From<T>>(self) -> Vec<U>;
}

impl<T> CoerceColl<T> for Vec<T> {
    fn coerce_into<U: From<T>>(self) -> Vec<U> {
        self.into_iter().map(|v| v.into()).collect()
    }
}

/// Look up the user named in the request's credentials. Checking the password is the job of the
/// gateway in front of this service; here we only need to know who's asking.
async fn viewer<DS: Client>(ds: &DS, auth: &BasicAuth) -> Fallible<User> {
    let username: &str = &auth.user_id();
    guard!(let Some(user) = ds.find_user(username).await? else {
        return Err(TfError::user(Cause::UserBadAuth, "Unknown user"));
    });
    Ok(user)
}

/// Reject blank post/comment text, and trim what's left.
fn clean_text(text: &str) -> Fallible<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TfError::user(Cause::UserInvalidField, "Text can't be blank"));
    }
    Ok(text.to_owned())
}

fn json_body(body: Bytes) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/json")
        .body(body)
}

/// Execute the closure, then log its operational metrics, e.g. time taken, whether it returned Ok/Err, etc.
async fn observe<F, Fut, R>(name: &'static str, f: F) -> Fallible<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Fallible<R>>,
{
    let start = Instant::now();
    let return_val = f().await;
    let duration = start.elapsed();
    metrics::HANDLER_SECS
        .with_label_values(&[name])
        .observe(duration.as_secs_f64());
    metrics::RESPONSES
        .with_label_values(&[name, variant_name(&return_val)])
        .inc();
    return_val
}

fn variant_name<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "err"
    }
}
