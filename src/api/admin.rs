//! Endpoints for site operators. Served on their own listener, which should never be exposed
//! publicly.
use crate::api::{observe, State, UserFacingUser};
use crate::datastore::{
    structs::{Group, NewGroup, NewUser},
    Client,
};
use crate::twoface::{Cause, Fallible, OrNotFound, TfError};
use actix_web::{web, HttpResponse};
use tracing::info;

const MAX_TITLE_LEN: usize = 200;
const MAX_USERNAME_LEN: usize = 150;

pub fn configure<DS: Client + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/users").route(web::post().to(create_user::<DS>)))
        .service(web::resource("/users/{username}").route(web::delete().to(delete_user::<DS>)))
        .service(
            web::resource("/groups")
                .route(web::get().to(list_groups::<DS>))
                .route(web::post().to(create_group::<DS>)),
        )
        .service(web::resource("/groups/{slug}").route(web::delete().to(delete_group::<DS>)))
        .service(web::resource("/cache").route(web::delete().to(clear_cache::<DS>)));
}

fn validate_username(username: &str) -> Fallible<()> {
    let allowed = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
    if username.is_empty()
        || username.chars().count() > MAX_USERNAME_LEN
        || !username.chars().all(allowed)
    {
        return Err(TfError::user(
            Cause::UserInvalidField,
            "Usernames are 1-150 letters, digits and @.+-_",
        ));
    }
    Ok(())
}

fn validate_group(group: &NewGroup) -> Fallible<()> {
    let slug_ok = !group.slug.is_empty()
        && group
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !slug_ok {
        return Err(TfError::user(
            Cause::UserInvalidField,
            "Slugs may only contain latin letters, digits, hyphens and underscores",
        ));
    }
    if group.title.trim().is_empty() || group.title.chars().count() > MAX_TITLE_LEN {
        return Err(TfError::user(
            Cause::UserInvalidField,
            "Titles must be between 1 and 200 characters",
        ));
    }
    Ok(())
}

async fn create_user<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<NewUser>,
) -> Fallible<web::Json<UserFacingUser>> {
    observe("create_user", || async {
        let new_user = body.into_inner();
        validate_username(&new_user.username)?;
        let user = state.ds.new_user(new_user).await?;
        info!(username = &user.username[..], "created user");
        Ok(web::Json(user.into()))
    })
    .await
}

async fn delete_user<DS: Client>(
    state: web::Data<State<DS>>,
    username: web::Path<String>,
) -> Fallible<web::Json<UserFacingUser>> {
    observe("delete_user", || async {
        let user = state
            .ds
            .delete_user(username.as_str())
            .await?
            .or_not_found("User not found")?;
        info!(username = &user.username[..], "deleted user");
        Ok(web::Json(user.into()))
    })
    .await
}

async fn list_groups<DS: Client>(state: web::Data<State<DS>>) -> Fallible<web::Json<Vec<Group>>> {
    observe("list_groups", || async { Ok(web::Json(state.ds.list_groups().await?)) }).await
}

async fn create_group<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<NewGroup>,
) -> Fallible<web::Json<Group>> {
    observe("create_group", || async {
        let new_group = body.into_inner();
        validate_group(&new_group)?;
        let group = state.ds.new_group(new_group).await?;
        info!(slug = &group.slug[..], "created group");
        Ok(web::Json(group))
    })
    .await
}

async fn delete_group<DS: Client>(
    state: web::Data<State<DS>>,
    slug: web::Path<String>,
) -> Fallible<web::Json<Group>> {
    observe("delete_group", || async {
        let group = state
            .ds
            .delete_group(slug.as_str())
            .await?
            .or_not_found("Group not found")?;
        info!(slug = &group.slug[..], "deleted group");
        Ok(web::Json(group))
    })
    .await
}

async fn clear_cache<DS: Client>(state: web::Data<State<DS>>) -> HttpResponse {
    state.cache.clear();
    info!("cleared page cache");
    HttpResponse::NoContent().finish()
}
