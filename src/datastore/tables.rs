#[allow(unused_imports)]
use diesel::sql_types::*;

table! {
    users (id) {
        id -> Uuid,
        username -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    groups (id) {
        id -> Uuid,
        title -> Text,
        slug -> Text,
        description -> Text,
    }
}

table! {
    posts (id) {
        id -> Uuid,
        text -> Text,
        pub_date -> Timestamptz,
        author_id -> Uuid,
        group_id -> Nullable<Uuid>,
        image -> Nullable<Text>,
        seq -> Int8,
    }
}

table! {
    comments (id) {
        id -> Uuid,
        post_id -> Uuid,
        author_id -> Uuid,
        text -> Text,
        created -> Timestamptz,
    }
}

table! {
    follows (user_id, author_id) {
        user_id -> Uuid,
        author_id -> Uuid,
    }
}

joinable!(posts -> users (author_id));
joinable!(posts -> groups (group_id));
joinable!(comments -> posts (post_id));

allow_tables_to_appear_in_same_query!(users, groups, posts, comments, follows);
