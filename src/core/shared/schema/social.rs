diesel::table! {
    feed_channels (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        name -> Varchar,
        department_id -> Nullable<Uuid>,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    feed_posts (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        channel_id -> Nullable<Uuid>,
        author_id -> Nullable<Uuid>,
        content -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    feed_post_comments (id) {
        id -> Uuid,
        post_id -> Uuid,
        author_id -> Nullable<Uuid>,
        content -> Text,
        created_at -> Timestamptz,
    }
}
