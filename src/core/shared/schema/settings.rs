diesel::table! {
    roles (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        permissions -> Array<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        email -> Varchar,
        display_name -> Varchar,
        role_id -> Nullable<Uuid>,
        department_id -> Nullable<Uuid>,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    invitations (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        email -> Varchar,
        role_id -> Nullable<Uuid>,
        department_id -> Nullable<Uuid>,
        token -> Varchar,
        status -> Varchar,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    system_settings (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        department_id -> Nullable<Uuid>,
        settings -> Jsonb,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    external_links (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        title -> Varchar,
        url -> Text,
        icon -> Nullable<Varchar>,
        sort_order -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    announcements (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        title -> Varchar,
        body -> Text,
        department_id -> Nullable<Uuid>,
        pinned -> Bool,
        published_at -> Nullable<Timestamptz>,
        expires_at -> Nullable<Timestamptz>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}
