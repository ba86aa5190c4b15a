diesel::table! {
    books (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        title -> Varchar,
        description -> Nullable<Text>,
        department_id -> Nullable<Uuid>,
        versioning_enabled -> Bool,
        max_versions -> Int4,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    pages (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        book_id -> Nullable<Uuid>,
        parent_id -> Nullable<Uuid>,
        kind -> Varchar,
        title -> Varchar,
        content -> Text,
        status -> Varchar,
        reviewer_id -> Nullable<Uuid>,
        version -> Int4,
        created_by -> Nullable<Uuid>,
        embedding -> Nullable<Array<Float4>>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    page_versions (id) {
        id -> Uuid,
        page_id -> Uuid,
        version_number -> Int4,
        title -> Varchar,
        content -> Text,
        author_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    page_comments (id) {
        id -> Uuid,
        page_id -> Uuid,
        author_id -> Nullable<Uuid>,
        author_name -> Nullable<Varchar>,
        content -> Text,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(pages -> books (book_id));
diesel::joinable!(page_versions -> pages (page_id));
diesel::joinable!(page_comments -> pages (page_id));

diesel::allow_tables_to_appear_in_same_query!(books, pages, page_versions, page_comments);
