diesel::table! {
    departments (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        color -> Nullable<Varchar>,
        head_user_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    department_hierarchy (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        parent_department_id -> Nullable<Uuid>,
        child_department_id -> Uuid,
        relation_type -> Varchar,
        created_at -> Timestamptz,
    }
}
