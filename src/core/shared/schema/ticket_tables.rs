diesel::table! {
    tickets (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        helpdesk_id -> Uuid,
        department_id -> Uuid,
        form_category_id -> Nullable<Uuid>,
        ticket_number -> Varchar,
        title -> Varchar,
        description -> Nullable<Text>,
        priority -> Varchar,
        ticket_type -> Varchar,
        source -> Varchar,
        state_id -> Nullable<Uuid>,
        assignee_id -> Nullable<Uuid>,
        created_by -> Nullable<Uuid>,
        custom_fields -> Jsonb,
        email_message_id -> Nullable<Varchar>,
        first_response_at -> Nullable<Timestamptz>,
        resolved_at -> Nullable<Timestamptz>,
        version -> Int4,
        embedding -> Nullable<Array<Float4>>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_comments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        author_id -> Nullable<Uuid>,
        author_name -> Nullable<Varchar>,
        content -> Text,
        is_internal -> Bool,
        source -> Varchar,
        email_message_id -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_activity (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        actor_id -> Nullable<Uuid>,
        kind -> Varchar,
        detail -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_escalations (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        rule_id -> Uuid,
        applied_at -> Timestamptz,
    }
}
