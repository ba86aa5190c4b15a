diesel::table! {
    helpdesks (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        department_id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        enabled -> Bool,
        public_access -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    sla_states (id) {
        id -> Uuid,
        helpdesk_id -> Uuid,
        name -> Varchar,
        color -> Varchar,
        sort_order -> Int4,
        is_final -> Bool,
        is_default -> Bool,
        target_hours -> Nullable<Int4>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    sla_policies (id) {
        id -> Uuid,
        helpdesk_id -> Uuid,
        priority -> Varchar,
        first_response_hours -> Int4,
        resolution_hours -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    escalation_rules (id) {
        id -> Uuid,
        helpdesk_id -> Uuid,
        name -> Varchar,
        trigger_type -> Varchar,
        trigger_hours -> Int4,
        priority_filter -> Nullable<Varchar>,
        ticket_type_filter -> Nullable<Varchar>,
        from_state_id -> Nullable<Uuid>,
        target_department_id -> Nullable<Uuid>,
        target_user_id -> Nullable<Uuid>,
        notify_managers -> Bool,
        enabled -> Bool,
        sort_order -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    escalation_conditions (id) {
        id -> Uuid,
        rule_id -> Uuid,
        field -> Varchar,
        operator -> Varchar,
        value -> Text,
        logic_operator -> Varchar,
        position -> Int4,
    }
}

diesel::table! {
    ticket_form_categories (id) {
        id -> Uuid,
        helpdesk_id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        sort_order -> Int4,
        icon -> Nullable<Varchar>,
        color -> Nullable<Varchar>,
        enabled -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_form_fields (id) {
        id -> Uuid,
        helpdesk_id -> Uuid,
        form_category_id -> Nullable<Uuid>,
        field_key -> Varchar,
        label -> Varchar,
        field_type -> Varchar,
        required -> Bool,
        min_value -> Nullable<Float8>,
        max_value -> Nullable<Float8>,
        min_date -> Nullable<Date>,
        max_date -> Nullable<Date>,
        pattern -> Nullable<Text>,
        options -> Array<Text>,
        sort_order -> Int4,
        width -> Varchar,
        internal_only -> Bool,
        placeholder -> Nullable<Varchar>,
        help_text -> Nullable<Text>,
        conditional_field -> Nullable<Varchar>,
        conditional_value -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    inbound_email_configs (id) {
        id -> Uuid,
        helpdesk_id -> Uuid,
        address -> Varchar,
        display_name -> Nullable<Varchar>,
        enabled -> Bool,
        auto_reply -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    webhooks (id) {
        id -> Uuid,
        tenant_id -> Uuid,
        helpdesk_id -> Nullable<Uuid>,
        url -> Text,
        secret -> Varchar,
        events -> Array<Text>,
        enabled -> Bool,
        created_at -> Timestamptz,
    }
}
