// Column lists shared by repositories

pub mod user_queries {
    pub const SELECT_ALL_COLUMNS: &str =
        "id, username, password_hash, email, enabled, created_at, updated_at";
}

pub mod organization_queries {
    /// Organization columns with the plan joined from `subscriptions s`
    pub const SELECT_WITH_PLAN: &str = r#"o.id, o.name, o.slug, o.timezone,
        COALESCE(s.plan, 'free') AS plan, o.created_at, o.updated_at"#;
}

pub mod contact_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id, org_id, first_name, last_name, email, phone,
        company, job_title, status, tags, notes, owner_id, created_at, updated_at"#;
}

pub mod deal_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id, org_id, title, value, currency, stage,
        contact_id, owner_id, expected_close_date, closed_at, lost_reason,
        created_at, updated_at"#;
}

pub mod activity_queries {
    pub const SELECT_ALL_COLUMNS: &str = r#"id, org_id, kind, subject, body, contact_id,
        deal_id, occurred_at, created_by, created_at"#;
}

pub mod onboarding_queries {
    pub const PROJECT_COLUMNS: &str =
        "id, org_id, name, client_contact_id, status, template_id, created_at, updated_at";

    pub const TEMPLATE_COLUMNS: &str =
        "id, org_id, name, steps, task_rules, created_at, updated_at";

    pub const SESSION_COLUMNS: &str = r#"id, org_id, project_id, template_id, current_step,
        responses, completion_percentage, status, completed_at, tasks_generated_at,
        created_at, updated_at"#;

    pub const TASK_COLUMNS: &str = r#"id, org_id, project_id, session_id, title, description,
        priority, status, due_date, assignee_id, created_at, updated_at"#;
}

pub mod email_queries {
    pub const MAILBOX_COLUMNS: &str = r#"id, org_id, user_id, provider, grant_id, email_address,
        sync_status, last_synced_at, sync_cursor, sync_high_water, last_error, messages_synced,
        created_at, updated_at"#;

    pub const THREAD_COLUMNS: &str = r#"id, org_id, mailbox_id, provider_thread_id, subject,
        participants, message_count, last_message_at, importance_score, importance_level,
        summary, created_at, updated_at"#;

    pub const MESSAGE_COLUMNS: &str = r#"id, org_id, mailbox_id, thread_id, provider_message_id,
        from_email, from_name, to_addresses, subject, snippet, body, received_at, unread,
        placement, auto_classified, created_at"#;

    pub const DECISION_COLUMNS: &str =
        "id, org_id, user_id, sender_email, bucket, created_at, updated_at";
}

pub mod campaign_queries {
    pub const SELECT_ALL_COLUMNS: &str =
        "id, org_id, name, description, goal, status, category, created_at, updated_at";
}

pub mod reminder_queries {
    pub const REMINDER_COLUMNS: &str = r#"id, org_id, user_id, title, notes, entity_type,
        entity_id, due_at, remind_before_minutes, channel, status, sent_at, last_error,
        created_at"#;

    pub const NOTIFICATION_COLUMNS: &str = "id, org_id, user_id, title, body, read_at, created_at";
}
