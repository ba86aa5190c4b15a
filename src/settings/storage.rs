use chrono::{Duration, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::error::SettingsError;
use super::merge::{apply_patch, effective};
use super::permissions;
use super::types::*;
use crate::core::shared::schema::{
    announcements, departments, external_links, invitations, roles, system_settings, users,
};

pub const INVITATION_TTL_DAYS: i64 = 7;

fn require_department(conn: &mut PgConnection, tenant_id: Uuid, id: Option<Uuid>) -> Result<(), SettingsError> {
    let Some(id) = id else {
        return Ok(());
    };
    let found: i64 = departments::table
        .filter(departments::tenant_id.eq(tenant_id))
        .filter(departments::id.eq(id))
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(SettingsError::Validation(format!("unknown department {id}")));
    }
    Ok(())
}

fn require_role(conn: &mut PgConnection, tenant_id: Uuid, id: Option<Uuid>) -> Result<(), SettingsError> {
    let Some(id) = id else {
        return Ok(());
    };
    let found: i64 = roles::table
        .filter(roles::tenant_id.eq(tenant_id))
        .filter(roles::id.eq(id))
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(SettingsError::Validation(format!("unknown role {id}")));
    }
    Ok(())
}

fn normalize_email(raw: &str) -> Result<String, SettingsError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid {
        return Err(SettingsError::Validation(format!("'{raw}' is not an email address")));
    }
    Ok(email)
}

fn scope_row(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    department_id: Option<Uuid>,
) -> Result<Option<SystemSettingsRow>, SettingsError> {
    let mut q = system_settings::table
        .filter(system_settings::tenant_id.eq(tenant_id))
        .into_boxed();
    q = match department_id {
        Some(id) => q.filter(system_settings::department_id.eq(id)),
        None => q.filter(system_settings::department_id.is_null()),
    };
    Ok(q.select(SystemSettingsRow::as_select()).first(conn).optional()?)
}

pub fn effective_settings(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    department_id: Option<Uuid>,
) -> Result<EffectiveSettings, SettingsError> {
    require_department(conn, tenant_id, department_id)?;
    let global = scope_row(conn, tenant_id, None)?;
    let department = match department_id {
        Some(_) => scope_row(conn, tenant_id, department_id)?,
        None => None,
    };
    Ok(EffectiveSettings {
        department_id,
        settings: effective(
            global.as_ref().map(|r| &r.settings),
            department.as_ref().map(|r| &r.settings),
        ),
    })
}

/// Merge-patches the stored document of one scope, creating it on first write.
pub fn patch_settings(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    department_id: Option<Uuid>,
    patch: serde_json::Value,
) -> Result<EffectiveSettings, SettingsError> {
    if !patch.is_object() {
        return Err(SettingsError::Validation("settings patch must be a JSON object".to_string()));
    }
    conn.transaction::<_, SettingsError, _>(|conn| {
        require_department(conn, tenant_id, department_id)?;
        let now = Utc::now();
        match scope_row(conn, tenant_id, department_id)? {
            Some(mut row) => {
                apply_patch(&mut row.settings, &patch);
                diesel::update(system_settings::table.filter(system_settings::id.eq(row.id)))
                    .set((
                        system_settings::settings.eq(&row.settings),
                        system_settings::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            }
            None => {
                let mut settings = serde_json::json!({});
                apply_patch(&mut settings, &patch);
                diesel::insert_into(system_settings::table)
                    .values(&SystemSettingsRow {
                        id: Uuid::new_v4(),
                        tenant_id,
                        department_id,
                        settings,
                        updated_at: now,
                    })
                    .execute(conn)?;
            }
        }
        effective_settings(conn, tenant_id, department_id)
    })
}

pub fn list_roles(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<Role>, SettingsError> {
    Ok(roles::table
        .filter(roles::tenant_id.eq(tenant_id))
        .order(roles::name.asc())
        .select(Role::as_select())
        .load(conn)?)
}

pub fn create_role(conn: &mut PgConnection, tenant_id: Uuid, req: CreateRoleRequest) -> Result<Role, SettingsError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(SettingsError::Validation("role name is required".to_string()));
    }
    let permissions = permissions::normalize(&req.permissions).map_err(SettingsError::Validation)?;
    let role = Role {
        id: Uuid::new_v4(),
        tenant_id,
        name: name.to_string(),
        description: req.description,
        permissions,
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(roles::table)
        .values(&role)
        .returning(Role::as_returning())
        .get_result(conn)?)
}

/// Users holding the role fall back to no role.
pub fn delete_role(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), SettingsError> {
    let deleted = diesel::delete(roles::table.filter(roles::tenant_id.eq(tenant_id)).filter(roles::id.eq(id)))
        .execute(conn)?;
    if deleted == 0 {
        return Err(SettingsError::NotFound(format!("role {id}")));
    }
    Ok(())
}

pub fn list_users(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<User>, SettingsError> {
    Ok(users::table
        .filter(users::tenant_id.eq(tenant_id))
        .order(users::display_name.asc())
        .select(User::as_select())
        .load(conn)?)
}

pub fn create_user(conn: &mut PgConnection, tenant_id: Uuid, req: CreateUserRequest) -> Result<User, SettingsError> {
    let email = normalize_email(&req.email)?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(SettingsError::Validation("display name is required".to_string()));
    }
    require_role(conn, tenant_id, req.role_id)?;
    require_department(conn, tenant_id, req.department_id)?;
    let user = User {
        id: Uuid::new_v4(),
        tenant_id,
        email,
        display_name: display_name.to_string(),
        role_id: req.role_id,
        department_id: req.department_id,
        is_active: true,
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(users::table)
        .values(&user)
        .returning(User::as_returning())
        .get_result(conn)?)
}

pub fn invite_user(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    req: InviteUserRequest,
) -> Result<Invitation, SettingsError> {
    let email = normalize_email(&req.email)?;
    let existing: i64 = users::table
        .filter(users::tenant_id.eq(tenant_id))
        .filter(users::email.eq(&email))
        .count()
        .get_result(conn)?;
    if existing > 0 {
        return Err(SettingsError::Conflict(format!("{email} is already a member")));
    }
    require_role(conn, tenant_id, req.role_id)?;
    require_department(conn, tenant_id, req.department_id)?;

    let now = Utc::now();
    let invitation = Invitation {
        id: Uuid::new_v4(),
        tenant_id,
        email,
        role_id: req.role_id,
        department_id: req.department_id,
        token: Uuid::new_v4().simple().to_string(),
        status: "pending".to_string(),
        expires_at: now + Duration::days(INVITATION_TTL_DAYS),
        created_at: now,
    };
    Ok(diesel::insert_into(invitations::table)
        .values(&invitation)
        .returning(Invitation::as_returning())
        .get_result(conn)?)
}

fn check_url(url: &str) -> Result<(), SettingsError> {
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(SettingsError::Validation(format!("'{url}' is not an http(s) URL"))),
    }
}

pub fn list_links(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<ExternalLink>, SettingsError> {
    Ok(external_links::table
        .filter(external_links::tenant_id.eq(tenant_id))
        .order((external_links::sort_order.asc(), external_links::title.asc()))
        .select(ExternalLink::as_select())
        .load(conn)?)
}

pub fn create_link(conn: &mut PgConnection, tenant_id: Uuid, req: CreateLinkRequest) -> Result<ExternalLink, SettingsError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(SettingsError::Validation("title is required".to_string()));
    }
    check_url(&req.url)?;
    let link = ExternalLink {
        id: Uuid::new_v4(),
        tenant_id,
        title: title.to_string(),
        url: req.url,
        icon: req.icon,
        sort_order: req.sort_order,
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(external_links::table)
        .values(&link)
        .returning(ExternalLink::as_returning())
        .get_result(conn)?)
}

pub fn update_link(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    req: UpdateLinkRequest,
) -> Result<ExternalLink, SettingsError> {
    if let Some(url) = &req.url {
        check_url(url)?;
    }
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(SettingsError::Validation("title is required".to_string()));
    }
    let target = external_links::table
        .filter(external_links::tenant_id.eq(tenant_id))
        .filter(external_links::id.eq(id));
    let unchanged = req.title.is_none() && req.url.is_none() && req.icon.is_none() && req.sort_order.is_none();
    let link = if unchanged {
        target.select(ExternalLink::as_select()).first(conn).optional()?
    } else {
        diesel::update(target)
            .set(&req)
            .returning(ExternalLink::as_returning())
            .get_result(conn)
            .optional()?
    };
    link.ok_or_else(|| SettingsError::NotFound(format!("link {id}")))
}

pub fn delete_link(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), SettingsError> {
    let deleted = diesel::delete(
        external_links::table
            .filter(external_links::tenant_id.eq(tenant_id))
            .filter(external_links::id.eq(id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(SettingsError::NotFound(format!("link {id}")));
    }
    Ok(())
}

/// Pinned first, then newest. Without `include_inactive` only announcements
/// inside their publish window are returned; a department scope adds that
/// department's announcements to the tenant-wide ones.
pub fn list_announcements(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    query: AnnouncementQuery,
) -> Result<Vec<Announcement>, SettingsError> {
    let mut q = announcements::table
        .filter(announcements::tenant_id.eq(tenant_id))
        .into_boxed();
    q = match query.department_id {
        Some(id) => q.filter(
            announcements::department_id
                .is_null()
                .or(announcements::department_id.eq(id)),
        ),
        None => q.filter(announcements::department_id.is_null()),
    };
    let rows: Vec<Announcement> = q
        .order((announcements::pinned.desc(), announcements::created_at.desc()))
        .select(Announcement::as_select())
        .load(conn)?;
    if query.include_inactive {
        return Ok(rows);
    }
    let now = Utc::now();
    Ok(rows.into_iter().filter(|a| a.is_visible_at(now)).collect())
}

pub fn create_announcement(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    actor: Option<Uuid>,
    req: CreateAnnouncementRequest,
) -> Result<Announcement, SettingsError> {
    if req.title.trim().is_empty() {
        return Err(SettingsError::Validation("title is required".to_string()));
    }
    if let (Some(from), Some(until)) = (req.published_at, req.expires_at) {
        if until <= from {
            return Err(SettingsError::Validation("expiry must be after publication".to_string()));
        }
    }
    require_department(conn, tenant_id, req.department_id)?;
    let announcement = Announcement {
        id: Uuid::new_v4(),
        tenant_id,
        title: req.title.trim().to_string(),
        body: req.body,
        department_id: req.department_id,
        pinned: req.pinned,
        published_at: req.published_at,
        expires_at: req.expires_at,
        created_by: actor,
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(announcements::table)
        .values(&announcement)
        .returning(Announcement::as_returning())
        .get_result(conn)?)
}

pub fn update_announcement(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    req: UpdateAnnouncementRequest,
) -> Result<Announcement, SettingsError> {
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(SettingsError::Validation("title is required".to_string()));
    }
    let target = announcements::table
        .filter(announcements::tenant_id.eq(tenant_id))
        .filter(announcements::id.eq(id));
    let unchanged = req.title.is_none()
        && req.body.is_none()
        && req.pinned.is_none()
        && req.published_at.is_none()
        && req.expires_at.is_none();
    let announcement = if unchanged {
        target.select(Announcement::as_select()).first(conn).optional()?
    } else {
        diesel::update(target)
            .set(&req)
            .returning(Announcement::as_returning())
            .get_result(conn)
            .optional()?
    };
    announcement.ok_or_else(|| SettingsError::NotFound(format!("announcement {id}")))
}

pub fn delete_announcement(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), SettingsError> {
    let deleted = diesel::delete(
        announcements::table
            .filter(announcements::tenant_id.eq(tenant_id))
            .filter(announcements::id.eq(id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(SettingsError::NotFound(format!("announcement {id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalized() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        assert!(normalize_email("ana@localhost").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana.example.com").is_err());
    }

    #[test]
    fn test_links_must_be_http() {
        assert!(check_url("https://status.example.com/board").is_ok());
        assert!(check_url("javascript:alert(1)").is_err());
        assert!(check_url("not a url").is_err());
    }
}
