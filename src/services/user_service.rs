use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::{audit, ensure_branch, list_filter, non_blank, search_clause, FieldErrors, ServiceError};
use crate::access::{sanitize_user, Scope, Viewer};
use crate::auth::password::validate_password_strength;
use crate::auth::{hash_password, verify_password, Role};
use crate::database::models::user::USER_COLUMNS;
use crate::database::models::User;
use crate::database::Repository;
use crate::types::{double_option, ListQuery, Page};

const PASTORAL_NOTES: &str = "pastoral_notes";

/// User-list extras on top of [`ListQuery`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Honored for admins only
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUser {
    /// Required for superadmins, ignored otherwise
    pub church_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub member_details: Option<Value>,
    pub pastor_details: Option<Value>,
    pub bishop_details: Option<Value>,
    pub admin_details: Option<Value>,
}

fn default_role() -> Role {
    Role::Member
}

/// Body of `PUT /api/users/:id`. Absent fields are left alone; `null` clears
/// the nullable ones.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_image: Option<Option<String>>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub church_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub branch_id: Option<Option<Uuid>>,
    pub member_details: Option<Value>,
    pub pastor_details: Option<Value>,
    pub bishop_details: Option<Value>,
    pub admin_details: Option<Value>,
    /// Accepted only so it can be refused with a pointer to the password route
    pub password: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<User> {
        Repository::new("users", self.pool.clone())
    }

    pub async fn list(&self, viewer: &Viewer, query: &ListQuery, filter: &UserFilter) -> Result<Page<Value>, ServiceError> {
        viewer.require(&Role::PASTORAL)?;
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?.confine_pastor(viewer)?;

        let mut clause = scope.where_clause();
        if let Some(role) = filter.role {
            clause.insert("role".to_string(), json!(role));
        }
        if let Some(pattern) = query.search_pattern() {
            clause.insert(
                "$or".to_string(),
                search_clause(&pattern, &["first_name", "last_name", "email", "phone"]),
            );
        }

        let mut data = list_filter(clause, "last_name asc, first_name asc");
        data.include_deleted = filter.include_deleted && viewer.role.is_admin();

        let page = self.repository().page(data, query.page(), query.limit()).await?;
        Ok(page.map(|user| sanitize_user(&user, viewer)))
    }

    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<Value, ServiceError> {
        let user = self.find(id).await?;
        if !reachable(viewer, &user) {
            return Err(ServiceError::not_found("User not found"));
        }
        Ok(sanitize_user(&user, viewer))
    }

    pub async fn whoami(&self, viewer: &Viewer) -> Result<Value, ServiceError> {
        let user = self.find(viewer.id).await?;
        Ok(sanitize_user(&user, viewer))
    }

    async fn find(&self, id: Uuid) -> Result<User, ServiceError> {
        Ok(self
            .repository()
            .select_404(crate::filter::FilterData {
                where_clause: Some(json!({ "id": id })),
                ..Default::default()
            })
            .await?)
    }

    pub async fn create(&self, creator: &Viewer, input: CreateUser) -> Result<Value, ServiceError> {
        match creator.role {
            Role::Superadmin | Role::Admin => {}
            Role::Pastor if input.role == Role::Member => {}
            Role::Pastor => return Err(ServiceError::forbidden("Pastors may only add members")),
            _ => return Err(ServiceError::forbidden("You may not add users")),
        }
        if input.role == Role::Superadmin {
            return Err(ServiceError::forbidden("Superadmins are created with the flock CLI"));
        }

        let scope = Scope::resolve(creator, input.church_id, input.branch_id)?.confine_pastor(creator)?;

        let email = input.email.trim().to_lowercase();
        let phone = non_blank(input.phone);
        let mut errors = FieldErrors::new();
        errors.require_text("first_name", &input.first_name);
        errors.require_text("last_name", &input.last_name);
        errors.check_email("email", &email);
        if let Some(phone) = &phone {
            errors.check_phone("phone", phone);
        }
        if let Err(weak) = validate_password_strength(&input.password) {
            errors.add("password", weak.to_string());
        }
        check_birth_date(&mut errors, input.date_of_birth);
        errors.into_result()?;

        let supplied = [
            (Role::Member, input.member_details),
            (Role::Pastor, input.pastor_details),
            (Role::Bishop, input.bishop_details),
            (Role::Admin, input.admin_details),
        ];
        let mut details = json!({});
        for (role, value) in supplied {
            if let Some(value) = value {
                let changes = details_changes(role, input.role, value)?;
                details = merge_details(Some(details), changes);
            }
        }
        let slot = |role: Role| (role == input.role).then(|| details.clone());

        let password_hash = hash_password(&input.password)?;

        let mut tx = self.pool.begin().await?;
        if let Some(branch_id) = scope.branch_id {
            ensure_branch(&mut *tx, scope.church_id, branch_id).await?;
        }
        ensure_unique(&mut *tx, Some(scope.church_id), "email", &email, None).await?;
        if let Some(phone) = &phone {
            ensure_unique(&mut *tx, Some(scope.church_id), "phone", phone, None).await?;
        }

        let user: User = sqlx::query_as(&format!(
            "INSERT INTO users (id, church_id, branch_id, first_name, last_name, email, phone, password_hash, role, \
             gender, date_of_birth, address, profile_image, is_active, member_details, pastor_details, \
             bishop_details, admin_details) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, true, $14, $15, $16, $17) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(&email)
        .bind(&phone)
        .bind(&password_hash)
        .bind(input.role)
        .bind(non_blank(input.gender))
        .bind(input.date_of_birth)
        .bind(non_blank(input.address))
        .bind(non_blank(input.profile_image))
        .bind(slot(Role::Member))
        .bind(slot(Role::Pastor))
        .bind(slot(Role::Bishop))
        .bind(slot(Role::Admin))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("User {} created {} {} in church {}", creator.id, user.role, user.id, scope.church_id);
        Ok(sanitize_user(&user, creator))
    }

    /// Locks the row, applies the merge and writes it back in one
    /// transaction. Any error drops the transaction uncommitted.
    pub async fn update(&self, editor: &Viewer, id: Uuid, patch: UserUpdate) -> Result<Value, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let target: Option<User> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE id = $1 AND is_deleted = false FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let target = target
            .filter(|user| reachable(editor, user))
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        let next = apply_update(editor, &target, patch)?;

        let church_moved = next.church_id != target.church_id;
        if let Some(church_id) = next.church_id {
            if church_moved {
                ensure_live_church(&mut *tx, church_id).await?;
            }
            if let Some(branch_id) = next.branch_id {
                if church_moved || next.branch_id != target.branch_id {
                    ensure_branch(&mut *tx, church_id, branch_id).await?;
                }
            }
        }
        if church_moved || !next.email.eq_ignore_ascii_case(&target.email) {
            ensure_unique(&mut *tx, next.church_id, "email", &next.email, Some(next.id)).await?;
        }
        if let Some(phone) = &next.phone {
            if church_moved || next.phone != target.phone {
                ensure_unique(&mut *tx, next.church_id, "phone", phone, Some(next.id)).await?;
            }
        }

        let saved: User = sqlx::query_as(&format!(
            "UPDATE users SET church_id = $2, branch_id = $3, first_name = $4, last_name = $5, email = $6, \
             phone = $7, role = $8, gender = $9, date_of_birth = $10, address = $11, profile_image = $12, \
             is_active = $13, member_details = $14, pastor_details = $15, bishop_details = $16, \
             admin_details = $17, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(next.id)
        .bind(next.church_id)
        .bind(next.branch_id)
        .bind(&next.first_name)
        .bind(&next.last_name)
        .bind(&next.email)
        .bind(&next.phone)
        .bind(next.role)
        .bind(&next.gender)
        .bind(next.date_of_birth)
        .bind(&next.address)
        .bind(&next.profile_image)
        .bind(next.is_active)
        .bind(&next.member_details)
        .bind(&next.pastor_details)
        .bind(&next.bishop_details)
        .bind(&next.admin_details)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("User {} updated user {}", editor.id, saved.id);
        audit(editor, "update", "user", saved.id);
        Ok(sanitize_user(&saved, editor))
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<Value, ServiceError> {
        viewer.require(&Role::ADMINS)?;
        if viewer.id == id {
            return Err(ServiceError::bad_request("You cannot delete your own account"));
        }
        let target = self.find(id).await?;
        if !reachable(viewer, &target) {
            return Err(ServiceError::not_found("User not found"));
        }

        let deleted: User = sqlx::query_as(&format!(
            "UPDATE users SET is_deleted = true, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("User {} soft-deleted user {}", viewer.id, id);
        audit(viewer, "delete", "user", id);
        Ok(sanitize_user(&deleted, viewer))
    }

    pub async fn restore(&self, viewer: &Viewer, id: Uuid) -> Result<Value, ServiceError> {
        viewer.require(&Role::ADMINS)?;
        let target: Option<User> = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let target = target
            .filter(|user| reachable(viewer, user))
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        if !target.is_deleted {
            return Err(ServiceError::bad_request("User is not deleted"));
        }

        // The partial unique indexes reject a restore whose email or phone
        // has since been reused.
        let restored: User = sqlx::query_as(&format!(
            "UPDATE users SET is_deleted = false, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("User {} restored user {}", viewer.id, id);
        audit(viewer, "restore", "user", id);
        Ok(sanitize_user(&restored, viewer))
    }

    pub async fn change_password(&self, viewer: &Viewer, input: ChangePassword) -> Result<(), ServiceError> {
        let user = self.find(viewer.id).await?;
        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(ServiceError::invalid("current_password", "Current password is incorrect"));
        }
        if input.current_password == input.new_password {
            return Err(ServiceError::invalid("new_password", "New password must differ from the current one"));
        }
        let password_hash = hash_password(&input.new_password)?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user.id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        tracing::info!("User {} changed their password", user.id);
        Ok(())
    }

    /// Email + password login. The same email may exist in several churches;
    /// the slug disambiguates when more than one password matches.
    pub async fn authenticate(&self, email: &str, password: &str, church_slug: Option<&str>) -> Result<User, ServiceError> {
        let email = email.trim().to_lowercase();
        let candidates: Vec<User> = match church_slug.map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM users WHERE lower(email) = $1 AND is_deleted = false \
                     AND church_id IN (SELECT id FROM churches WHERE lower(slug) = lower($2) AND is_deleted = false)",
                    USER_COLUMNS
                ))
                .bind(&email)
                .bind(slug)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM users WHERE lower(email) = $1 AND is_deleted = false",
                    USER_COLUMNS
                ))
                .bind(&email)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut matching = Vec::new();
        for user in candidates {
            if verify_password(password, &user.password_hash)? {
                matching.push(user);
            }
        }
        let user = match matching.len() {
            0 => {
                tracing::warn!("Failed login for {}", email);
                return Err(ServiceError::Unauthorized("Invalid email or password".to_string()));
            }
            1 => matching.remove(0),
            _ => {
                return Err(ServiceError::invalid(
                    "church",
                    "This account exists in several churches; provide the church slug",
                ))
            }
        };

        let user = self.session_user(user.id).await?;
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(user)
    }

    /// A user who may hold a session right now: live, active, and in a live,
    /// active church (superadmins have none).
    pub async fn session_user(&self, id: Uuid) -> Result<User, ServiceError> {
        let user: Option<User> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1 AND is_deleted = false", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let user = user.ok_or_else(|| ServiceError::Unauthorized("Account no longer exists".to_string()))?;
        if !user.is_active {
            return Err(ServiceError::forbidden("Account is disabled"));
        }
        if let Some(church_id) = user.church_id {
            let church: Option<(bool,)> =
                sqlx::query_as("SELECT is_active FROM churches WHERE id = $1 AND is_deleted = false")
                    .bind(church_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if !matches!(church, Some((true,))) {
                return Err(ServiceError::forbidden("Church is not active"));
            }
        }
        Ok(user)
    }
}

/// Rows outside the viewer's church are invisible. A superadmin's own row
/// has no church and is reachable only by superadmins.
fn reachable(viewer: &Viewer, user: &User) -> bool {
    viewer.id == user.id
        || user
            .church_id
            .map_or(viewer.is_superadmin(), |church_id| viewer.can_reach_church(church_id))
}

/// Who may edit whom, before looking at which fields change.
pub fn authorize_edit(editor: &Viewer, target: &User) -> Result<(), ServiceError> {
    if editor.id == target.id || editor.is_superadmin() {
        return Ok(());
    }
    let same_church = target.church_id.is_some() && target.church_id == editor.church_id;
    let same_branch = target.branch_id.is_some() && target.branch_id == editor.branch_id;
    let allowed = same_church
        && match editor.role {
            Role::Admin => true,
            Role::Bishop => matches!(target.role, Role::Pastor | Role::Member),
            Role::Pastor => target.role == Role::Member && same_branch,
            _ => false,
        };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::forbidden("You may not edit this user"))
    }
}

/// The in-memory half of an update: authorization, privileged-field rules,
/// profile validation and the role-details merge. Returns the row to write.
pub fn apply_update(editor: &Viewer, target: &User, patch: UserUpdate) -> Result<User, ServiceError> {
    if patch.password.is_some() {
        return Err(ServiceError::bad_request("Passwords are changed through PUT /api/auth/password"));
    }
    authorize_edit(editor, target)?;

    let role_change = patch.role.filter(|role| *role != target.role);
    let active_change = patch.is_active.filter(|active| *active != target.is_active);
    let church_change = patch.church_id.filter(|church| *church != target.church_id);
    let branch_change = patch.branch_id.filter(|branch| *branch != target.branch_id);

    let privileged = role_change.is_some() || active_change.is_some() || church_change.is_some() || branch_change.is_some();
    if privileged {
        if !editor.role.is_admin() {
            return Err(ServiceError::forbidden(
                "Only administrators may change role, status, church or branch",
            ));
        }
        if role_change == Some(Role::Superadmin) && !editor.is_superadmin() {
            return Err(ServiceError::forbidden("Only a superadmin can grant superadmin"));
        }
        if church_change.is_some() && !editor.is_superadmin() {
            return Err(ServiceError::forbidden("Only a superadmin can move users between churches"));
        }
        if editor.id == target.id && active_change == Some(false) {
            return Err(ServiceError::bad_request("You cannot deactivate your own account"));
        }
    }

    let mut next = target.clone();
    if let Some(role) = role_change {
        next.role = role;
    }
    if let Some(active) = active_change {
        next.is_active = active;
    }
    if let Some(church_id) = church_change {
        next.church_id = church_id;
        if branch_change.is_none() {
            next.branch_id = None;
        }
    }
    if let Some(branch_id) = branch_change {
        next.branch_id = branch_id;
    }
    if next.role == Role::Superadmin {
        next.church_id = None;
        next.branch_id = None;
    } else if next.church_id.is_none() {
        return Err(ServiceError::invalid("church_id", "Only superadmins may exist without a church"));
    }

    let mut errors = FieldErrors::new();
    if let Some(first_name) = patch.first_name {
        errors.require_text("first_name", &first_name);
        next.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = patch.last_name {
        errors.require_text("last_name", &last_name);
        next.last_name = last_name.trim().to_string();
    }
    if let Some(email) = patch.email {
        let email = email.trim().to_lowercase();
        errors.check_email("email", &email);
        next.email = email;
    }
    if let Some(phone) = patch.phone {
        let phone = non_blank(phone);
        if let Some(phone) = &phone {
            errors.check_phone("phone", phone);
        }
        next.phone = phone;
    }
    if let Some(gender) = patch.gender {
        next.gender = non_blank(gender);
    }
    if let Some(date_of_birth) = patch.date_of_birth {
        check_birth_date(&mut errors, date_of_birth);
        next.date_of_birth = date_of_birth;
    }
    if let Some(address) = patch.address {
        next.address = non_blank(address);
    }
    if let Some(profile_image) = patch.profile_image {
        next.profile_image = non_blank(profile_image);
    }
    errors.into_result()?;

    if role_change.is_some() {
        if let Some(slot) = next.details_slot(next.role) {
            *slot = Some(json!({}));
        }
    }

    let supplied = [
        (Role::Member, patch.member_details),
        (Role::Pastor, patch.pastor_details),
        (Role::Bishop, patch.bishop_details),
        (Role::Admin, patch.admin_details),
    ];
    for (role, value) in supplied {
        let Some(value) = value else { continue };
        let changes = details_changes(role, next.role, value)?;
        if changes.contains_key(PASTORAL_NOTES) && !editor.role.is_pastoral() {
            return Err(ServiceError::forbidden("Only pastoral staff may write pastoral notes"));
        }
        if let Some(slot) = next.details_slot(role) {
            *slot = Some(merge_details(slot.take(), changes));
        }
    }

    Ok(next)
}

/// A supplied `<role>_details` object, checked against the user's role.
fn details_changes(supplied_for: Role, user_role: Role, value: Value) -> Result<Map<String, Value>, ServiceError> {
    let field = supplied_for.details_field().unwrap_or("details");
    if supplied_for != user_role {
        return Err(ServiceError::bad_request(format!(
            "{} does not apply to a user with role {}",
            field, user_role
        )));
    }
    match value {
        Value::Object(changes) => Ok(changes),
        _ => Err(ServiceError::invalid(field, "Must be an object")),
    }
}

/// Shallow merge; `null` values delete their key.
pub fn merge_details(current: Option<Value>, changes: Map<String, Value>) -> Value {
    let mut merged = match current {
        Some(Value::Object(existing)) => existing,
        _ => Map::new(),
    };
    for (key, value) in changes {
        if value.is_null() {
            merged.remove(&key);
        } else {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

fn check_birth_date(errors: &mut FieldErrors, date_of_birth: Option<NaiveDate>) {
    if let Some(date) = date_of_birth {
        if date > Utc::now().date_naive() {
            errors.add("date_of_birth", "Date of birth cannot be in the future");
        }
    }
}

async fn ensure_unique<'e, E>(
    executor: E,
    church_id: Option<Uuid>,
    field: &'static str,
    value: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError>
where
    E: PgExecutor<'e>,
{
    let column = match field {
        "phone" => "phone",
        _ => "email",
    };
    let (taken,): (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM users WHERE church_id IS NOT DISTINCT FROM $1 \
         AND lower({column}) = lower($2) AND ($3::uuid IS NULL OR id <> $3) AND is_deleted = false)"
    ))
    .bind(church_id)
    .bind(value)
    .bind(except)
    .fetch_one(executor)
    .await?;

    if taken {
        Err(ServiceError::conflict(
            column,
            format!("A user with this {} already exists in this church", column),
        ))
    } else {
        Ok(())
    }
}

async fn ensure_live_church<'e, E>(executor: E, church_id: Uuid) -> Result<(), ServiceError>
where
    E: PgExecutor<'e>,
{
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM churches WHERE id = $1 AND is_deleted = false")
        .bind(church_id)
        .fetch_optional(executor)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| ServiceError::invalid("church_id", "Church does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        church: Uuid,
        branch: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                church: Uuid::new_v4(),
                branch: Uuid::new_v4(),
            }
        }

        fn user(&self, role: Role) -> User {
            let now = Utc::now();
            User {
                id: Uuid::new_v4(),
                church_id: Some(self.church),
                branch_id: Some(self.branch),
                first_name: "Ada".to_string(),
                last_name: "Eze".to_string(),
                email: "ada@example.org".to_string(),
                phone: None,
                password_hash: String::new(),
                role,
                gender: None,
                date_of_birth: None,
                address: None,
                profile_image: None,
                is_active: true,
                member_details: (role == Role::Member).then(|| json!({ "baptized": false, "ministry": "choir" })),
                pastor_details: None,
                bishop_details: None,
                admin_details: None,
                last_login_at: None,
                is_deleted: false,
                created_at: now,
                updated_at: now,
            }
        }
    }

    fn viewer(user: &User) -> Viewer {
        Viewer {
            id: user.id,
            church_id: user.church_id,
            branch_id: user.branch_id,
            role: user.role,
        }
    }

    fn patch(body: Value) -> UserUpdate {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn edit_matrix() {
        let f = Fixture::new();
        let member = f.user(Role::Member);
        let pastor = f.user(Role::Pastor);
        let bishop = f.user(Role::Bishop);
        let admin = f.user(Role::Admin);

        assert!(authorize_edit(&viewer(&member), &member).is_ok());
        assert!(authorize_edit(&viewer(&pastor), &member).is_ok());
        assert!(authorize_edit(&viewer(&bishop), &pastor).is_ok());
        assert!(authorize_edit(&viewer(&admin), &bishop).is_ok());

        assert!(authorize_edit(&viewer(&member), &f.user(Role::Member)).is_err());
        assert!(authorize_edit(&viewer(&pastor), &f.user(Role::Pastor)).is_err());
        assert!(authorize_edit(&viewer(&bishop), &admin).is_err());

        let mut far_member = f.user(Role::Member);
        far_member.branch_id = Some(Uuid::new_v4());
        assert!(authorize_edit(&viewer(&pastor), &far_member).is_err());
    }

    #[test]
    fn merges_profile_and_details() {
        let f = Fixture::new();
        let member = f.user(Role::Member);
        let next = apply_update(
            &viewer(&member),
            &member,
            patch(json!({
                "first_name": "  Adaeze ",
                "phone": "+234 803 000 0000",
                "member_details": { "baptized": true, "ministry": null, "cell": "north" }
            })),
        )
        .unwrap();

        assert_eq!(next.first_name, "Adaeze");
        assert_eq!(next.phone.as_deref(), Some("+234 803 000 0000"));
        assert_eq!(next.member_details, Some(json!({ "baptized": true, "cell": "north" })));
        assert_eq!(next.last_name, "Eze");
    }

    #[test]
    fn members_cannot_touch_privileged_fields() {
        let f = Fixture::new();
        let member = f.user(Role::Member);
        let err = apply_update(&viewer(&member), &member, patch(json!({ "role": "pastor" }))).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // Re-sending the current value is not a change
        assert!(apply_update(&viewer(&member), &member, patch(json!({ "role": "member" }))).is_ok());
    }

    #[test]
    fn admins_promote_but_cannot_grant_superadmin() {
        let f = Fixture::new();
        let admin = viewer(&f.user(Role::Admin));
        let member = f.user(Role::Member);

        let next = apply_update(&admin, &member, patch(json!({ "role": "pastor", "pastor_details": { "title": "Rev" } }))).unwrap();
        assert_eq!(next.role, Role::Pastor);
        assert_eq!(next.pastor_details, Some(json!({ "title": "Rev" })));

        let err = apply_update(&admin, &member, patch(json!({ "role": "superadmin" }))).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = apply_update(&admin, &member, patch(json!({ "church_id": Uuid::new_v4() }))).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn role_change_starts_fresh_details() {
        let f = Fixture::new();
        let admin = viewer(&f.user(Role::Admin));
        let mut pastor = f.user(Role::Pastor);
        pastor.bishop_details = Some(json!({ "stale": true }));
        pastor.role = Role::Pastor;

        let next = apply_update(&admin, &pastor, patch(json!({ "role": "bishop" }))).unwrap();
        assert_eq!(next.bishop_details, Some(json!({})));
    }

    #[test]
    fn details_must_match_role() {
        let f = Fixture::new();
        let member = f.user(Role::Member);
        let err = apply_update(&viewer(&member), &member, patch(json!({ "pastor_details": { "x": 1 } }))).unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let err = apply_update(&viewer(&member), &member, patch(json!({ "member_details": "nope" }))).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[test]
    fn pastoral_notes_need_pastoral_role() {
        let f = Fixture::new();
        let member = f.user(Role::Member);
        let body = json!({ "member_details": { "pastoral_notes": "needs a visit" } });

        let err = apply_update(&viewer(&member), &member, patch(body.clone())).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let pastor = viewer(&f.user(Role::Pastor));
        let next = apply_update(&pastor, &member, patch(body)).unwrap();
        assert_eq!(next.member_details.unwrap()["pastoral_notes"], "needs a visit");
    }

    #[test]
    fn password_and_bad_fields_are_refused() {
        let f = Fixture::new();
        let member = f.user(Role::Member);
        let err = apply_update(&viewer(&member), &member, patch(json!({ "password": "hunter22" }))).unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let err = apply_update(
            &viewer(&member),
            &member,
            patch(json!({ "email": "nope", "first_name": " " })),
        )
        .unwrap_err();
        match err {
            ServiceError::Validation { field_errors, .. } => {
                assert!(field_errors.contains_key("email"));
                assert!(field_errors.contains_key("first_name"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(serde_json::from_value::<UserUpdate>(json!({ "password_hash": "x" })).is_err());
    }

    #[test]
    fn null_clears_optional_fields() {
        let f = Fixture::new();
        let mut member = f.user(Role::Member);
        member.phone = Some("0803-555-1234".to_string());
        let next = apply_update(&viewer(&member), &member, patch(json!({ "phone": null }))).unwrap();
        assert_eq!(next.phone, None);
    }

    #[test]
    fn failed_update_leaves_target_untouched() {
        let f = Fixture::new();
        let member = f.user(Role::Member);
        let before = member.member_details.clone();
        let _ = apply_update(
            &viewer(&member),
            &member,
            patch(json!({ "member_details": { "baptized": true }, "email": "broken" })),
        );
        assert_eq!(member.member_details, before);
        assert_eq!(member.email, "ada@example.org");
    }

    #[test]
    fn merge_details_from_nothing() {
        let mut changes = Map::new();
        changes.insert("a".to_string(), json!(1));
        changes.insert("b".to_string(), Value::Null);
        assert_eq!(merge_details(None, changes), json!({ "a": 1 }));
    }
}
