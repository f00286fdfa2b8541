use serde_json::{Map, Value};

use super::Viewer;
use crate::auth::Role;
use crate::database::models::User;

/// How much of a user record a viewer gets to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Full,
    OwnProfile,
    Pastoral,
    PublicCard,
}

const PUBLIC_CARD_FIELDS: &[&str] = &["id", "first_name", "last_name", "role", "branch_id", "profile_image"];

const PASTORAL_FIELDS: &[&str] = &[
    "id",
    "church_id",
    "branch_id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "role",
    "gender",
    "date_of_birth",
    "address",
    "profile_image",
    "is_active",
    "member_details",
    "created_at",
    "updated_at",
];

const PASTORAL_NOTES: &str = "pastoral_notes";

pub fn visibility(user: &User, viewer: &Viewer) -> Visibility {
    let same_church = user.church_id.is_some() && user.church_id == viewer.church_id;

    match viewer.role {
        Role::Superadmin => return Visibility::Full,
        Role::Admin if same_church => return Visibility::Full,
        _ => {}
    }

    if viewer.id == user.id {
        return Visibility::OwnProfile;
    }

    if same_church {
        let same_branch = user.branch_id.is_some() && user.branch_id == viewer.branch_id;
        match viewer.role {
            Role::Bishop => return Visibility::Pastoral,
            Role::Pastor if same_branch => return Visibility::Pastoral,
            _ => {}
        }
    }

    Visibility::PublicCard
}

/// Render `user` as JSON with the fields `viewer` may see. The password hash
/// never leaves this function.
pub fn sanitize_user(user: &User, viewer: &Viewer) -> Value {
    let mut doc = match serde_json::to_value(user) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::error!("User {} did not serialize to an object", user.id);
            Map::new()
        }
    };
    doc.remove("password_hash");

    match visibility(user, viewer) {
        Visibility::Full => {}
        Visibility::OwnProfile => strip_pastoral_notes(&mut doc),
        Visibility::Pastoral => {
            let rank_gated = if viewer.role.outranks(user.role) {
                user.role.details_field().filter(|field| *field != "member_details")
            } else {
                None
            };
            doc.retain(|key, _| PASTORAL_FIELDS.contains(&key.as_str()) || Some(key.as_str()) == rank_gated);
        }
        Visibility::PublicCard => doc.retain(|key, _| PUBLIC_CARD_FIELDS.contains(&key.as_str())),
    }

    Value::Object(doc)
}

fn strip_pastoral_notes(doc: &mut Map<String, Value>) {
    if let Some(Value::Object(details)) = doc.get_mut("member_details") {
        details.remove(PASTORAL_NOTES);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn user(role: Role, church: Option<Uuid>, branch: Option<Uuid>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            church_id: church,
            branch_id: branch,
            first_name: "Grace".to_string(),
            last_name: "Okafor".to_string(),
            email: "grace@example.org".to_string(),
            phone: Some("+2348030000000".to_string()),
            password_hash: "$argon2id$v=19$secret".to_string(),
            role,
            gender: None,
            date_of_birth: None,
            address: Some("12 Hill Rd".to_string()),
            profile_image: None,
            is_active: true,
            member_details: Some(json!({ "baptized": true, "pastoral_notes": "visiting weekly" })),
            pastor_details: (role == Role::Pastor).then(|| json!({ "ordained": "2019" })),
            bishop_details: None,
            admin_details: None,
            last_login_at: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn viewer_of(u: &User) -> Viewer {
        Viewer {
            id: u.id,
            church_id: u.church_id,
            branch_id: u.branch_id,
            role: u.role,
        }
    }

    #[test]
    fn password_hash_never_leaks() {
        let church = Some(Uuid::new_v4());
        let target = user(Role::Member, church, None);
        for role in Role::ALL {
            let viewer = Viewer { id: Uuid::new_v4(), church_id: church, branch_id: None, role };
            let doc = sanitize_user(&target, &viewer);
            assert!(doc.get("password_hash").is_none(), "leaked to {}", role);
        }
        let doc = sanitize_user(&target, &viewer_of(&target));
        assert!(doc.get("password_hash").is_none());
    }

    #[test]
    fn self_view_hides_pastoral_notes() {
        let target = user(Role::Member, Some(Uuid::new_v4()), None);
        let doc = sanitize_user(&target, &viewer_of(&target));
        assert_eq!(doc["email"], "grace@example.org");
        assert_eq!(doc["member_details"]["baptized"], true);
        assert!(doc["member_details"].get("pastoral_notes").is_none());
    }

    #[test]
    fn members_only_see_public_cards() {
        let church = Some(Uuid::new_v4());
        let target = user(Role::Member, church, None);
        let peer = viewer_of(&user(Role::Member, church, None));
        let doc = sanitize_user(&target, &peer);
        let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(keys.iter().all(|k| PUBLIC_CARD_FIELDS.contains(k)));
        assert!(doc.get("email").is_none());
        assert!(doc.get("phone").is_none());
        assert_eq!(doc["first_name"], "Grace");
    }

    #[test]
    fn pastor_sees_own_branch_members_in_full_pastoral_view() {
        let church = Some(Uuid::new_v4());
        let branch = Some(Uuid::new_v4());
        let target = user(Role::Member, church, branch);
        let pastor = viewer_of(&user(Role::Pastor, church, branch));
        assert_eq!(visibility(&target, &pastor), Visibility::Pastoral);
        let doc = sanitize_user(&target, &pastor);
        assert_eq!(doc["phone"], "+2348030000000");
        assert_eq!(doc["member_details"]["pastoral_notes"], "visiting weekly");
        assert!(doc.get("last_login_at").is_none());

        let elsewhere = viewer_of(&user(Role::Pastor, church, Some(Uuid::new_v4())));
        assert_eq!(visibility(&target, &elsewhere), Visibility::PublicCard);
    }

    #[test]
    fn role_details_need_higher_rank() {
        let church = Some(Uuid::new_v4());
        let pastor = user(Role::Pastor, church, None);

        let bishop = viewer_of(&user(Role::Bishop, church, None));
        assert_eq!(sanitize_user(&pastor, &bishop)["pastor_details"]["ordained"], "2019");

        let other_bishop = user(Role::Bishop, church, None);
        let doc = sanitize_user(&other_bishop, &bishop);
        assert!(doc.get("bishop_details").is_none());
    }

    #[test]
    fn admin_scope_is_per_church() {
        let target = user(Role::Member, Some(Uuid::new_v4()), None);
        let own_admin = Viewer { id: Uuid::new_v4(), church_id: target.church_id, branch_id: None, role: Role::Admin };
        let foreign_admin = Viewer { id: Uuid::new_v4(), church_id: Some(Uuid::new_v4()), branch_id: None, role: Role::Admin };
        assert_eq!(visibility(&target, &own_admin), Visibility::Full);
        assert_eq!(visibility(&target, &foreign_admin), Visibility::PublicCard);

        let root = Viewer { id: Uuid::new_v4(), church_id: None, branch_id: None, role: Role::Superadmin };
        assert_eq!(sanitize_user(&target, &root)["member_details"]["pastoral_notes"], "visiting weekly");
    }
}
