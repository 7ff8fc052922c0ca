// Household roster and the current session

use eyre::{Context, Result, eyre};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{NewUser, Role, User, UserPatch, validate_email, validate_name};
use crate::storage::SaveHook;

const MIN_PASSWORD_LEN: usize = 6;

/// Owns the roster (user id -> User) and the session pointer.
///
/// Passwords are accepted but never stored or verified.
pub struct UserStore {
    users: BTreeMap<String, User>,
    session: Option<String>,
    on_save_users: Option<SaveHook<User>>,
    on_save_session: Option<SaveHook<User>>,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            session: None,
            on_save_users: None,
            on_save_session: None,
        }
    }

    pub fn with_hooks(mut self, users: SaveHook<User>, session: SaveHook<User>) -> Self {
        self.on_save_users = Some(users);
        self.on_save_session = Some(session);
        self
    }

    /// Replace the roster and session wholesale, without saving.
    ///
    /// A session user missing from the roster is added to it.
    pub fn load(&mut self, users: Vec<User>, session: Option<User>) {
        self.users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        self.session = None;
        if let Some(user) = session {
            let id = user.id.clone();
            self.users.entry(id.clone()).or_insert(user);
            self.session = Some(id);
        }
        debug!(users = self.users.len(), logged_in = self.session.is_some(), "Loaded user store");
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref().and_then(|id| self.users.get(id))
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// Roster sorted by name
    pub fn users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        users
    }

    pub fn family_member_count(&self) -> usize {
        self.users.values().filter(|u| u.is_family_member).count()
    }

    pub fn admin_count(&self) -> usize {
        self.users.values().filter(|u| u.is_admin()).count()
    }

    /// The session user, or an error when logged out
    pub fn require_session(&self) -> Result<&User> {
        self.current_user()
            .ok_or_else(|| eyre!("Not logged in"))
    }

    fn require_admin(&self) -> Result<&User> {
        let user = self.require_session()?;
        if !user.is_admin() {
            return Err(eyre!("Administrator access required"));
        }
        Ok(user)
    }

    fn find_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim();
        self.users.values().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Create an account and log into it. The first account becomes the administrator.
    pub fn register(&mut self, email: &str, password: &str, name: &str) -> Result<User> {
        require_password(password)?;

        let role = if self.users.is_empty() {
            Role::Admin
        } else {
            Role::FamilyMember
        };
        let user = self.insert_user(NewUser {
            email: email.to_string(),
            name: name.to_string(),
            role,
            is_family_member: true,
        })?;

        self.start_session(&user.id)?;
        Ok(user)
    }

    /// Log in by email. An unknown email gets an account named after its local part.
    pub fn login(&mut self, email: &str, password: &str) -> Result<User> {
        require_password(password)?;
        validate_email(email)?;

        let existing = self.find_by_email(email).map(|u| u.id.clone());
        let id = match existing {
            Some(id) => id,
            None => {
                let name = email.trim().split('@').next().unwrap_or_default().to_string();
                return self.register(email, password, &name);
            }
        };

        self.start_session(&id)?;
        self.require_session().cloned()
    }

    pub fn logout(&mut self) -> Result<()> {
        if let Some(id) = self.session.take() {
            info!(id = %id, "Logged out");
        }
        self.save_session()
    }

    /// Validate a password change for the session user
    pub fn change_password(&self, current: &str, new: &str, confirm: &str) -> Result<()> {
        let user = self.require_session()?;
        if current.is_empty() {
            return Err(eyre!("Current password is required"));
        }
        if new != confirm {
            return Err(eyre!("New passwords do not match"));
        }
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Err(eyre!("Password must be at least {} characters long", MIN_PASSWORD_LEN));
        }
        info!(id = %user.id, "Password changed");
        Ok(())
    }

    // ========================================================================
    // Roster management
    // ========================================================================

    /// Add a user to the roster (administrators only)
    pub fn create_user(&mut self, new: NewUser) -> Result<User> {
        self.require_admin()?;
        self.insert_user(new)
    }

    /// Edit a user; administrators may edit anyone, others only themselves
    pub fn update_user(&mut self, id: &str, patch: UserPatch) -> Result<User> {
        let actor = self.require_session()?;
        if !actor.is_admin() && actor.id != id {
            return Err(eyre!("Administrator access required"));
        }
        if let Some(email) = &patch.email {
            if self.find_by_email(email).is_some_and(|other| other.id != id) {
                return Err(eyre!("Email already in use: {}", email.trim()));
            }
        }

        let user = self
            .users
            .get_mut(id)
            .ok_or_else(|| eyre!("User not found: {}", id))?;
        user.apply(patch)?;
        let updated = user.clone();
        info!(id, "Updated user");

        self.save_users()?;
        if self.session.as_deref() == Some(id) {
            self.save_session()?;
        }
        Ok(updated)
    }

    /// Remove a user (administrators only); administrators themselves cannot be removed
    pub fn delete_user(&mut self, id: &str) -> Result<()> {
        self.require_admin()?;
        if self.session.as_deref() == Some(id) {
            return Err(eyre!("You cannot delete your own account"));
        }

        let target = self.users.get(id).ok_or_else(|| eyre!("User not found: {}", id))?;
        if target.is_admin() {
            return Err(eyre!("Administrators cannot be deleted"));
        }

        self.users.remove(id);
        info!(id, "Deleted user");
        self.save_users()
    }

    pub fn assign_family_membership(&mut self, id: &str) -> Result<User> {
        self.set_family_membership(id, true)
    }

    pub fn remove_family_membership(&mut self, id: &str) -> Result<User> {
        self.set_family_membership(id, false)
    }

    pub fn toggle_family_membership(&mut self, id: &str) -> Result<User> {
        let current = self
            .users
            .get(id)
            .map(|u| u.is_family_member)
            .ok_or_else(|| eyre!("User not found: {}", id))?;
        self.set_family_membership(id, !current)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn set_family_membership(&mut self, id: &str, member: bool) -> Result<User> {
        self.require_admin()?;

        let user = self
            .users
            .get_mut(id)
            .ok_or_else(|| eyre!("User not found: {}", id))?;
        user.is_family_member = member;
        let updated = user.clone();
        info!(id, member, "Set family membership");

        self.save_users()?;
        if self.session.as_deref() == Some(id) {
            self.save_session()?;
        }
        Ok(updated)
    }

    fn insert_user(&mut self, new: NewUser) -> Result<User> {
        validate_email(&new.email)?;
        validate_name(&new.name)?;
        if self.find_by_email(&new.email).is_some() {
            return Err(eyre!("Email already in use: {}", new.email.trim()));
        }

        let user = User {
            id: Uuid::now_v7().to_string(),
            email: new.email.trim().to_string(),
            name: new.name.trim().to_string(),
            role: new.role,
            is_family_member: new.is_family_member,
            avatar: None,
        };
        self.users.insert(user.id.clone(), user.clone());
        info!(id = %user.id, email = %user.email, role = %user.role, "Created user");

        self.save_users()?;
        Ok(user)
    }

    fn start_session(&mut self, id: &str) -> Result<()> {
        if !self.users.contains_key(id) {
            warn!(id, "Session requested for unknown user");
            return Err(eyre!("User not found: {}", id));
        }
        self.session = Some(id.to_string());
        info!(id, "Logged in");
        self.save_session()
    }

    fn save_users(&mut self) -> Result<()> {
        if let Some(hook) = self.on_save_users.as_mut() {
            let users: Vec<User> = self.users.values().cloned().collect();
            hook(&users).context("Failed to save users")?;
        }
        Ok(())
    }

    fn save_session(&mut self) -> Result<()> {
        if let Some(hook) = self.on_save_session.as_mut() {
            let session: Vec<User> = self
                .session
                .as_ref()
                .and_then(|id| self.users.get(id))
                .cloned()
                .into_iter()
                .collect();
            hook(&session).context("Failed to save session")?;
        }
        Ok(())
    }
}

fn require_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(eyre!("Password is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, load_collection, removing_save_hook, save_hook};
    use std::rc::Rc;

    /// Store with an admin (logged in) and one family member
    fn household() -> (UserStore, User, User) {
        let mut store = UserStore::new();
        let admin = store.register("mum@example.com", "secret1", "Mum").unwrap();
        let kid = store
            .create_user(NewUser {
                email: "kid@example.com".to_string(),
                name: "Kid".to_string(),
                role: Role::FamilyMember,
                is_family_member: false,
            })
            .unwrap();
        (store, admin, kid)
    }

    #[test]
    fn test_first_registration_is_admin() {
        let (store, admin, kid) = household();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_family_member);
        assert_eq!(kid.role, Role::FamilyMember);
        assert_eq!(store.current_user().unwrap().id, admin.id);
        assert_eq!(store.admin_count(), 1);
        assert_eq!(store.family_member_count(), 1);
    }

    #[test]
    fn test_second_registration_is_family_member() {
        let (mut store, _, _) = household();
        let dad = store.register("dad@example.com", "secret2", "Dad").unwrap();
        assert_eq!(dad.role, Role::FamilyMember);
        assert_eq!(store.current_user().unwrap().id, dad.id);
    }

    #[test]
    fn test_register_validation() {
        let mut store = UserStore::new();
        assert!(store.register("not-an-email", "pw", "X").is_err());
        assert!(store.register("a@b.c", "pw", "  ").is_err());
        assert!(store.register("a@b.c", "", "X").is_err());
        store.register("a@b.c", "pw", "X").unwrap();
        assert!(store.register("A@B.C", "pw", "Y").is_err());
    }

    #[test]
    fn test_login_existing_and_unknown() {
        let (mut store, _, kid) = household();
        store.logout().unwrap();
        assert!(store.current_user().is_none());

        let user = store.login("KID@example.com", "whatever").unwrap();
        assert_eq!(user.id, kid.id);

        let fresh = store.login("grandpa@example.com", "whatever").unwrap();
        assert_eq!(fresh.name, "grandpa");
        assert_eq!(fresh.role, Role::FamilyMember);
        assert_eq!(store.current_user().unwrap().id, fresh.id);
    }

    #[test]
    fn test_login_requires_password() {
        let (mut store, _, _) = household();
        assert!(store.login("kid@example.com", "").is_err());
    }

    #[test]
    fn test_family_membership_toggles() {
        let (mut store, _, kid) = household();

        assert!(store.assign_family_membership(&kid.id).unwrap().is_family_member);
        assert!(!store.remove_family_membership(&kid.id).unwrap().is_family_member);
        assert!(store.toggle_family_membership(&kid.id).unwrap().is_family_member);
        assert!(store.toggle_family_membership("ghost").is_err());
    }

    #[test]
    fn test_admin_only_operations() {
        let (mut store, _, kid) = household();
        store.login("kid@example.com", "pw").unwrap();

        assert!(store.assign_family_membership(&kid.id).is_err());
        assert!(store.delete_user(&kid.id).is_err());
        assert!(
            store
                .create_user(NewUser {
                    email: "x@example.com".to_string(),
                    name: "X".to_string(),
                    ..Default::default()
                })
                .is_err()
        );

        store.logout().unwrap();
        assert!(store.delete_user(&kid.id).is_err());
    }

    #[test]
    fn test_delete_user() {
        let (mut store, admin, kid) = household();
        store.delete_user(&kid.id).unwrap();
        assert!(store.user(&kid.id).is_none());

        let err = store.delete_user(&admin.id).unwrap_err();
        assert!(err.to_string().contains("your own account"));

        let dad = store
            .create_user(NewUser {
                email: "dad@example.com".to_string(),
                name: "Dad".to_string(),
                role: Role::Admin,
                is_family_member: true,
            })
            .unwrap();
        let err = store.delete_user(&dad.id).unwrap_err();
        assert!(err.to_string().contains("cannot be deleted"));
        assert!(store.user(&dad.id).is_some());
    }

    #[test]
    fn test_update_user_permissions() {
        let (mut store, admin, kid) = household();

        let renamed = store
            .update_user(
                &kid.id,
                UserPatch {
                    name: Some("Junior".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Junior");

        store.login("kid@example.com", "pw").unwrap();
        assert!(
            store
                .update_user(
                    &admin.id,
                    UserPatch {
                        name: Some("Hacked".to_string()),
                        ..Default::default()
                    },
                )
                .is_err()
        );

        let me = store
            .update_user(
                &kid.id,
                UserPatch {
                    avatar: Some(Some("kid.png".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(me.avatar.as_deref(), Some("kid.png"));
        assert_eq!(store.current_user().unwrap().avatar.as_deref(), Some("kid.png"));
    }

    #[test]
    fn test_update_user_rejects_taken_email() {
        let (mut store, _, kid) = household();
        let result = store.update_user(
            &kid.id,
            UserPatch {
                email: Some("mum@example.com".to_string()),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_change_password() {
        let (mut store, _, _) = household();
        assert!(store.change_password("old", "abcdef", "abcdef").is_ok());
        assert!(store.change_password("old", "abcdef", "abcdeg").is_err());
        assert!(store.change_password("old", "abc", "abc").is_err());
        assert!(store.change_password("", "abcdef", "abcdef").is_err());

        store.logout().unwrap();
        assert!(store.change_password("old", "abcdef", "abcdef").is_err());
    }

    #[test]
    fn test_users_sorted_by_name() {
        let (store, _, _) = household();
        let names: Vec<&str> = store.users().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Kid", "Mum"]);
    }

    #[test]
    fn test_persists_roster_and_session() {
        let storage = Rc::new(MemoryStorage::new());
        let mut store = UserStore::new().with_hooks(
            save_hook(storage.clone(), "goldtasks_users".to_string()),
            removing_save_hook(storage.clone(), "goldtasks_user".to_string()),
        );
        let admin = store.register("mum@example.com", "pw", "Mum").unwrap();

        let users: Vec<User> = load_collection(&*storage, "goldtasks_users").unwrap().unwrap();
        let session: Vec<User> = load_collection(&*storage, "goldtasks_user").unwrap().unwrap();
        assert_eq!(users, vec![admin.clone()]);
        assert_eq!(session, vec![admin.clone()]);

        let mut reloaded = UserStore::new();
        reloaded.load(users, session.into_iter().next());
        assert_eq!(reloaded.current_user().unwrap().id, admin.id);

        store.logout().unwrap();
        let session: Option<Vec<User>> = load_collection(&*storage, "goldtasks_user").unwrap();
        assert!(session.is_none());
    }

    #[test]
    fn test_load_adds_orphan_session_user() {
        let user = User {
            id: "1".to_string(),
            email: "solo@example.com".to_string(),
            name: "solo".to_string(),
            role: Role::FamilyMember,
            is_family_member: false,
            avatar: None,
        };
        let mut store = UserStore::new();
        store.load(vec![], Some(user.clone()));
        assert_eq!(store.current_user(), Some(&user));
        assert_eq!(store.users().len(), 1);
    }
}
