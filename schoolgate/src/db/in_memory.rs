//! In-memory store implementation.
//!
//! All tables live behind a single lock, so every trait method is atomic in the same way a
//! single postgres transaction is. Suitable for tests and single-process development runs.
//! Everything is lost on restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::db::errors::{DbError, Result};
use crate::db::models::{
    accounts::{AccountCreateDBRequest, AccountDBResponse, RoleGrant},
    password_reset_tokens::{PasswordResetTokenCreateDBRequest, PasswordResetTokenDBResponse, ResetOutcome},
    persons::{PersonDBResponse, PersonWriteDBRequest},
    roles::{PermissionDBResponse, RoleCreateDBRequest, RoleDBResponse},
    students::{Enrolment, StudentDBResponse, StudentWriteDBRequest},
};
use crate::db::store::{AccountStore, PasswordResetTokenStore, PermissionStore, PersonStore, RoleChangeGuard, RoleStore, StudentStore};
use crate::types::{AccountId, Operation, PermissionName, PersonId, RoleId, RoleName};

#[derive(Clone)]
struct StoredRole {
    id: RoleId,
    name: RoleName,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, AccountDBResponse>,
    roles: HashMap<RoleId, StoredRole>,
    permissions: HashMap<PermissionName, PermissionDBResponse>,
    role_permissions: HashMap<RoleId, BTreeSet<PermissionName>>,
    account_roles: HashMap<AccountId, Vec<RoleId>>,
    reset_tokens: HashMap<Vec<u8>, PasswordResetTokenDBResponse>,
    persons: HashMap<PersonId, PersonDBResponse>,
    students: HashMap<PersonId, Enrolment>,
}

fn unique_violation(table: &str, constraint: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

impl Tables {
    fn role_response(&self, role: &StoredRole) -> RoleDBResponse {
        let mut permissions: Vec<PermissionName> = self
            .role_permissions
            .get(&role.id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        permissions.sort_by_key(|p| p.as_str());

        RoleDBResponse {
            id: role.id,
            name: role.name,
            description: role.description.clone(),
            permissions,
            created_at: role.created_at,
        }
    }

    fn role_id_by_name(&self, name: RoleName) -> Option<RoleId> {
        self.roles.values().find(|r| r.name == name).map(|r| r.id)
    }

    fn role_names_of(&self, account_id: AccountId) -> Vec<RoleName> {
        let mut names: Vec<RoleName> = self
            .account_roles
            .get(&account_id)
            .into_iter()
            .flatten()
            .filter_map(|role_id| self.roles.get(role_id).map(|r| r.name))
            .collect();
        names.sort_by_key(|r| r.as_str());
        names
    }

    fn check_account_unique(&self, username: &str, email: &str) -> Result<()> {
        if self.accounts.values().any(|a| a.username == username) {
            return Err(unique_violation("accounts", "accounts_username_key"));
        }
        if self.accounts.values().any(|a| a.email == email) {
            return Err(unique_violation("accounts", "accounts_email_key"));
        }
        Ok(())
    }

    fn check_dni_unique(&self, dni: &str, except: Option<PersonId>) -> Result<()> {
        if self.persons.values().any(|p| p.dni == dni && Some(p.id) != except) {
            return Err(unique_violation("persons", "persons_dni_key"));
        }
        Ok(())
    }

    fn insert_person(&mut self, request: &PersonWriteDBRequest) -> Result<PersonDBResponse> {
        self.check_dni_unique(&request.dni, None)?;
        self.check_account_link(request.account_id, None)?;

        let now = Utc::now();
        let person = PersonDBResponse {
            id: Uuid::new_v4(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            dni: request.dni.clone(),
            birth_date: request.birth_date,
            gender: request.gender.clone(),
            address: request.address.clone(),
            phone: request.phone.clone(),
            account_id: request.account_id,
            created_at: now,
            updated_at: now,
        };
        self.persons.insert(person.id, person.clone());
        Ok(person)
    }

    fn rewrite_person(&mut self, id: PersonId, request: &PersonWriteDBRequest) -> Result<Option<PersonDBResponse>> {
        if !self.persons.contains_key(&id) {
            return Ok(None);
        }
        self.check_dni_unique(&request.dni, Some(id))?;
        self.check_account_link(request.account_id, Some(id))?;

        let Some(person) = self.persons.get_mut(&id) else {
            return Ok(None);
        };
        person.first_name = request.first_name.clone();
        person.last_name = request.last_name.clone();
        person.dni = request.dni.clone();
        person.birth_date = request.birth_date;
        person.gender = request.gender.clone();
        person.address = request.address.clone();
        person.phone = request.phone.clone();
        person.account_id = request.account_id;
        person.updated_at = Utc::now();
        Ok(Some(person.clone()))
    }

    fn student(&self, id: PersonId) -> Option<StudentDBResponse> {
        let enrolment = *self.students.get(&id)?;
        let person = self.persons.get(&id)?.clone();
        Some(StudentDBResponse { person, enrolment })
    }

    /// A person links to at most one existing account, and an account to at most one person.
    fn check_account_link(&self, account_id: Option<AccountId>, except: Option<PersonId>) -> Result<()> {
        let Some(id) = account_id else {
            return Ok(());
        };
        if !self.accounts.contains_key(&id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("persons_account_id_fkey".to_string()),
                table: Some("persons".to_string()),
                message: format!("account {id} does not exist"),
            });
        }
        if self.persons.values().any(|p| p.account_id == Some(id) && Some(p.id) != except) {
            return Err(unique_violation("persons", "persons_account_id_key"));
        }
        Ok(())
    }
}

/// In-memory implementation of every store trait.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Give an account an extra role without removing the ones it holds.
    ///
    /// Nothing in the service does this; it exists to reproduce multi-role rows left behind by
    /// older data.
    pub fn grant_additional_role(&self, account_id: AccountId, role: RoleName) -> Result<()> {
        let mut tables = self.tables.write();
        let role_id = tables.role_id_by_name(role).ok_or(DbError::NotFound)?;
        if !tables.accounts.contains_key(&account_id) {
            return Err(DbError::NotFound);
        }
        let held = tables.account_roles.entry(account_id).or_default();
        if !held.contains(&role_id) {
            held.push(role_id);
        }
        Ok(())
    }

    /// Remove an account outright, as an external admin tool might.
    pub fn delete_account(&self, account_id: AccountId) -> bool {
        let mut tables = self.tables.write();
        tables.account_roles.remove(&account_id);
        tables.reset_tokens.retain(|_, t| t.account_id != account_id);
        for person in tables.persons.values_mut() {
            if person.account_id == Some(account_id) {
                person.account_id = None;
            }
        }
        tables.accounts.remove(&account_id).is_some()
    }

    /// Flip the active flag of an account.
    pub fn set_account_active(&self, account_id: AccountId, active: bool) -> Result<()> {
        let mut tables = self.tables.write();
        let account = tables.accounts.get_mut(&account_id).ok_or(DbError::NotFound)?;
        account.active = active;
        account.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let mut tables = self.tables.write();
        tables.check_account_unique(&request.username, &request.email)?;

        let role_id = match request.role {
            Some(role) => Some(tables.role_id_by_name(role).ok_or(DbError::NotFound)?),
            None => None,
        };

        let now = Utc::now();
        let account = AccountDBResponse {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            active: request.active,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(account.id, account.clone());
        if let Some(role_id) = role_id {
            tables.account_roles.insert(account.id, vec![role_id]);
        }
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        Ok(self.tables.read().accounts.get(&id).cloned())
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<AccountDBResponse>> {
        Ok(self.tables.read().accounts.values().find(|a| a.username == username).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountDBResponse>> {
        Ok(self.tables.read().accounts.values().find(|a| a.email == email).cloned())
    }

    async fn account_grants(&self, id: AccountId) -> Result<Vec<RoleGrant>> {
        let tables = self.tables.read();
        let mut grants: Vec<RoleGrant> = tables
            .account_roles
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|role_id| tables.roles.get(role_id))
            .map(|role| {
                let response = tables.role_response(role);
                RoleGrant {
                    role: response.name,
                    permissions: response.permissions,
                }
            })
            .collect();
        grants.sort_by_key(|g| g.role.as_str());
        Ok(grants)
    }

    async fn replace_account_role(&self, id: AccountId, role: RoleName, guard: &RoleChangeGuard) -> Result<AccountDBResponse> {
        let mut tables = self.tables.write();
        let account = tables.accounts.get(&id).cloned().ok_or(DbError::NotFound)?;
        let current = tables.role_names_of(id);
        guard(&account, &current)?;

        let role_id = tables.role_id_by_name(role).ok_or(DbError::NotFound)?;
        tables.account_roles.insert(id, vec![role_id]);

        let account = tables.accounts.get_mut(&id).ok_or(DbError::NotFound)?;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn list_roles(&self) -> Result<Vec<RoleDBResponse>> {
        let tables = self.tables.read();
        let mut roles: Vec<RoleDBResponse> = tables.roles.values().map(|r| tables.role_response(r)).collect();
        roles.sort_by_key(|r| r.name.as_str());
        Ok(roles)
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        let tables = self.tables.read();
        Ok(tables.roles.get(&id).map(|r| tables.role_response(r)))
    }

    async fn get_role_by_name(&self, name: RoleName) -> Result<Option<RoleDBResponse>> {
        let tables = self.tables.read();
        Ok(tables.roles.values().find(|r| r.name == name).map(|r| tables.role_response(r)))
    }

    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse> {
        let mut tables = self.tables.write();
        if tables.role_id_by_name(request.name).is_some() {
            return Err(unique_violation("roles", "roles_name_key"));
        }
        let role = StoredRole {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description.clone(),
            created_at: Utc::now(),
        };
        tables.roles.insert(role.id, role.clone());
        Ok(tables.role_response(&role))
    }

    async fn update_role_description(&self, id: RoleId, description: Option<String>) -> Result<Option<RoleDBResponse>> {
        let mut tables = self.tables.write();
        let Some(role) = tables.roles.get_mut(&id) else {
            return Ok(None);
        };
        role.description = description;
        let role = role.clone();
        Ok(Some(tables.role_response(&role)))
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool> {
        let mut tables = self.tables.write();
        let Some(role) = tables.roles.get(&id) else {
            return Ok(false);
        };
        let holders = tables.account_roles.values().filter(|held| held.contains(&id)).count();
        if holders > 0 {
            return Err(DbError::ProtectedEntity {
                operation: Operation::Delete,
                reason: format!("role {} is held by {holders} account(s)", role.name),
                entity_type: "role".to_string(),
                entity_id: Some(id.to_string()),
            });
        }
        tables.role_permissions.remove(&id);
        Ok(tables.roles.remove(&id).is_some())
    }

    async fn add_role_permission(&self, id: RoleId, permission: PermissionName) -> Result<RoleDBResponse> {
        let mut tables = self.tables.write();
        if !tables.permissions.contains_key(&permission) {
            return Err(DbError::NotFound);
        }
        let role = tables.roles.get(&id).cloned().ok_or(DbError::NotFound)?;
        tables.role_permissions.entry(id).or_default().insert(permission);
        Ok(tables.role_response(&role))
    }

    async fn remove_role_permission(&self, id: RoleId, permission: PermissionName) -> Result<RoleDBResponse> {
        let mut tables = self.tables.write();
        let role = tables.roles.get(&id).cloned().ok_or(DbError::NotFound)?;
        if let Some(set) = tables.role_permissions.get_mut(&id) {
            set.remove(&permission);
        }
        Ok(tables.role_response(&role))
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn list_permissions(&self) -> Result<Vec<PermissionDBResponse>> {
        let mut permissions: Vec<PermissionDBResponse> = self.tables.read().permissions.values().cloned().collect();
        permissions.sort_by_key(|p| p.name.as_str());
        Ok(permissions)
    }

    async fn get_permission(&self, name: PermissionName) -> Result<Option<PermissionDBResponse>> {
        Ok(self.tables.read().permissions.get(&name).cloned())
    }

    async fn upsert_permission(&self, name: PermissionName, label: &str) -> Result<PermissionDBResponse> {
        let mut tables = self.tables.write();
        let entry = tables.permissions.entry(name).or_insert_with(|| PermissionDBResponse {
            id: Uuid::new_v4(),
            name,
            label: label.to_string(),
        });
        entry.label = label.to_string();
        Ok(entry.clone())
    }
}

#[async_trait]
impl PasswordResetTokenStore for InMemoryStore {
    async fn create_reset_token(&self, request: &PasswordResetTokenCreateDBRequest) -> Result<PasswordResetTokenDBResponse> {
        let mut tables = self.tables.write();
        if !tables.accounts.contains_key(&request.account_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("password_reset_tokens_account_id_fkey".to_string()),
                table: Some("password_reset_tokens".to_string()),
                message: format!("account {} does not exist", request.account_id),
            });
        }
        let now = Utc::now();
        tables.reset_tokens.retain(|_, t| t.expires_at > now);
        if tables.reset_tokens.contains_key(&request.token_digest) {
            return Err(unique_violation("password_reset_tokens", "password_reset_tokens_token_digest_key"));
        }
        let token = PasswordResetTokenDBResponse {
            id: Uuid::new_v4(),
            account_id: request.account_id,
            token_digest: request.token_digest.clone(),
            expires_at: request.expires_at,
            created_at: now,
        };
        tables.reset_tokens.insert(token.token_digest.clone(), token.clone());
        Ok(token)
    }

    async fn consume_reset_token(&self, token_digest: &[u8], new_password_hash: &str, now: DateTime<Utc>) -> Result<ResetOutcome> {
        let mut tables = self.tables.write();
        let Some(token) = tables.reset_tokens.get(token_digest).cloned() else {
            return Ok(ResetOutcome::NotFound);
        };
        if token.expires_at <= now {
            return Ok(ResetOutcome::Expired);
        }

        let Some(account) = tables.accounts.get_mut(&token.account_id) else {
            return Ok(ResetOutcome::NotFound);
        };
        account.password_hash = new_password_hash.to_string();
        account.updated_at = now;

        tables.reset_tokens.retain(|_, t| t.account_id != token.account_id);
        Ok(ResetOutcome::Completed {
            account_id: token.account_id,
        })
    }
}

#[async_trait]
impl PersonStore for InMemoryStore {
    async fn list_persons(&self) -> Result<Vec<PersonDBResponse>> {
        let mut persons: Vec<PersonDBResponse> = self.tables.read().persons.values().cloned().collect();
        persons.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(persons)
    }

    async fn get_person(&self, id: PersonId) -> Result<Option<PersonDBResponse>> {
        Ok(self.tables.read().persons.get(&id).cloned())
    }

    async fn create_person(&self, request: &PersonWriteDBRequest) -> Result<PersonDBResponse> {
        self.tables.write().insert_person(request)
    }

    async fn update_person(&self, id: PersonId, request: &PersonWriteDBRequest) -> Result<Option<PersonDBResponse>> {
        self.tables.write().rewrite_person(id, request)
    }

    async fn delete_person(&self, id: PersonId) -> Result<bool> {
        let mut tables = self.tables.write();
        tables.students.remove(&id);
        Ok(tables.persons.remove(&id).is_some())
    }
}

#[async_trait]
impl StudentStore for InMemoryStore {
    async fn list_students(&self) -> Result<Vec<StudentDBResponse>> {
        let tables = self.tables.read();
        let mut students: Vec<StudentDBResponse> = tables.students.keys().filter_map(|id| tables.student(*id)).collect();
        students.sort_by(|a, b| a.person.created_at.cmp(&b.person.created_at).then(a.person.id.cmp(&b.person.id)));
        Ok(students)
    }

    async fn get_student(&self, id: PersonId) -> Result<Option<StudentDBResponse>> {
        Ok(self.tables.read().student(id))
    }

    async fn create_student(&self, request: &StudentWriteDBRequest) -> Result<StudentDBResponse> {
        let mut tables = self.tables.write();
        let person = tables.insert_person(&request.person)?;
        tables.students.insert(person.id, request.enrolment);
        Ok(StudentDBResponse {
            person,
            enrolment: request.enrolment,
        })
    }

    async fn update_student(&self, id: PersonId, request: &StudentWriteDBRequest) -> Result<Option<StudentDBResponse>> {
        let mut tables = self.tables.write();
        if !tables.students.contains_key(&id) {
            return Ok(None);
        }
        let Some(person) = tables.rewrite_person(id, &request.person)? else {
            return Ok(None);
        };
        tables.students.insert(id, request.enrolment);
        Ok(Some(StudentDBResponse {
            person,
            enrolment: request.enrolment,
        }))
    }

    async fn delete_student(&self, id: PersonId) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.students.remove(&id).is_none() {
            return Ok(false);
        }
        Ok(tables.persons.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store_with_roles() -> InMemoryStore {
        let store = InMemoryStore::new();
        for permission in PermissionName::ALL {
            store.upsert_permission(permission, permission.label()).await.unwrap();
        }
        for role in RoleName::ALL {
            store
                .create_role(&RoleCreateDBRequest {
                    name: role,
                    description: None,
                })
                .await
                .unwrap();
        }
        store
    }

    fn account_request(username: &str, role: Option<RoleName>) -> AccountCreateDBRequest {
        AccountCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "$argon2id$stub".to_string(),
            active: true,
            role,
        }
    }

    fn allow_all(_: &AccountDBResponse, _: &[RoleName]) -> Result<()> {
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_are_unique_violations() {
        let store = store_with_roles().await;
        store.create_account(&account_request("alice", None)).await.unwrap();

        let err = store.create_account(&account_request("alice", None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref constraint, .. } if constraint.as_deref() == Some("accounts_username_key")));

        let mut other = account_request("alicia", None);
        other.email = "alice@example.com".to_string();
        let err = store.create_account(&other).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref constraint, .. } if constraint.as_deref() == Some("accounts_email_key")));
    }

    #[tokio::test]
    async fn test_grants_follow_current_role_permissions() {
        let store = store_with_roles().await;
        let teacher = store.get_role_by_name(RoleName::Teacher).await.unwrap().unwrap();
        store.add_role_permission(teacher.id, PermissionName::GetPerson).await.unwrap();
        let account = store.create_account(&account_request("tina", Some(RoleName::Teacher))).await.unwrap();

        let grants = store.account_grants(account.id).await.unwrap();
        assert_eq!(
            grants,
            vec![RoleGrant {
                role: RoleName::Teacher,
                permissions: vec![PermissionName::GetPerson],
            }]
        );

        store.remove_role_permission(teacher.id, PermissionName::GetPerson).await.unwrap();
        let grants = store.account_grants(account.id).await.unwrap();
        assert!(grants[0].permissions.is_empty());
    }

    #[tokio::test]
    async fn test_replace_role_keeps_single_role() {
        let store = store_with_roles().await;
        let account = store.create_account(&account_request("sam", Some(RoleName::Student))).await.unwrap();
        store.grant_additional_role(account.id, RoleName::Guardian).unwrap();
        assert_eq!(store.account_grants(account.id).await.unwrap().len(), 2);

        store.replace_account_role(account.id, RoleName::Teacher, &allow_all).await.unwrap();
        let grants = store.account_grants(account.id).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].role, RoleName::Teacher);
    }

    #[tokio::test]
    async fn test_replace_role_guard_rejection_changes_nothing() {
        let store = store_with_roles().await;
        let account = store.create_account(&account_request("sam", Some(RoleName::Student))).await.unwrap();

        let reject = |_: &AccountDBResponse, roles: &[RoleName]| -> Result<()> {
            assert_eq!(roles, &[RoleName::Student]);
            Err(DbError::ProtectedEntity {
                operation: Operation::Update,
                reason: "no".to_string(),
                entity_type: "account".to_string(),
                entity_id: None,
            })
        };
        let err = store.replace_account_role(account.id, RoleName::Teacher, &reject).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));
        assert_eq!(store.account_grants(account.id).await.unwrap()[0].role, RoleName::Student);
    }

    #[tokio::test]
    async fn test_replace_role_missing_account() {
        let store = store_with_roles().await;
        let err = store.replace_account_role(Uuid::new_v4(), RoleName::Teacher, &allow_all).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_role_held_by_account_is_protected() {
        let store = store_with_roles().await;
        let guardian = store.get_role_by_name(RoleName::Guardian).await.unwrap().unwrap();
        store.create_account(&account_request("gail", Some(RoleName::Guardian))).await.unwrap();

        let err = store.delete_role(guardian.id).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));

        let student = store.get_role_by_name(RoleName::Student).await.unwrap().unwrap();
        assert!(store.delete_role(student.id).await.unwrap());
        assert!(!store.delete_role(student.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_role_permission_add_is_idempotent() {
        let store = store_with_roles().await;
        let role = store.get_role_by_name(RoleName::Guardian).await.unwrap().unwrap();
        store.add_role_permission(role.id, PermissionName::GetPerson).await.unwrap();
        let role = store.add_role_permission(role.id, PermissionName::GetPerson).await.unwrap();
        assert_eq!(role.permissions, vec![PermissionName::GetPerson]);

        let role = store.remove_role_permission(role.id, PermissionName::DeletePerson).await.unwrap();
        assert_eq!(role.permissions, vec![PermissionName::GetPerson]);
    }

    #[tokio::test]
    async fn test_consume_reset_token_lifecycle() {
        let store = store_with_roles().await;
        let account = store.create_account(&account_request("rita", None)).await.unwrap();
        let now = Utc::now();

        for digest in [vec![1u8; 32], vec![2u8; 32]] {
            store
                .create_reset_token(&PasswordResetTokenCreateDBRequest {
                    account_id: account.id,
                    token_digest: digest,
                    expires_at: now + Duration::hours(1),
                })
                .await
                .unwrap();
        }

        let outcome = store.consume_reset_token(&[1u8; 32], "$argon2id$new", now).await.unwrap();
        assert_eq!(outcome, ResetOutcome::Completed { account_id: account.id });
        let stored = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$new");

        // single use, and sibling tokens are gone too
        assert_eq!(store.consume_reset_token(&[1u8; 32], "x", now).await.unwrap(), ResetOutcome::NotFound);
        assert_eq!(store.consume_reset_token(&[2u8; 32], "x", now).await.unwrap(), ResetOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_consume_expired_reset_token_leaves_password() {
        let store = store_with_roles().await;
        let account = store.create_account(&account_request("eve", None)).await.unwrap();
        let issued = Utc::now();
        store
            .create_reset_token(&PasswordResetTokenCreateDBRequest {
                account_id: account.id,
                token_digest: vec![9u8; 32],
                expires_at: issued + Duration::minutes(60),
            })
            .await
            .unwrap();

        let later = issued + Duration::minutes(61);
        let outcome = store.consume_reset_token(&[9u8; 32], "$argon2id$new", later).await.unwrap();
        assert_eq!(outcome, ResetOutcome::Expired);
        assert_eq!(store.get_account(account.id).await.unwrap().unwrap().password_hash, "$argon2id$stub");
    }

    #[tokio::test]
    async fn test_creating_reset_token_purges_expired_ones() {
        let store = store_with_roles().await;
        let account = store.create_account(&account_request("rita", None)).await.unwrap();
        let now = Utc::now();
        let token = |digest: u8, expires_at| PasswordResetTokenCreateDBRequest {
            account_id: account.id,
            token_digest: vec![digest; 32],
            expires_at,
        };

        store.create_reset_token(&token(1, now - Duration::minutes(5))).await.unwrap();
        store.create_reset_token(&token(2, now + Duration::hours(1))).await.unwrap();
        store.create_reset_token(&token(3, now + Duration::hours(1))).await.unwrap();

        assert_eq!(store.tables.read().reset_tokens.len(), 2);
        assert_eq!(store.consume_reset_token(&[1u8; 32], "x", now).await.unwrap(), ResetOutcome::NotFound);
        assert!(matches!(
            store.consume_reset_token(&[2u8; 32], "$argon2id$new", now).await.unwrap(),
            ResetOutcome::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_student_is_a_person_with_enrolment() {
        let store = store_with_roles().await;
        let enrolment = Enrolment {
            grade: 3,
            section: crate::types::Section::B,
            school_level: crate::types::SchoolLevel::Primary,
        };
        let person = PersonWriteDBRequest {
            first_name: "Luis".to_string(),
            last_name: "Mamani".to_string(),
            dni: "70112233".to_string(),
            birth_date: chrono::NaiveDate::from_ymd_opt(2016, 8, 2).unwrap(),
            gender: "M".to_string(),
            address: None,
            phone: None,
            account_id: None,
        };
        let plain = store
            .create_person(&PersonWriteDBRequest {
                dni: "70998877".to_string(),
                ..person.clone()
            })
            .await
            .unwrap();
        let student = store
            .create_student(&StudentWriteDBRequest {
                person: person.clone(),
                enrolment,
            })
            .await
            .unwrap();

        // the person side shows up with other persons, the plain person is not a student
        assert_eq!(store.list_persons().await.unwrap().len(), 2);
        assert_eq!(store.list_students().await.unwrap().len(), 1);
        assert!(store.get_student(plain.id).await.unwrap().is_none());
        let update = StudentWriteDBRequest {
            person: person.clone(),
            enrolment,
        };
        assert!(store.update_student(plain.id, &update).await.unwrap().is_none());
        assert!(!store.delete_student(plain.id).await.unwrap());

        // a student reuses the person dni uniqueness
        let err = store
            .create_student(&StudentWriteDBRequest {
                person: PersonWriteDBRequest {
                    dni: "70998877".to_string(),
                    ..person
                },
                enrolment,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(store.list_persons().await.unwrap().len(), 2);

        assert!(store.delete_student(student.person.id).await.unwrap());
        assert!(store.get_person(student.person.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_person_dni_unique_on_update() {
        let store = store_with_roles().await;
        let write = |dni: &str| PersonWriteDBRequest {
            first_name: "Ana".to_string(),
            last_name: "Quispe".to_string(),
            dni: dni.to_string(),
            birth_date: chrono::NaiveDate::from_ymd_opt(2010, 3, 14).unwrap(),
            gender: "F".to_string(),
            address: None,
            phone: None,
            account_id: None,
        };
        let first = store.create_person(&write("12345678")).await.unwrap();
        let second = store.create_person(&write("87654321")).await.unwrap();

        // keeping its own dni is fine
        assert!(store.update_person(first.id, &write("12345678")).await.unwrap().is_some());
        let err = store.update_person(second.id, &write("12345678")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let mut linked = write("11112222");
        linked.account_id = Some(Uuid::new_v4());
        assert!(matches!(store.create_person(&linked).await.unwrap_err(), DbError::ForeignKeyViolation { .. }));
    }
}
