// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-memory account directory.
//!
//! Usernames are unique as typed; emails are unique case-insensitively.
//! Passwords are stored only as Argon2id PHC strings. Each account owns at
//! most one profile, created with the account and recreated on demand after
//! it has been deleted.

use crate::forms::{ProfileForm, ProfilePatch, RegisterForm};
use crate::password::{PasswordError, PasswordHasher};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Account directory error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("A user with that username already exists.")]
    UsernameTaken,

    #[error("A user with this email already exists.")]
    EmailTaken,

    #[error("Not found.")]
    NotFound,

    #[error("This user already has a profile.")]
    ProfileExists,

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl AccountError {
    /// Form field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::UsernameTaken => "username",
            Self::EmailTaken => "email",
            Self::NotFound | Self::ProfileExists | Self::Password(_) => "__all__",
        }
    }
}

/// Optional details attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: u64,
    pub bio: String,
    pub avatar_url: String,
    pub location: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    fn apply(&mut self, patch: &ProfilePatch) {
        for (field, value) in [
            (&mut self.bio, &patch.bio),
            (&mut self.avatar_url, &patch.avatar_url),
            (&mut self.location, &patch.location),
            (&mut self.phone, &patch.phone),
        ] {
            if let Some(value) = value {
                field.clone_from(value);
            }
        }
        self.updated_at = Utc::now();
    }
}

/// Public view of a registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub profile: Option<Profile>,
}

impl Account {
    /// First name if set, otherwise the username.
    pub fn display_name(&self) -> &str {
        if self.first_name.is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }

    /// Uppercased first letter of [`Account::display_name`].
    pub fn avatar_initial(&self) -> String {
        self.display_name()
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Default)]
struct Directory {
    next_id: u64,
    next_profile_id: u64,
    accounts: BTreeMap<u64, StoredAccount>,
    usernames: HashMap<String, u64>,
}

impl Directory {
    fn email_taken(&self, email: &str, except: Option<u64>) -> bool {
        self.accounts
            .values()
            .filter(|stored| Some(stored.account.id) != except)
            .any(|stored| stored.account.email.eq_ignore_ascii_case(email))
    }

    fn new_profile(&mut self) -> Profile {
        self.next_profile_id += 1;
        let now = Utc::now();
        Profile {
            id: self.next_profile_id,
            bio: String::new(),
            avatar_url: String::new(),
            location: String::new(),
            phone: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn account_mut(&mut self, id: u64) -> Result<&mut Account, AccountError> {
        self.accounts
            .get_mut(&id)
            .map(|stored| &mut stored.account)
            .ok_or(AccountError::NotFound)
    }

    fn profile_owner(&self, profile_id: u64) -> Option<u64> {
        self.accounts
            .values()
            .find(|stored| stored.account.profile.as_ref().map(|p| p.id) == Some(profile_id))
            .map(|stored| stored.account.id)
    }

    fn insert(&mut self, new: NewAccount<'_>, password_hash: String) -> Result<Account, AccountError> {
        if self.usernames.contains_key(new.username) {
            debug!(username = %new.username, "Username already registered");
            return Err(AccountError::UsernameTaken);
        }
        let email = new.email.trim();
        if self.email_taken(email, None) {
            debug!(username = %new.username, "Email already registered");
            return Err(AccountError::EmailTaken);
        }

        self.next_id += 1;
        let mut profile = self.new_profile();
        profile.location = new.location.to_string();
        profile.bio = new.bio.to_string();
        let account = Account {
            id: self.next_id,
            username: new.username.to_string(),
            email: email.to_string(),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            is_staff: new.is_staff,
            date_joined: Utc::now(),
            profile: Some(profile),
        };
        self.usernames.insert(account.username.clone(), account.id);
        self.accounts.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash,
            },
        );
        Ok(account)
    }
}

struct NewAccount<'a> {
    username: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    password: &'a str,
    is_staff: bool,
    location: &'a str,
    bio: &'a str,
}

/// Fixture account inserted by [`AccountDirectory::seed`].
pub struct SeedAccount {
    pub username: &'static str,
    pub email: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub password: &'static str,
    pub is_staff: bool,
    pub location: &'static str,
    pub bio: &'static str,
}

/// Sample users for local development. The first entry is the staff account.
pub const SEED_ACCOUNTS: &[SeedAccount] = &[
    SeedAccount {
        username: "admin",
        email: "admin@example.se",
        first_name: "",
        last_name: "",
        password: "Admin123!",
        is_staff: true,
        location: "",
        bio: "",
    },
    SeedAccount {
        username: "erik.lindberg",
        email: "erik@example.se",
        first_name: "Erik",
        last_name: "Lindberg",
        password: "SwedishTest123!",
        is_staff: false,
        location: "Stockholm",
        bio: "Backend developer at Spotify",
    },
    SeedAccount {
        username: "anna.johansson",
        email: "anna@example.se",
        first_name: "Anna",
        last_name: "Johansson",
        password: "SwedishTest123!",
        is_staff: false,
        location: "Gothenburg",
        bio: "UX Designer at Klarna",
    },
    SeedAccount {
        username: "oscar.nilsson",
        email: "oscar@example.se",
        first_name: "Oscar",
        last_name: "Nilsson",
        password: "SwedishTest123!",
        is_staff: false,
        location: "Malmö",
        bio: "DevOps engineer at Ericsson",
    },
    SeedAccount {
        username: "sara.eriksson",
        email: "sara@example.se",
        first_name: "Sara",
        last_name: "Eriksson",
        password: "SwedishTest123!",
        is_staff: false,
        location: "Uppsala",
        bio: "Data scientist at IKEA Digital",
    },
    SeedAccount {
        username: "karl.svensson",
        email: "karl@example.se",
        first_name: "Karl",
        last_name: "Svensson",
        password: "SwedishTest123!",
        is_staff: false,
        location: "Linköping",
        bio: "Security researcher at SAAB",
    },
];

/// Thread-safe account directory.
pub struct AccountDirectory {
    hasher: PasswordHasher,
    inner: RwLock<Directory>,
}

impl AccountDirectory {
    pub fn new(hasher: PasswordHasher) -> Self {
        Self {
            hasher,
            inner: RwLock::new(Directory::default()),
        }
    }

    /// Create an account from an already validated form.
    pub async fn register(&self, form: &RegisterForm) -> Result<Account, AccountError> {
        let account = self
            .create(NewAccount {
                username: &form.username,
                email: &form.email,
                first_name: &form.first_name,
                last_name: &form.last_name,
                password: &form.password1,
                is_staff: false,
                location: "",
                bio: "",
            })
            .await?;
        info!(id = account.id, username = %account.username, "Account registered");
        Ok(account)
    }

    async fn create(&self, new: NewAccount<'_>) -> Result<Account, AccountError> {
        // Hashing is slow on purpose; keep it outside the lock
        let password_hash = self.hasher.hash(new.password)?;
        self.inner.write().await.insert(new, password_hash)
    }

    /// Return the account if `password` matches.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, AccountError> {
        let found = {
            let directory = self.inner.read().await;
            directory
                .usernames
                .get(username)
                .and_then(|id| directory.accounts.get(id))
                .map(|stored| (stored.account.clone(), stored.password_hash.clone()))
        };
        let Some((account, hash)) = found else {
            return Ok(None);
        };

        if self.hasher.verify(password, &hash)? {
            Ok(Some(account))
        } else {
            Ok(None)
        }
    }

    pub async fn get(&self, id: u64) -> Option<Account> {
        let directory = self.inner.read().await;
        directory.accounts.get(&id).map(|stored| stored.account.clone())
    }

    pub async fn find(&self, username: &str) -> Option<Account> {
        let directory = self.inner.read().await;
        let id = directory.usernames.get(username)?;
        directory.accounts.get(id).map(|stored| stored.account.clone())
    }

    /// Every account, oldest first.
    pub async fn list(&self) -> Vec<Account> {
        let directory = self.inner.read().await;
        directory.accounts.values().map(|stored| stored.account.clone()).collect()
    }

    /// Owner of the profile with `profile_id`.
    pub async fn profile_owner(&self, profile_id: u64) -> Option<Account> {
        let directory = self.inner.read().await;
        let id = directory.profile_owner(profile_id)?;
        directory.accounts.get(&id).map(|stored| stored.account.clone())
    }

    /// The account with its profile, creating an empty profile if it has none.
    pub async fn ensure_profile(&self, id: u64) -> Result<Account, AccountError> {
        let mut directory = self.inner.write().await;
        if directory.account_mut(id)?.profile.is_none() {
            let profile = directory.new_profile();
            debug!(user_id = id, profile_id = profile.id, "Profile recreated");
            directory.account_mut(id)?.profile = Some(profile);
        }
        Ok(directory.account_mut(id)?.clone())
    }

    /// Create a profile for an account that has none.
    pub async fn create_profile(&self, id: u64, patch: &ProfilePatch) -> Result<Account, AccountError> {
        let mut directory = self.inner.write().await;
        if directory.account_mut(id)?.profile.is_some() {
            return Err(AccountError::ProfileExists);
        }
        let mut profile = directory.new_profile();
        profile.apply(patch);
        let account = directory.account_mut(id)?;
        account.profile = Some(profile);
        info!(user_id = id, "Profile created");
        Ok(account.clone())
    }

    /// Apply the profile page form to account `id`.
    ///
    /// The email must not belong to any other account.
    pub async fn update_account(&self, id: u64, form: &ProfileForm) -> Result<Account, AccountError> {
        let mut directory = self.inner.write().await;
        let email = form.email.trim();
        if directory.email_taken(email, Some(id)) {
            debug!(user_id = id, "Email already registered");
            return Err(AccountError::EmailTaken);
        }
        if directory.account_mut(id)?.profile.is_none() {
            let profile = directory.new_profile();
            directory.account_mut(id)?.profile = Some(profile);
        }

        let account = directory.account_mut(id)?;
        account.first_name = form.first_name.trim().to_string();
        account.last_name = form.last_name.trim().to_string();
        account.email = email.to_string();
        if let Some(profile) = account.profile.as_mut() {
            profile.apply(&form.patch());
        }

        info!(user_id = id, "Account updated");
        Ok(account.clone())
    }

    /// Apply `patch` to the profile with `profile_id` and return its owner.
    pub async fn patch_profile(&self, profile_id: u64, patch: &ProfilePatch) -> Result<Account, AccountError> {
        let mut directory = self.inner.write().await;
        let owner = directory.profile_owner(profile_id).ok_or(AccountError::NotFound)?;
        let account = directory.account_mut(owner)?;
        if let Some(profile) = account.profile.as_mut() {
            profile.apply(patch);
        }
        info!(user_id = owner, profile_id, "Profile updated");
        Ok(account.clone())
    }

    pub async fn delete_profile(&self, profile_id: u64) -> Result<(), AccountError> {
        let mut directory = self.inner.write().await;
        let owner = directory.profile_owner(profile_id).ok_or(AccountError::NotFound)?;
        directory.account_mut(owner)?.profile = None;
        info!(user_id = owner, profile_id, "Profile deleted");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.accounts.is_empty()
    }

    /// Insert the fixture accounts, skipping any that already exist.
    ///
    /// Fixture data is trusted and not run through form validation.
    /// Returns the number of accounts created.
    pub async fn seed(&self, fixtures: &[SeedAccount]) -> Result<usize, AccountError> {
        let mut created = 0;
        for fixture in fixtures {
            if self.find(fixture.username).await.is_some() {
                info!(username = fixture.username, "Seed account exists, skipped");
                continue;
            }
            let result = self
                .create(NewAccount {
                    username: fixture.username,
                    email: fixture.email,
                    first_name: fixture.first_name,
                    last_name: fixture.last_name,
                    password: fixture.password,
                    is_staff: fixture.is_staff,
                    location: fixture.location,
                    bio: fixture.bio,
                })
                .await;
            match result {
                Ok(account) => {
                    debug!(username = %account.username, staff = account.is_staff, "Seed account created");
                    created += 1;
                }
                Err(err @ AccountError::Password(_)) => return Err(err),
                Err(err) => info!(username = fixture.username, error = %err, "Seed account skipped"),
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PasswordConfig;

    fn directory() -> AccountDirectory {
        AccountDirectory::new(PasswordHasher::new(&PasswordConfig::fast()).unwrap())
    }

    fn form(username: &str, email: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: email.to_string(),
            password1: "TestPass123!".to_string(),
            password2: "TestPass123!".to_string(),
        }
    }

    fn profile_form(email: &str) -> ProfileForm {
        ProfileForm {
            first_name: "Anna".to_string(),
            last_name: "Berg".to_string(),
            email: email.to_string(),
            bio: "New bio".to_string(),
            location: "Malmö".to_string(),
            ..ProfileForm::default()
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let directory = directory();
        let account = directory
            .register(&form("testuser", "test@example.com"))
            .await
            .unwrap();
        assert_eq!(account.id, 1);
        assert!(!account.is_staff);
        assert!(account.profile.is_some());

        assert_eq!(
            directory.authenticate("testuser", "TestPass123!").await.unwrap(),
            Some(account)
        );
        assert_eq!(directory.authenticate("testuser", "wrong").await.unwrap(), None);
        assert_eq!(directory.authenticate("nobody", "TestPass123!").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_password_stored_as_argon2id() {
        let directory = directory();
        let account = directory
            .register(&form("testuser", "test@example.com"))
            .await
            .unwrap();

        let inner = directory.inner.read().await;
        let stored = &inner.accounts[&account.id].password_hash;
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("TestPass123!"));
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let directory = directory();
        directory.register(&form("taken", "a@example.com")).await.unwrap();

        let err = directory
            .register(&form("taken", "b@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::UsernameTaken);
        assert_eq!(err.field(), "username");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_case_insensitively() {
        let directory = directory();
        directory.register(&form("first", "taken@example.com")).await.unwrap();

        let err = directory
            .register(&form("second", "TAKEN@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::EmailTaken);
        assert_eq!(directory.len().await, 1);
    }

    #[test]
    fn test_avatar_initial() {
        let mut account = Account {
            id: 1,
            username: "testuser".to_string(),
            email: String::new(),
            first_name: "åsa".to_string(),
            last_name: String::new(),
            is_staff: false,
            date_joined: Utc::now(),
            profile: None,
        };
        assert_eq!(account.avatar_initial(), "Å");

        account.first_name.clear();
        assert_eq!(account.avatar_initial(), "T");
    }

    #[tokio::test]
    async fn test_update_account_keeps_own_email() {
        let directory = directory();
        let anna = directory.register(&form("anna", "anna@example.se")).await.unwrap();
        directory.register(&form("erik", "erik@example.se")).await.unwrap();

        let updated = directory
            .update_account(anna.id, &profile_form("ANNA@example.se"))
            .await
            .unwrap();
        assert_eq!(updated.last_name, "Berg");
        assert_eq!(updated.email, "ANNA@example.se");
        let profile = updated.profile.unwrap();
        assert_eq!(profile.bio, "New bio");
        assert_eq!(profile.location, "Malmö");

        let err = directory
            .update_account(anna.id, &profile_form("Erik@example.se"))
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::EmailTaken);
        assert_eq!(directory.get(anna.id).await.unwrap().email, "ANNA@example.se");
    }

    #[tokio::test]
    async fn test_patch_leaves_absent_fields() {
        let directory = directory();
        let account = directory.register(&form("anna", "anna@example.se")).await.unwrap();
        let profile_id = account.profile.unwrap().id;

        let first = ProfilePatch {
            bio: Some("Designer".to_string()),
            location: Some("Gothenburg".to_string()),
            ..ProfilePatch::default()
        };
        directory.patch_profile(profile_id, &first).await.unwrap();

        let second = ProfilePatch {
            location: Some("Uppsala".to_string()),
            ..ProfilePatch::default()
        };
        let profile = directory
            .patch_profile(profile_id, &second)
            .await
            .unwrap()
            .profile
            .unwrap();
        assert_eq!(profile.bio, "Designer");
        assert_eq!(profile.location, "Uppsala");
        assert!(profile.updated_at >= profile.created_at);
    }

    #[tokio::test]
    async fn test_deleted_profile_is_recreated_on_demand() {
        let directory = directory();
        let account = directory.register(&form("anna", "anna@example.se")).await.unwrap();
        let old_id = account.profile.unwrap().id;

        directory.delete_profile(old_id).await.unwrap();
        assert!(directory.get(account.id).await.unwrap().profile.is_none());
        assert!(directory.profile_owner(old_id).await.is_none());
        assert_eq!(directory.delete_profile(old_id).await, Err(AccountError::NotFound));

        let restored = directory.ensure_profile(account.id).await.unwrap().profile.unwrap();
        assert_ne!(restored.id, old_id);
        assert_eq!(restored.bio, "");
        assert_eq!(
            directory.create_profile(account.id, &ProfilePatch::default()).await,
            Err(AccountError::ProfileExists)
        );
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let directory = directory();
        assert_eq!(directory.seed(SEED_ACCOUNTS).await.unwrap(), 6);
        assert_eq!(directory.seed(SEED_ACCOUNTS).await.unwrap(), 0);
        assert_eq!(directory.len().await, 6);

        let anna = directory.find("anna.johansson").await.unwrap();
        let profile = anna.profile.unwrap();
        assert_eq!(profile.location, "Gothenburg");
        assert_eq!(profile.bio, "UX Designer at Klarna");
        assert!(directory
            .authenticate("anna.johansson", "SwedishTest123!")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_seed_includes_staff_account() {
        let directory = directory();
        directory.seed(SEED_ACCOUNTS).await.unwrap();

        let admin = directory.authenticate("admin", "Admin123!").await.unwrap().unwrap();
        assert!(admin.is_staff);
        let staff = directory.list().await.iter().filter(|a| a.is_staff).count();
        assert_eq!(staff, 1);
    }
}
