//! User record storage.
//!
//! [`UserStore`] is the contract the credential lifecycle needs from
//! persistence. [`SledUserStore`] implements it on two sled trees: records
//! keyed by id and a unique username index. Every write touches both trees
//! in one transaction.

use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use thiserror::Error;

use crate::identity::{Role, UserId};

const USERS_TREE_NAME: &[u8] = b"users:by_id";
const USERNAMES_TREE_NAME: &[u8] = b"users:by_username";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("username already exists: {0}")]
    DuplicateUsername(String),

    #[error("storage error: {0}")]
    Backend(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid key format")]
    InvalidKey,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A registered user as held by the store.
///
/// Not serializable: the only client-facing view is [`PublicUser`].
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl UserRecord {
    /// Strip the password hash for a response.
    pub fn into_public(self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username,
            role: self.role,
        }
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// A user record without its password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

/// Fields for a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Replacement fields for an existing user.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Persistence contract for user records.
///
/// Each call is atomic for the record it touches. Failures are returned
/// as-is; callers do not retry.
pub trait UserStore: Send + Sync {
    /// Look up a user by exact (case-sensitive) username.
    fn find_by_username(&self, username: &str) -> StoreResult<UserRecord>;

    /// Look up a user by id.
    fn find_by_id(&self, id: UserId) -> StoreResult<UserRecord>;

    /// Insert a user, returning its new id.
    fn insert(&self, user: NewUser) -> StoreResult<UserId>;

    /// Replace a user's username, password hash and role.
    fn update(&self, id: UserId, update: UserUpdate) -> StoreResult<UserRecord>;

    /// Delete a user. Irreversible.
    fn delete_by_id(&self, id: UserId) -> StoreResult<()>;
}

/// On-disk representation.
#[derive(Serialize, Deserialize)]
struct StoredUser {
    username: String,
    password_hash: String,
    role: Role,
}

impl StoredUser {
    fn into_record(self, id: UserId) -> UserRecord {
        UserRecord {
            id,
            username: self.username,
            password_hash: self.password_hash,
            role: self.role,
        }
    }
}

/// sled-backed [`UserStore`].
#[derive(Clone)]
pub struct SledUserStore {
    db: sled::Db,
    users: sled::Tree,
    usernames: sled::Tree,
}

impl SledUserStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Use the user trees of an already open database.
    pub fn from_db(db: &sled::Db) -> StoreResult<Self> {
        Ok(Self {
            db: db.clone(),
            users: db.open_tree(USERS_TREE_NAME)?,
            usernames: db.open_tree(USERNAMES_TREE_NAME)?,
        })
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self) -> StoreResult<UserId> {
        // generate_id starts at 0; ids start at 1.
        let raw = self.db.generate_id()? + 1;
        UserId::try_from(raw).map_err(|_| StoreError::InvalidKey)
    }

    fn load(&self, id: UserId) -> StoreResult<UserRecord> {
        let bytes = self
            .users
            .get(id_key(id))?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        Ok(deserialize_user(&bytes)?.into_record(id))
    }
}

impl UserStore for SledUserStore {
    fn find_by_username(&self, username: &str) -> StoreResult<UserRecord> {
        let id_bytes = self
            .usernames
            .get(username.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(format!("user {username}")))?;
        let id = decode_id(&id_bytes)?;

        // A concurrent delete can land between the two reads.
        self.load(id).map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound(format!("user {username}")),
            other => other,
        })
    }

    fn find_by_id(&self, id: UserId) -> StoreResult<UserRecord> {
        self.load(id)
    }

    fn insert(&self, user: NewUser) -> StoreResult<UserId> {
        let id = self.next_id()?;
        let key = id_key(id);
        let value = serialize_user(&StoredUser {
            username: user.username.clone(),
            password_hash: user.password_hash,
            role: user.role,
        })?;

        (&self.users, &self.usernames)
            .transaction(|(users, usernames)| {
                if usernames.get(user.username.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        StoreError::DuplicateUsername(user.username.clone()),
                    ));
                }
                usernames.insert(user.username.as_bytes(), &key[..])?;
                users.insert(&key[..], value.as_slice())?;
                Ok(())
            })
            .map_err(flatten_tx_error)?;

        tracing::debug!(user_id = id, username = %user.username, "user inserted");
        Ok(id)
    }

    fn update(&self, id: UserId, update: UserUpdate) -> StoreResult<UserRecord> {
        let key = id_key(id);
        let value = serialize_user(&StoredUser {
            username: update.username.clone(),
            password_hash: update.password_hash.clone(),
            role: update.role,
        })?;

        (&self.users, &self.usernames)
            .transaction(|(users, usernames)| {
                let current = match users.get(&key[..])? {
                    Some(bytes) => deserialize_user(&bytes).map_err(ConflictableTransactionError::Abort)?,
                    None => {
                        return Err(ConflictableTransactionError::Abort(StoreError::NotFound(
                            format!("user {id}"),
                        )))
                    }
                };

                if current.username != update.username {
                    if usernames.get(update.username.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            StoreError::DuplicateUsername(update.username.clone()),
                        ));
                    }
                    usernames.remove(current.username.as_bytes())?;
                    usernames.insert(update.username.as_bytes(), &key[..])?;
                }

                users.insert(&key[..], value.as_slice())?;
                Ok(())
            })
            .map_err(flatten_tx_error)?;

        tracing::debug!(user_id = id, "user updated");
        Ok(UserRecord {
            id,
            username: update.username,
            password_hash: update.password_hash,
            role: update.role,
        })
    }

    fn delete_by_id(&self, id: UserId) -> StoreResult<()> {
        let key = id_key(id);

        (&self.users, &self.usernames)
            .transaction(|(users, usernames)| {
                let removed = match users.remove(&key[..])? {
                    Some(bytes) => deserialize_user(&bytes).map_err(ConflictableTransactionError::Abort)?,
                    None => {
                        return Err(ConflictableTransactionError::Abort(StoreError::NotFound(
                            format!("user {id}"),
                        )))
                    }
                };
                usernames.remove(removed.username.as_bytes())?;
                Ok(())
            })
            .map_err(flatten_tx_error)?;

        tracing::debug!(user_id = id, "user deleted");
        Ok(())
    }
}

fn id_key(id: UserId) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_id(bytes: &[u8]) -> StoreResult<UserId> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| StoreError::InvalidKey)?;
    Ok(UserId::from_be_bytes(arr))
}

fn serialize_user(user: &StoredUser) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(user).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn deserialize_user(bytes: &[u8]) -> StoreResult<StoredUser> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn flatten_tx_error(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StoreError::Backend(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (SledUserStore, sled::Db) {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledUserStore::from_db(&db).unwrap();
        (store, db)
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: format!("$argon2id$fake${username}"),
            role,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let (store, _db) = test_store();

        let id = store.insert(new_user("alice", Role::Admin)).unwrap();
        assert!(id >= 1);

        let by_name = store.find_by_username("alice").unwrap();
        assert_eq!(by_name.id, id);
        assert_eq!(by_name.role, Role::Admin);

        let by_id = store.find_by_id(id).unwrap();
        assert_eq!(by_id, by_name);
    }

    #[test]
    fn test_ids_are_unique() {
        let (store, _db) = test_store();

        let a = store.insert(new_user("a", Role::User)).unwrap();
        let b = store.insert(new_user("b", Role::User)).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_username() {
        let (store, _db) = test_store();

        store.insert(new_user("alice", Role::User)).unwrap();
        let err = store.insert(new_user("alice", Role::Admin)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername(ref name) if name == "alice"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_usernames_are_case_sensitive() {
        let (store, _db) = test_store();

        store.insert(new_user("alice", Role::User)).unwrap();
        store.insert(new_user("Alice", Role::User)).unwrap();
        assert!(matches!(
            store.find_by_username("ALICE"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_not_found() {
        let (store, _db) = test_store();

        assert!(matches!(store.find_by_id(99), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.find_by_username("ghost"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_renames_and_reindexes() {
        let (store, _db) = test_store();
        let id = store.insert(new_user("bob", Role::User)).unwrap();

        let updated = store
            .update(
                id,
                UserUpdate {
                    username: "robert".to_string(),
                    password_hash: "$argon2id$new".to_string(),
                    role: Role::Admin,
                },
            )
            .unwrap();
        assert_eq!(updated.username, "robert");

        assert!(matches!(
            store.find_by_username("bob"),
            Err(StoreError::NotFound(_))
        ));
        let found = store.find_by_username("robert").unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.password_hash, "$argon2id$new");
        assert_eq!(found.role, Role::Admin);
    }

    #[test]
    fn test_update_keeping_username() {
        let (store, _db) = test_store();
        let id = store.insert(new_user("bob", Role::User)).unwrap();

        store
            .update(
                id,
                UserUpdate {
                    username: "bob".to_string(),
                    password_hash: "$argon2id$rotated".to_string(),
                    role: Role::User,
                },
            )
            .unwrap();

        assert_eq!(
            store.find_by_username("bob").unwrap().password_hash,
            "$argon2id$rotated"
        );
    }

    #[test]
    fn test_update_onto_taken_username() {
        let (store, _db) = test_store();
        store.insert(new_user("alice", Role::User)).unwrap();
        let bob = store.insert(new_user("bob", Role::User)).unwrap();

        let err = store
            .update(
                bob,
                UserUpdate {
                    username: "alice".to_string(),
                    password_hash: "h".to_string(),
                    role: Role::User,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername(_)));

        // Nothing changed.
        assert_eq!(store.find_by_username("bob").unwrap().id, bob);
    }

    #[test]
    fn test_update_missing_user() {
        let (store, _db) = test_store();
        let err = store
            .update(
                42,
                UserUpdate {
                    username: "x".to_string(),
                    password_hash: "h".to_string(),
                    role: Role::User,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_frees_username() {
        let (store, _db) = test_store();
        let id = store.insert(new_user("carol", Role::User)).unwrap();

        store.delete_by_id(id).unwrap();
        assert!(matches!(store.find_by_id(id), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.delete_by_id(id),
            Err(StoreError::NotFound(_))
        ));

        let again = store.insert(new_user("carol", Role::User)).unwrap();
        assert_ne!(again, id);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let id = {
            let store = SledUserStore::open(dir.path()).unwrap();
            let id = store.insert(new_user("dave", Role::User)).unwrap();
            store.flush().unwrap();
            id
        };

        let store = SledUserStore::open(dir.path()).unwrap();
        assert_eq!(store.find_by_username("dave").unwrap().id, id);
    }

    #[test]
    fn test_corrupt_record_is_not_reported_missing() {
        let (store, _db) = test_store();
        let id = store.insert(new_user("bob", Role::User)).unwrap();
        store.users.insert(id_key(id), &b"{not json"[..]).unwrap();

        assert!(matches!(
            store.find_by_id(id),
            Err(StoreError::Serialization(_))
        ));
        assert!(matches!(
            store.find_by_username("bob"),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let record = UserRecord {
            id: 1,
            username: "eve".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::User,
        };
        assert!(!format!("{record:?}").contains("secret"));

        let public = record.into_public();
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }
}
