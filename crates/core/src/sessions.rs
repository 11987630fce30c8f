//! Role-aware access to the credential records in a [`SessionStore`]

use crate::error::StoreResult;
use crate::role::Role;
use crate::session::{BlockNotice, SessionCredential, keys};
use crate::store::SessionStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A credential together with the key it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredential {
    pub role: Role,
    pub source_key: &'static str,
    pub credential: SessionCredential,
}

/// Facade over a shared [`SessionStore`]
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for Sessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sessions").finish_non_exhaustive()
    }
}

impl Sessions {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Load the credential for `role`
    pub fn load(&self, role: Role) -> StoreResult<Option<SessionCredential>> {
        Ok(self.locate(role)?.map(|stored| stored.credential))
    }

    /// Load the credential for `role` along with its storage key.
    ///
    /// Students are looked up under the current key first, then the legacy one.
    pub fn locate(&self, role: Role) -> StoreResult<Option<StoredCredential>> {
        let found = match role {
            Role::Admin => self
                .read_blob(keys::ADMIN_AUTH)?
                .map(|c| (keys::ADMIN_AUTH, c)),
            Role::Student => match self.read_blob(keys::STUDENT_AUTH)? {
                Some(c) => Some((keys::STUDENT_AUTH, c)),
                None => self
                    .read_blob(keys::LEGACY_AUTH)?
                    .map(|c| (keys::LEGACY_AUTH, c)),
            },
            Role::Faculty => self.read_faculty()?.map(|c| (keys::FACULTY_TOKEN, c)),
        };

        Ok(found.map(|(source_key, credential)| StoredCredential {
            role,
            source_key,
            credential,
        }))
    }

    /// Persist a freshly issued credential for `role`
    pub fn save(&self, role: Role, credential: &SessionCredential) -> StoreResult<()> {
        let key = match role {
            Role::Admin => keys::ADMIN_AUTH,
            Role::Student => keys::STUDENT_AUTH,
            Role::Faculty => keys::FACULTY_TOKEN,
        };
        self.write_at(key, credential)?;
        info!(%role, "Stored session credential");
        Ok(())
    }

    /// Replace the tokens of the record stored under `source_key`.
    ///
    /// Only the token fields are touched: the user profile, the blob `version`
    /// and any field the front end keeps next to them survive. A `None`
    /// refresh token leaves the existing one in place.
    pub fn update_tokens(
        &self,
        stored: &StoredCredential,
        token: &str,
        refresh_token: Option<&str>,
    ) -> StoreResult<SessionCredential> {
        let mut credential = stored.credential.clone();
        credential.token = token.to_string();
        if let Some(refresh_token) = refresh_token {
            credential.refresh_token = Some(refresh_token.to_string());
        }

        if stored.source_key == keys::FACULTY_TOKEN {
            self.store.set(keys::FACULTY_TOKEN, token)?;
            if let Some(refresh_token) = refresh_token {
                self.store.set(keys::FACULTY_REFRESH_TOKEN, refresh_token)?;
            }
        } else {
            let patched = self
                .store
                .get(stored.source_key)?
                .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
                .and_then(|blob| patch_tokens(blob, token, refresh_token));
            match patched {
                Some(blob) => self
                    .store
                    .set(stored.source_key, &serde_json::to_string(&blob)?)?,
                None => self.write_at(stored.source_key, &credential)?,
            }
        }

        debug!(role = %stored.role, key = stored.source_key, "Updated session tokens");
        Ok(credential)
    }

    /// Refresh token kept by the legacy global record
    pub fn legacy_refresh_token(&self) -> StoreResult<Option<String>> {
        Ok(self
            .read_blob(keys::LEGACY_AUTH)?
            .and_then(|c| c.refresh_token))
    }

    /// Remove the record(s) belonging to `role`
    pub fn clear(&self, role: Role) -> StoreResult<()> {
        let owned: &[&str] = match role {
            Role::Admin => &[keys::ADMIN_AUTH],
            Role::Student => &[keys::STUDENT_AUTH, keys::LEGACY_AUTH],
            Role::Faculty => &[
                keys::FACULTY_TOKEN,
                keys::FACULTY_REFRESH_TOKEN,
                keys::FACULTY_USER,
            ],
        };
        for key in owned {
            self.store.remove(key)?;
        }
        info!(%role, "Cleared session credential");
        Ok(())
    }

    /// Remove every credential key family
    pub fn clear_all(&self) -> StoreResult<()> {
        for key in keys::CREDENTIAL_KEYS {
            self.store.remove(key)?;
        }
        info!("Cleared all session credentials");
        Ok(())
    }

    /// Roles that currently have a usable credential
    pub fn active_roles(&self) -> StoreResult<Vec<Role>> {
        let mut roles = Vec::new();
        for role in Role::ALL {
            if self.locate(role)?.is_some() {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    /// Record that the account was deactivated so the next login screen can say so
    pub fn mark_blocked(&self, message: &str) -> StoreResult<()> {
        self.store.set(keys::ACCOUNT_BLOCKED, "true")?;
        self.store.set(keys::BLOCK_MESSAGE, message)
    }

    /// Read the pending block notice without consuming it
    pub fn block_notice(&self) -> StoreResult<Option<BlockNotice>> {
        if self.store.get(keys::ACCOUNT_BLOCKED)?.as_deref() != Some("true") {
            return Ok(None);
        }
        let message = self.store.get(keys::BLOCK_MESSAGE)?.unwrap_or_default();
        Ok(Some(BlockNotice { message }))
    }

    /// Read and clear the pending block notice
    pub fn take_block_notice(&self) -> StoreResult<Option<BlockNotice>> {
        let notice = self.block_notice()?;
        self.store.remove(keys::ACCOUNT_BLOCKED)?;
        self.store.remove(keys::BLOCK_MESSAGE)?;
        Ok(notice)
    }

    fn read_blob(&self, key: &str) -> StoreResult<Option<SessionCredential>> {
        Ok(self
            .store
            .get(key)?
            .and_then(|blob| SessionCredential::from_blob(&blob)))
    }

    fn read_faculty(&self) -> StoreResult<Option<SessionCredential>> {
        let Some(token) = self.store.get(keys::FACULTY_TOKEN)?.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let refresh_token = self
            .store
            .get(keys::FACULTY_REFRESH_TOKEN)?
            .filter(|t| !t.is_empty());
        let user = self
            .store
            .get(keys::FACULTY_USER)?
            .and_then(|raw| serde_json::from_str(&raw).ok());

        Ok(Some(SessionCredential {
            token,
            refresh_token,
            user,
        }))
    }

    fn write_at(&self, key: &str, credential: &SessionCredential) -> StoreResult<()> {
        if key == keys::FACULTY_TOKEN {
            self.store.set(keys::FACULTY_TOKEN, &credential.token)?;
            match &credential.refresh_token {
                Some(refresh) => self.store.set(keys::FACULTY_REFRESH_TOKEN, refresh)?,
                None => self.store.remove(keys::FACULTY_REFRESH_TOKEN)?,
            }
            match &credential.user {
                Some(user) => self
                    .store
                    .set(keys::FACULTY_USER, &serde_json::to_string(user)?)?,
                None => self.store.remove(keys::FACULTY_USER)?,
            }
            Ok(())
        } else {
            self.store.set(key, &credential.to_blob()?)
        }
    }
}

/// Swap the tokens inside a stored blob, under `state` when present.
/// Returns `None` when the blob is not an object.
fn patch_tokens(mut blob: Value, token: &str, refresh_token: Option<&str>) -> Option<Value> {
    let nested = blob.get("state").is_some_and(Value::is_object);
    let target = if nested {
        blob.get_mut("state")?.as_object_mut()?
    } else {
        blob.as_object_mut()?
    };

    let token_field = if !target.contains_key("token") && target.contains_key("accessToken") {
        "accessToken"
    } else {
        "token"
    };
    target.insert(token_field.to_string(), Value::from(token));
    if let Some(refresh_token) = refresh_token {
        target.insert("refreshToken".to_string(), Value::from(refresh_token));
    }

    Some(blob)
}
