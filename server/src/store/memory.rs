use std::{collections::BTreeMap, sync::Arc};

use lib::types::{RegistrationToken, Role, UserPatch};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Credential, RegistrationTxn, Store, StoreError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<String, Credential>,
    tokens: BTreeMap<String, RegistrationToken>,
}

impl MemoryState {
    fn username_taken(&self, username: &str) -> bool {
        self.users.values().any(|user| user.username == username)
    }
}

/// Process-local store. A registration holds the lock from `begin` to
/// `commit`/drop, so registrations never interleave.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryRegistration {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl RegistrationTxn for MemoryRegistration {
    async fn root_exists(&mut self) -> Result<bool, StoreError> {
        Ok(self.staged.users.values().any(|user| user.role == Role::Root))
    }

    async fn consume_token(&mut self, id: &str) -> Result<Option<RegistrationToken>, StoreError> {
        Ok(self.staged.tokens.remove(id))
    }

    async fn insert_credential(&mut self, credential: &Credential) -> Result<(), StoreError> {
        if self.staged.users.contains_key(&credential.id)
            || self.staged.username_taken(&credential.username)
        {
            return Err(StoreError::UniqueViolation);
        }
        self.staged
            .users
            .insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.staged;
        Ok(())
    }
}

impl Store for MemoryStore {
    type Registration = MemoryRegistration;

    async fn begin_registration(&self) -> Result<MemoryRegistration, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryRegistration { guard, staged })
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.state.lock().await.users.get(id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<Credential>, StoreError> {
        Ok(self.state.lock().await.users.values().cloned().collect())
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.users.remove(id).is_some())
    }

    async fn update_user(&self, patch: &UserPatch) -> Result<Option<Credential>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&patch.id) else {
            return Ok(None);
        };
        user.apply(patch);
        Ok(Some(user.clone()))
    }

    async fn list_tokens(&self) -> Result<Vec<RegistrationToken>, StoreError> {
        Ok(self.state.lock().await.tokens.values().cloned().collect())
    }

    async fn create_token(&self, token: &RegistrationToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.tokens.contains_key(&token.id) {
            return Err(StoreError::UniqueViolation);
        }
        state.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn delete_token(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.tokens.remove(id).is_some())
    }
}
