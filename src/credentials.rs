use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;

use crate::api::UserProfile;

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub user: Option<UserProfile>,
}

#[async_trait]
pub trait CredentialStore {
    async fn load(&self) -> Result<Option<Credentials>>;
    async fn save(&self, credentials: &Credentials) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}
impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
    fn token_path(&self) -> PathBuf {
        self.dir.join("token")
    }
    fn user_path(&self) -> PathBuf {
        self.dir.join("user")
    }
}
#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        let token = match fs::read_to_string(self.token_path()).await {
            Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let user = match fs::read_to_string(self.user_path()).await {
            Ok(user) => match serde_json::from_str::<UserProfile>(&user) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Ignoring unreadable stored user: {}", e);
                    None
                }
            },
            Err(_) => None,
        };
        Ok(Some(Credentials { token, user }))
    }
    async fn save(&self, credentials: &Credentials) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.token_path(), &credentials.token).await?;
        match &credentials.user {
            Some(user) => fs::write(self.user_path(), serde_json::to_vec(user)?).await?,
            None => remove_if_exists(self.user_path()).await?,
        }
        debug!("Stored credentials in {}", self.dir.display());
        Ok(())
    }
    async fn clear(&self) -> Result<()> {
        remove_if_exists(self.token_path()).await?;
        remove_if_exists(self.user_path()).await?;
        debug!("Cleared credentials in {}", self.dir.display());
        Ok(())
    }
}
async fn remove_if_exists(path: PathBuf) -> Result<()> {
    match fs::remove_file(&path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<Option<Credentials>>,
}
#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        let credentials = self
            .credentials
            .lock()
            .map_err(|_| anyhow!("Credential store poisoned"))?;
        Ok(credentials.clone())
    }
    async fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut stored = self
            .credentials
            .lock()
            .map_err(|_| anyhow!("Credential store poisoned"))?;
        *stored = Some(credentials.clone());
        Ok(())
    }
    async fn clear(&self) -> Result<()> {
        let mut stored = self
            .credentials
            .lock()
            .map_err(|_| anyhow!("Credential store poisoned"))?;
        *stored = None;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::api::Role;

    fn credentials() -> Credentials {
        Credentials {
            token: "tok3n".to_string(),
            user: Some(UserProfile {
                id: "u1".to_string(),
                username: "alice".to_string(),
                email: "alice@campus.edu".to_string(),
                tokens: 1000,
                winnings: 0,
                role: Role::User,
            }),
        }
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "campus-royale-{}-{}",
            std::process::id(),
            nanos
        ));
        let store = FileCredentialStore::new(&dir);
        assert_eq!(store.load().await.unwrap(), None);

        store.save(&credentials()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(credentials()));

        let anonymous = Credentials {
            token: "other".to_string(),
            user: None,
        };
        store.save(&anonymous).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(anonymous));

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn memory_store() {
        let store = MemoryCredentialStore::default();
        assert_eq!(store.load().await.unwrap(), None);
        store.save(&credentials()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(credentials()));
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
