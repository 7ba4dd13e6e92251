use tokio::sync::RwLock;
use tracing::info;

use crate::entities::{Profile, ProfileId};
use crate::repositories::{ProfileRepository, RepositoryError};

type Result<T> = ::std::result::Result<T, RepositoryError>;

/// Who is acting.  An actor always has an identity; the profile row is
/// looked up separately and may be missing, which is what sends a fresh
/// account through profile setup.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: ProfileId,
    pub profile: Option<Profile>,
}

impl Actor {
    pub fn needs_setup(&self) -> bool { self.profile.is_none() }

    pub fn display_name(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.name.as_str())
    }
}

/// Holds the signed-in actor, if any.  Everything that wants to know who
/// is acting asks this value instead of some ambient global.
pub struct Session {
    profiles: Box<dyn ProfileRepository + Send + Sync>,
    actor: RwLock<Option<Actor>>,
}

impl Session {
    pub fn new(profiles: Box<dyn ProfileRepository + Send + Sync>) -> Self {
        Self {
            profiles,
            actor: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> Option<Actor> { self.actor.read().await.clone() }

    /// The viewer id for read paths, `None` when signed out.
    pub async fn viewer(&self) -> Option<ProfileId> {
        self.actor.read().await.as_ref().map(|a| a.id)
    }

    pub async fn sign_in(&self, id: ProfileId) -> Result<Actor> {
        let profile = self.fetch_profile(id).await?;
        let actor = Actor { id, profile };

        info!(actor = %id, has_profile = !actor.needs_setup(), "signed in");
        *self.actor.write().await = Some(actor.clone());
        Ok(actor)
    }

    /// Re-reads the current actor's profile row, picking up a profile
    /// created or edited since sign-in.
    pub async fn refresh(&self) -> Result<Option<Actor>> {
        let id = match self.viewer().await {
            Some(id) => id,
            None => return Ok(None),
        };

        let actor = Actor {
            id,
            profile: self.fetch_profile(id).await?,
        };
        *self.actor.write().await = Some(actor.clone());
        Ok(Some(actor))
    }

    pub async fn sign_out(&self) {
        let mut actor = self.actor.write().await;
        if let Some(a) = actor.take() {
            info!(actor = %a.id, "signed out");
        }
    }

    async fn fetch_profile(&self, id: ProfileId) -> Result<Option<Profile>> {
        match self.profiles.find(id, None).await {
            Ok(record) => Ok(Some(record.profile)),
            Err(RepositoryError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::repositories::memory::{InMemoryBackend, DEMO_JOHN};

    fn session() -> Session {
        Session::new(Box::new(InMemoryBackend::with_demo_data()))
    }

    #[tokio::test]
    async fn sign_in_loads_the_profile_row() {
        let session = session();
        let actor = session.sign_in(DEMO_JOHN).await.unwrap();

        assert!(!actor.needs_setup());
        assert_eq!(actor.display_name(), Some("John Doe"));
        assert_eq!(session.viewer().await, Some(DEMO_JOHN));
    }

    #[tokio::test]
    async fn unknown_identity_still_signs_in_without_a_profile() {
        let session = session();
        let id = ProfileId(Uuid::from_u128(0xdead));
        let actor = session.sign_in(id).await.unwrap();

        assert!(actor.needs_setup());
        assert_eq!(actor.display_name(), None);
        assert_eq!(session.viewer().await, Some(id));
    }

    #[tokio::test]
    async fn refresh_picks_up_a_newly_created_profile() {
        let backend = InMemoryBackend::new();
        let session = Session::new(Box::new(backend.clone()));
        let id = ProfileId(Uuid::from_u128(7));

        assert!(session.sign_in(id).await.unwrap().needs_setup());

        ProfileRepository::insert(&backend, Profile {
            id,
            username: "newcomer".to_string(),
            name: "New Comer".to_string(),
            avatar: None,
            bio: None,
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let actor = session.refresh().await.unwrap().unwrap();
        assert!(!actor.needs_setup());
        assert_eq!(actor.display_name(), Some("New Comer"));
    }

    #[tokio::test]
    async fn sign_out_clears_the_actor() {
        let session = session();
        session.sign_in(DEMO_JOHN).await.unwrap();
        session.sign_out().await;

        assert_eq!(session.current().await, None);
        assert_eq!(session.viewer().await, None);
    }
}
