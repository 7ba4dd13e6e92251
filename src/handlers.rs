use chrono::Utc;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::entities::{
    is_valid_username, Collection, CollectionId, Comment, CommentId, ContentType, NotificationId,
    Pin, PinId, Profile, ProfileId, Report, ReportId, ReportReason, Visibility,
};
use crate::repositories::{
    CollectionRecord, CollectionRepository, CommentRecord, FeedCursor, FeedSlice,
    ModerationRepository, NotificationRecord, NotificationRepository, PinRecord, PinRepository,
    PinSearch, ProfileMutation, ProfileRecord, ProfileRepository, RepositoryError,
};
use crate::session::Actor;

type Result<T> = ::std::result::Result<T, FlowError>;

/// Why a flow stopped.  `Validation` carries the exact message shown to
/// the user, so the copy lives in one place.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Backend(#[from] RepositoryError),
}

pub struct Handler {
    pub pin_repository: Box<dyn PinRepository + Send + Sync>,
    pub profile_repository: Box<dyn ProfileRepository + Send + Sync>,
    pub collection_repository: Box<dyn CollectionRepository + Send + Sync>,
    pub moderation_repository: Box<dyn ModerationRepository + Send + Sync>,
    pub notification_repository: Box<dyn NotificationRepository + Send + Sync>,
}

impl Handler {
    pub async fn feed(&self, viewer: Option<ProfileId>, cursor: FeedCursor) -> Result<FeedSlice> {
        Ok(self.pin_repository.feed(viewer, cursor).await?)
    }

    pub async fn read_pin(&self, id: PinId, viewer: Option<ProfileId>) -> Result<PinRecord> {
        Ok(self.pin_repository.find(id, viewer).await?)
    }

    pub async fn read_comments(&self, id: PinId) -> Result<Vec<CommentRecord>> {
        Ok(self.pin_repository.comments_of(id).await?)
    }

    pub async fn trending(
        &self,
        viewer: Option<ProfileId>,
        limit: usize,
    ) -> Result<Vec<PinRecord>> {
        Ok(self.pin_repository.trending(viewer, limit).await?)
    }

    pub async fn search_pins(
        &self,
        query: PinSearch,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>> {
        Ok(self.pin_repository.search(query, viewer).await?)
    }

    pub async fn search_profiles(
        &self,
        text: &str,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<ProfileRecord>> {
        Ok(self.profile_repository.search(text, viewer).await?)
    }

    pub async fn search_collections(&self, text: &str) -> Result<Vec<CollectionRecord>> {
        Ok(self.collection_repository.search(text).await?)
    }

    pub async fn create_pin(
        &self,
        actor: &Actor,
        image_url: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<Pin> {
        let title = title.trim();
        if title.is_empty() {
            return Err(FlowError::Validation("Please enter a title"));
        }
        if Url::parse(image_url.trim()).is_err() {
            return Err(FlowError::Validation("Please enter a valid image URL"));
        }

        let new_pin = Pin {
            id: PinId(Uuid::new_v4()),
            image_url: image_url.trim().to_string(),
            title: title.to_string(),
            description: trimmed(description),
            creator_id: actor.id,
            created_at: Utc::now(),
            promoted: false,
        };

        self.pin_repository.insert(new_pin.clone()).await?;
        Ok(new_pin)
    }

    /// Flips the like row towards `engage`.  The answer is whether a row
    /// actually changed, which the optimistic state uses to reconverge.
    pub async fn set_like(&self, actor: &Actor, id: PinId, engage: bool) -> Result<bool> {
        let changed = match engage {
            true => self.pin_repository.insert_like(id, actor.id).await?,
            false => self.pin_repository.delete_like(id, actor.id).await?,
        };

        Ok(changed)
    }

    pub async fn create_comment(
        &self,
        actor: &Actor,
        id: PinId,
        content: &str,
    ) -> Result<CommentRecord> {
        let author = self.require_profile(actor)?.clone();

        let content = content.trim();
        if content.is_empty() {
            return Err(FlowError::Validation("Comment cannot be empty"));
        }

        let new_comment = Comment {
            id: CommentId(Uuid::new_v4()),
            pin_id: id,
            user_id: actor.id,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.pin_repository.insert_comment(new_comment.clone()).await?;
        Ok(CommentRecord {
            comment: new_comment,
            author,
        })
    }

    pub async fn set_follow(
        &self,
        actor: &Actor,
        target: ProfileId,
        engage: bool,
    ) -> Result<bool> {
        if target == actor.id {
            return Err(FlowError::Validation("You cannot follow yourself"));
        }

        let changed = match engage {
            true => {
                self.profile_repository
                    .insert_follow(actor.id, target)
                    .await?
            }
            false => {
                self.profile_repository
                    .delete_follow(actor.id, target)
                    .await?
            }
        };

        Ok(changed)
    }

    /// Reports run with or without a signed-in reporter.
    pub async fn create_report(
        &self,
        reporter: Option<ProfileId>,
        content_type: ContentType,
        content_id: &str,
        reason: ReportReason,
        description: Option<&str>,
    ) -> Result<Report> {
        if content_id.trim().is_empty() {
            return Err(FlowError::Validation("Nothing selected to report"));
        }

        let new_report = Report {
            id: ReportId(Uuid::new_v4()),
            content_type,
            content_id: content_id.trim().to_string(),
            reporter_id: reporter,
            reason,
            description: trimmed(description),
            created_at: Utc::now(),
        };

        self.moderation_repository
            .insert_report(new_report.clone())
            .await?;
        Ok(new_report)
    }

    pub async fn read_profile(
        &self,
        id: ProfileId,
        viewer: Option<ProfileId>,
    ) -> Result<ProfileRecord> {
        Ok(self.profile_repository.find(id, viewer).await?)
    }

    pub async fn read_profile_pins(
        &self,
        id: ProfileId,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>> {
        Ok(self.pin_repository.finds_by_creator(id, viewer).await?)
    }

    /// First-run profile creation for a signed-in identity.
    pub async fn create_profile(
        &self,
        actor: &Actor,
        username: &str,
        name: &str,
        avatar: Option<&str>,
        bio: Option<&str>,
    ) -> Result<Profile> {
        let username = username.trim();
        if !is_valid_username(username) {
            return Err(FlowError::Validation(
                "Username must be 3-20 characters: letters, numbers and underscores",
            ));
        }
        self.ensure_username_free(username, actor.id).await?;

        let name = name.trim();
        let new_profile = Profile {
            id: actor.id,
            username: username.to_string(),
            name: match name.is_empty() {
                true => username.to_string(),
                false => name.to_string(),
            },
            avatar: trimmed(avatar),
            bio: trimmed(bio),
            created_at: Utc::now(),
        };

        self.profile_repository.insert(new_profile.clone()).await?;
        Ok(new_profile)
    }

    pub async fn update_profile(
        &self,
        actor: &Actor,
        mutation: ProfileMutation,
    ) -> Result<Profile> {
        if let Some(username) = &mutation.username {
            if !is_valid_username(username) {
                return Err(FlowError::Validation(
                    "Username must be 3-20 characters: letters, numbers and underscores",
                ));
            }
            self.ensure_username_free(username, actor.id).await?;
        }

        Ok(self.profile_repository.update(actor.id, mutation).await?)
    }

    pub async fn read_collections(&self, creator: ProfileId) -> Result<Vec<CollectionRecord>> {
        Ok(self.collection_repository.finds_by_creator(creator).await?)
    }

    pub async fn read_collection(&self, id: CollectionId) -> Result<Collection> {
        Ok(self.collection_repository.find(id).await?)
    }

    pub async fn read_collection_pins(
        &self,
        id: CollectionId,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>> {
        Ok(self.collection_repository.items_of(id, viewer).await?)
    }

    pub async fn create_collection(
        &self,
        actor: &Actor,
        name: &str,
        visibility: Visibility,
    ) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FlowError::Validation("Collection name cannot be empty"));
        }

        let new_collection = Collection {
            id: CollectionId(Uuid::new_v4()),
            name: name.to_string(),
            creator_id: actor.id,
            visibility,
            created_at: Utc::now(),
        };

        self.collection_repository
            .insert(new_collection.clone())
            .await?;
        Ok(new_collection)
    }

    /// Adds a pin to one of the actor's own collections.  Answers whether
    /// the pin was newly added.
    pub async fn save_pin(
        &self,
        actor: &Actor,
        collection_id: CollectionId,
        pin_id: PinId,
    ) -> Result<bool> {
        let collection = self.collection_repository.find(collection_id).await?;
        if collection.creator_id != actor.id {
            return Err(FlowError::Validation(
                "You can only save to your own collections",
            ));
        }

        Ok(self
            .collection_repository
            .insert_item(collection_id, pin_id)
            .await?)
    }

    pub async fn read_notifications(
        &self,
        actor: &Actor,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>> {
        Ok(self.notification_repository.recent(actor.id, limit).await?)
    }

    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<bool> {
        Ok(self.notification_repository.mark_read(id).await?)
    }

    fn require_profile<'a>(&self, actor: &'a Actor) -> Result<&'a Profile> {
        actor
            .profile
            .as_ref()
            .ok_or(FlowError::Validation("Please set up your profile first"))
    }

    async fn ensure_username_free(&self, username: &str, claimant: ProfileId) -> Result<()> {
        match self.profile_repository.find_by_username(username, None).await {
            Ok(record) if record.profile.id != claimant => {
                Err(FlowError::Validation("That username is already taken"))
            }
            Ok(_) => Ok(()),
            Err(RepositoryError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn trimmed(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::{
        InMemoryBackend, DEMO_JANE, DEMO_JOHN, DEMO_PIN_COFFEE, DEMO_PIN_WORKSPACE,
    };

    fn handler() -> Handler {
        let backend = InMemoryBackend::with_demo_data();
        Handler {
            pin_repository: Box::new(backend.clone()),
            profile_repository: Box::new(backend.clone()),
            collection_repository: Box::new(backend.clone()),
            moderation_repository: Box::new(backend.clone()),
            notification_repository: Box::new(backend),
        }
    }

    async fn actor_of(handler: &Handler, id: ProfileId) -> Actor {
        let profile = handler
            .profile_repository
            .find(id, None)
            .await
            .ok()
            .map(|r| r.profile);
        Actor { id, profile }
    }

    fn validation_message(err: FlowError) -> &'static str {
        match err {
            FlowError::Validation(msg) => msg,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_comments_are_rejected_with_the_exact_copy() {
        let handler = handler();
        let actor = actor_of(&handler, DEMO_JANE).await;

        let err = handler
            .create_comment(&actor, DEMO_PIN_COFFEE, "   ")
            .await
            .unwrap_err();

        assert_eq!(validation_message(err), "Comment cannot be empty");
    }

    #[tokio::test]
    async fn comments_come_back_with_the_author_attached() {
        let handler = handler();
        let actor = actor_of(&handler, DEMO_JANE).await;

        let record = handler
            .create_comment(&actor, DEMO_PIN_COFFEE, "  Great beans  ")
            .await
            .unwrap();

        assert_eq!(record.comment.content, "Great beans");
        assert_eq!(record.author.username, "janesmith");
    }

    #[tokio::test]
    async fn commenting_without_a_profile_is_refused() {
        let handler = handler();
        let actor = Actor {
            id: ProfileId(Uuid::from_u128(0xfeed)),
            profile: None,
        };

        let err = handler
            .create_comment(&actor, DEMO_PIN_COFFEE, "hello")
            .await
            .unwrap_err();

        assert_eq!(validation_message(err), "Please set up your profile first");
    }

    #[tokio::test]
    async fn like_answers_whether_a_row_changed() {
        let handler = handler();
        let actor = actor_of(&handler, DEMO_JANE).await;

        assert!(handler.set_like(&actor, DEMO_PIN_COFFEE, true).await.unwrap());
        assert!(!handler.set_like(&actor, DEMO_PIN_COFFEE, true).await.unwrap());
        assert!(handler.set_like(&actor, DEMO_PIN_COFFEE, false).await.unwrap());
        assert!(!handler.set_like(&actor, DEMO_PIN_COFFEE, false).await.unwrap());
    }

    #[tokio::test]
    async fn self_follow_is_refused() {
        let handler = handler();
        let actor = actor_of(&handler, DEMO_JANE).await;

        let err = handler.set_follow(&actor, DEMO_JANE, true).await.unwrap_err();
        assert_eq!(validation_message(err), "You cannot follow yourself");
    }

    #[tokio::test]
    async fn pin_creation_validates_title_and_url() {
        let handler = handler();
        let actor = actor_of(&handler, DEMO_JANE).await;

        let err = handler
            .create_pin(&actor, "https://img.example/x.jpg", "  ", None)
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "Please enter a title");

        let err = handler
            .create_pin(&actor, "not a url", "Sunset", None)
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "Please enter a valid image URL");

        let pin = handler
            .create_pin(&actor, " https://img.example/x.jpg ", " Sunset ", Some("  "))
            .await
            .unwrap();
        assert_eq!(pin.image_url, "https://img.example/x.jpg");
        assert_eq!(pin.title, "Sunset");
        assert_eq!(pin.description, None);
        assert!(!pin.promoted);
    }

    #[tokio::test]
    async fn anonymous_reports_are_accepted() {
        let handler = handler();

        let report = handler
            .create_report(None, ContentType::Pin, "42", ReportReason::Spam, None)
            .await
            .unwrap();

        assert_eq!(report.reporter_id, None);
        assert_eq!(report.content_type, ContentType::Pin);
        assert_eq!(report.content_id, "42");
        assert_eq!(report.reason, ReportReason::Spam);
    }

    #[tokio::test]
    async fn usernames_are_validated_and_unique_on_setup() {
        let handler = handler();
        let newcomer = Actor {
            id: ProfileId(Uuid::from_u128(0xbeef)),
            profile: None,
        };

        let err = handler
            .create_profile(&newcomer, "x", "X", None, None)
            .await
            .unwrap_err();
        assert_eq!(
            validation_message(err),
            "Username must be 3-20 characters: letters, numbers and underscores"
        );

        let err = handler
            .create_profile(&newcomer, "janesmith", "Imposter", None, None)
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "That username is already taken");

        let profile = handler
            .create_profile(&newcomer, "new_face", "  ", None, None)
            .await
            .unwrap();
        assert_eq!(profile.username, "new_face");
        assert_eq!(profile.name, "new_face");
    }

    #[tokio::test]
    async fn keeping_your_own_username_on_update_is_fine() {
        let handler = handler();
        let actor = actor_of(&handler, DEMO_JANE).await;

        let profile = handler
            .update_profile(&actor, ProfileMutation {
                username: Some("janesmith".to_string()),
                name: None,
                avatar: None,
                bio: Some("still here".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(profile.username, "janesmith");
        assert_eq!(profile.bio.as_deref(), Some("still here"));
    }

    #[tokio::test]
    async fn collections_only_accept_saves_from_their_owner() {
        let handler = handler();
        let jane = actor_of(&handler, DEMO_JANE).await;
        let john = actor_of(&handler, DEMO_JOHN).await;

        let err = handler
            .create_collection(&jane, "  ", Visibility::Public)
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "Collection name cannot be empty");

        let collection = handler
            .create_collection(&jane, "Workspace Envy", Visibility::Public)
            .await
            .unwrap();

        let err = handler
            .save_pin(&john, collection.id, DEMO_PIN_WORKSPACE)
            .await
            .unwrap_err();
        assert_eq!(
            validation_message(err),
            "You can only save to your own collections"
        );

        assert!(handler
            .save_pin(&jane, collection.id, DEMO_PIN_WORKSPACE)
            .await
            .unwrap());
        assert!(!handler
            .save_pin(&jane, collection.id, DEMO_PIN_WORKSPACE)
            .await
            .unwrap());
    }
}
