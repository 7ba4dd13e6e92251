pub mod routes;

use tracing::{error, warn};

use self::routes::{Route, SearchCategory, SearchParams};
use crate::entities::{
    Collection, CollectionId, ContentType, Pin, PinId, Profile, ProfileId, ReportReason,
    Visibility,
};
use crate::handlers::{FlowError, Handler};
use crate::presenters::cards::{FeedView, PinCard, ProfileCard};
use crate::presenters::notices::{self, Notice, NoticeSink};
use crate::presenters::pages::{Page, ProfilePage, SearchResults, UPGRADE_TIERS};
use crate::repositories::{
    CommentRecord, FeedCursor, NotificationRecord, PinSearch, ProfileMutation, RepositoryError,
};
use crate::session::{Actor, Session};

const NOTIFICATION_LIMIT: usize = 10;
const TRENDING_LIMIT: usize = 20;

type Result<T> = ::std::result::Result<T, FlowError>;

/// Where a navigation ended up: a page to render, or another route the
/// caller should go to instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Page(Page),
    Redirect(Route),
}

/// Runs the app's flows: resolves routes into pages, applies the
/// signed-in guards, and turns user actions into backend calls plus
/// notices.
pub struct Conductor {
    pub handler: Handler,
    pub session: Session,
    pub notices: NoticeSink,
    pub feed_page: usize,
}

impl Conductor {
    pub async fn sign_in(&self, id: ProfileId) -> Result<Actor> {
        Ok(self.session.sign_in(id).await?)
    }

    pub async fn sign_out(&self) { self.session.sign_out().await }

    pub async fn navigate(&self, location: &str) -> Result<Navigation> {
        let route = Route::parse(location);
        let actor = self.session.current().await;

        match (&route, &actor) {
            (r, None) if r.requires_actor() => {
                return Ok(Navigation::Redirect(Route::Login));
            }
            (r, Some(actor)) if r.requires_actor() && actor.needs_setup() => {
                if route != Route::ProfileSetup {
                    return Ok(Navigation::Redirect(Route::ProfileSetup));
                }
            }
            (Route::Login, Some(_)) => return Ok(Navigation::Redirect(Route::Home)),
            _ => {}
        }

        let viewer = actor.as_ref().map(|a| a.id);
        let page = match route {
            Route::Home => {
                let slice = self
                    .handler
                    .feed(viewer, FeedCursor::first(self.feed_page))
                    .await?;
                Page::Home(FeedView::from_slice(slice))
            }
            Route::Pin(id) => match self.handler.read_pin(id, viewer).await {
                Ok(record) => Page::PinDetail {
                    card: Box::new(PinCard::from_record(record)),
                    comments: self.handler.read_comments(id).await?,
                },
                Err(FlowError::Backend(RepositoryError::NotFound)) => Page::NotFound,
                Err(e) => return Err(e),
            },
            Route::Profile(target) => {
                let target = match (target, &actor) {
                    (Some(id), _) => id,
                    (None, Some(actor)) => actor.id,
                    // requires_actor already redirected this.
                    (None, None) => return Ok(Navigation::Redirect(Route::Login)),
                };
                match self.profile_page(target, viewer).await? {
                    Some(page) => page,
                    None => {
                        self.notices.push(
                            Notice::destructive(notices::ERROR_TITLE)
                                .describe("Profile not found"),
                        );
                        return Ok(Navigation::Redirect(Route::Home));
                    }
                }
            }
            Route::ProfileSetup => Page::ProfileSetup,
            Route::Collection(id) => self.collection_page(id, viewer).await?,
            Route::Search(params) => self.search_page(params, viewer).await?,
            Route::Create => Page::Create,
            Route::Upgrade => Page::Upgrade(UPGRADE_TIERS),
            Route::Login => Page::Login,
            Route::NotFound => Page::NotFound,
        };

        Ok(Navigation::Page(page))
    }

    async fn profile_page(
        &self,
        target: ProfileId,
        viewer: Option<ProfileId>,
    ) -> Result<Option<Page>> {
        let record = match self.handler.read_profile(target, viewer).await {
            Ok(r) => r,
            Err(FlowError::Backend(RepositoryError::NotFound)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let is_self = viewer == Some(target);
        let pins = self.handler.read_profile_pins(target, viewer).await?;
        let mut collections = self.handler.read_collections(target).await?;
        if !is_self {
            collections.retain(|c| c.collection.visibility == Visibility::Public);
        }

        Ok(Some(Page::Profile(Box::new(ProfilePage {
            card: ProfileCard::from_record(record),
            pins: FeedView::from_records(pins),
            collections,
            is_self,
        }))))
    }

    async fn collection_page(
        &self,
        id: CollectionId,
        viewer: Option<ProfileId>,
    ) -> Result<Page> {
        let collection = match self.handler.read_collection(id).await {
            Ok(c) => c,
            Err(FlowError::Backend(RepositoryError::NotFound)) => return Ok(Page::NotFound),
            Err(e) => return Err(e),
        };

        // Private boards only exist for their owner.
        if collection.visibility != Visibility::Public && viewer != Some(collection.creator_id) {
            return Ok(Page::NotFound);
        }

        let pins = self.handler.read_collection_pins(id, viewer).await?;
        Ok(Page::Collection {
            collection,
            pins: FeedView::from_records(pins),
        })
    }

    async fn search_page(
        &self,
        params: SearchParams,
        viewer: Option<ProfileId>,
    ) -> Result<Page> {
        let results = match params.category {
            SearchCategory::Images => {
                let query = PinSearch {
                    text: match params.query.trim().is_empty() {
                        true => None,
                        false => Some(params.query.clone()),
                    },
                    exact: params.exact.clone(),
                    exclude: params.exclude.clone(),
                    author: params.author.clone(),
                };
                let records = self.handler.search_pins(query, viewer).await?;
                SearchResults::Images(FeedView::from_records(records))
            }
            SearchCategory::Collections => {
                SearchResults::Collections(self.handler.search_collections(&params.query).await?)
            }
            SearchCategory::People => {
                let records = self.handler.search_profiles(&params.query, viewer).await?;
                SearchResults::People(
                    records.into_iter().map(ProfileCard::from_record).collect(),
                )
            }
            SearchCategory::Trending => {
                let records = self.handler.trending(viewer, TRENDING_LIMIT).await?;
                SearchResults::Trending(FeedView::from_records(records))
            }
        };

        Ok(Page::Search { params, results })
    }

    /// Fetches the next feed page and appends it.
    pub async fn load_more(&self, feed: &mut FeedView) {
        let before = match feed.next_before {
            Some(at) => at,
            None => return,
        };

        let viewer = self.session.viewer().await;
        let cursor = FeedCursor {
            before: Some(before),
            limit: self.feed_page,
        };
        match self.handler.feed(viewer, cursor).await {
            Ok(slice) => feed.push_slice(slice),
            Err(e) => warn!(error = %e, "failed to load more pins"),
        }
    }

    /// Optimistic like toggle: flip first, settle with the backend's
    /// answer, roll back if it refuses.
    pub async fn toggle_like(&self, card: &mut PinCard) {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices.push(
                    Notice::destructive(notices::SIGN_IN_TITLE)
                        .describe(notices::SIGN_IN_TO_LIKE),
                );
                return;
            }
        };

        let ticket = match card.like.begin() {
            Ok(t) => t,
            // Still in flight; the press is dropped, not queued.
            Err(_) => return,
        };

        match self.handler.set_like(&actor, card.id, ticket.engage).await {
            Ok(changed) => {
                card.like.commit(ticket, changed);
            }
            Err(e) => {
                error!(error = %e, pin = %card.id, "like toggle refused");
                card.like.rollback(ticket);
                self.notices.push(
                    Notice::destructive(notices::ERROR_TITLE).describe(notices::LIKE_FAILED),
                );
            }
        }
    }

    pub async fn toggle_follow(&self, card: &mut ProfileCard) {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices.push(
                    Notice::destructive(notices::SIGN_IN_TITLE)
                        .describe(notices::SIGN_IN_TO_FOLLOW),
                );
                return;
            }
        };

        let ticket = match card.follow.begin() {
            Ok(t) => t,
            Err(_) => return,
        };

        match self
            .handler
            .set_follow(&actor, card.profile.id, ticket.engage)
            .await
        {
            Ok(changed) => {
                card.follow.commit(ticket, changed);
            }
            Err(e) => {
                error!(error = %e, profile = %card.profile.id, "follow toggle refused");
                card.follow.rollback(ticket);
                self.notices.push(
                    Notice::destructive(notices::ERROR_TITLE).describe(notices::FOLLOW_FAILED),
                );
            }
        }
    }

    pub async fn submit_comment(&self, pin_id: PinId, content: &str) -> Option<CommentRecord> {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices.push(
                    Notice::destructive(notices::SIGN_IN_TITLE)
                        .describe(notices::SIGN_IN_TO_COMMENT),
                );
                return None;
            }
        };

        match self.handler.create_comment(&actor, pin_id, content).await {
            Ok(record) => {
                self.notices.push(
                    Notice::info(notices::SUCCESS_TITLE).describe(notices::COMMENT_POSTED),
                );
                Some(record)
            }
            Err(FlowError::Validation(msg)) => {
                self.notices
                    .push(Notice::destructive(notices::ERROR_TITLE).describe(msg));
                None
            }
            Err(e) => {
                error!(error = %e, pin = %pin_id, "comment refused");
                self.notices.push(
                    Notice::destructive(notices::ERROR_TITLE).describe(notices::COMMENT_FAILED),
                );
                None
            }
        }
    }

    pub async fn submit_report(
        &self,
        content_type: ContentType,
        content_id: &str,
        reason: ReportReason,
        description: Option<&str>,
    ) {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices.push(
                    Notice::destructive(notices::SIGN_IN_TITLE)
                        .describe(notices::SIGN_IN_TO_REPORT),
                );
                return;
            }
        };

        match self
            .handler
            .create_report(Some(actor.id), content_type, content_id, reason, description)
            .await
        {
            Ok(_) => {
                self.notices.push(
                    Notice::info(notices::REPORT_SUBMITTED_TITLE)
                        .describe(notices::REPORT_THANKS),
                );
            }
            Err(e) => {
                error!(error = %e, "report refused");
                self.notices.push(
                    Notice::destructive(notices::ERROR_TITLE).describe(notices::REPORT_FAILED),
                );
            }
        }
    }

    pub async fn save_pin_to(&self, collection_id: CollectionId, pin_id: PinId) {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices.push(
                    Notice::destructive(notices::SIGN_IN_TITLE)
                        .describe(notices::SIGN_IN_TO_SAVE),
                );
                return;
            }
        };

        match self.handler.save_pin(&actor, collection_id, pin_id).await {
            Ok(_) => {
                self.notices
                    .push(Notice::info(notices::SUCCESS_TITLE).describe(notices::PIN_ADDED));
            }
            Err(FlowError::Validation(msg)) => {
                self.notices
                    .push(Notice::destructive(notices::ERROR_TITLE).describe(msg));
            }
            Err(e) => {
                error!(error = %e, "save to collection refused");
                self.notices.push(
                    Notice::destructive(notices::ERROR_TITLE).describe(notices::PIN_ADD_FAILED),
                );
            }
        }
    }

    /// The collection-selector path: make the board, then drop the pin in.
    /// The two writes are separate; a collection without its first pin can
    /// survive a failure in between.
    pub async fn create_collection_with_pin(
        &self,
        name: &str,
        visibility: Visibility,
        pin_id: Option<PinId>,
    ) -> Option<Collection> {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices.push(
                    Notice::destructive(notices::SIGN_IN_TITLE)
                        .describe(notices::SIGN_IN_TO_SAVE),
                );
                return None;
            }
        };

        let collection = match self
            .handler
            .create_collection(&actor, name, visibility)
            .await
        {
            Ok(c) => c,
            Err(FlowError::Validation(msg)) => {
                self.notices
                    .push(Notice::destructive(notices::ERROR_TITLE).describe(msg));
                return None;
            }
            Err(e) => {
                error!(error = %e, "collection creation refused");
                self.notices.push(
                    Notice::destructive(notices::ERROR_TITLE)
                        .describe(notices::COLLECTION_CREATE_FAILED),
                );
                return None;
            }
        };

        if let Some(pin_id) = pin_id {
            match self.handler.save_pin(&actor, collection.id, pin_id).await {
                Ok(_) => {
                    self.notices.push(
                        Notice::info(notices::SUCCESS_TITLE)
                            .describe(notices::PIN_ADDED_TO_NEW),
                    );
                }
                Err(e) => {
                    warn!(error = %e, collection = %collection.id, "new collection kept its pin out");
                    self.notices.push(
                        Notice::destructive(notices::ERROR_TITLE)
                            .describe(notices::PIN_ADD_FAILED),
                    );
                }
            }
        }

        Some(collection)
    }

    pub async fn submit_pin(
        &self,
        image_url: &str,
        title: &str,
        description: Option<&str>,
    ) -> Option<Pin> {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices
                    .push(Notice::destructive(notices::SIGN_IN_TITLE));
                return None;
            }
        };

        match self
            .handler
            .create_pin(&actor, image_url, title, description)
            .await
        {
            Ok(pin) => {
                self.notices.push(Notice::info(notices::PIN_CREATED_TITLE));
                Some(pin)
            }
            Err(e) => {
                self.notices.push(
                    Notice::destructive(notices::PIN_CREATE_FAILED_TITLE)
                        .describe(e.to_string()),
                );
                None
            }
        }
    }

    /// First-run profile creation; refreshes the session so guards see
    /// the new profile straight away.
    pub async fn setup_profile(
        &self,
        username: &str,
        name: &str,
        avatar: Option<&str>,
        bio: Option<&str>,
    ) -> Option<Profile> {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices
                    .push(Notice::destructive(notices::SIGN_IN_TITLE));
                return None;
            }
        };

        match self
            .handler
            .create_profile(&actor, username, name, avatar, bio)
            .await
        {
            Ok(profile) => {
                if let Err(e) = self.session.refresh().await {
                    warn!(error = %e, "session refresh after profile setup failed");
                }
                Some(profile)
            }
            Err(e) => {
                self.notices
                    .push(Notice::destructive(notices::ERROR_TITLE).describe(e.to_string()));
                None
            }
        }
    }

    pub async fn save_profile(&self, mutation: ProfileMutation) -> Option<Profile> {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => {
                self.notices
                    .push(Notice::destructive(notices::SIGN_IN_TITLE));
                return None;
            }
        };

        match self.handler.update_profile(&actor, mutation).await {
            Ok(profile) => {
                if let Err(e) = self.session.refresh().await {
                    warn!(error = %e, "session refresh after profile edit failed");
                }
                self.notices.push(
                    Notice::info(notices::PROFILE_UPDATED_TITLE)
                        .describe(notices::PROFILE_UPDATED_BODY),
                );
                Some(profile)
            }
            Err(e) => {
                self.notices
                    .push(Notice::destructive(notices::ERROR_TITLE).describe(e.to_string()));
                None
            }
        }
    }

    /// The header bell: latest notifications for the signed-in actor.
    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        let actor = match self.session.current().await {
            Some(a) => a,
            None => return vec![],
        };

        match self
            .handler
            .read_notifications(&actor, NOTIFICATION_LIMIT)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "failed to load notifications");
                vec![]
            }
        }
    }

    /// Marks a notification read and answers where it points.
    pub async fn open_notification(&self, item: &NotificationRecord) -> Option<Route> {
        if let Err(e) = self
            .handler
            .mark_notification_read(item.notification.id)
            .await
        {
            warn!(error = %e, "failed to mark notification read");
        }

        let target = item.notification.content_id.as_deref()?;
        match item.notification.content_type? {
            ContentType::Pin => target.parse().ok().map(Route::Pin),
            ContentType::Profile => target.parse().ok().map(|id| Route::Profile(Some(id))),
            ContentType::Collection => target.parse().ok().map(Route::Collection),
        }
    }

    /// Plan selection is not wired to billing yet.
    pub fn select_upgrade(&self, _tier: &str) {
        self.notices.push(
            Notice::info(notices::UPGRADE_SOON_TITLE).describe(notices::UPGRADE_SOON_BODY),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::*;
    use crate::entities::{Comment, Report};
    use crate::presenters::notices::NoticeLevel;
    use crate::repositories::memory::{
        InMemoryBackend, DEMO_JANE, DEMO_JOHN, DEMO_PIN_COFFEE, DEMO_PIN_WORKSPACE,
    };
    use crate::repositories::{FeedSlice, ModerationRepository, PinRecord, PinRepository};

    type RepoResult<T> = ::std::result::Result<T, RepositoryError>;

    /// Pin repository that counts like mutations and can be told to
    /// refuse them.
    #[derive(Clone)]
    struct TogglePins {
        inner: InMemoryBackend,
        fail_likes: bool,
        like_calls: Arc<AtomicUsize>,
    }

    impl TogglePins {
        fn new(inner: InMemoryBackend, fail_likes: bool) -> Self {
            Self {
                inner,
                fail_likes,
                like_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PinRepository for TogglePins {
        async fn insert(&self, item: Pin) -> RepoResult<bool> {
            PinRepository::insert(&self.inner, item).await
        }

        async fn is_exists(&self, id: PinId) -> RepoResult<bool> {
            PinRepository::is_exists(&self.inner, id).await
        }

        async fn find(&self, id: PinId, viewer: Option<ProfileId>) -> RepoResult<PinRecord> {
            PinRepository::find(&self.inner, id, viewer).await
        }

        async fn feed(
            &self,
            viewer: Option<ProfileId>,
            cursor: FeedCursor,
        ) -> RepoResult<FeedSlice> {
            self.inner.feed(viewer, cursor).await
        }

        async fn search(
            &self,
            query: PinSearch,
            viewer: Option<ProfileId>,
        ) -> RepoResult<Vec<PinRecord>> {
            PinRepository::search(&self.inner, query, viewer).await
        }

        async fn finds_by_creator(
            &self,
            creator_id: ProfileId,
            viewer: Option<ProfileId>,
        ) -> RepoResult<Vec<PinRecord>> {
            PinRepository::finds_by_creator(&self.inner, creator_id, viewer).await
        }

        async fn trending(
            &self,
            viewer: Option<ProfileId>,
            limit: usize,
        ) -> RepoResult<Vec<PinRecord>> {
            self.inner.trending(viewer, limit).await
        }

        async fn is_liked(&self, id: PinId, user_id: ProfileId) -> RepoResult<bool> {
            self.inner.is_liked(id, user_id).await
        }

        async fn insert_like(&self, id: PinId, user_id: ProfileId) -> RepoResult<bool> {
            self.like_calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_likes {
                true => Err(RepositoryError::Internal(anyhow::anyhow!("backend down"))),
                false => self.inner.insert_like(id, user_id).await,
            }
        }

        async fn delete_like(&self, id: PinId, user_id: ProfileId) -> RepoResult<bool> {
            self.like_calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_likes {
                true => Err(RepositoryError::Internal(anyhow::anyhow!("backend down"))),
                false => self.inner.delete_like(id, user_id).await,
            }
        }

        async fn insert_comment(&self, item: Comment) -> RepoResult<bool> {
            self.inner.insert_comment(item).await
        }

        async fn comments_of(&self, id: PinId) -> RepoResult<Vec<CommentRecord>> {
            self.inner.comments_of(id).await
        }
    }

    /// Moderation repository that remembers what it was given.
    #[derive(Clone, Default)]
    struct RecordingModeration {
        reports: Arc<Mutex<Vec<Report>>>,
    }

    #[async_trait]
    impl ModerationRepository for RecordingModeration {
        async fn insert_report(&self, item: Report) -> RepoResult<bool> {
            self.reports.lock().await.push(item);
            Ok(true)
        }
    }

    struct Fixture {
        conductor: Conductor,
        notices: UnboundedReceiver<Notice>,
        like_calls: Arc<AtomicUsize>,
        reports: Arc<Mutex<Vec<Report>>>,
    }

    fn fixture_with(fail_likes: bool, feed_page: usize) -> Fixture {
        let backend = InMemoryBackend::with_demo_data();
        let pins = TogglePins::new(backend.clone(), fail_likes);
        let like_calls = pins.like_calls.clone();
        let moderation = RecordingModeration::default();
        let reports = moderation.reports.clone();

        let handler = Handler {
            pin_repository: Box::new(pins),
            profile_repository: Box::new(backend.clone()),
            collection_repository: Box::new(backend.clone()),
            moderation_repository: Box::new(moderation),
            notification_repository: Box::new(backend.clone()),
        };
        let session = Session::new(Box::new(backend));
        let (sink, notices) = NoticeSink::new();

        Fixture {
            conductor: Conductor {
                handler,
                session,
                notices: sink,
                feed_page,
            },
            notices,
            like_calls,
            reports,
        }
    }

    fn fixture(fail_likes: bool) -> Fixture {
        fixture_with(fail_likes, 30)
    }

    fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
        let mut out = vec![];
        while let Ok(notice) = rx.try_recv() {
            out.push(notice);
        }
        out
    }

    async fn coffee_card(conductor: &Conductor) -> PinCard {
        match conductor.navigate("/").await.unwrap() {
            Navigation::Page(Page::Home(mut feed)) => {
                feed.card_mut(DEMO_PIN_COFFEE).unwrap().clone()
            }
            other => panic!("expected the home feed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn signed_out_like_calls_nothing_and_asks_to_sign_in() {
        let mut fx = fixture(false);
        let mut card = coffee_card(&fx.conductor).await;
        let before = card.like.clone();

        fx.conductor.toggle_like(&mut card).await;

        assert_eq!(fx.like_calls.load(Ordering::SeqCst), 0);
        assert_eq!(card.like, before);

        let notices = drain(&mut fx.notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Please sign in");
        assert_eq!(
            notices[0].description.as_deref(),
            Some("You need to be signed in to like pins")
        );
        assert_eq!(notices[0].level, NoticeLevel::Destructive);
    }

    #[tokio::test]
    async fn like_flips_immediately_and_commits() {
        let mut fx = fixture(false);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();
        let mut card = coffee_card(&fx.conductor).await;
        assert!(!card.like.engaged());
        assert_eq!(card.like.count(), 0);

        fx.conductor.toggle_like(&mut card).await;

        assert!(card.like.engaged());
        assert_eq!(card.like.count(), 1);
        assert_eq!(card.like.phase(), crate::actions::Phase::Committed);
        assert_eq!(fx.like_calls.load(Ordering::SeqCst), 1);
        assert!(drain(&mut fx.notices).is_empty());
    }

    #[tokio::test]
    async fn failed_like_rolls_back_and_notifies() {
        let mut fx = fixture(true);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();
        let mut card = coffee_card(&fx.conductor).await;

        fx.conductor.toggle_like(&mut card).await;

        assert!(!card.like.engaged());
        assert_eq!(card.like.count(), 0);
        assert_eq!(card.like.phase(), crate::actions::Phase::RolledBack);

        let notices = drain(&mut fx.notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Error");
        assert_eq!(
            notices[0].description.as_deref(),
            Some("Failed to update like status")
        );
    }

    #[tokio::test]
    async fn a_pending_like_swallows_further_presses() {
        let mut fx = fixture(false);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();
        let mut card = coffee_card(&fx.conductor).await;

        let _held = card.like.begin().unwrap();
        fx.conductor.toggle_like(&mut card).await;

        assert_eq!(fx.like_calls.load(Ordering::SeqCst), 0);
        assert!(drain(&mut fx.notices).is_empty());
    }

    #[tokio::test]
    async fn double_toggle_lands_back_where_it_started() {
        let fx = fixture(false);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();
        let mut card = coffee_card(&fx.conductor).await;

        fx.conductor.toggle_like(&mut card).await;
        fx.conductor.toggle_like(&mut card).await;

        assert!(!card.like.engaged());
        assert_eq!(card.like.count(), 0);
        assert_eq!(fx.like_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn guards_route_the_signed_out_and_the_profile_less() {
        let fx = fixture(false);

        assert_eq!(
            fx.conductor.navigate("/create").await.unwrap(),
            Navigation::Redirect(Route::Login)
        );
        assert_eq!(
            fx.conductor.navigate("/profile").await.unwrap(),
            Navigation::Redirect(Route::Login)
        );

        let newcomer = ProfileId(Uuid::from_u128(0xabcd));
        fx.conductor.sign_in(newcomer).await.unwrap();

        assert_eq!(
            fx.conductor.navigate("/create").await.unwrap(),
            Navigation::Redirect(Route::ProfileSetup)
        );
        match fx.conductor.navigate("/profile/setup").await.unwrap() {
            Navigation::Page(Page::ProfileSetup) => {}
            other => panic!("setup should render for the profile-less, got {other:?}"),
        }
        assert_eq!(
            fx.conductor.navigate("/login").await.unwrap(),
            Navigation::Redirect(Route::Home)
        );
    }

    #[tokio::test]
    async fn setup_unlocks_the_guarded_routes() {
        let fx = fixture(false);
        let newcomer = ProfileId(Uuid::from_u128(0xabcd));
        fx.conductor.sign_in(newcomer).await.unwrap();

        let profile = fx
            .conductor
            .setup_profile("fresh_face", "Fresh Face", None, None)
            .await
            .unwrap();
        assert_eq!(profile.username, "fresh_face");

        match fx.conductor.navigate("/create").await.unwrap() {
            Navigation::Page(Page::Create) => {}
            other => panic!("expected the create page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn report_flow_records_the_row_and_thanks_the_reporter() {
        let mut fx = fixture(false);

        fx.conductor
            .submit_report(ContentType::Pin, "42", ReportReason::Spam, None)
            .await;
        assert_eq!(drain(&mut fx.notices)[0].title, "Please sign in");
        assert!(fx.reports.lock().await.is_empty());

        fx.conductor.sign_in(DEMO_JANE).await.unwrap();
        fx.conductor
            .submit_report(ContentType::Pin, "42", ReportReason::Spam, Some("looks off"))
            .await;

        let notices = drain(&mut fx.notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Report submitted");
        assert_eq!(
            notices[0].description.as_deref(),
            Some("Thank you for helping keep our community safe")
        );

        let reports = fx.reports.lock().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].content_type, ContentType::Pin);
        assert_eq!(reports[0].content_id, "42");
        assert_eq!(reports[0].reason, ReportReason::Spam);
        assert_eq!(reports[0].reporter_id, Some(DEMO_JANE));
        assert_eq!(reports[0].description.as_deref(), Some("looks off"));
    }

    #[tokio::test]
    async fn comment_flow_validates_and_celebrates() {
        let mut fx = fixture(false);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();

        assert!(fx
            .conductor
            .submit_comment(DEMO_PIN_COFFEE, "   ")
            .await
            .is_none());
        let notices = drain(&mut fx.notices);
        assert_eq!(notices[0].description.as_deref(), Some("Comment cannot be empty"));

        let record = fx
            .conductor
            .submit_comment(DEMO_PIN_COFFEE, "Love it")
            .await
            .unwrap();
        assert_eq!(record.author.username, "janesmith");

        let notices = drain(&mut fx.notices);
        assert_eq!(notices[0].title, "Success");
        assert_eq!(
            notices[0].description.as_deref(),
            Some("Comment posted successfully")
        );
    }

    #[tokio::test]
    async fn search_defaults_to_images_and_finds_the_coffee_pin() {
        let fx = fixture(false);

        match fx.conductor.navigate("/search?q=coffee").await.unwrap() {
            Navigation::Page(Page::Search { params, results }) => {
                assert_eq!(params.category, SearchCategory::Images);
                match results {
                    SearchResults::Images(feed) => {
                        assert_eq!(feed.len(), 1);
                        assert_eq!(feed.cards[0].id, DEMO_PIN_COFFEE);
                    }
                    other => panic!("expected image results, got {other:?}"),
                }
            }
            other => panic!("expected a search page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_profile_goes_home_with_a_notice() {
        let mut fx = fixture(false);
        let ghost = Uuid::from_u128(0x404);

        assert_eq!(
            fx.conductor
                .navigate(&format!("/profile/{ghost}"))
                .await
                .unwrap(),
            Navigation::Redirect(Route::Home)
        );

        let notices = drain(&mut fx.notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].description.as_deref(), Some("Profile not found"));
    }

    #[tokio::test]
    async fn private_collections_hide_from_strangers() {
        let fx = fixture(false);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();

        let collection = fx
            .conductor
            .create_collection_with_pin("Secret Stash", Visibility::Private, None)
            .await
            .unwrap();
        let path = format!("/collection/{}", collection.id);

        match fx.conductor.navigate(&path).await.unwrap() {
            Navigation::Page(Page::Collection { collection, .. }) => {
                assert_eq!(collection.name, "Secret Stash");
            }
            other => panic!("owner should see it, got {other:?}"),
        }

        fx.conductor.sign_out().await;
        match fx.conductor.navigate(&path).await.unwrap() {
            Navigation::Page(Page::NotFound) => {}
            other => panic!("strangers should hit not-found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn selector_creates_a_board_and_drops_the_pin_in() {
        let mut fx = fixture(false);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();

        let collection = fx
            .conductor
            .create_collection_with_pin("Road Trips", Visibility::Public, Some(DEMO_PIN_COFFEE))
            .await
            .unwrap();

        let notices = drain(&mut fx.notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Success");
        assert_eq!(
            notices[0].description.as_deref(),
            Some("Pin added to new collection")
        );

        fx.conductor
            .save_pin_to(collection.id, DEMO_PIN_WORKSPACE)
            .await;
        let notices = drain(&mut fx.notices);
        assert_eq!(notices[0].description.as_deref(), Some("Pin added to collection"));
    }

    #[tokio::test]
    async fn notifications_open_to_their_target_and_mark_read() {
        let fx = fixture(false);
        fx.conductor.sign_in(DEMO_JOHN).await.unwrap();

        let items = fx.conductor.notifications().await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| !i.notification.read));

        let route = fx.conductor.open_notification(&items[0]).await;
        assert_eq!(route, Some(Route::Pin(DEMO_PIN_WORKSPACE)));

        let items = fx.conductor.notifications().await;
        let read_count = items.iter().filter(|i| i.notification.read).count();
        assert_eq!(read_count, 1);
    }

    #[tokio::test]
    async fn load_more_pages_through_the_whole_feed_without_repeats() {
        let fx = fixture_with(false, 2);

        let mut feed = match fx.conductor.navigate("/").await.unwrap() {
            Navigation::Page(Page::Home(feed)) => feed,
            other => panic!("expected the home feed, got {other:?}"),
        };
        assert_eq!(feed.len(), 2);
        assert!(feed.can_load_more());

        fx.conductor.load_more(&mut feed).await;
        assert_eq!(feed.len(), 4);
        assert!(!feed.can_load_more());

        let ids: std::collections::HashSet<_> = feed.cards.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), 4);

        // Exhausted cursor: another call is a no-op.
        fx.conductor.load_more(&mut feed).await;
        assert_eq!(feed.len(), 4);
    }

    #[tokio::test]
    async fn upgrade_page_lists_tiers_and_stubs_the_purchase() {
        let mut fx = fixture(false);
        fx.conductor.sign_in(DEMO_JANE).await.unwrap();

        match fx.conductor.navigate("/upgrade").await.unwrap() {
            Navigation::Page(Page::Upgrade(tiers)) => assert_eq!(tiers.len(), 3),
            other => panic!("expected the upgrade page, got {other:?}"),
        }

        fx.conductor.select_upgrade("pro");
        let notices = drain(&mut fx.notices);
        assert_eq!(notices[0].title, "Coming Soon");
        assert_eq!(
            notices[0].description.as_deref(),
            Some("Payment processing will be implemented shortly.")
        );
    }
}
