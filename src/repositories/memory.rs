use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::{
    try_remove_unique, CollectionMutation, CollectionRecord, CollectionRepository, CommentRecord,
    FeedCursor, FeedSlice, ModerationRepository, NotificationRecord, NotificationRepository,
    PinRecord, PinRepository, PinSearch, ProfileMutation, ProfileRecord, ProfileRepository,
    RepositoryError, Result,
};
use crate::entities::{
    Collection, CollectionId, CollectionItem, Comment, CommentId, ContentType, Follow, Like,
    Notification, NotificationId, NotificationKind, Pin, PinId, Profile, ProfileId, Report,
    Visibility,
};

/// Backend over process-local rows.  Serves the demo dataset and every test
/// that does not want a network; cheap to clone, all clones share one store.
#[derive(Clone, Default)]
pub struct InMemoryBackend(Arc<Mutex<Store>>);

#[derive(Default)]
struct Store {
    pins: Vec<Pin>,
    profiles: Vec<Profile>,
    likes: Vec<Like>,
    comments: Vec<Comment>,
    collections: Vec<Collection>,
    collection_items: Vec<CollectionItem>,
    reports: Vec<Report>,
    follows: Vec<Follow>,
    notifications: Vec<Notification>,
}

pub const DEMO_JOHN: ProfileId =
    ProfileId(Uuid::from_u128(0x123e4567_e89b_12d3_a456_426614174000));
pub const DEMO_JANE: ProfileId =
    ProfileId(Uuid::from_u128(0x987fcdeb_51a2_43d7_9b56_626614174001));
pub const DEMO_COFFEE_CO: ProfileId =
    ProfileId(Uuid::from_u128(0xc0ffee00_0000_4000_8000_000000000001));

pub const DEMO_PIN_WORKSPACE: PinId = PinId(Uuid::from_u128(1));
pub const DEMO_PIN_COFFEE: PinId = PinId(Uuid::from_u128(2));
pub const DEMO_PIN_DEVELOPMENT: PinId = PinId(Uuid::from_u128(3));
pub const DEMO_PIN_PHOTOGRAPHY: PinId = PinId(Uuid::from_u128(4));

fn demo_time(offset_hours: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_705_312_800 + offset_hours * 3600, 0).unwrap_or_default()
}

impl InMemoryBackend {
    pub fn new() -> Self { Self::default() }

    /// The seeded rows the product demos against: three profiles, four pins
    /// (one promoted), a couple of likes, a comment and its notification.
    pub fn with_demo_data() -> Self {
        let mut store = Store::default();

        store.profiles.push(Profile {
            id: DEMO_JOHN,
            username: "johndoe".to_string(),
            name: "John Doe".to_string(),
            avatar: Some("https://i.pravatar.cc/150?u=johndoe".to_string()),
            bio: Some("Photographer & coffee enthusiast".to_string()),
            created_at: demo_time(-48),
        });
        store.profiles.push(Profile {
            id: DEMO_JANE,
            username: "janesmith".to_string(),
            name: "Jane Smith".to_string(),
            avatar: Some("https://i.pravatar.cc/150?u=janesmith".to_string()),
            bio: Some("Designer. Collector of quiet places.".to_string()),
            created_at: demo_time(-36),
        });
        store.profiles.push(Profile {
            id: DEMO_COFFEE_CO,
            username: "coffeeco".to_string(),
            name: "Coffee Co.".to_string(),
            avatar: Some("https://i.pravatar.cc/150?u=coffeeco".to_string()),
            bio: Some("Crafting the perfect cup since 2010".to_string()),
            created_at: demo_time(-24),
        });

        store.pins.push(Pin {
            id: DEMO_PIN_WORKSPACE,
            image_url: "https://images.unsplash.com/photo-1497366216548-37526070297c"
                .to_string(),
            title: "Beautiful Workspace".to_string(),
            description: Some("A clean and minimal workspace setup".to_string()),
            creator_id: DEMO_JOHN,
            created_at: demo_time(0),
            promoted: false,
        });
        store.pins.push(Pin {
            id: DEMO_PIN_COFFEE,
            image_url: "https://images.unsplash.com/photo-1495474472287-4d71bcdd2085"
                .to_string(),
            title: "Premium Coffee Experience".to_string(),
            description: Some("Start your day with premium coffee".to_string()),
            creator_id: DEMO_COFFEE_CO,
            created_at: demo_time(1),
            promoted: true,
        });
        store.pins.push(Pin {
            id: DEMO_PIN_DEVELOPMENT,
            image_url: "https://images.unsplash.com/photo-1461749280684-dccba630e2f6"
                .to_string(),
            title: "Modern Development".to_string(),
            description: Some("Modern software development workspace".to_string()),
            creator_id: DEMO_JOHN,
            created_at: demo_time(2),
            promoted: false,
        });
        store.pins.push(Pin {
            id: DEMO_PIN_PHOTOGRAPHY,
            image_url: "https://images.unsplash.com/photo-1449824913935-59a10b8d2000"
                .to_string(),
            title: "Urban Photography".to_string(),
            description: Some("City life captured in stunning detail".to_string()),
            creator_id: DEMO_JANE,
            created_at: demo_time(3),
            promoted: false,
        });

        store.likes.push(Like {
            user_id: DEMO_JANE,
            pin_id: DEMO_PIN_WORKSPACE,
            created_at: demo_time(4),
        });
        store.likes.push(Like {
            user_id: DEMO_JOHN,
            pin_id: DEMO_PIN_PHOTOGRAPHY,
            created_at: demo_time(4),
        });

        store.comments.push(Comment {
            id: CommentId(Uuid::from_u128(0x10)),
            pin_id: DEMO_PIN_WORKSPACE,
            user_id: DEMO_JANE,
            content: "Love this setup!".to_string(),
            created_at: demo_time(5),
        });

        store.follows.push(Follow {
            follower_id: DEMO_JANE,
            following_id: DEMO_JOHN,
            created_at: demo_time(-10),
        });

        store.collections.push(Collection {
            id: CollectionId(Uuid::from_u128(0x20)),
            name: "Morning Rituals".to_string(),
            creator_id: DEMO_JANE,
            visibility: Visibility::Public,
            created_at: demo_time(-8),
        });
        store.collection_items.push(CollectionItem {
            collection_id: CollectionId(Uuid::from_u128(0x20)),
            pin_id: DEMO_PIN_COFFEE,
            added_at: demo_time(-7),
        });

        store.notifications.push(Notification {
            id: NotificationId(Uuid::from_u128(0x30)),
            recipient_id: DEMO_JOHN,
            sender_id: Some(DEMO_JANE),
            kind: NotificationKind::Like,
            content_type: Some(ContentType::Pin),
            content_id: Some(DEMO_PIN_WORKSPACE.to_string()),
            message: "Jane Smith liked your pin".to_string(),
            read: false,
            created_at: demo_time(4),
        });
        store.notifications.push(Notification {
            id: NotificationId(Uuid::from_u128(0x31)),
            recipient_id: DEMO_JOHN,
            sender_id: Some(DEMO_JANE),
            kind: NotificationKind::Comment,
            content_type: Some(ContentType::Pin),
            content_id: Some(DEMO_PIN_WORKSPACE.to_string()),
            message: "Jane Smith commented on your pin".to_string(),
            read: false,
            created_at: demo_time(5),
        });

        Self(Arc::new(Mutex::new(store)))
    }
}

#[inline]
fn find_ref<T, P>(v: &[T], predicate: P) -> Result<&T>
where P: FnMut(&&T) -> bool {
    let mut res = v.iter().filter(predicate).collect::<Vec<_>>();

    match res.len() {
        0 => Err(RepositoryError::NotFound),
        1 => Ok(res.remove(0)),
        i => Err(RepositoryError::NoUnique { matched: i as u32 }),
    }
}

#[inline]
fn find_mut<T, P>(v: &mut [T], predicate: P) -> Result<&mut T>
where P: FnMut(&&mut T) -> bool {
    let mut res = v.iter_mut().filter(predicate).collect::<Vec<_>>();

    match res.len() {
        0 => Err(RepositoryError::NotFound),
        1 => Ok(res.remove(0)),
        i => Err(RepositoryError::NoUnique { matched: i as u32 }),
    }
}

impl Store {
    fn pin_record(&self, pin: &Pin, viewer: Option<ProfileId>) -> Option<PinRecord> {
        let creator = match self.profiles.iter().find(|p| p.id == pin.creator_id) {
            Some(p) => p.clone(),
            None => {
                warn!(pin_id = %pin.id, "skipping pin row with unknown creator");
                return None;
            }
        };

        let like_count = self.likes.iter().filter(|l| l.pin_id == pin.id).count() as u64;
        let comment_count = self.comments.iter().filter(|c| c.pin_id == pin.id).count() as u64;
        let viewer_liked = viewer
            .map(|v| {
                self.likes
                    .iter()
                    .any(|l| l.user_id == v && l.pin_id == pin.id)
            })
            .unwrap_or(false);

        Some(PinRecord {
            pin: pin.clone(),
            creator,
            like_count,
            comment_count,
            viewer_liked,
        })
    }

    fn pin_records<'a>(
        &self,
        pins: impl Iterator<Item = &'a Pin>,
        viewer: Option<ProfileId>,
    ) -> Vec<PinRecord> {
        pins.filter_map(|p| self.pin_record(p, viewer)).collect()
    }

    fn profile_record(&self, profile: &Profile, viewer: Option<ProfileId>) -> ProfileRecord {
        let follower_count = self
            .follows
            .iter()
            .filter(|f| f.following_id == profile.id)
            .count() as u64;
        let following_count = self
            .follows
            .iter()
            .filter(|f| f.follower_id == profile.id)
            .count() as u64;
        let post_count = self
            .pins
            .iter()
            .filter(|p| p.creator_id == profile.id)
            .count() as u64;
        let viewer_following = viewer
            .map(|v| {
                self.follows
                    .iter()
                    .any(|f| f.follower_id == v && f.following_id == profile.id)
            })
            .unwrap_or(false);

        ProfileRecord {
            profile: profile.clone(),
            follower_count,
            following_count,
            post_count,
            viewer_following,
        }
    }

    fn collection_record(&self, collection: &Collection) -> CollectionRecord {
        let mut items: Vec<_> = self
            .collection_items
            .iter()
            .filter(|i| i.collection_id == collection.id)
            .collect();
        items.sort_by_key(|i| i.added_at);

        let cover = items.first().and_then(|i| {
            self.pins
                .iter()
                .find(|p| p.id == i.pin_id)
                .map(|p| p.image_url.clone())
        });

        CollectionRecord {
            collection: collection.clone(),
            pin_count: items.len() as u64,
            cover,
        }
    }
}

#[async_trait]
impl PinRepository for InMemoryBackend {
    async fn insert(&self, item: Pin) -> Result<bool> {
        let mut guard = self.0.lock().await;

        match find_ref(&guard.pins, |v| v.id == item.id) {
            Ok(_) => return Ok(false),
            Err(RepositoryError::NotFound) => (),
            Err(e) => return Err(e),
        }

        guard.pins.push(item);
        Ok(true)
    }

    async fn is_exists(&self, id: PinId) -> Result<bool> {
        let guard = self.0.lock().await;

        match find_ref(&guard.pins, |v| v.id == id) {
            Ok(_) => Ok(true),
            Err(RepositoryError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find(&self, id: PinId, viewer: Option<ProfileId>) -> Result<PinRecord> {
        let guard = self.0.lock().await;
        let pin = find_ref(&guard.pins, |v| v.id == id)?;

        guard.pin_record(pin, viewer).ok_or(RepositoryError::NotFound)
    }

    async fn feed(&self, viewer: Option<ProfileId>, cursor: FeedCursor) -> Result<FeedSlice> {
        let guard = self.0.lock().await;

        let mut pins: Vec<_> = guard
            .pins
            .iter()
            .filter(|p| cursor.before.map(|b| p.created_at < b).unwrap_or(true))
            .collect();
        pins.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let remainder = pins.len() > cursor.limit;
        pins.truncate(cursor.limit);

        let next_before = match remainder {
            true => pins.last().map(|p| p.created_at),
            false => None,
        };

        Ok(FeedSlice {
            records: guard.pin_records(pins.into_iter(), viewer),
            next_before,
        })
    }

    async fn search(&self, query: PinSearch, viewer: Option<ProfileId>) -> Result<Vec<PinRecord>> {
        let guard = self.0.lock().await;

        let mut pins: Vec<_> = guard
            .pins
            .iter()
            .filter(|p| {
                guard
                    .profiles
                    .iter()
                    .find(|c| c.id == p.creator_id)
                    .map(|c| query.matches(p, c))
                    .unwrap_or(false)
            })
            .collect();
        pins.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(guard.pin_records(pins.into_iter(), viewer))
    }

    async fn finds_by_creator(
        &self,
        creator_id: ProfileId,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>> {
        let guard = self.0.lock().await;

        let mut pins: Vec<_> = guard
            .pins
            .iter()
            .filter(|p| p.creator_id == creator_id)
            .collect();
        pins.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(guard.pin_records(pins.into_iter(), viewer))
    }

    async fn trending(&self, viewer: Option<ProfileId>, limit: usize) -> Result<Vec<PinRecord>> {
        let guard = self.0.lock().await;

        let mut records = guard.pin_records(guard.pins.iter(), viewer);
        records.sort_by(|a, b| {
            b.like_count
                .cmp(&a.like_count)
                .then(b.pin.created_at.cmp(&a.pin.created_at))
        });
        records.truncate(limit);

        Ok(records)
    }

    async fn is_liked(&self, id: PinId, user_id: ProfileId) -> Result<bool> {
        let guard = self.0.lock().await;

        Ok(guard
            .likes
            .iter()
            .any(|l| l.pin_id == id && l.user_id == user_id))
    }

    async fn insert_like(&self, id: PinId, user_id: ProfileId) -> Result<bool> {
        let mut guard = self.0.lock().await;
        find_ref(&guard.pins, |v| v.id == id)?;

        let exists = guard
            .likes
            .iter()
            .any(|l| l.pin_id == id && l.user_id == user_id);
        if exists {
            return Ok(false);
        }

        guard.likes.push(Like {
            user_id,
            pin_id: id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn delete_like(&self, id: PinId, user_id: ProfileId) -> Result<bool> {
        let mut guard = self.0.lock().await;

        match try_remove_unique(&mut guard.likes, |l| l.pin_id == id && l.user_id == user_id) {
            Ok(_) => Ok(true),
            Err(0) => Ok(false),
            Err(i) => Err(RepositoryError::NoUnique { matched: i as u32 }),
        }
    }

    async fn insert_comment(&self, item: Comment) -> Result<bool> {
        let mut guard = self.0.lock().await;
        find_ref(&guard.pins, |v| v.id == item.pin_id)?;

        match find_ref(&guard.comments, |v| v.id == item.id) {
            Ok(_) => return Ok(false),
            Err(RepositoryError::NotFound) => (),
            Err(e) => return Err(e),
        }

        guard.comments.push(item);
        Ok(true)
    }

    async fn comments_of(&self, id: PinId) -> Result<Vec<CommentRecord>> {
        let guard = self.0.lock().await;

        let mut comments: Vec<_> = guard.comments.iter().filter(|c| c.pin_id == id).collect();
        comments.sort_by_key(|c| c.created_at);

        Ok(comments
            .into_iter()
            .filter_map(|c| {
                match guard.profiles.iter().find(|p| p.id == c.user_id) {
                    Some(author) => Some(CommentRecord {
                        comment: c.clone(),
                        author: author.clone(),
                    }),
                    None => {
                        warn!(comment_id = %c.id, "skipping comment row with unknown author");
                        None
                    }
                }
            })
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn insert(&self, item: Profile) -> Result<bool> {
        let mut guard = self.0.lock().await;

        match find_ref(&guard.profiles, |v| v.id == item.id) {
            Ok(_) => return Ok(false),
            Err(RepositoryError::NotFound) => (),
            Err(e) => return Err(e),
        }

        guard.profiles.push(item);
        Ok(true)
    }

    async fn is_exists(&self, id: ProfileId) -> Result<bool> {
        let guard = self.0.lock().await;

        match find_ref(&guard.profiles, |v| v.id == id) {
            Ok(_) => Ok(true),
            Err(RepositoryError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find(&self, id: ProfileId, viewer: Option<ProfileId>) -> Result<ProfileRecord> {
        let guard = self.0.lock().await;
        let profile = find_ref(&guard.profiles, |v| v.id == id)?;

        Ok(guard.profile_record(profile, viewer))
    }

    async fn find_by_username(
        &self,
        username: &str,
        viewer: Option<ProfileId>,
    ) -> Result<ProfileRecord> {
        let guard = self.0.lock().await;
        let profile = find_ref(&guard.profiles, |v| {
            v.username.eq_ignore_ascii_case(username)
        })?;

        Ok(guard.profile_record(profile, viewer))
    }

    async fn search(&self, text: &str, viewer: Option<ProfileId>) -> Result<Vec<ProfileRecord>> {
        let guard = self.0.lock().await;
        let text = text.to_lowercase();

        Ok(guard
            .profiles
            .iter()
            .filter(|p| {
                p.username.to_lowercase().contains(&text)
                    || p.name.to_lowercase().contains(&text)
            })
            .map(|p| guard.profile_record(p, viewer))
            .collect())
    }

    async fn update(&self, id: ProfileId, mutation: ProfileMutation) -> Result<Profile> {
        let mut guard = self.0.lock().await;
        let item = find_mut(&mut guard.profiles, |v| v.id == id)?;

        let ProfileMutation {
            username,
            name,
            avatar,
            bio,
        } = mutation;
        if let Some(val) = username {
            item.username = val;
        }
        if let Some(val) = name {
            item.name = val;
        }
        if let Some(val) = avatar {
            item.avatar = Some(val);
        }
        if let Some(val) = bio {
            item.bio = Some(val);
        }

        Ok(item.clone())
    }

    async fn is_following(&self, follower_id: ProfileId, following_id: ProfileId) -> Result<bool> {
        let guard = self.0.lock().await;

        Ok(guard
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id))
    }

    async fn insert_follow(
        &self,
        follower_id: ProfileId,
        following_id: ProfileId,
    ) -> Result<bool> {
        let mut guard = self.0.lock().await;
        find_ref(&guard.profiles, |v| v.id == following_id)?;

        let exists = guard
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id);
        if exists {
            return Ok(false);
        }

        guard.follows.push(Follow {
            follower_id,
            following_id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn delete_follow(
        &self,
        follower_id: ProfileId,
        following_id: ProfileId,
    ) -> Result<bool> {
        let mut guard = self.0.lock().await;

        match try_remove_unique(&mut guard.follows, |f| {
            f.follower_id == follower_id && f.following_id == following_id
        }) {
            Ok(_) => Ok(true),
            Err(0) => Ok(false),
            Err(i) => Err(RepositoryError::NoUnique { matched: i as u32 }),
        }
    }
}

#[async_trait]
impl CollectionRepository for InMemoryBackend {
    async fn insert(&self, item: Collection) -> Result<bool> {
        let mut guard = self.0.lock().await;

        match find_ref(&guard.collections, |v| v.id == item.id) {
            Ok(_) => return Ok(false),
            Err(RepositoryError::NotFound) => (),
            Err(e) => return Err(e),
        }

        guard.collections.push(item);
        Ok(true)
    }

    async fn find(&self, id: CollectionId) -> Result<Collection> {
        let guard = self.0.lock().await;

        Ok(find_ref(&guard.collections, |v| v.id == id)?.clone())
    }

    async fn finds_by_creator(&self, creator_id: ProfileId) -> Result<Vec<CollectionRecord>> {
        let guard = self.0.lock().await;

        let mut collections: Vec<_> = guard
            .collections
            .iter()
            .filter(|c| c.creator_id == creator_id)
            .collect();
        collections.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(collections
            .into_iter()
            .map(|c| guard.collection_record(c))
            .collect())
    }

    async fn search(&self, text: &str) -> Result<Vec<CollectionRecord>> {
        let guard = self.0.lock().await;
        let text = text.to_lowercase();

        Ok(guard
            .collections
            .iter()
            .filter(|c| c.visibility == Visibility::Public)
            .filter(|c| c.name.to_lowercase().contains(&text))
            .map(|c| guard.collection_record(c))
            .collect())
    }

    async fn update(&self, id: CollectionId, mutation: CollectionMutation) -> Result<Collection> {
        let mut guard = self.0.lock().await;
        let item = find_mut(&mut guard.collections, |v| v.id == id)?;

        let CollectionMutation { name, visibility } = mutation;
        if let Some(val) = name {
            item.name = val;
        }
        if let Some(val) = visibility {
            item.visibility = val;
        }

        Ok(item.clone())
    }

    async fn insert_item(&self, id: CollectionId, pin_id: PinId) -> Result<bool> {
        let mut guard = self.0.lock().await;
        find_ref(&guard.collections, |v| v.id == id)?;
        find_ref(&guard.pins, |v| v.id == pin_id)?;

        let exists = guard
            .collection_items
            .iter()
            .any(|i| i.collection_id == id && i.pin_id == pin_id);
        if exists {
            return Ok(false);
        }

        guard.collection_items.push(CollectionItem {
            collection_id: id,
            pin_id,
            added_at: Utc::now(),
        });
        Ok(true)
    }

    async fn items_of(
        &self,
        id: CollectionId,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>> {
        let guard = self.0.lock().await;

        let mut items: Vec<_> = guard
            .collection_items
            .iter()
            .filter(|i| i.collection_id == id)
            .collect();
        items.sort_by_key(|i| i.added_at);

        Ok(items
            .into_iter()
            .filter_map(|i| guard.pins.iter().find(|p| p.id == i.pin_id))
            .filter_map(|p| guard.pin_record(p, viewer))
            .collect())
    }
}

#[async_trait]
impl ModerationRepository for InMemoryBackend {
    async fn insert_report(&self, item: Report) -> Result<bool> {
        let mut guard = self.0.lock().await;

        match find_ref(&guard.reports, |v| v.id == item.id) {
            Ok(_) => return Ok(false),
            Err(RepositoryError::NotFound) => (),
            Err(e) => return Err(e),
        }

        guard.reports.push(item);
        Ok(true)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryBackend {
    async fn recent(
        &self,
        recipient_id: ProfileId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>> {
        let guard = self.0.lock().await;

        let mut notifications: Vec<_> = guard
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications.truncate(limit);

        Ok(notifications
            .into_iter()
            .map(|n| NotificationRecord {
                notification: n.clone(),
                sender: n
                    .sender_id
                    .and_then(|s| guard.profiles.iter().find(|p| p.id == s).cloned()),
            })
            .collect())
    }

    async fn mark_read(&self, id: NotificationId) -> Result<bool> {
        let mut guard = self.0.lock().await;
        let item = find_mut(&mut guard.notifications, |v| v.id == id)?;

        let changed = !item.read;
        item.read = true;
        Ok(changed)
    }
}
