use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    Collection, CollectionId, Comment, Notification, NotificationId, Pin, PinId, Profile,
    ProfileId, Report, Visibility,
};

pub mod memory;
pub mod rest;

type StdResult<T, E> = ::std::result::Result<T, E>;
pub type Result<T> = ::std::result::Result<T, RepositoryError>;

/// A pin row joined with everything the card surface renders.
#[derive(Debug, Clone)]
pub struct PinRecord {
    pub pin: Pin,
    pub creator: Profile,
    pub like_count: u64,
    pub comment_count: u64,
    pub viewer_liked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub comment: Comment,
    pub author: Profile,
}

#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub profile: Profile,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub viewer_following: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    pub collection: Collection,
    pub pin_count: u64,
    pub cover: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub notification: Notification,
    pub sender: Option<Profile>,
}

/// Cursor over the feed, newest first: `before` excludes rows at or after
/// that instant, `limit` bounds the slice.
#[derive(Debug, Clone, Copy)]
pub struct FeedCursor {
    pub before: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl FeedCursor {
    pub fn first(limit: usize) -> Self {
        Self {
            before: None,
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedSlice {
    pub records: Vec<PinRecord>,
    pub next_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct PinSearch {
    pub text: Option<String>,
    pub exact: Option<String>,
    pub exclude: Vec<String>,
    pub author: Option<String>,
}

impl PinSearch {
    /// Case-insensitive match over title + description, with exact-phrase,
    /// excluded-terms and author refinements.  The in-memory backend
    /// evaluates this directly; the hosted backend translates it into the
    /// equivalent `ilike` filters.
    pub fn matches(&self, pin: &Pin, creator: &Profile) -> bool {
        let haystack = match &pin.description {
            Some(d) => format!("{} {}", pin.title, d).to_lowercase(),
            None => pin.title.to_lowercase(),
        };

        if let Some(text) = &self.text {
            if !haystack.contains(&text.to_lowercase()) {
                return false;
            }
        }

        if let Some(exact) = &self.exact {
            if !haystack.contains(&exact.to_lowercase()) {
                return false;
            }
        }

        if self
            .exclude
            .iter()
            .any(|term| haystack.contains(&term.to_lowercase()))
        {
            return false;
        }

        if let Some(author) = &self.author {
            let author = author.to_lowercase();
            if !creator.username.to_lowercase().contains(&author)
                && !creator.name.to_lowercase().contains(&author)
            {
                return false;
            }
        }

        true
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.exact.is_none()
            && self.exclude.is_empty()
            && self.author.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileMutation {
    pub username: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionMutation {
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
}

#[async_trait]
pub trait PinRepository {
    async fn insert(&self, item: Pin) -> Result<bool>;
    async fn is_exists(&self, id: PinId) -> Result<bool>;

    async fn find(&self, id: PinId, viewer: Option<ProfileId>) -> Result<PinRecord>;
    async fn feed(&self, viewer: Option<ProfileId>, cursor: FeedCursor) -> Result<FeedSlice>;
    async fn search(&self, query: PinSearch, viewer: Option<ProfileId>) -> Result<Vec<PinRecord>>;
    async fn finds_by_creator(
        &self,
        creator_id: ProfileId,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>>;
    async fn trending(&self, viewer: Option<ProfileId>, limit: usize) -> Result<Vec<PinRecord>>;

    async fn is_liked(&self, id: PinId, user_id: ProfileId) -> Result<bool>;
    async fn insert_like(&self, id: PinId, user_id: ProfileId) -> Result<bool>;
    async fn delete_like(&self, id: PinId, user_id: ProfileId) -> Result<bool>;

    async fn insert_comment(&self, item: Comment) -> Result<bool>;
    async fn comments_of(&self, id: PinId) -> Result<Vec<CommentRecord>>;
}

#[async_trait]
pub trait ProfileRepository {
    async fn insert(&self, item: Profile) -> Result<bool>;
    async fn is_exists(&self, id: ProfileId) -> Result<bool>;

    async fn find(&self, id: ProfileId, viewer: Option<ProfileId>) -> Result<ProfileRecord>;
    async fn find_by_username(
        &self,
        username: &str,
        viewer: Option<ProfileId>,
    ) -> Result<ProfileRecord>;
    async fn search(&self, text: &str, viewer: Option<ProfileId>) -> Result<Vec<ProfileRecord>>;

    async fn update(&self, id: ProfileId, mutation: ProfileMutation) -> Result<Profile>;

    async fn is_following(&self, follower_id: ProfileId, following_id: ProfileId) -> Result<bool>;
    async fn insert_follow(&self, follower_id: ProfileId, following_id: ProfileId)
        -> Result<bool>;
    async fn delete_follow(&self, follower_id: ProfileId, following_id: ProfileId)
        -> Result<bool>;
}

#[async_trait]
pub trait CollectionRepository {
    async fn insert(&self, item: Collection) -> Result<bool>;
    async fn find(&self, id: CollectionId) -> Result<Collection>;
    async fn finds_by_creator(&self, creator_id: ProfileId) -> Result<Vec<CollectionRecord>>;
    async fn search(&self, text: &str) -> Result<Vec<CollectionRecord>>;

    async fn update(&self, id: CollectionId, mutation: CollectionMutation) -> Result<Collection>;

    async fn insert_item(&self, id: CollectionId, pin_id: PinId) -> Result<bool>;
    async fn items_of(&self, id: CollectionId, viewer: Option<ProfileId>)
        -> Result<Vec<PinRecord>>;
}

#[async_trait]
pub trait ModerationRepository {
    async fn insert_report(&self, item: Report) -> Result<bool>;
}

#[async_trait]
pub trait NotificationRepository {
    async fn recent(&self, recipient_id: ProfileId, limit: usize)
        -> Result<Vec<NotificationRecord>>;
    async fn mark_read(&self, id: NotificationId) -> Result<bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("cannot find row")]
    NotFound,
    #[error("expected unique row, found non-unique rows (matched: {matched})")]
    NoUnique { matched: u32 },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Removes the single element matching `is_target`; errs with the match
/// count when it is not exactly one.
pub(crate) fn try_remove_unique<T>(
    vec: &mut Vec<T>,
    is_target: impl Fn(&T) -> bool,
) -> StdResult<T, usize> {
    let indexes: Vec<_> = vec
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match is_target(v) {
            true => Some(i),
            false => None,
        })
        .collect();

    match *indexes.as_slice() {
        [one] => Ok(vec.remove(one)),
        _ => Err(indexes.len()),
    }
}

#[test]
fn search_matching() {
    use chrono::TimeZone;
    use uuid::Uuid;

    let creator = Profile {
        id: ProfileId(Uuid::from_u128(1)),
        username: "coffeeco".to_string(),
        name: "Coffee Co.".to_string(),
        avatar: None,
        bio: None,
        created_at: Utc.timestamp_opt(0, 0).unwrap(),
    };
    let pin = Pin {
        id: PinId(Uuid::from_u128(2)),
        image_url: "https://img.example/2.jpg".to_string(),
        title: "Premium Coffee Experience".to_string(),
        description: Some("Start your day with premium coffee".to_string()),
        creator_id: creator.id,
        created_at: Utc.timestamp_opt(0, 0).unwrap(),
        promoted: true,
    };

    let hit = PinSearch {
        text: Some("coffee".to_string()),
        ..Default::default()
    };
    assert!(hit.matches(&pin, &creator));

    let miss = PinSearch {
        text: Some("workspace".to_string()),
        ..Default::default()
    };
    assert!(!miss.matches(&pin, &creator));

    let excluded = PinSearch {
        text: Some("coffee".to_string()),
        exclude: vec!["premium".to_string()],
        ..Default::default()
    };
    assert!(!excluded.matches(&pin, &creator));

    let by_author = PinSearch {
        author: Some("coffee co".to_string()),
        ..Default::default()
    };
    assert!(by_author.matches(&pin, &creator));
}

#[test]
fn remove_unique_requires_exactly_one() {
    let mut v = vec![1, 2, 3, 2];
    assert_eq!(try_remove_unique(&mut v, |n| *n == 3), Ok(3));
    assert_eq!(try_remove_unique(&mut v, |n| *n == 2), Err(2));
    assert_eq!(try_remove_unique(&mut v, |n| *n == 9), Err(0));
}
