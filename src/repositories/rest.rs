use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use url::Url;
use uuid::Uuid;

use super::{
    CollectionMutation, CollectionRecord, CollectionRepository, CommentRecord, FeedCursor,
    FeedSlice, ModerationRepository, NotificationRecord, NotificationRepository, PinRecord,
    PinRepository, PinSearch, ProfileMutation, ProfileRecord, ProfileRepository, RepositoryError,
    Result,
};
use crate::entities::{
    Collection, CollectionId, Comment, Notification, NotificationId, Pin, PinId, Profile,
    ProfileId, Report,
};

const PIN_SELECT: &str = "*,creator:profiles(*),likes(count),comments(count)";
const PROFILE_SELECT: &str = "*,followers:follows!follows_following_id_fkey(count),\
                              following:follows!follows_follower_id_fkey(count),pins(count)";
const COLLECTION_SELECT: &str = "*,collection_items(added_at,pin:pins(image_url))";

// Trending is ranked client-side over this many recent rows; the hosted
// schema exposes no aggregate ordering.
const TRENDING_WINDOW: usize = 100;

/// Backend over the hosted platform's REST query interface.  Rows are
/// validated one by one at the response boundary; malformed ones are logged
/// and skipped.
#[derive(Clone)]
pub struct RestBackend {
    http: Client,
    base: Url,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)?.join("rest/v1/")?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(api_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))?,
        );

        let http = Client::builder().default_headers(headers).build()?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, table: &str) -> Result<Url> {
        self.base.join(table).map_err(|e| internal(anyhow!(e)))
    }

    async fn get_rows(&self, url: Url) -> Result<Vec<Value>> {
        let resp = self.http.get(url).send().await.map_err(internal)?;
        let resp = resp.error_for_status().map_err(internal)?;

        resp.json().await.map_err(internal)
    }

    /// POST one row; a key conflict reports "already in the target state"
    /// instead of failing, so toggles can converge.
    async fn insert_row(&self, table: &str, body: Value) -> Result<bool> {
        let url = self.endpoint(table)?;
        let resp = self
            .http
            .post(url)
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(internal)?;

        match resp.status() {
            StatusCode::CONFLICT => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(internal(anyhow!("insert into {table} failed with {s}"))),
        }
    }

    async fn delete_rows(&self, url: Url) -> Result<u64> {
        let resp = self
            .http
            .delete(url)
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(internal)?;
        let rows: Vec<Value> = resp
            .error_for_status()
            .map_err(internal)?
            .json()
            .await
            .map_err(internal)?;

        Ok(rows.len() as u64)
    }

    async fn patch_rows(&self, url: Url, body: Value) -> Result<Vec<Value>> {
        let resp = self
            .http
            .patch(url)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(internal)?;

        resp.error_for_status()
            .map_err(internal)?
            .json()
            .await
            .map_err(internal)
    }

    /// Which of `ids` the viewer has liked, as one membership query.
    async fn liked_set(
        &self,
        viewer: Option<ProfileId>,
        ids: &[PinId],
    ) -> Result<Vec<PinId>> {
        let viewer = match viewer {
            Some(v) => v,
            None => return Ok(vec![]),
        };
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut url = self.endpoint("likes")?;
        url.query_pairs_mut()
            .append_pair("select", "pin_id")
            .append_pair("user_id", &format!("eq.{viewer}"))
            .append_pair("pin_id", &format!("in.({list})"));

        #[derive(Deserialize)]
        struct Row {
            pin_id: Uuid,
        }

        Ok(decode_rows::<Row>(self.get_rows(url).await?, "likes")
            .into_iter()
            .map(|r| PinId(r.pin_id))
            .collect())
    }

    async fn mark_viewer_likes(
        &self,
        viewer: Option<ProfileId>,
        records: &mut [PinRecord],
    ) -> Result<()> {
        let ids: Vec<_> = records.iter().map(|r| r.pin.id).collect();
        let liked = self.liked_set(viewer, &ids).await?;

        for record in records.iter_mut() {
            record.viewer_liked = liked.contains(&record.pin.id);
        }
        Ok(())
    }

    async fn pin_records(&self, url: Url, viewer: Option<ProfileId>) -> Result<Vec<PinRecord>> {
        let rows = self.get_rows(url).await?;
        let mut records: Vec<_> = decode_rows::<PinRow>(rows, "pins")
            .into_iter()
            .filter_map(PinRow::into_record)
            .collect();

        self.mark_viewer_likes(viewer, &mut records).await?;
        Ok(records)
    }
}

fn internal(e: impl Into<anyhow::Error>) -> RepositoryError { RepositoryError::Internal(e.into()) }

fn unique_row(mut rows: Vec<Value>) -> Result<Value> {
    match rows.len() {
        0 => Err(RepositoryError::NotFound),
        1 => Ok(rows.remove(0)),
        i => Err(RepositoryError::NoUnique { matched: i as u32 }),
    }
}

/// Row-at-a-time decode so one malformed row cannot poison a whole page.
fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, table: &str) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(table, error = %e, "skipping malformed row");
                None
            }
        })
        .collect()
}

/// The `ilike` pattern syntax shares delimiters with the filter grammar, so
/// user text is stripped of them before it is sent; the caller re-applies
/// the authoritative match client-side.
fn ilike_term(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%' | '"'))
        .collect()
}

fn timestamptz(at: DateTime<Utc>) -> String { at.to_rfc3339_opts(SecondsFormat::Micros, true) }

fn count_of(rows: &[CountRow]) -> u64 { rows.first().map(|r| r.count).unwrap_or(0) }

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: Uuid,
    username: String,
    name: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: ProfileId(row.id),
            username: row.username,
            name: row.name,
            avatar: row.avatar,
            bio: row.bio,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PinRow {
    id: Uuid,
    image_url: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    creator_id: Uuid,
    created_at: DateTime<Utc>,
    #[serde(default)]
    promoted: bool,
    creator: Option<ProfileRow>,
    #[serde(default)]
    likes: Vec<CountRow>,
    #[serde(default)]
    comments: Vec<CountRow>,
}

impl PinRow {
    fn into_record(self) -> Option<PinRecord> {
        let PinRow {
            id,
            image_url,
            title,
            description,
            creator_id,
            created_at,
            promoted,
            creator,
            likes,
            comments,
        } = self;

        let creator = match creator {
            Some(c) => Profile::from(c),
            None => {
                warn!(pin_id = %id, "skipping pin row with no embedded creator");
                return None;
            }
        };

        Some(PinRecord {
            pin: Pin {
                id: PinId(id),
                image_url,
                title,
                description,
                creator_id: ProfileId(creator_id),
                created_at,
                promoted,
            },
            like_count: count_of(&likes),
            comment_count: count_of(&comments),
            creator,
            viewer_liked: false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProfileStatsRow {
    #[serde(flatten)]
    profile: ProfileRow,
    #[serde(default)]
    followers: Vec<CountRow>,
    #[serde(default)]
    following: Vec<CountRow>,
    #[serde(default)]
    pins: Vec<CountRow>,
}

impl ProfileStatsRow {
    fn into_record(self) -> ProfileRecord {
        ProfileRecord {
            follower_count: count_of(&self.followers),
            following_count: count_of(&self.following),
            post_count: count_of(&self.pins),
            profile: Profile::from(self.profile),
            viewer_following: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommentRow {
    id: Uuid,
    pin_id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    author: Option<ProfileRow>,
}

impl CommentRow {
    fn into_record(self) -> Option<CommentRecord> {
        let author = match self.author {
            Some(a) => Profile::from(a),
            None => {
                warn!(comment_id = %self.id, "skipping comment row with no embedded author");
                return None;
            }
        };

        Some(CommentRecord {
            comment: Comment {
                id: crate::entities::CommentId(self.id),
                pin_id: PinId(self.pin_id),
                user_id: ProfileId(self.user_id),
                content: self.content,
                created_at: self.created_at,
            },
            author,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CollectionRow {
    id: Uuid,
    name: String,
    creator_id: Uuid,
    visibility: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    collection_items: Vec<ItemCoverRow>,
}

#[derive(Debug, Deserialize)]
struct ItemCoverRow {
    added_at: DateTime<Utc>,
    pin: Option<CoverRow>,
}

#[derive(Debug, Deserialize)]
struct CoverRow {
    image_url: String,
}

impl CollectionRow {
    fn to_collection(&self) -> Option<Collection> {
        let visibility = match self.visibility.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(collection_id = %self.id, value = %self.visibility,
                      "skipping collection row with unknown visibility");
                return None;
            }
        };

        Some(Collection {
            id: CollectionId(self.id),
            name: self.name.clone(),
            creator_id: ProfileId(self.creator_id),
            visibility,
            created_at: self.created_at,
        })
    }

    fn into_record(mut self) -> Option<CollectionRecord> {
        let collection = self.to_collection()?;

        self.collection_items.sort_by_key(|i| i.added_at);
        let cover = self
            .collection_items
            .first()
            .and_then(|i| i.pin.as_ref())
            .map(|p| p.image_url.clone());

        Some(CollectionRecord {
            pin_count: self.collection_items.len() as u64,
            cover,
            collection,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    #[serde(default)]
    sender_id: Option<Uuid>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    content_id: Option<String>,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
    sender: Option<ProfileRow>,
}

impl NotificationRow {
    fn into_record(self) -> Option<NotificationRecord> {
        let kind = match self.kind.parse() {
            Ok(k) => k,
            Err(_) => {
                warn!(notification_id = %self.id, value = %self.kind,
                      "skipping notification row with unknown kind");
                return None;
            }
        };
        let content_type = match self.content_type.as_deref().map(str::parse).transpose() {
            Ok(c) => c,
            Err(_) => {
                warn!(notification_id = %self.id, "skipping notification row with unknown target");
                return None;
            }
        };

        Some(NotificationRecord {
            sender: self.sender.map(Profile::from),
            notification: Notification {
                id: NotificationId(self.id),
                recipient_id: ProfileId(self.recipient_id),
                sender_id: self.sender_id.map(ProfileId),
                kind,
                content_type,
                content_id: self.content_id,
                message: self.message,
                read: self.read,
                created_at: self.created_at,
            },
        })
    }
}

#[async_trait]
impl PinRepository for RestBackend {
    async fn insert(&self, item: Pin) -> Result<bool> {
        self.insert_row(
            "pins",
            json!({
                "id": item.id.0,
                "image_url": item.image_url,
                "title": item.title,
                "description": item.description,
                "creator_id": item.creator_id.0,
                "created_at": timestamptz(item.created_at),
                "promoted": item.promoted,
            }),
        )
        .await
    }

    async fn is_exists(&self, id: PinId) -> Result<bool> {
        let mut url = self.endpoint("pins")?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("id", &format!("eq.{id}"));

        Ok(!self.get_rows(url).await?.is_empty())
    }

    async fn find(&self, id: PinId, viewer: Option<ProfileId>) -> Result<PinRecord> {
        let mut url = self.endpoint("pins")?;
        url.query_pairs_mut()
            .append_pair("select", PIN_SELECT)
            .append_pair("id", &format!("eq.{id}"));

        let row = unique_row(self.get_rows(url).await?)?;
        let row: PinRow = serde_json::from_value(row).map_err(|e| internal(anyhow!(e)))?;
        let mut record = row.into_record().ok_or(RepositoryError::NotFound)?;

        record.viewer_liked = !self.liked_set(viewer, &[record.pin.id]).await?.is_empty();
        Ok(record)
    }

    async fn feed(&self, viewer: Option<ProfileId>, cursor: FeedCursor) -> Result<FeedSlice> {
        let mut url = self.endpoint("pins")?;
        url.query_pairs_mut()
            .append_pair("select", PIN_SELECT)
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &cursor.limit.to_string());
        if let Some(before) = cursor.before {
            url.query_pairs_mut()
                .append_pair("created_at", &format!("lt.{}", timestamptz(before)));
        }

        let rows = self.get_rows(url).await?;
        let full_page = rows.len() == cursor.limit;

        let mut records: Vec<_> = decode_rows::<PinRow>(rows, "pins")
            .into_iter()
            .filter_map(PinRow::into_record)
            .collect();
        self.mark_viewer_likes(viewer, &mut records).await?;

        let next_before = match full_page {
            true => records.last().map(|r| r.pin.created_at),
            false => None,
        };

        Ok(FeedSlice {
            records,
            next_before,
        })
    }

    async fn search(&self, query: PinSearch, viewer: Option<ProfileId>) -> Result<Vec<PinRecord>> {
        let mut url = self.endpoint("pins")?;
        url.query_pairs_mut()
            .append_pair("select", PIN_SELECT)
            .append_pair("order", "created_at.desc");
        if let Some(text) = &query.text {
            let term = ilike_term(text);
            url.query_pairs_mut().append_pair(
                "or",
                &format!("(title.ilike.*{term}*,description.ilike.*{term}*)"),
            );
        }

        // The server pass narrows; the shared matcher decides.
        let records = self.pin_records(url, viewer).await?;
        Ok(records
            .into_iter()
            .filter(|r| query.matches(&r.pin, &r.creator))
            .collect())
    }

    async fn finds_by_creator(
        &self,
        creator_id: ProfileId,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>> {
        let mut url = self.endpoint("pins")?;
        url.query_pairs_mut()
            .append_pair("select", PIN_SELECT)
            .append_pair("creator_id", &format!("eq.{creator_id}"))
            .append_pair("order", "created_at.desc");

        self.pin_records(url, viewer).await
    }

    async fn trending(&self, viewer: Option<ProfileId>, limit: usize) -> Result<Vec<PinRecord>> {
        let mut url = self.endpoint("pins")?;
        url.query_pairs_mut()
            .append_pair("select", PIN_SELECT)
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &TRENDING_WINDOW.to_string());

        let mut records = self.pin_records(url, viewer).await?;
        records.sort_by(|a, b| {
            b.like_count
                .cmp(&a.like_count)
                .then(b.pin.created_at.cmp(&a.pin.created_at))
        });
        records.truncate(limit);

        Ok(records)
    }

    async fn is_liked(&self, id: PinId, user_id: ProfileId) -> Result<bool> {
        Ok(!self.liked_set(Some(user_id), &[id]).await?.is_empty())
    }

    async fn insert_like(&self, id: PinId, user_id: ProfileId) -> Result<bool> {
        self.insert_row(
            "likes",
            json!({ "user_id": user_id.0, "pin_id": id.0 }),
        )
        .await
    }

    async fn delete_like(&self, id: PinId, user_id: ProfileId) -> Result<bool> {
        let mut url = self.endpoint("likes")?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("pin_id", &format!("eq.{id}"));

        Ok(self.delete_rows(url).await? > 0)
    }

    async fn insert_comment(&self, item: Comment) -> Result<bool> {
        self.insert_row(
            "comments",
            json!({
                "id": item.id.0,
                "pin_id": item.pin_id.0,
                "user_id": item.user_id.0,
                "content": item.content,
                "created_at": timestamptz(item.created_at),
            }),
        )
        .await
    }

    async fn comments_of(&self, id: PinId) -> Result<Vec<CommentRecord>> {
        let mut url = self.endpoint("comments")?;
        url.query_pairs_mut()
            .append_pair("select", "*,author:profiles(*)")
            .append_pair("pin_id", &format!("eq.{id}"))
            .append_pair("order", "created_at.asc");

        Ok(decode_rows::<CommentRow>(self.get_rows(url).await?, "comments")
            .into_iter()
            .filter_map(CommentRow::into_record)
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for RestBackend {
    async fn insert(&self, item: Profile) -> Result<bool> {
        self.insert_row(
            "profiles",
            json!({
                "id": item.id.0,
                "username": item.username,
                "name": item.name,
                "avatar": item.avatar,
                "bio": item.bio,
                "created_at": timestamptz(item.created_at),
            }),
        )
        .await
    }

    async fn is_exists(&self, id: ProfileId) -> Result<bool> {
        let mut url = self.endpoint("profiles")?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("id", &format!("eq.{id}"));

        Ok(!self.get_rows(url).await?.is_empty())
    }

    async fn find(&self, id: ProfileId, viewer: Option<ProfileId>) -> Result<ProfileRecord> {
        let mut url = self.endpoint("profiles")?;
        url.query_pairs_mut()
            .append_pair("select", PROFILE_SELECT)
            .append_pair("id", &format!("eq.{id}"));

        let row = unique_row(self.get_rows(url).await?)?;
        let row: ProfileStatsRow = serde_json::from_value(row).map_err(|e| internal(anyhow!(e)))?;
        let mut record = row.into_record();

        record.viewer_following = match viewer {
            Some(v) => self.is_following(v, id).await?,
            None => false,
        };
        Ok(record)
    }

    async fn find_by_username(
        &self,
        username: &str,
        viewer: Option<ProfileId>,
    ) -> Result<ProfileRecord> {
        let mut url = self.endpoint("profiles")?;
        url.query_pairs_mut()
            .append_pair("select", PROFILE_SELECT)
            .append_pair("username", &format!("ilike.{}", ilike_term(username)));

        let row = unique_row(self.get_rows(url).await?)?;
        let row: ProfileStatsRow = serde_json::from_value(row).map_err(|e| internal(anyhow!(e)))?;
        let mut record = row.into_record();

        record.viewer_following = match viewer {
            Some(v) => self.is_following(v, record.profile.id).await?,
            None => false,
        };
        Ok(record)
    }

    async fn search(&self, text: &str, _viewer: Option<ProfileId>) -> Result<Vec<ProfileRecord>> {
        let term = ilike_term(text);
        let mut url = self.endpoint("profiles")?;
        url.query_pairs_mut()
            .append_pair("select", PROFILE_SELECT)
            .append_pair("or", &format!("(username.ilike.*{term}*,name.ilike.*{term}*)"));

        Ok(decode_rows::<ProfileStatsRow>(self.get_rows(url).await?, "profiles")
            .into_iter()
            .map(ProfileStatsRow::into_record)
            .collect())
    }

    async fn update(&self, id: ProfileId, mutation: ProfileMutation) -> Result<Profile> {
        let mut body = serde_json::Map::new();
        let ProfileMutation {
            username,
            name,
            avatar,
            bio,
        } = mutation;
        if let Some(val) = username {
            body.insert("username".to_string(), json!(val));
        }
        if let Some(val) = name {
            body.insert("name".to_string(), json!(val));
        }
        if let Some(val) = avatar {
            body.insert("avatar".to_string(), json!(val));
        }
        if let Some(val) = bio {
            body.insert("bio".to_string(), json!(val));
        }

        let mut url = self.endpoint("profiles")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{id}"));

        let row = unique_row(self.patch_rows(url, Value::Object(body)).await?)?;
        let row: ProfileRow = serde_json::from_value(row).map_err(|e| internal(anyhow!(e)))?;
        Ok(Profile::from(row))
    }

    async fn is_following(&self, follower_id: ProfileId, following_id: ProfileId) -> Result<bool> {
        let mut url = self.endpoint("follows")?;
        url.query_pairs_mut()
            .append_pair("select", "follower_id")
            .append_pair("follower_id", &format!("eq.{follower_id}"))
            .append_pair("following_id", &format!("eq.{following_id}"));

        Ok(!self.get_rows(url).await?.is_empty())
    }

    async fn insert_follow(
        &self,
        follower_id: ProfileId,
        following_id: ProfileId,
    ) -> Result<bool> {
        self.insert_row(
            "follows",
            json!({ "follower_id": follower_id.0, "following_id": following_id.0 }),
        )
        .await
    }

    async fn delete_follow(
        &self,
        follower_id: ProfileId,
        following_id: ProfileId,
    ) -> Result<bool> {
        let mut url = self.endpoint("follows")?;
        url.query_pairs_mut()
            .append_pair("follower_id", &format!("eq.{follower_id}"))
            .append_pair("following_id", &format!("eq.{following_id}"));

        Ok(self.delete_rows(url).await? > 0)
    }
}

#[async_trait]
impl CollectionRepository for RestBackend {
    async fn insert(&self, item: Collection) -> Result<bool> {
        self.insert_row(
            "collections",
            json!({
                "id": item.id.0,
                "name": item.name,
                "creator_id": item.creator_id.0,
                "visibility": item.visibility.as_str(),
                "created_at": timestamptz(item.created_at),
            }),
        )
        .await
    }

    async fn find(&self, id: CollectionId) -> Result<Collection> {
        let mut url = self.endpoint("collections")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{id}"));

        let row = unique_row(self.get_rows(url).await?)?;
        let row: CollectionRow = serde_json::from_value(row).map_err(|e| internal(anyhow!(e)))?;
        row.to_collection().ok_or(RepositoryError::NotFound)
    }

    async fn finds_by_creator(&self, creator_id: ProfileId) -> Result<Vec<CollectionRecord>> {
        let mut url = self.endpoint("collections")?;
        url.query_pairs_mut()
            .append_pair("select", COLLECTION_SELECT)
            .append_pair("creator_id", &format!("eq.{creator_id}"))
            .append_pair("order", "created_at.desc");

        Ok(
            decode_rows::<CollectionRow>(self.get_rows(url).await?, "collections")
                .into_iter()
                .filter_map(CollectionRow::into_record)
                .collect(),
        )
    }

    async fn search(&self, text: &str) -> Result<Vec<CollectionRecord>> {
        let mut url = self.endpoint("collections")?;
        url.query_pairs_mut()
            .append_pair("select", COLLECTION_SELECT)
            .append_pair("name", &format!("ilike.*{}*", ilike_term(text)))
            .append_pair("visibility", "eq.public");

        Ok(
            decode_rows::<CollectionRow>(self.get_rows(url).await?, "collections")
                .into_iter()
                .filter_map(CollectionRow::into_record)
                .collect(),
        )
    }

    async fn update(&self, id: CollectionId, mutation: CollectionMutation) -> Result<Collection> {
        let mut body = serde_json::Map::new();
        let CollectionMutation { name, visibility } = mutation;
        if let Some(val) = name {
            body.insert("name".to_string(), json!(val));
        }
        if let Some(val) = visibility {
            body.insert("visibility".to_string(), json!(val.as_str()));
        }

        let mut url = self.endpoint("collections")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{id}"));

        let row = unique_row(self.patch_rows(url, Value::Object(body)).await?)?;
        let row: CollectionRow = serde_json::from_value(row).map_err(|e| internal(anyhow!(e)))?;
        row.to_collection().ok_or(RepositoryError::NotFound)
    }

    async fn insert_item(&self, id: CollectionId, pin_id: PinId) -> Result<bool> {
        self.insert_row(
            "collection_items",
            json!({
                "collection_id": id.0,
                "pin_id": pin_id.0,
                "added_at": timestamptz(Utc::now()),
            }),
        )
        .await
    }

    async fn items_of(
        &self,
        id: CollectionId,
        viewer: Option<ProfileId>,
    ) -> Result<Vec<PinRecord>> {
        let mut url = self.endpoint("collection_items")?;
        url.query_pairs_mut()
            .append_pair("select", &format!("added_at,pin:pins({PIN_SELECT})"))
            .append_pair("collection_id", &format!("eq.{id}"))
            .append_pair("order", "added_at.asc");

        #[derive(Deserialize)]
        struct ItemRow {
            pin: Option<PinRow>,
        }

        let mut records: Vec<_> =
            decode_rows::<ItemRow>(self.get_rows(url).await?, "collection_items")
                .into_iter()
                .filter_map(|i| i.pin)
                .filter_map(PinRow::into_record)
                .collect();

        self.mark_viewer_likes(viewer, &mut records).await?;
        Ok(records)
    }
}

#[async_trait]
impl ModerationRepository for RestBackend {
    async fn insert_report(&self, item: Report) -> Result<bool> {
        self.insert_row(
            "reports",
            json!({
                "id": item.id.0,
                "content_type": item.content_type.as_str(),
                "content_id": item.content_id,
                "reporter_id": item.reporter_id.map(|r| r.0),
                "reason": item.reason.as_str(),
                "description": item.description,
                "created_at": timestamptz(item.created_at),
            }),
        )
        .await
    }
}

#[async_trait]
impl NotificationRepository for RestBackend {
    async fn recent(
        &self,
        recipient_id: ProfileId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>> {
        let mut url = self.endpoint("notifications")?;
        url.query_pairs_mut()
            .append_pair("select", "*,sender:profiles(*)")
            .append_pair("recipient_id", &format!("eq.{recipient_id}"))
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &limit.to_string());

        Ok(
            decode_rows::<NotificationRow>(self.get_rows(url).await?, "notifications")
                .into_iter()
                .filter_map(NotificationRow::into_record)
                .collect(),
        )
    }

    async fn mark_read(&self, id: NotificationId) -> Result<bool> {
        // Filtering on `read` makes the representation empty when the row
        // was already read, which is exactly the "changed" answer.
        let mut url = self.endpoint("notifications")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("read", "eq.false");

        Ok(!self
            .patch_rows(url, json!({ "read": true }))
            .await?
            .is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        RestBackend::new("https://demo.example.co", "anon-key").unwrap()
    }

    #[test]
    fn endpoint_joins_under_rest_v1() {
        let url = backend().endpoint("pins").unwrap();
        assert_eq!(url.as_str(), "https://demo.example.co/rest/v1/pins");
    }

    #[test]
    fn malformed_rows_are_skipped_not_propagated() {
        let rows = vec![
            json!({
                "id": "00000000-0000-0000-0000-000000000001",
                "image_url": "https://img.example/a.jpg",
                "title": "A",
                "creator_id": "00000000-0000-0000-0000-000000000009",
                "created_at": "2024-01-15T10:00:00Z",
                "creator": {
                    "id": "00000000-0000-0000-0000-000000000009",
                    "username": "a",
                    "name": "A",
                    "created_at": "2024-01-01T00:00:00Z"
                },
                "likes": [{ "count": 3 }],
                "comments": []
            }),
            json!({ "id": "not-a-uuid", "title": 7 }),
        ];

        let decoded = decode_rows::<PinRow>(rows, "pins");
        assert_eq!(decoded.len(), 1);

        let record = decoded.into_iter().next().unwrap().into_record().unwrap();
        assert_eq!(record.like_count, 3);
        assert_eq!(record.comment_count, 0);
        assert_eq!(record.creator.username, "a");
        assert!(!record.viewer_liked);
    }

    #[test]
    fn pin_row_without_creator_is_dropped() {
        let row: PinRow = serde_json::from_value(json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "image_url": "https://img.example/a.jpg",
            "title": "A",
            "creator_id": "00000000-0000-0000-0000-000000000009",
            "created_at": "2024-01-15T10:00:00Z",
            "creator": null
        }))
        .unwrap();

        assert!(row.into_record().is_none());
    }

    #[test]
    fn unique_row_maps_cardinality_to_errors() {
        assert!(matches!(
            unique_row(vec![]),
            Err(RepositoryError::NotFound)
        ));
        assert!(unique_row(vec![json!({})]).is_ok());
        assert!(matches!(
            unique_row(vec![json!({}), json!({})]),
            Err(RepositoryError::NoUnique { matched: 2 })
        ));
    }

    #[test]
    fn ilike_terms_lose_filter_delimiters() {
        assert_eq!(ilike_term("coffee"), "coffee");
        assert_eq!(ilike_term("a,b(c)d*e%f\"g"), "abcdefg");
    }

    #[test]
    fn collection_row_with_unknown_visibility_is_dropped() {
        let row: CollectionRow = serde_json::from_value(json!({
            "id": "00000000-0000-0000-0000-000000000002",
            "name": "Morning",
            "creator_id": "00000000-0000-0000-0000-000000000009",
            "visibility": "friends-only",
            "created_at": "2024-01-15T10:00:00Z"
        }))
        .unwrap();

        assert!(row.to_collection().is_none());
    }

    #[test]
    fn notification_row_decodes_kind_and_sender() {
        let rows = vec![json!({
            "id": "00000000-0000-0000-0000-000000000003",
            "recipient_id": "00000000-0000-0000-0000-000000000009",
            "sender_id": "00000000-0000-0000-0000-00000000000a",
            "type": "like",
            "content_type": "pin",
            "content_id": "42",
            "message": "someone liked your pin",
            "read": false,
            "created_at": "2024-01-15T10:00:00Z",
            "sender": {
                "id": "00000000-0000-0000-0000-00000000000a",
                "username": "jane",
                "name": "Jane",
                "created_at": "2024-01-01T00:00:00Z"
            }
        })];

        let records: Vec<_> = decode_rows::<NotificationRow>(rows, "notifications")
            .into_iter()
            .filter_map(NotificationRow::into_record)
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].notification.kind,
            crate::entities::NotificationKind::Like
        );
        assert_eq!(records[0].notification.content_id.as_deref(), Some("42"));
        assert_eq!(records[0].sender.as_ref().unwrap().username, "jane");
    }

    #[test]
    fn feed_cursor_timestamp_is_utc_rfc3339() {
        let at = DateTime::from_timestamp(1_705_312_800, 0).unwrap_or_default();
        assert_eq!(timestamptz(at), "2024-01-15T10:00:00.000000Z");
    }
}
