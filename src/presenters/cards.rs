//! View models that carry per-item interaction state.
//!
//! Repository records are plain data; a card wraps one with the optimistic
//! toggle, the reveal gate and the image lifecycle its surface needs.

use chrono::{DateTime, Utc};

use crate::actions::ToggleState;
use crate::entities::{PinId, Profile, ProfileId};
use crate::repositories::{FeedSlice, PinRecord, ProfileRecord};
use crate::visibility::{ImageSlot, RevealGate};

/// Height over width assumed for a card until its image reports a size.
pub const FALLBACK_ASPECT: f32 = 1.25;

#[derive(Debug, Clone, PartialEq)]
pub struct PinCard {
    pub id: PinId,
    pub image_url: String,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: ProfileId,
    pub creator_username: String,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    pub promoted: bool,
    pub created_at: DateTime<Utc>,
    pub comment_count: u64,
    pub like: ToggleState,
    pub image: ImageSlot,
    pub reveal: RevealGate,
}

impl PinCard {
    pub fn from_record(record: PinRecord) -> Self {
        let PinRecord {
            pin,
            creator,
            like_count,
            comment_count,
            viewer_liked,
        } = record;

        Self {
            id: pin.id,
            image_url: pin.image_url,
            title: pin.title,
            description: pin.description,
            creator_id: creator.id,
            creator_username: creator.username,
            creator_name: creator.name,
            creator_avatar: creator.avatar,
            promoted: pin.promoted,
            created_at: pin.created_at,
            comment_count,
            like: ToggleState::new(viewer_liked, like_count),
            image: ImageSlot::new(FALLBACK_ASPECT),
            reveal: RevealGate::new(),
        }
    }

    pub fn aspect(&self) -> f32 { self.image.aspect() }
}

/// One scrollable grid of cards plus its pagination cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub cards: Vec<PinCard>,
    pub next_before: Option<DateTime<Utc>>,
}

impl FeedView {
    pub fn from_slice(slice: FeedSlice) -> Self {
        Self {
            cards: slice.records.into_iter().map(PinCard::from_record).collect(),
            next_before: slice.next_before,
        }
    }

    /// A grid without pagination, for search results and profile tabs.
    pub fn from_records(records: Vec<PinRecord>) -> Self {
        Self {
            cards: records.into_iter().map(PinCard::from_record).collect(),
            next_before: None,
        }
    }

    pub fn len(&self) -> usize { self.cards.len() }

    pub fn is_empty(&self) -> bool { self.cards.is_empty() }

    pub fn can_load_more(&self) -> bool { self.next_before.is_some() }

    /// Appends the next page and advances the cursor.
    pub fn push_slice(&mut self, slice: FeedSlice) {
        self.cards
            .extend(slice.records.into_iter().map(PinCard::from_record));
        self.next_before = slice.next_before;
    }

    pub fn card_mut(&mut self, id: PinId) -> Option<&mut PinCard> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// Aspect ratios in feed order, ready for the masonry planner.
    pub fn aspects(&self) -> Vec<f32> {
        self.cards.iter().map(PinCard::aspect).collect()
    }

    /// Detaches every in-flight toggle, for when the grid is rebuilt from
    /// fresh records.
    pub fn invalidate(&mut self) {
        for card in &mut self.cards {
            card.like.invalidate();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileCard {
    pub profile: Profile,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub follow: ToggleState,
}

impl ProfileCard {
    pub fn from_record(record: ProfileRecord) -> Self {
        let ProfileRecord {
            profile,
            follower_count,
            following_count,
            post_count,
            viewer_following,
        } = record;

        Self {
            profile,
            follower_count,
            following_count,
            post_count,
            follow: ToggleState::new(viewer_following, follower_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::entities::Pin;

    fn record(id: u128, liked: bool) -> PinRecord {
        PinRecord {
            pin: Pin {
                id: PinId(Uuid::from_u128(id)),
                image_url: "https://img.example/a.jpg".to_string(),
                title: "A".to_string(),
                description: None,
                creator_id: ProfileId(Uuid::from_u128(0x99)),
                created_at: DateTime::from_timestamp(1_705_312_800 + id as i64, 0)
                    .unwrap_or_default(),
                promoted: false,
            },
            creator: Profile {
                id: ProfileId(Uuid::from_u128(0x99)),
                username: "a".to_string(),
                name: "A".to_string(),
                avatar: None,
                bio: None,
                created_at: DateTime::from_timestamp(0, 0).unwrap_or_default(),
            },
            like_count: 2,
            comment_count: 1,
            viewer_liked: liked,
        }
    }

    #[test]
    fn cards_seed_their_toggle_from_the_record() {
        let card = PinCard::from_record(record(1, true));

        assert!(card.like.engaged());
        assert_eq!(card.like.count(), 2);
        assert_eq!(card.comment_count, 1);
        assert!(!card.reveal.is_revealed());
        assert_eq!(card.aspect(), FALLBACK_ASPECT);
    }

    #[test]
    fn pages_append_and_move_the_cursor() {
        let first = FeedSlice {
            records: vec![record(1, false), record(2, false)],
            next_before: DateTime::from_timestamp(1_705_312_800, 0),
        };
        let mut feed = FeedView::from_slice(first);
        assert_eq!(feed.len(), 2);
        assert!(feed.can_load_more());

        feed.push_slice(FeedSlice {
            records: vec![record(3, false)],
            next_before: None,
        });

        assert_eq!(feed.len(), 3);
        assert!(!feed.can_load_more());
        assert!(feed.card_mut(PinId(Uuid::from_u128(3))).is_some());
    }

    #[test]
    fn invalidate_detaches_pending_toggles() {
        let mut feed = FeedView::from_records(vec![record(1, false)]);
        let ticket = feed.cards[0].like.begin().unwrap();

        feed.invalidate();
        assert!(!feed.cards[0].like.commit(ticket, true));
    }
}
