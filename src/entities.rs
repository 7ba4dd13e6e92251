use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use uuid::Uuid;

macro_rules! id_types {
    ($($name:ident),* $(,)?) => {$(
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
        }

        impl FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    )*};
}

id_types! { PinId, ProfileId, CollectionId, CommentId, ReportId, NotificationId }

#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub id: PinId,
    pub image_url: String,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: ProfileId,
    pub created_at: DateTime<Utc>,
    pub promoted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub username: String,
    pub name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub creator_id: ProfileId,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionItem {
    pub collection_id: CollectionId,
    pub pin_id: PinId,
    pub added_at: DateTime<Utc>,
}

/// Join row of Profile x Pin, unique per pair (enforced server-side).
#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub user_id: ProfileId,
    pub pin_id: PinId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub pin_id: PinId,
    pub user_id: ProfileId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Join row of Profile x Profile, unique per pair (enforced server-side).
#[derive(Debug, Clone, PartialEq)]
pub struct Follow {
    pub follower_id: ProfileId,
    pub following_id: ProfileId,
    pub created_at: DateTime<Utc>,
}

/// References the offending content by loose id so any entity kind can be
/// reported through the same row shape.  Inserted, never mutated by the
/// client.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: ReportId,
    pub content_type: ContentType,
    pub content_id: String,
    pub reporter_id: Option<ProfileId>,
    pub reason: ReportReason,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: ProfileId,
    pub sender_id: Option<ProfileId>,
    pub kind: NotificationKind,
    pub content_type: Option<ContentType>,
    pub content_id: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

macro_rules! str_enum {
    ($name:ident { $($variant:ident => $repr:expr),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $repr,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s {
                    $($repr => Ok(Self::$variant),)*
                    _ => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

str_enum! { Visibility {
    Public => "public",
    Private => "private",
    Unlisted => "unlisted",
} }

str_enum! { ContentType {
    Pin => "pin",
    Profile => "profile",
    Collection => "collection",
} }

str_enum! { ReportReason {
    Inappropriate => "inappropriate",
    Spam => "spam",
    Harassment => "harassment",
    Copyright => "copyright",
    Other => "other",
} }

str_enum! { NotificationKind {
    Like => "like",
    Comment => "comment",
    Reply => "reply",
    Follow => "follow",
    Mention => "mention",
} }

/// 3-20 chars, ascii alphanumerics and underscore only.
pub fn is_valid_username(s: &str) -> bool {
    ::lazy_static::lazy_static! {
        static ref PATTERN: Regex = Regex::new("^[a-zA-Z0-9_]{3,20}$").unwrap();
    }

    PATTERN.is_match(s)
}

#[test]
fn username_pattern() {
    assert!(is_valid_username("jane_smith"));
    assert!(is_valid_username("abc"));
    assert!(is_valid_username("A1234567890123456789"));

    assert!(!is_valid_username("ab"));
    assert!(!is_valid_username("way_too_long_for_a_username"));
    assert!(!is_valid_username("spaced out"));
    assert!(!is_valid_username("dashed-name"));
    assert!(!is_valid_username(""));
}

#[test]
fn enum_reprs_round_trip() {
    assert_eq!("public".parse::<Visibility>().unwrap(), Visibility::Public);
    assert_eq!(Visibility::Unlisted.as_str(), "unlisted");
    assert_eq!("spam".parse::<ReportReason>().unwrap(), ReportReason::Spam);
    assert_eq!(ContentType::Pin.to_string(), "pin");
    assert_eq!(
        "follow".parse::<NotificationKind>().unwrap(),
        NotificationKind::Follow
    );
    assert!("banana".parse::<ReportReason>().is_err());
}
