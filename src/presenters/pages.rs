use crate::conductors::routes::SearchParams;
use crate::entities::Collection;
use crate::presenters::cards::{FeedView, PinCard, ProfileCard};
use crate::repositories::{CollectionRecord, CommentRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeTier {
    pub name: &'static str,
    pub price: &'static str,
    pub features: &'static [&'static str],
    pub popular: bool,
}

pub const UPGRADE_TIERS: &[UpgradeTier] = &[
    UpgradeTier {
        name: "Basic",
        price: "Free",
        features: &[
            "High-quality image uploads",
            "Basic compression",
            "Create unlimited pins",
            "Join the community",
        ],
        popular: false,
    },
    UpgradeTier {
        name: "Pro",
        price: "$9.99",
        features: &[
            "Everything in Basic",
            "Full resolution uploads",
            "No compression",
            "Advanced analytics",
            "Priority support",
        ],
        popular: true,
    },
    UpgradeTier {
        name: "Enterprise",
        price: "$29.99",
        features: &[
            "Everything in Pro",
            "Custom branding",
            "API access",
            "Dedicated support",
            "Early access features",
        ],
        popular: false,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePage {
    pub card: ProfileCard,
    pub pins: FeedView,
    pub collections: Vec<CollectionRecord>,
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchResults {
    Images(FeedView),
    Collections(Vec<CollectionRecord>),
    People(Vec<ProfileCard>),
    Trending(FeedView),
}

impl SearchResults {
    pub fn len(&self) -> usize {
        match self {
            Self::Images(feed) | Self::Trending(feed) => feed.len(),
            Self::Collections(items) => items.len(),
            Self::People(people) => people.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Everything a route resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Home(FeedView),
    PinDetail {
        card: Box<PinCard>,
        comments: Vec<CommentRecord>,
    },
    Search {
        params: SearchParams,
        results: SearchResults,
    },
    Profile(Box<ProfilePage>),
    Collection {
        collection: Collection,
        pins: FeedView,
    },
    Create,
    ProfileSetup,
    Upgrade(&'static [UpgradeTier]),
    Login,
    NotFound,
}

impl Page {
    pub fn name(&self) -> &'static str {
        match self {
            Page::Home(_) => "home",
            Page::PinDetail { .. } => "pin",
            Page::Search { .. } => "search",
            Page::Profile(_) => "profile",
            Page::Collection { .. } => "collection",
            Page::Create => "create",
            Page::ProfileSetup => "profile-setup",
            Page::Upgrade(_) => "upgrade",
            Page::Login => "login",
            Page::NotFound => "not-found",
        }
    }
}

#[test]
fn the_pro_tier_is_the_highlighted_one() {
    assert_eq!(UPGRADE_TIERS.len(), 3);

    let popular: Vec<_> = UPGRADE_TIERS.iter().filter(|t| t.popular).collect();
    assert_eq!(popular.len(), 1);
    assert_eq!(popular[0].name, "Pro");
    assert_eq!(popular[0].price, "$9.99");

    assert_eq!(UPGRADE_TIERS[0].price, "Free");
}
