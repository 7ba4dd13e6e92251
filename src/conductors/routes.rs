//! The app's path grammar.
//!
//! `Route::parse` never fails: anything it does not recognize is the
//! not-found route, and a recognized path with a malformed id falls there
//! too instead of half-parsing.

use std::fmt;

use url::form_urlencoded;

use crate::entities::{CollectionId, PinId, ProfileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchCategory {
    #[default]
    Images,
    Collections,
    People,
    Trending,
}

impl SearchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Collections => "collections",
            Self::People => "people",
            Self::Trending => "trending",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "images" => Some(Self::Images),
            "collections" => Some(Self::Collections),
            "people" => Some(Self::People),
            "trending" => Some(Self::Trending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchParams {
    pub query: String,
    pub category: SearchCategory,
    /// Phrase that must appear verbatim.
    pub exact: Option<String>,
    /// Comma-separated terms none of which may appear.
    pub exclude: Vec<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Create,
    Pin(PinId),
    /// `None` is the signed-in user's own profile.
    Profile(Option<ProfileId>),
    ProfileSetup,
    Collection(CollectionId),
    Search(SearchParams),
    Upgrade,
    Login,
    NotFound,
}

impl Route {
    pub fn parse(location: &str) -> Route {
        let (path, query) = match location.split_once('?') {
            Some((p, q)) => (p, q),
            None => (location, ""),
        };

        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match *segments.as_slice() {
            [] => Route::Home,
            ["create"] => Route::Create,
            ["pin", id] => match id.parse() {
                Ok(id) => Route::Pin(id),
                Err(_) => Route::NotFound,
            },
            ["profile"] => Route::Profile(None),
            ["profile", "setup"] => Route::ProfileSetup,
            ["profile", id] => match id.parse() {
                Ok(id) => Route::Profile(Some(id)),
                Err(_) => Route::NotFound,
            },
            ["collection", id] => match id.parse() {
                Ok(id) => Route::Collection(id),
                Err(_) => Route::NotFound,
            },
            ["search"] => Route::Search(parse_search(query)),
            ["upgrade"] => Route::Upgrade,
            ["login"] => Route::Login,
            _ => Route::NotFound,
        }
    }

    /// Routes that need someone signed in before they render.
    pub fn requires_actor(&self) -> bool {
        matches!(
            self,
            Route::Create | Route::ProfileSetup | Route::Upgrade | Route::Profile(None)
        )
    }
}

fn parse_search(query: &str) -> SearchParams {
    let mut params = SearchParams::default();
    let mut category = None;
    let mut type_alias = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "q" => params.query = value.into_owned(),
            "category" => category = SearchCategory::parse(&value),
            "type" => type_alias = SearchCategory::parse(&value),
            "exact" => params.exact = some_nonempty(&value),
            "author" => params.author = some_nonempty(&value),
            "exclude" => {
                params.exclude = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            _ => {}
        }
    }

    // `type` is the legacy spelling; `category` wins when both appear.
    params.category = category.or(type_alias).unwrap_or_default();
    params
}

fn some_nonempty(value: &str) -> Option<String> {
    match value.trim().is_empty() {
        true => None,
        false => Some(value.trim().to_string()),
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => write!(f, "/"),
            Route::Create => write!(f, "/create"),
            Route::Pin(id) => write!(f, "/pin/{id}"),
            Route::Profile(None) => write!(f, "/profile"),
            Route::Profile(Some(id)) => write!(f, "/profile/{id}"),
            Route::ProfileSetup => write!(f, "/profile/setup"),
            Route::Collection(id) => write!(f, "/collection/{id}"),
            Route::Search(params) => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                serializer.append_pair("q", &params.query);
                if params.category != SearchCategory::default() {
                    serializer.append_pair("category", params.category.as_str());
                }
                if let Some(exact) = &params.exact {
                    serializer.append_pair("exact", exact);
                }
                if !params.exclude.is_empty() {
                    serializer.append_pair("exclude", &params.exclude.join(","));
                }
                if let Some(author) = &params.author {
                    serializer.append_pair("author", author);
                }
                write!(f, "/search?{}", serializer.finish())
            }
            Route::Upgrade => write!(f, "/upgrade"),
            Route::Login => write!(f, "/login"),
            Route::NotFound => write!(f, "/404"),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn static_paths_parse_with_or_without_trailing_slash() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/create"), Route::Create);
        assert_eq!(Route::parse("/create/"), Route::Create);
        assert_eq!(Route::parse("/upgrade"), Route::Upgrade);
        assert_eq!(Route::parse("/login"), Route::Login);
        assert_eq!(Route::parse("/nope"), Route::NotFound);
        assert_eq!(Route::parse("/pin/1/extra"), Route::NotFound);
    }

    #[test]
    fn id_segments_must_be_well_formed() {
        let id = Uuid::from_u128(7);
        assert_eq!(
            Route::parse(&format!("/pin/{id}")),
            Route::Pin(PinId(id))
        );
        assert_eq!(Route::parse("/pin/not-a-uuid"), Route::NotFound);
        assert_eq!(
            Route::parse(&format!("/collection/{id}")),
            Route::Collection(CollectionId(id))
        );
    }

    #[test]
    fn profile_setup_is_not_a_profile_id() {
        let id = Uuid::from_u128(9);

        assert_eq!(Route::parse("/profile"), Route::Profile(None));
        assert_eq!(Route::parse("/profile/setup"), Route::ProfileSetup);
        assert_eq!(
            Route::parse(&format!("/profile/{id}")),
            Route::Profile(Some(ProfileId(id)))
        );
        assert_eq!(Route::parse("/profile/someone"), Route::NotFound);
    }

    #[test]
    fn search_reads_every_filter() {
        let route = Route::parse(
            "/search?q=coffee+shop&category=people&exact=latte%20art&exclude=decaf,instant&author=jane",
        );

        match route {
            Route::Search(params) => {
                assert_eq!(params.query, "coffee shop");
                assert_eq!(params.category, SearchCategory::People);
                assert_eq!(params.exact.as_deref(), Some("latte art"));
                assert_eq!(params.exclude, vec!["decaf", "instant"]);
                assert_eq!(params.author.as_deref(), Some("jane"));
            }
            other => panic!("expected a search route, got {other:?}"),
        }
    }

    #[test]
    fn category_beats_the_type_alias_and_unknowns_default() {
        match Route::parse("/search?q=x&type=people") {
            Route::Search(params) => assert_eq!(params.category, SearchCategory::People),
            other => panic!("unexpected {other:?}"),
        }

        match Route::parse("/search?q=x&type=people&category=trending") {
            Route::Search(params) => assert_eq!(params.category, SearchCategory::Trending),
            other => panic!("unexpected {other:?}"),
        }

        match Route::parse("/search?q=x&category=everything") {
            Route::Search(params) => assert_eq!(params.category, SearchCategory::Images),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn displayed_routes_parse_back_to_themselves() {
        let routes = vec![
            Route::Home,
            Route::Create,
            Route::Pin(PinId(Uuid::from_u128(1))),
            Route::Profile(None),
            Route::Profile(Some(ProfileId(Uuid::from_u128(2)))),
            Route::ProfileSetup,
            Route::Collection(CollectionId(Uuid::from_u128(3))),
            Route::Search(SearchParams {
                query: "coffee shop".to_string(),
                category: SearchCategory::Trending,
                exact: Some("latte art".to_string()),
                exclude: vec!["decaf".to_string()],
                author: Some("jane".to_string()),
            }),
            Route::Upgrade,
            Route::Login,
        ];

        for route in routes {
            assert_eq!(Route::parse(&route.to_string()), route);
        }
    }

    #[test]
    fn guarded_routes_are_exactly_the_signed_in_surface() {
        assert!(Route::Create.requires_actor());
        assert!(Route::ProfileSetup.requires_actor());
        assert!(Route::Upgrade.requires_actor());
        assert!(Route::Profile(None).requires_actor());

        assert!(!Route::Home.requires_actor());
        assert!(!Route::Login.requires_actor());
        assert!(!Route::Profile(Some(ProfileId(Uuid::from_u128(1)))).requires_actor());
    }
}
