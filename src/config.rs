use clap::Parser;

/// Command line and environment configuration.
///
/// Every flag also reads a `LUMIERE_*` environment variable, so the
/// binary runs unconfigured against the in-memory demo data.
#[derive(Debug, Parser)]
#[command(name = "lumiere", version, about = "A pin board client core")]
pub struct Config {
    /// PostgREST endpoint; the in-memory demo backend when unset.
    #[arg(long, env = "LUMIERE_BASE_URL")]
    pub base_url: Option<String>,

    /// API key sent as both the apikey header and the bearer token.
    #[arg(long, env = "LUMIERE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Starting viewport width in css pixels.
    #[arg(long, env = "LUMIERE_VIEWPORT", default_value_t = 1440)]
    pub viewport_width: u32,

    /// Pins per feed page.
    #[arg(long, env = "LUMIERE_FEED_PAGE", default_value_t = 30)]
    pub feed_page: usize,

    /// Quiet window before a resize is considered settled, in milliseconds.
    #[arg(long, env = "LUMIERE_DEBOUNCE_MS", default_value_t = 150)]
    pub debounce_ms: u64,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_coherent() {
        Config::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let config =
            Config::parse_from(["lumiere", "--viewport-width", "1024", "--feed-page", "12"]);

        assert_eq!(config.viewport_width, 1024);
        assert_eq!(config.feed_page, 12);
        assert_eq!(config.debounce_ms, 150);
        assert!(config.base_url.is_none());
    }
}
