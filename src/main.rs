use std::io::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use lumiere::conductors::Navigation;
use lumiere::config::Config;
use lumiere::entities::{ContentType, ProfileId, ReportReason, Visibility};
use lumiere::layout::GridController;
use lumiere::presenters::cards::FeedView;
use lumiere::presenters::pages::{Page, SearchResults};
use lumiere::repositories::memory::{DEMO_JANE, DEMO_JOHN};
use lumiere::repositories::{NotificationRecord, ProfileMutation};
use lumiere::{in_memory, rest, App};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name_fn(|| {
            static NUM: AtomicU32 = AtomicU32::new(0);
            format!("lumiere-worker-{}", NUM.fetch_add(1, Ordering::Relaxed))
        })
        .build()
    {
        Ok(r) => r,
        Err(e) => return eprintln!("cannot build the runtime: {e}"),
    };

    rt.block_on(async_main(config))
}

async fn async_main(config: Config) {
    let mut app = match (&config.base_url, &config.api_key) {
        (Some(url), Some(key)) => match rest(url, key) {
            Ok(a) => a,
            Err(e) => return eprintln!("cannot configure the rest backend: {e}"),
        },
        (Some(_), None) => return eprintln!("--api-key is required with --base-url"),
        (None, _) => in_memory(),
    };
    app.conductor.feed_page = config.feed_page;

    let backend = match config.base_url {
        Some(_) => "rest",
        None => "memory",
    };
    let grid = GridController::new(
        config.viewport_width,
        Duration::from_millis(config.debounce_ms),
    );
    info!(backend, columns = grid.columns(), "ready");

    let mut shell = Shell {
        app,
        grid,
        page: None,
        notifications: vec![],
        debounce: Duration::from_millis(config.debounce_ms),
    };

    println!("lumiere, type `help` for commands");
    shell.open("/").await;
    shell.drain_notices();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Ok(Some(line)) = lines.next_line().await {
        let words = match shell_words::split(&line) {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                prompt();
                continue;
            }
        };
        if words.is_empty() {
            prompt();
            continue;
        }

        match ReplLine::try_parse_from(&words) {
            Ok(ReplLine {
                command: ReplCommand::Quit,
            }) => break,
            Ok(ReplLine { command }) => shell.dispatch(command).await,
            Err(e) => println!("{e}"),
        }

        shell.drain_notices();
        prompt();
    }
}

fn prompt() {
    print!("> ");
    let _ = ::std::io::stdout().flush();
}

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct ReplLine {
    #[command(subcommand)]
    command: ReplCommand,
}

#[derive(Debug, Subcommand)]
enum ReplCommand {
    /// Render the page at a path, e.g. `open /search?q=coffee`.
    Open { path: String },
    /// Sign in as a profile id, or the shorthands `john` and `jane`.
    Login { who: String },
    /// Sign out.
    Logout,
    /// Toggle a like on the n-th card of the current feed.
    Like { index: usize },
    /// Toggle follow on the profile being viewed.
    Follow,
    /// Comment on the open pin, or on the n-th card of the feed.
    Comment { index: usize, text: Vec<String> },
    /// Report the open pin or the n-th card.
    Report {
        index: usize,
        reason: String,
        text: Vec<String>,
    },
    /// Save the n-th card to one of your collections.
    Save { index: usize, collection: String },
    /// Create a collection, optionally seeding it with the n-th card.
    Collect {
        name: String,
        index: Option<usize>,
        #[arg(long)]
        private: bool,
    },
    /// Load the next feed page.
    More,
    /// Publish a pin.
    Pin {
        image_url: String,
        title: String,
        description: Vec<String>,
    },
    /// Create your profile.
    Setup { username: String, name: Vec<String> },
    /// Edit your profile.
    Edit {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Report a new viewport width in css pixels.
    Resize { width: u32 },
    /// List your notifications.
    Notifications,
    /// Open the n-th notification.
    Read { index: usize },
    /// Pick a plan on the upgrade page.
    Buy { tier: String },
    /// Leave.
    Quit,
}

struct Shell {
    app: App,
    grid: GridController,
    page: Option<Page>,
    notifications: Vec<NotificationRecord>,
    debounce: Duration,
}

impl Shell {
    async fn dispatch(&mut self, command: ReplCommand) {
        match command {
            ReplCommand::Open { path } => self.open(&path).await,
            ReplCommand::Login { who } => self.login(&who).await,
            ReplCommand::Logout => {
                self.app.conductor.sign_out().await;
                println!("signed out");
            }
            ReplCommand::Like { index } => self.like(index).await,
            ReplCommand::Follow => self.follow().await,
            ReplCommand::Comment { index, text } => self.comment(index, &text.join(" ")).await,
            ReplCommand::Report {
                index,
                reason,
                text,
            } => self.report(index, &reason, &text.join(" ")).await,
            ReplCommand::Save { index, collection } => self.save(index, &collection).await,
            ReplCommand::Collect {
                name,
                index,
                private,
            } => self.collect(&name, index, private).await,
            ReplCommand::More => self.more().await,
            ReplCommand::Pin {
                image_url,
                title,
                description,
            } => self.pin(&image_url, &title, &description.join(" ")).await,
            ReplCommand::Setup { username, name } => {
                self.setup(&username, &name.join(" ")).await
            }
            ReplCommand::Edit {
                username,
                name,
                avatar,
                bio,
            } => {
                let mutation = ProfileMutation {
                    username,
                    name,
                    avatar,
                    bio,
                };
                if let Some(profile) = self.app.conductor.save_profile(mutation).await {
                    println!("profile saved: @{}", profile.username);
                }
            }
            ReplCommand::Resize { width } => self.resize(width).await,
            ReplCommand::Notifications => self.notifications().await,
            ReplCommand::Read { index } => self.read(index).await,
            ReplCommand::Buy { tier } => self.app.conductor.select_upgrade(&tier),
            // Handled by the loop.
            ReplCommand::Quit => {}
        }
    }

    async fn open(&mut self, path: &str) {
        let mut location = path.to_string();

        // A couple of hops covers every guard chain.
        for _ in 0..4 {
            match self.app.conductor.navigate(&location).await {
                Ok(Navigation::Page(page)) => {
                    self.render(&page);
                    self.page = Some(page);
                    return;
                }
                Ok(Navigation::Redirect(route)) => {
                    println!("-> {route}");
                    location = route.to_string();
                }
                Err(e) => return println!("error: {e}"),
            }
        }
    }

    async fn login(&mut self, who: &str) {
        let id = match who {
            "john" => DEMO_JOHN,
            "jane" => DEMO_JANE,
            other => match other.parse::<ProfileId>() {
                Ok(id) => id,
                Err(_) => return println!("not a profile id: {other}"),
            },
        };

        match self.app.conductor.sign_in(id).await {
            Ok(actor) => match actor.needs_setup() {
                true => println!("signed in; run `setup <username> <name>` to finish"),
                false => println!(
                    "signed in as {}",
                    actor.display_name().unwrap_or("someone")
                ),
            },
            Err(e) => println!("sign-in failed: {e}"),
        }
    }

    async fn like(&mut self, index: usize) {
        let Self { app, page, .. } = self;
        let Some(feed) = feed_of(page) else {
            return println!("no feed on this page");
        };
        let Some(card) = feed.cards.get_mut(index) else {
            return println!("no card [{index}]");
        };

        app.conductor.toggle_like(card).await;
        println!("{} likes on {:?}", card.like.count(), card.title);
    }

    async fn follow(&mut self) {
        let Self { app, page, .. } = self;
        let Some(Page::Profile(view)) = page else {
            return println!("open a profile first");
        };

        app.conductor.toggle_follow(&mut view.card).await;
        println!(
            "@{} now has {} followers",
            view.card.profile.username,
            view.card.follow.count()
        );
    }

    async fn comment(&mut self, index: usize, text: &str) {
        let Self { app, page, .. } = self;
        match page {
            Some(Page::PinDetail { card, comments }) => {
                if let Some(record) = app.conductor.submit_comment(card.id, text).await {
                    card.comment_count += 1;
                    comments.push(record);
                }
            }
            other => {
                let Some(feed) = feed_of(other) else {
                    return println!("nothing to comment on here");
                };
                let Some(card) = feed.cards.get(index) else {
                    return println!("no card [{index}]");
                };
                app.conductor.submit_comment(card.id, text).await;
            }
        }
    }

    async fn report(&mut self, index: usize, reason: &str, text: &str) {
        let reason: ReportReason = match reason.parse() {
            Ok(r) => r,
            Err(e) => return println!("{e} (try spam, inappropriate, harassment, copyright or other)"),
        };

        let target = match &self.page {
            Some(Page::PinDetail { card, .. }) => card.id,
            other => {
                let Some(feed) = feed_ref(other) else {
                    return println!("nothing to report here");
                };
                let Some(card) = feed.cards.get(index) else {
                    return println!("no card [{index}]");
                };
                card.id
            }
        };

        let description = match text.is_empty() {
            true => None,
            false => Some(text),
        };
        self.app
            .conductor
            .submit_report(ContentType::Pin, &target.to_string(), reason, description)
            .await;
    }

    async fn save(&mut self, index: usize, collection: &str) {
        let collection = match collection.parse() {
            Ok(id) => id,
            Err(_) => return println!("not a collection id: {collection}"),
        };

        let Some(feed) = feed_ref(&self.page) else {
            return println!("no feed on this page");
        };
        let Some(card) = feed.cards.get(index) else {
            return println!("no card [{index}]");
        };

        let pin_id = card.id;
        self.app.conductor.save_pin_to(collection, pin_id).await;
    }

    async fn collect(&mut self, name: &str, index: Option<usize>, private: bool) {
        let pin_id = match index {
            Some(index) => {
                let Some(feed) = feed_ref(&self.page) else {
                    return println!("no feed on this page");
                };
                match feed.cards.get(index) {
                    Some(card) => Some(card.id),
                    None => return println!("no card [{index}]"),
                }
            }
            None => None,
        };

        let visibility = match private {
            true => Visibility::Private,
            false => Visibility::Public,
        };
        if let Some(collection) = self
            .app
            .conductor
            .create_collection_with_pin(name, visibility, pin_id)
            .await
        {
            println!("created {:?} ({})", collection.name, collection.id);
        }
    }

    async fn more(&mut self) {
        let Self { app, page, .. } = self;
        let Some(feed) = feed_of(page) else {
            return println!("no feed on this page");
        };

        let before = feed.len();
        app.conductor.load_more(feed).await;
        match feed.len() - before {
            0 => println!("nothing more"),
            n => println!("{n} more pins"),
        }
    }

    async fn pin(&mut self, image_url: &str, title: &str, description: &str) {
        let description = match description.is_empty() {
            true => None,
            false => Some(description),
        };
        if let Some(pin) = self
            .app
            .conductor
            .submit_pin(image_url, title, description)
            .await
        {
            println!("published {}", pin.id);
        }
    }

    async fn setup(&mut self, username: &str, name: &str) {
        let name = match name.is_empty() {
            true => username,
            false => name,
        };
        if let Some(profile) = self
            .app
            .conductor
            .setup_profile(username, name, None, None)
            .await
        {
            println!("welcome, @{}", profile.username);
        }
    }

    async fn resize(&mut self, width: u32) {
        self.grid.resize(width, Instant::now());
        tokio::time::sleep(self.debounce + Duration::from_millis(20)).await;

        match self.grid.poll(Instant::now()) {
            Some(columns) => println!("layout now {columns} columns"),
            None => println!("still {} columns", self.grid.columns()),
        }
    }

    async fn notifications(&mut self) {
        self.notifications = self.app.conductor.notifications().await;
        if self.notifications.is_empty() {
            return println!("nothing new");
        }

        for (i, item) in self.notifications.iter().enumerate() {
            let mark = match item.notification.read {
                true => ' ',
                false => '*',
            };
            println!("[{i}]{mark} {}", item.notification.message);
        }
    }

    async fn read(&mut self, index: usize) {
        let Some(item) = self.notifications.get(index).cloned() else {
            return println!("no notification [{index}]");
        };

        match self.app.conductor.open_notification(&item).await {
            Some(route) => self.open(&route.to_string()).await,
            None => println!("nowhere to go"),
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.app.notices.try_recv() {
            match &notice.description {
                Some(d) => println!("[{}] {}", notice.title, d),
                None => println!("[{}]", notice.title),
            }
        }
    }

    fn render(&self, page: &Page) {
        println!("# {}", page.name());
        match page {
            Page::Home(feed) => self.render_feed(feed),
            Page::PinDetail { card, comments } => {
                println!("{} by @{}", card.title, card.creator_username);
                if let Some(d) = &card.description {
                    println!("{d}");
                }
                println!("{} likes, {} comments", card.like.count(), comments.len());
                for c in comments {
                    println!("  @{}: {}", c.author.username, c.comment.content);
                }
            }
            Page::Search { params, results } => {
                println!("{} results for {:?}", results.len(), params.query);
                match results {
                    SearchResults::Images(feed) | SearchResults::Trending(feed) => {
                        self.render_feed(feed)
                    }
                    SearchResults::Collections(items) => {
                        for (i, c) in items.iter().enumerate() {
                            println!(
                                "[{i}] {} ({} pins) {}",
                                c.collection.name, c.pin_count, c.collection.id
                            );
                        }
                    }
                    SearchResults::People(cards) => {
                        for (i, p) in cards.iter().enumerate() {
                            println!(
                                "[{i}] @{} {} ({} followers)",
                                p.profile.username, p.profile.name, p.follower_count
                            );
                        }
                    }
                }
            }
            Page::Profile(view) => {
                println!("@{} {}", view.card.profile.username, view.card.profile.name);
                if let Some(bio) = &view.card.profile.bio {
                    println!("{bio}");
                }
                println!(
                    "{} followers, {} following, {} pins",
                    view.card.follower_count, view.card.following_count, view.card.post_count
                );
                self.render_feed(&view.pins);
                for c in &view.collections {
                    println!(
                        "collection: {} ({} pins) {}",
                        c.collection.name, c.pin_count, c.collection.id
                    );
                }
            }
            Page::Collection { collection, pins } => {
                println!("{} ({})", collection.name, collection.visibility);
                self.render_feed(pins);
            }
            Page::Upgrade(tiers) => {
                for tier in tiers.iter() {
                    let mark = match tier.popular {
                        true => " (popular)",
                        false => "",
                    };
                    println!("{} {}{mark}", tier.name, tier.price);
                    for feature in tier.features {
                        println!("  - {feature}");
                    }
                }
            }
            Page::Create => println!("publish with: pin <image_url> <title> [description]"),
            Page::ProfileSetup => println!("finish with: setup <username> <name>"),
            Page::Login => println!("sign in with: login <john|jane|uuid>"),
            Page::NotFound => {}
        }
    }

    fn render_feed(&self, feed: &FeedView) {
        let plan = self.grid.plan(&feed.aspects());
        println!(
            "{} pins over {} columns, {}px tall",
            feed.len(),
            self.grid.columns(),
            plan.height()
        );

        for (i, card) in feed.cards.iter().enumerate() {
            let slot = &plan.slots[i];
            let liked = match card.like.engaged() {
                true => "*",
                false => " ",
            };
            println!(
                "[{i}] col {} y {:>5} {liked} {}  ({} likes)",
                slot.column,
                slot.top,
                card.title,
                card.like.count()
            );
        }
        if feed.can_load_more() {
            println!("(`more` loads the next page)");
        }
    }
}

fn feed_of(page: &mut Option<Page>) -> Option<&mut FeedView> {
    match page {
        Some(Page::Home(feed)) => Some(feed),
        Some(Page::Search {
            results: SearchResults::Images(feed) | SearchResults::Trending(feed),
            ..
        }) => Some(feed),
        Some(Page::Profile(view)) => Some(&mut view.pins),
        Some(Page::Collection { pins, .. }) => Some(pins),
        _ => None,
    }
}

fn feed_ref(page: &Option<Page>) -> Option<&FeedView> {
    match page {
        Some(Page::Home(feed)) => Some(feed),
        Some(Page::Search {
            results: SearchResults::Images(feed) | SearchResults::Trending(feed),
            ..
        }) => Some(feed),
        Some(Page::Profile(view)) => Some(&view.pins),
        Some(Page::Collection { pins, .. }) => Some(pins),
        _ => None,
    }
}
