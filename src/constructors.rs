use tokio::sync::mpsc::UnboundedReceiver;

use crate::conductors::Conductor;
use crate::handlers::Handler;
use crate::presenters::notices::{Notice, NoticeSink};
use crate::repositories::memory::InMemoryBackend;
use crate::repositories::rest::RestBackend;
use crate::session::Session;

pub const DEFAULT_FEED_PAGE: usize = 30;

/// A wired application: the conductor plus the notice stream its flows feed.
pub struct App {
    pub conductor: Conductor,
    pub notices: UnboundedReceiver<Notice>,
}

fn assemble(handler: Handler, session: Session) -> App {
    let (sink, notices) = NoticeSink::new();

    App {
        conductor: Conductor {
            handler,
            session,
            notices: sink,
            feed_page: DEFAULT_FEED_PAGE,
        },
        notices,
    }
}

/// Everything in process, seeded with the demo rows.
pub fn in_memory() -> App {
    let backend = InMemoryBackend::with_demo_data();

    let handler = Handler {
        pin_repository: Box::new(backend.clone()),
        profile_repository: Box::new(backend.clone()),
        collection_repository: Box::new(backend.clone()),
        moderation_repository: Box::new(backend.clone()),
        notification_repository: Box::new(backend.clone()),
    };
    let session = Session::new(Box::new(backend));

    assemble(handler, session)
}

/// Backed by a PostgREST service at `base_url`.
pub fn rest(base_url: impl AsRef<str>, api_key: impl AsRef<str>) -> ::anyhow::Result<App> {
    let backend = RestBackend::new(base_url.as_ref(), api_key.as_ref())?;

    let handler = Handler {
        pin_repository: Box::new(backend.clone()),
        profile_repository: Box::new(backend.clone()),
        collection_repository: Box::new(backend.clone()),
        moderation_repository: Box::new(backend.clone()),
        notification_repository: Box::new(backend.clone()),
    };
    let session = Session::new(Box::new(backend));

    Ok(assemble(handler, session))
}
