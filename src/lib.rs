pub mod actions;
pub mod conductors;
pub mod config;
mod constructors;
pub mod entities;
pub mod handlers;
pub mod layout;
pub mod presenters;
pub mod repositories;
pub mod session;
pub mod visibility;

pub use constructors::*;
