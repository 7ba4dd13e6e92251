pub mod cards;
pub mod notices;
pub mod pages;
