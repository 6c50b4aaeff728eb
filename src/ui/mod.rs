//! Terminal interface: dashboard, focus timer, flashcard review, chunked
//! reader and the flashcard generator.

mod app;
pub mod theme;
mod widgets;

pub use app::App;
