pub mod progress;
pub mod videos;
