pub mod config;
pub mod error;
pub mod progress_service;
pub mod request_meta;
pub mod routes;
pub mod security;
pub mod state;
pub mod video_service;
pub mod youtube;

#[cfg(test)]
mod test_support;
