pub mod backend;
pub mod gallery_service;

pub use gallery_service::{connect, AppSession, Connection};
