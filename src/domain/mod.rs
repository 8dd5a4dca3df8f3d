pub mod feed;
pub mod identity;
pub mod matching;
pub mod message;
pub mod profile;
pub mod session;
pub mod user;
