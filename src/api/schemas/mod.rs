pub mod chat;
pub mod feed;
pub mod gateway;
pub mod health;
pub mod profile;
pub mod session;
