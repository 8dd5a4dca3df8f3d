pub mod account_service;
pub mod chat_service;
pub mod feed_service;
pub mod health_service;
pub mod profile_service;
pub mod session_registry;
pub mod unread;
