mod auth_handler;
mod contact_handler;
mod conversation_handler;
mod error;
mod group_handler;
mod message_handler;
mod router;
mod user_handler;
mod ws_handler;

pub use error::recover_error;
pub use router::routes;
