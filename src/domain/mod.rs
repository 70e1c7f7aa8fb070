mod auth_service_impl;
mod contact_service_impl;
mod conversation_service_impl;
mod group_service_impl;
mod message_service_impl;
mod service;
mod user_service_impl;

pub use auth_service_impl::*;
pub use contact_service_impl::*;
pub use conversation_service_impl::*;
pub use group_service_impl::*;
pub use message_service_impl::*;
pub use service::*;
pub use user_service_impl::*;
