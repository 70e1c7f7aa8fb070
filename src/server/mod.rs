mod chat_handler;
mod dispatcher;
mod port;
mod presence;
mod receipt_handler;
mod server;
mod session_hub;

pub use chat_handler::*;
pub use dispatcher::*;
pub use port::*;
pub use presence::*;
pub use receipt_handler::*;
pub use server::*;
pub use session_hub::*;

#[cfg(test)]
pub(crate) mod testkit;
