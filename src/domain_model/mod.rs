mod contact;
mod conversation;
mod group;
mod key;
mod message;
mod receipt;
mod stream;
mod unit;
mod user;

pub use contact::*;
pub use conversation::*;
pub use group::*;
pub use key::*;
pub use message::*;
pub use receipt::*;
pub use stream::*;
pub use unit::*;
pub use user::*;
