pub mod args;
pub mod chat;
pub mod op;
pub mod ops;

pub use ops::{Create, Init, Join, SendMessage, Version};
