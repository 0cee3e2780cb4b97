pub mod create;
pub mod init;
pub mod join;
pub mod send;
pub mod version;

pub use create::Create;
pub use init::Init;
pub use join::Join;
pub use send::SendMessage;
pub use version::Version;
