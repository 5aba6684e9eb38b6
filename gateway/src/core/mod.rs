pub mod posts;
pub mod realtime;
pub mod relay;
pub mod session;

pub use posts::{Post, PostCatalog, PostLookup};
pub use realtime::{RealtimeError, RealtimeResult};
pub use session::{Session, SessionState};
