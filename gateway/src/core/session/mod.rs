//! Session lifecycle manager.
//!
//! A session pairs one client socket with one upstream socket. It moves
//! through `Connecting -> Configuring -> Active -> Closing -> Closed`, with
//! `Failed` reachable from any live state. Whichever side ends first, the
//! other side is closed exactly once.

mod instructions;
mod relay_loop;
mod resolver;
mod setup;
mod state;
mod teardown;

pub use instructions::build_instructions;
pub use relay_loop::{RelayOutcome, RelayReport, RelayStats, run_relay};
pub use resolver::{ResolveError, resolve_post};
pub use setup::{MAX_PENDING_FRAMES, PendingFrames, await_unless_client_gone};
pub use state::{Session, SessionError, SessionState};
pub use teardown::{UPSTREAM_LOST_MESSAGE, error_frame, reject_client, teardown};
