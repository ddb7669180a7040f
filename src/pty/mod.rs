mod handle;
mod relay;
mod session;
mod signal;
mod spawn_config;

pub use handle::{PtyError, PtyHandle};
pub use session::{ExitInfo, PtySession};
pub use signal::Signal;
pub use spawn_config::SpawnOptions;
