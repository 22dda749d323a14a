//! Request handlers.

pub mod estimate;
pub mod health;
pub mod jobs;
pub mod progress;
pub mod queue;
pub mod system;
pub mod videos;

pub use estimate::*;
pub use health::*;
pub use jobs::*;
pub use progress::*;
pub use queue::*;
pub use system::*;
pub use videos::*;
