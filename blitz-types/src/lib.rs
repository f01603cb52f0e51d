pub mod group;
pub mod player;
pub mod score;
pub mod session;
pub mod word;

// Re-export all types
pub use group::*;
pub use player::*;
pub use score::*;
pub use session::*;
pub use word::*;
