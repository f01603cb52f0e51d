pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod roster;
pub mod sampler;
pub mod session;

// Re-export main components
pub use auth::{AuthService, BearerSession};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use identity::{IdentityResolver, PlayerPatch, ProfileState};
pub use roster::PlayerRoster;
pub use sampler::WordSampler;
pub use session::{CreatedSession, MembershipReport, SessionEngine};
