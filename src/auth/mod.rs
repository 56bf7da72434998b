// Authentication module
// Two-step login handshake and the refresh exchange

mod handshake;
pub mod refresh;
mod types;

pub use handshake::LoginFlow;
pub use types::{issued_at, LoginOutcome, SetupChallenge};
