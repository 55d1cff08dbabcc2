pub mod actions;
pub mod config;
pub mod events;
pub mod frame;
pub mod reducer;
pub mod state;
pub mod persistence;

pub use actions::*;
pub use events::*;
pub use frame::*;
pub use reducer::*;
pub use state::*;

pub use persistence::*;
