pub mod backend;
pub mod contracts;
pub mod error;
pub mod sse;
pub mod stream;

pub use backend::*;
pub use contracts::*;
pub use error::*;
pub use sse::*;
pub use stream::*;
