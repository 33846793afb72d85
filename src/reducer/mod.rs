mod actions;
mod error;
mod reducer;

pub use actions::{Action, MetaPatch};
pub use error::{ReducerError, ReducerResult};
pub use reducer::apply;
