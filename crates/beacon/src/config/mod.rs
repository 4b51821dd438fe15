pub mod cli;
pub mod daemon;
pub mod duration;
pub mod file;

pub use cli::*;
pub use daemon::*;
pub use duration::parse_duration;
pub use file::*;
