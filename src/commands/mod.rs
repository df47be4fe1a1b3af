//! CLI commands implementation

pub mod browse;
pub mod health;
pub mod init;
pub mod sync;

pub use browse::*;
pub use health::*;
pub use init::*;
pub use sync::*;
