//! Line-delimited JSON worker protocol: commands, dispatch loop, shutdown

pub mod command;
pub mod dispatcher;
pub mod shutdown;

pub use command::{Command, Response};
pub use dispatcher::{Dispatcher, READY_LINE};
pub use shutdown::ShutdownCoordinator;
