mod command;
mod io_mode;

pub use command::*;
pub use io_mode::IoMode;
