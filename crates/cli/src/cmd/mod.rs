mod add;
mod info;

pub use add::{AddArgs, cmd_add};
pub use info::cmd_info;
