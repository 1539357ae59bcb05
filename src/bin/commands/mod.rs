pub mod inspect_cmd;
pub mod locate_cmd;
pub mod query_cmd;

pub use inspect_cmd::cmd_inspect;
pub use locate_cmd::cmd_locate;
pub use query_cmd::cmd_query;
