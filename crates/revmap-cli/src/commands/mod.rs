//! CLI subcommands.

pub(crate) mod audit;
pub(crate) mod commit;
pub(crate) mod get;
pub(crate) mod init;
