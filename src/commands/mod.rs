//! Concrete commands, one request each.
//!
//! Shell-backed commands write `shell:<command line>` and then look for their result
//! markers in the output; service commands (`log:`, `remount:`, `sync:`) only need the
//! `OKAY`.

mod clear;
mod install;
mod log;
mod remount;
mod screencap;
mod shell;
mod sync;
mod uninstall;

pub use self::clear::ClearCommand;
pub use self::install::InstallCommand;
pub use self::log::LogCommand;
pub use self::remount::RemountCommand;
pub use self::screencap::ScreencapCommand;
pub use self::shell::ShellCommand;
pub use self::sync::SyncCommand;
pub use self::uninstall::UninstallCommand;
