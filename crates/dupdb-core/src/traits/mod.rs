pub mod host;

pub use host::{
    BlockedEvent, BlockedHook, CursorHandler, CursorStep, DoneHandler, HostConnection, HostCursor,
    HostEngine, HostStore, HostTransaction, OpenHooks, SchemaUpgrade, UpgradeEvent, UpgradeHook,
};
