//! retrocard-rs: the card application around the bus engine.
//!
//! The bus side lives in `retrocard_mcu` and must never wait on anything in here.
//! This crate holds the parts that may block or fail: configuration, persisted settings,
//! the flash partition table and the firmware updater.

pub mod config;
pub mod flash;
pub mod storage;
pub mod update;

pub use config::{Config, ConfigError, load_config};
pub use flash::{FilePartitionTable, FlashError, FlashPartitions, PartitionId, PartitionWriter};
pub use storage::{KeyValueStore, MemoryStore, StorageError, TomlStore};
pub use update::{
    HttpUpdateClient, ProcessRestart, Restart, UpdateError, UpdateOutcome, UpdateServer, UpdateTrigger, Updater,
    run_update_task, switch_to_factory,
};
