//! Firmware update subsystem.
//!
//! Runs beside the bus engine but never touches a bus or handshake line. It talks to the
//! rest of the card only through the [`UpdateTrigger`] and the persisted key-value store.
//!
//! Flow of one check:
//! 1. fetch the published version for this card revision
//! 2. compare with the persisted `"version"` key (absent means "always update")
//! 3. stream the firmware into the next OTA slot, commit it and mark it bootable
//! 4. persist the new version, then restart
//!
//! Every failure abandons the attempt without persisting anything.

pub mod client;
pub mod trigger;
pub mod version;

use std::time::Duration;

use thiserror::Error;

use crate::flash::{FlashError, FlashPartitions, PartitionWriter};
use crate::storage::{KeyValueStore, StorageError};

pub use client::{FirmwareBody, FirmwareImage, HttpUpdateClient, UpdateServer};
pub use trigger::UpdateTrigger;

/// Key holding the installed firmware version.
pub const KEY_VERSION: &str = "version";

/// Size of each chunk written to flash.
pub const CHUNK_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Connection failed: {0}")]
    Connection(reqwest::Error),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Transfer interrupted: {0}")]
    TransferInterrupted(String),
    #[error("Flash write failed: {0}")]
    FlashWrite(#[from] FlashError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing newer on the server. `local` is `None` when no version was persisted.
    UpToDate { local: Option<i32>, remote: i32 },
    /// A new image was written and made bootable; the device must restart.
    Installed { version: i32, bytes: u64 },
}

/// Restart hook invoked after a successful install or a factory switch.
pub trait Restart: Send + Sync {
    fn restart(&self);
}

/// Restart by ending the process; the supervisor relaunches it from the new boot slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRestart;

impl Restart for ProcessRestart {
    fn restart(&self) {
        tracing::info!("Restart system");
        std::process::exit(0);
    }
}

pub struct Updater<S, F, K> {
    server: S,
    flash: F,
    store: K,
    revision: u32,
    read_timeout: Duration,
}

impl<S, F, K> Updater<S, F, K>
where
    S: UpdateServer,
    F: FlashPartitions,
    K: KeyValueStore,
{
    pub fn new(server: S, flash: F, store: K, revision: u32) -> Self {
        Self { server, flash, store, revision, read_timeout: Duration::from_secs(10) }
    }

    /// Longest silence tolerated while streaming the firmware body.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub async fn check_for_update(&mut self) -> Result<UpdateOutcome, UpdateError> {
        let remote = self.server.fetch_version(self.revision).await?;
        tracing::info!("Version (remote): {}", remote);

        let local = if self.store.has_key(KEY_VERSION) {
            let local = self.store.get_i32(KEY_VERSION);
            if let Some(local) = local {
                tracing::info!("Version (local): {}", local);
            }
            local
        } else {
            None
        };
        if let Some(local) = local {
            if local >= remote {
                return Ok(UpdateOutcome::UpToDate { local: Some(local), remote });
            }
        }

        let bytes = self.install(remote).await?;
        Ok(UpdateOutcome::Installed { version: remote, bytes })
    }

    async fn install(&mut self, version: i32) -> Result<u64, UpdateError> {
        let FirmwareImage { mut body, content_length } = self.server.fetch_firmware(self.revision).await?;
        let partition = self.flash.next_update_partition().await?;
        tracing::info!("Performing update to version {}, writing partition {}", version, partition);

        let mut writer = self.flash.begin(partition).await?;
        let mut received: u64 = 0;
        while content_length.is_none_or(|len| received < len) {
            let chunk = match tokio::time::timeout(self.read_timeout, body.next_chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => {
                    tracing::info!("Connection closed, all packets received");
                    break;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(UpdateError::TransferInterrupted(format!(
                        "no data for {:?} after {} bytes",
                        self.read_timeout, received
                    )));
                }
            };
            // anything past the announced length is not part of the image
            let keep = match content_length {
                Some(len) => chunk.len().min(usize::try_from(len - received).unwrap_or(usize::MAX)),
                None => chunk.len(),
            };
            for piece in chunk[..keep].chunks(CHUNK_SIZE) {
                writer.write(piece).await?;
            }
            received += keep as u64;
        }
        if let Some(expected) = content_length {
            if received != expected {
                return Err(UpdateError::TransferInterrupted(format!(
                    "received {} of {} bytes",
                    received, expected
                )));
            }
        }
        tracing::info!("Firmware size: {}", received);

        let written = writer.finish().await?;
        self.flash.set_boot_partition(partition).await?;
        self.store.set_i32(KEY_VERSION, version).await?;
        Ok(written)
    }
}

/// Serve update checks forever: one check per trigger raise.
///
/// Errors are logged and the task keeps waiting. A successful install ends in `restart`
/// and the task returns.
pub async fn run_update_task<S, F, K, R>(trigger: UpdateTrigger, mut updater: Updater<S, F, K>, restart: R)
where
    S: UpdateServer,
    F: FlashPartitions,
    K: KeyValueStore,
    R: Restart,
{
    loop {
        trigger.wait().await;
        tracing::info!("Update check requested");
        match updater.check_for_update().await {
            Ok(UpdateOutcome::UpToDate { local, remote }) => {
                tracing::info!("Firmware up to date (local {:?}, remote {})", local, remote);
            }
            Ok(UpdateOutcome::Installed { version, bytes }) => {
                tracing::info!("Installed firmware version {} ({} bytes)", version, bytes);
                restart.restart();
                return;
            }
            Err(e) => {
                tracing::warn!("Update attempt abandoned: {}", e);
            }
        }
    }
}

/// Make the factory image bootable and restart into it.
pub async fn switch_to_factory<F: FlashPartitions, R: Restart>(flash: &mut F, restart: &R) -> Result<(), FlashError> {
    let Some(factory) = flash.factory_partition().await else {
        tracing::error!("Failed to find factory partition");
        return Err(FlashError::NoFactoryPartition);
    };
    flash.set_boot_partition(factory).await?;
    restart.restart();
    Ok(())
}
