//! Flash partition table: a factory image plus two OTA slots and the "boot from" record.
//!
//! `FilePartitionTable` keeps each partition as a file in one directory:
//!
//! ```text
//! flash/
//!   factory.bin
//!   ota_0.bin
//!   ota_1.bin
//!   otadata.toml    # boot = "ota_1"
//! ```
//!
//! Images are written to a temporary file and only renamed into place by
//! [`PartitionWriter::finish`], so an interrupted download never leaves a bootable slot.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

pub const OTA_SLOTS: u8 = 2;

#[derive(Debug, Error)]
pub enum FlashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image for partition {0} is empty")]
    EmptyImage(PartitionId),
    #[error("Partition {0} holds no image")]
    MissingImage(PartitionId),
    #[error("No factory partition")]
    NoFactoryPartition,
    #[error("Corrupt partition table: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionId {
    Factory,
    Ota(u8),
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionId::Factory => write!(f, "factory"),
            PartitionId::Ota(slot) => write!(f, "ota_{}", slot),
        }
    }
}

impl std::str::FromStr for PartitionId {
    type Err = FlashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "factory" {
            return Ok(PartitionId::Factory);
        }
        s.strip_prefix("ota_")
            .and_then(|slot| slot.parse::<u8>().ok())
            .filter(|slot| *slot < OTA_SLOTS)
            .map(PartitionId::Ota)
            .ok_or_else(|| FlashError::Corrupt(format!("unknown partition '{}'", s)))
    }
}

/// Flash programming interface used by the updater.
#[async_trait]
pub trait FlashPartitions: Send + Sync {
    type Writer: PartitionWriter;

    /// Partition the device boots from next.
    async fn boot_partition(&self) -> Result<PartitionId, FlashError>;

    /// The OTA slot that is not the current boot partition.
    async fn next_update_partition(&self) -> Result<PartitionId, FlashError>;

    async fn factory_partition(&self) -> Option<PartitionId>;

    /// Start writing a fresh image into `partition`.
    async fn begin(&mut self, partition: PartitionId) -> Result<Self::Writer, FlashError>;

    /// Mark `partition` as the boot partition. It must hold a finished image.
    async fn set_boot_partition(&mut self, partition: PartitionId) -> Result<(), FlashError>;
}

#[async_trait]
pub trait PartitionWriter: Send {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), FlashError>;

    /// Verify and commit the image. Returns the image size in bytes.
    async fn finish(self) -> Result<u64, FlashError>;
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct OtaData {
    boot: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FilePartitionTable {
    dir: PathBuf,
}

impl FilePartitionTable {
    /// Open (creating if needed) the partition directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, FlashError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn image_path(&self, partition: PartitionId) -> PathBuf {
        self.dir.join(format!("{}.bin", partition))
    }

    fn otadata_path(&self) -> PathBuf {
        self.dir.join("otadata.toml")
    }

    async fn read_otadata(&self) -> Result<OtaData, FlashError> {
        match fs::read_to_string(self.otadata_path()).await {
            Ok(contents) => toml::from_str(&contents).map_err(|e| FlashError::Corrupt(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OtaData::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn holds_image(&self, partition: PartitionId) -> bool {
        fs::metadata(self.image_path(partition)).await.is_ok_and(|meta| meta.is_file())
    }
}

#[async_trait]
impl FlashPartitions for FilePartitionTable {
    type Writer = FileImageWriter;

    async fn boot_partition(&self) -> Result<PartitionId, FlashError> {
        match self.read_otadata().await?.boot {
            Some(name) => name.parse(),
            None => Ok(PartitionId::Factory),
        }
    }

    async fn next_update_partition(&self) -> Result<PartitionId, FlashError> {
        Ok(match self.boot_partition().await? {
            PartitionId::Ota(slot) => PartitionId::Ota((slot + 1) % OTA_SLOTS),
            PartitionId::Factory => PartitionId::Ota(0),
        })
    }

    async fn factory_partition(&self) -> Option<PartitionId> {
        self.holds_image(PartitionId::Factory).await.then_some(PartitionId::Factory)
    }

    async fn begin(&mut self, partition: PartitionId) -> Result<Self::Writer, FlashError> {
        let target = self.image_path(partition);
        let staging = target.with_extension("bin.partial");
        let file = File::create(&staging).await?;
        tracing::debug!("Writing partition {} via {}", partition, staging.display());
        Ok(FileImageWriter { partition, file, staging, target, written: 0, committed: false })
    }

    async fn set_boot_partition(&mut self, partition: PartitionId) -> Result<(), FlashError> {
        if !self.holds_image(partition).await {
            return Err(FlashError::MissingImage(partition));
        }
        let otadata = OtaData { boot: Some(partition.to_string()) };
        let contents = toml::to_string(&otadata).map_err(|e| FlashError::Corrupt(e.to_string()))?;
        let tmp = self.otadata_path().with_extension("tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, self.otadata_path()).await?;
        tracing::info!("Boot partition set to {}", partition);
        Ok(())
    }
}

/// Staged image; dropped without a successful `finish` it removes the staging file.
#[derive(Debug)]
pub struct FileImageWriter {
    partition: PartitionId,
    file: File,
    staging: PathBuf,
    target: PathBuf,
    written: u64,
    committed: bool,
}

#[async_trait]
impl PartitionWriter for FileImageWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), FlashError> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(mut self) -> Result<u64, FlashError> {
        if self.written == 0 {
            return Err(FlashError::EmptyImage(self.partition));
        }
        self.file.flush().await?;
        self.file.sync_all().await?;
        let on_disk = self.file.metadata().await?.len();
        if on_disk != self.written {
            return Err(FlashError::Corrupt(format!(
                "wrote {} bytes but staged image holds {}",
                self.written, on_disk
            )));
        }
        fs::rename(&self.staging, &self.target).await?;
        self.committed = true;
        Ok(self.written)
    }
}

impl Drop for FileImageWriter {
    fn drop(&mut self) {
        if !self.committed {
            // Drop cannot await
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}
