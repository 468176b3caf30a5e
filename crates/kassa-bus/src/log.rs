use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::record::EventRecord;
use crate::BusError;

/// A topic's on-disk log: one append-only file per partition, records framed
/// as a 4-byte big-endian length followed by the JSON bytes.
///
/// Records with the same key always land in the same partition, in append
/// order. Each topic has a single writer (its owning service); any number of
/// processes may read.
#[derive(Debug, Clone)]
pub struct TopicLog {
    topic: String,
    dir: PathBuf,
    partitions: u32,
}

impl TopicLog {
    /// Open or create the log for `topic` under `root`. The partition count
    /// is fixed at creation time and read back on every later open, so a
    /// topic keeps its key → partition mapping for its whole life.
    pub fn open(root: &Path, topic: &str, partitions: u32) -> Result<Self, BusError> {
        let dir = root.join(topic);
        std::fs::create_dir_all(&dir)?;

        let meta = dir.join("partitions");
        let partitions = if meta.exists() {
            std::fs::read_to_string(&meta)?
                .trim()
                .parse::<u32>()
                .map_err(|e| {
                    BusError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("partition meta for {topic}: {e}"),
                    ))
                })?
        } else {
            std::fs::write(&meta, partitions.to_string())?;
            partitions
        };

        let log = Self {
            topic: topic.to_string(),
            dir,
            partitions,
        };
        for p in 0..partitions {
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(log.partition_path(p))?;
            log.truncate_torn_tail(p)?;
        }
        Ok(log)
    }

    /// Drop a partial frame left by a writer that crashed mid-append, so a
    /// restarted writer never buries it under fresh frames.
    fn truncate_torn_tail(&self, partition: u32) -> Result<(), BusError> {
        let path = self.partition_path(partition);
        let len = std::fs::metadata(&path)?.len();
        let mut file = File::open(&path)?;
        let mut pos = 0u64;
        loop {
            if pos + 4 > len {
                break;
            }
            let mut frame_len = [0u8; 4];
            file.read_exact(&mut frame_len)?;
            let body_len = u64::from(u32::from_be_bytes(frame_len));
            if pos + 4 + body_len > len {
                break;
            }
            file.seek(SeekFrom::Current(body_len as i64))?;
            pos += 4 + body_len;
        }
        if pos < len {
            tracing::warn!(
                topic = %self.topic,
                partition,
                torn_bytes = len - pos,
                "truncating torn tail of partition log"
            );
            OpenOptions::new().write(true).open(&path)?.set_len(pos)?;
        }
        Ok(())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Partition assignment: stable FNV-1a hash of the key.
    pub fn partition_for(&self, key: &str) -> u32 {
        (fnv1a(key.as_bytes()) % u64::from(self.partitions)) as u32
    }

    /// Append a record to its key's partition. Returns the partition and the
    /// end offset after the write. The file is fsynced before returning so
    /// an acknowledged record survives a crash.
    pub fn append(&self, record: &EventRecord) -> Result<(u32, u64), BusError> {
        let partition = self.partition_for(&record.key);
        let body = serde_json::to_vec(record)?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.partition_path(partition))?;
        file.write_all(&(body.len() as u32).to_be_bytes())?;
        file.write_all(&body)?;
        file.sync_data()?;

        let end = file.metadata()?.len();
        Ok((partition, end))
    }

    /// Read up to `max` records starting at byte `offset` of `partition`.
    /// Each entry pairs the record with the offset to commit after handling
    /// it. A torn tail (partial frame from a crashed writer) terminates the
    /// batch silently; the next append will not resume mid-frame because the
    /// writer always appends whole frames.
    pub fn read_from(
        &self,
        partition: u32,
        offset: u64,
        max: usize,
    ) -> Result<Vec<(u64, EventRecord)>, BusError> {
        if partition >= self.partitions {
            return Err(BusError::PartitionOutOfRange {
                partition,
                partitions: self.partitions,
            });
        }

        let mut file = File::open(self.partition_path(partition))?;
        let len = file.metadata()?.len();
        let mut pos = offset.min(len);
        file.seek(SeekFrom::Start(pos))?;

        let mut out = Vec::new();
        while out.len() < max {
            let mut frame_len = [0u8; 4];
            if pos + 4 > len {
                break;
            }
            file.read_exact(&mut frame_len)?;
            let body_len = u64::from(u32::from_be_bytes(frame_len));
            if pos + 4 + body_len > len {
                break;
            }
            let mut body = vec![0u8; body_len as usize];
            file.read_exact(&mut body)?;
            pos += 4 + body_len;

            let record: EventRecord = serde_json::from_slice(&body)?;
            out.push((pos, record));
        }
        Ok(out)
    }

    /// Current end offset of a partition.
    pub fn end_offset(&self, partition: u32) -> Result<u64, BusError> {
        Ok(std::fs::metadata(self.partition_path(partition))?.len())
    }

    fn partition_path(&self, partition: u32) -> PathBuf {
        self.dir.join(format!("{partition:05}.log"))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x1_0000_0000_01b3);
    }
    hash
}
