//! Scalar summaries appended as JSON lines.
//!
//! Each event is one line of `summaries.jsonl`:
//!
//! ```text
//! {"step":10,"tag":"discriminator_loss","value":-0.42,"wall_time":1712.5}
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the summary log inside a run directory.
pub const SUMMARY_FILE: &str = "summaries.jsonl";

/// Tag of the critic loss on a training batch.
pub const TAG_D_LOSS: &str = "discriminator_loss";
/// Tag of the generator loss on a training batch.
pub const TAG_G_LOSS: &str = "generator_loss";
/// Tag of the mean absolute distance between generated and source volumes.
pub const TAG_IMAGE_DISTANCE: &str = "L1_distance_to_source_img";
/// Tag of the averaged validation critic loss.
pub const TAG_VAL_D_LOSS: &str = "validation_discriminator_loss";
/// Tag of the averaged validation generator loss.
pub const TAG_VAL_G_LOSS: &str = "validation_generator_loss";

/// One scalar summary event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEvent {
    /// Global step.
    pub step: usize,
    /// Summary tag.
    pub tag: String,
    /// Scalar value.
    pub value: f32,
    /// Seconds since the Unix epoch.
    pub wall_time: f64,
}

/// Appends summary events to a run directory.
pub struct SummaryWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SummaryWriter {
    /// Open (or create) the summary file in `dir`, appending to existing events.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SUMMARY_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Path of the summary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer one scalar.
    pub fn scalar(&mut self, step: usize, tag: &str, value: f32) -> Result<()> {
        let event = SummaryEvent {
            step,
            tag: tag.to_string(),
            value,
            wall_time: wall_time(),
        };
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush buffered events to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Read every event from a summary file.
pub fn read_summaries(path: &Path) -> Result<Vec<SummaryEvent>> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}

fn wall_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut writer = SummaryWriter::open(dir.path()).unwrap();
        writer.scalar(0, TAG_D_LOSS, -0.5).unwrap();
        writer.scalar(0, TAG_G_LOSS, 0.25).unwrap();
        writer.flush().unwrap();

        let events = read_summaries(writer.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tag, "discriminator_loss");
        assert_eq!(events[1].value, 0.25);
        assert!(events[1].wall_time > 0.0);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = SummaryWriter::open(dir.path()).unwrap();
            writer.scalar(1, TAG_VAL_D_LOSS, 1.0).unwrap();
            writer.flush().unwrap();
        }
        let mut writer = SummaryWriter::open(dir.path()).unwrap();
        writer.scalar(2, TAG_VAL_D_LOSS, 0.5).unwrap();
        writer.flush().unwrap();

        let steps: Vec<usize> = read_summaries(&dir.path().join(SUMMARY_FILE))
            .unwrap()
            .iter()
            .map(|e| e.step)
            .collect();
        assert_eq!(steps, vec![1, 2]);
    }
}
