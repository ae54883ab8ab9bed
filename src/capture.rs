// src/capture.rs
//! Optional capture of planner inputs for test-corpus generation.
//!
//! Each record is the pair of the world snapshot and the trajectory request,
//! appended as length-delimited postcard frames behind a fixed magic prefix.
//! The file is created lazily on the first write.

use crate::TrajectoryInput;
use crate::world::{WorldInformation, WorldState};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Identifies a pathfinding capture file.
pub const CAPTURE_MAGIC: &[u8] = b"PLAYMAKER PATHFINDING CAPTURE";

/// One captured planning situation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub world: WorldState,
    pub input: TrajectoryInput,
}

/// Append-only capture sink.
#[derive(Debug)]
pub struct InputCapture {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl InputCapture {
    pub fn new(path: PathBuf) -> Self {
        Self { path, writer: None }
    }

    pub fn append(
        &mut self,
        world: &WorldInformation,
        input: &TrajectoryInput,
    ) -> std::io::Result<()> {
        let writer = match &mut self.writer {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(&self.path)?;
                let is_new = file.metadata()?.len() == 0;
                let mut writer = BufWriter::new(file);
                if is_new {
                    writer.write_all(CAPTURE_MAGIC)?;
                }
                self.writer.insert(writer)
            }
        };

        let record = CaptureRecord {
            world: world.to_state(),
            input: input.clone(),
        };
        let payload = postcard::to_stdvec(&record).map_err(std::io::Error::other)?;
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()
    }
}

/// Reads a capture file back, mostly for tests and offline tooling.
pub fn read_capture_file(path: &Path) -> std::io::Result<Vec<CaptureRecord>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut magic = vec![0u8; CAPTURE_MAGIC.len()];
    reader.read_exact(&mut magic)?;
    if magic != CAPTURE_MAGIC {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            "wrong capture magic",
        ));
    }
    let mut records = Vec::new();
    loop {
        let mut len_bytes = [0u8; 4];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        let mut payload = vec![0u8; u32::from_le_bytes(len_bytes) as usize];
        reader.read_exact(&mut payload)?;
        let record = postcard::from_bytes(&payload)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vector;
    use crate::RobotState;

    #[test]
    fn capture_appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pathinput");
        let mut capture = InputCapture::new(path.clone());
        // the file does not exist until the first write
        assert!(!path.exists());

        let mut world = WorldInformation::new();
        world.set_radius(0.07);
        world.set_robot_id(5);
        world.set_boundary(-3.0, -3.0, 3.0, 3.0);
        world.add_circle(1.0, 2.0, 3.0, 4);

        let input = TrajectoryInput {
            start: RobotState::new(Vector::ZERO, Vector::new(1.0, 1.0)),
            target: RobotState::new(Vector::new(2.0, 2.0), Vector::ZERO),
            t0: 0.0,
            exponential_slow_down: true,
            max_speed: 4.0,
            max_speed_squared: 16.0,
            acceleration: 5.0,
        };

        capture.append(&world, &input).unwrap();
        capture.append(&world, &input).unwrap();

        let records = read_capture_file(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].world.robot_id, 5);
        assert_eq!(records[0].world.obstacles.len(), 1);
        assert_eq!(records[0].input.max_speed, 4.0);

        let restored = WorldInformation::from_state(records[0].world.clone());
        assert_eq!(restored.static_obstacles().len(), 1);
    }
}
