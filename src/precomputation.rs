// src/precomputation.rs
//! The standard sampler's persisted seed table.
//!
//! The file holds distance-stratified buckets of normalised search samples,
//! written as a magic prefix followed by length-prefixed postcard messages,
//! one per bucket. Absence of the file is a warning, not an error; the
//! sampler then searches live only.

use crate::error::PlannerError;
use crate::samplers::StandardSample;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// Identifies a seed-table file.
pub const PRECOMPUTATION_MAGIC: &[u8] = b"PLAYMAKER PRECOMPUTATION";

/// One distance bucket of seed samples, normalised to the start-to-target
/// axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputationSegment {
    pub min_distance: f32,
    pub max_distance: f32,
    pub samples: Vec<StandardSample>,
}

#[derive(Debug, Clone, Default)]
pub struct Precomputation {
    segments: Vec<PrecomputationSegment>,
}

impl Precomputation {
    pub fn new(segments: Vec<PrecomputationSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PrecomputationSegment] {
        &self.segments
    }

    /// The bucket covering the given start-to-target distance.
    pub fn segment_for(&self, distance: f32) -> Option<&PrecomputationSegment> {
        self.segments
            .iter()
            .find(|s| s.min_distance <= distance && s.max_distance >= distance)
    }

    pub fn load(path: &Path) -> Result<Self, PlannerError> {
        let missing = |message: String| PlannerError::PrecomputationMissing(message);

        let file = File::open(path)
            .map_err(|e| missing(format!("{}: {e}", path.display())))?;
        let mut reader = BufReader::new(file);

        let mut magic = vec![0u8; PRECOMPUTATION_MAGIC.len()];
        reader
            .read_exact(&mut magic)
            .map_err(|e| missing(format!("short magic prefix: {e}")))?;
        if magic != PRECOMPUTATION_MAGIC {
            return Err(missing("wrong magic prefix".into()));
        }

        let mut segments = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(missing(format!("truncated segment header: {e}"))),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut payload = vec![0u8; len];
            reader
                .read_exact(&mut payload)
                .map_err(|e| missing(format!("truncated segment payload: {e}")))?;
            let segment: PrecomputationSegment = postcard::from_bytes(&payload)
                .map_err(|e| missing(format!("malformed segment: {e}")))?;
            segments.push(segment);
        }
        if segments.is_empty() || segments.iter().any(|s| s.samples.is_empty()) {
            return Err(missing("empty seed table".into()));
        }
        Ok(Self { segments })
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(PRECOMPUTATION_MAGIC)?;
        for segment in &self.segments {
            let payload = postcard::to_stdvec(segment).map_err(std::io::Error::other)?;
            writer.write_all(&(payload.len() as u32).to_le_bytes())?;
            writer.write_all(&payload)?;
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vector;

    fn sample_table() -> Precomputation {
        Precomputation::new(vec![
            PrecomputationSegment {
                min_distance: 0.0,
                max_distance: 1.5,
                samples: vec![StandardSample {
                    time: 0.3,
                    angle: 1.0,
                    mid_speed: Vector::new(0.5, 0.1),
                }],
            },
            PrecomputationSegment {
                min_distance: 1.5,
                max_distance: f32::INFINITY,
                samples: vec![
                    StandardSample {
                        time: 1.0,
                        angle: 2.0,
                        mid_speed: Vector::new(2.0, 0.0),
                    },
                    StandardSample {
                        time: 2.0,
                        angle: 0.5,
                        mid_speed: Vector::new(1.0, -1.0),
                    },
                ],
            },
        ])
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("standardsampler.prec");
        let table = sample_table();
        table.save(&path).unwrap();

        let loaded = Precomputation::load(&path).unwrap();
        assert_eq!(loaded.segments().len(), 2);
        assert_eq!(loaded.segments()[1].samples.len(), 2);
        assert_eq!(loaded.segments()[0].samples[0], table.segments()[0].samples[0]);
    }

    #[test]
    fn bucket_lookup_by_distance() {
        let table = sample_table();
        assert_eq!(table.segment_for(1.0).unwrap().samples.len(), 1);
        assert_eq!(table.segment_for(7.0).unwrap().samples.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error_not_a_panic() {
        let result = Precomputation::load(Path::new("/nonexistent/standardsampler.prec"));
        assert!(matches!(result, Err(PlannerError::PrecomputationMissing(_))));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.prec");
        std::fs::write(&path, b"NOT A SEED TABLE AT ALL.....").unwrap();
        assert!(matches!(
            Precomputation::load(&path),
            Err(PlannerError::PrecomputationMissing(_))
        ));
    }
}
