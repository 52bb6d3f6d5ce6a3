//! Binary persistence of [`DatasetResults`].
//!
//! Layout, all little-endian:
//!
//! ```text
//! magic        8 bytes  "DETPOST1"
//! num_classes  u32
//! num_images   u32
//! has_keys     u8       1 when rows carry keypoint boxes
//! then for each class, for each image:
//!   rows       u32
//!   rows x [x1, y1, x2, y2, score (, kx1, ky1, kx2, ky2)] as f32
//! ```
//!
//! Detections without a keypoint box store NaN keypoint fields when the file
//! carries keypoints.

use crate::aggregate::{DatasetResults, Detection, DetectionSet};
use crate::bbox::BBox;
use crate::util::{DetPostError, DetPostResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// File name used by [`DatasetResults::save`].
pub const DETECTIONS_FILE: &str = "detections.bin";

const MAGIC: &[u8; 8] = b"DETPOST1";

/// Upper bound on capacity reserved from header counts before rows arrive.
const MAX_PREALLOC: usize = 1 << 16;

fn io_err(err: std::io::Error) -> DetPostError {
    DetPostError::Persist {
        reason: err.to_string(),
    }
}

fn len_u32(len: usize, context: &'static str) -> DetPostResult<u32> {
    u32::try_from(len).map_err(|_| DetPostError::Persist {
        reason: format!("{context} count {len} does not fit in u32"),
    })
}

fn read_u32<R: Read>(reader: &mut R) -> DetPostResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(io_err)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32s<R: Read, const N: usize>(reader: &mut R) -> DetPostResult<[f32; N]> {
    let mut out = [0.0f32; N];
    let mut buf = [0u8; 4];
    for v in &mut out {
        reader.read_exact(&mut buf).map_err(io_err)?;
        *v = f32::from_le_bytes(buf);
    }
    Ok(out)
}

impl DatasetResults {
    /// Serializes the results into `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> DetPostResult<()> {
        let has_keys = self.has_keypoints();
        writer.write_all(MAGIC).map_err(io_err)?;
        writer
            .write_all(&len_u32(self.num_classes, "class")?.to_le_bytes())
            .map_err(io_err)?;
        writer
            .write_all(&len_u32(self.num_images, "image")?.to_le_bytes())
            .map_err(io_err)?;
        writer.write_all(&[u8::from(has_keys)]).map_err(io_err)?;

        for set in &self.sets {
            writer
                .write_all(&len_u32(set.len(), "row")?.to_le_bytes())
                .map_err(io_err)?;
            for det in set {
                for v in det.to_row() {
                    writer.write_all(&v.to_le_bytes()).map_err(io_err)?;
                }
                if has_keys {
                    let keys = det.keypoints.map_or([f32::NAN; 4], BBox::to_array);
                    for v in keys {
                        writer.write_all(&v.to_le_bytes()).map_err(io_err)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Deserializes results written by [`DatasetResults::write_to`].
    pub fn read_from<R: Read>(reader: &mut R) -> DetPostResult<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).map_err(io_err)?;
        if &magic != MAGIC {
            return Err(DetPostError::Persist {
                reason: "bad magic".to_string(),
            });
        }
        let num_classes = read_u32(reader)? as usize;
        let num_images = read_u32(reader)? as usize;
        let mut flag = [0u8; 1];
        reader.read_exact(&mut flag).map_err(io_err)?;
        let has_keys = match flag[0] {
            0 => false,
            1 => true,
            other => {
                return Err(DetPostError::Persist {
                    reason: format!("bad keypoint flag {other}"),
                })
            }
        };

        let total = num_classes
            .checked_mul(num_images)
            .ok_or(DetPostError::InvalidDimensions {
                width: num_images,
                height: num_classes,
            })?;
        let mut sets = Vec::with_capacity(total.min(MAX_PREALLOC));
        for _ in 0..total {
            let rows = read_u32(reader)? as usize;
            let mut dets = Vec::with_capacity(rows.min(MAX_PREALLOC));
            for _ in 0..rows {
                let [x1, y1, x2, y2, score] = read_f32s::<_, 5>(reader)?;
                let mut det = Detection::new(BBox::new(x1, y1, x2, y2), score);
                if has_keys {
                    let keys = read_f32s::<_, 4>(reader)?;
                    if !keys.iter().all(|v| v.is_nan()) {
                        det = det.with_keypoints(BBox::from_array(keys));
                    }
                }
                dets.push(det);
            }
            sets.push(DetectionSet::new(dets));
        }

        Ok(Self {
            num_classes,
            num_images,
            sets,
        })
    }

    /// Writes `detections.bin` into `output_dir` and returns its path.
    pub fn save<P: AsRef<Path>>(&self, output_dir: P) -> DetPostResult<PathBuf> {
        let path = output_dir.as_ref().join(DETECTIONS_FILE);
        let file = File::create(&path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().map_err(io_err)?;
        Ok(path)
    }

    /// Loads results from a file written by [`DatasetResults::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> DetPostResult<Self> {
        let file = File::open(path).map_err(io_err)?;
        Self::read_from(&mut BufReader::new(file))
    }
}
