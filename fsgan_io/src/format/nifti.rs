//! NIfTI-1 volume read/write.
//!
//! Volumes are held in memory in C order `[depth][height][width][channel]`.
//! On disk NIfTI stores the first axis fastest, so values are transposed on
//! the way in and out. Files whose name ends in `.gz` are gzip-compressed on
//! write; on read, compression is detected from the gzip magic bytes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use fsgan_core::VolumeShape;

use super::header::{Datatype, NiftiHeader, HEADER_SIZE, VOX_OFFSET};
use crate::error::{Result, VolumeIoError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A single volumetric image.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    shape: VolumeShape,
    data: Vec<f32>,
    spacing: [f32; 3],
}

impl Volume {
    /// Wrap C-ordered data in a volume with unit voxel spacing.
    pub fn new(shape: VolumeShape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.num_values() {
            return Err(VolumeIoError::DataLength {
                expected: shape.num_values(),
                got: data.len(),
            });
        }
        Ok(Self {
            shape,
            data,
            spacing: [1.0; 3],
        })
    }

    /// Set the voxel spacing.
    pub fn with_spacing(mut self, spacing: [f32; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    /// Volume shape.
    #[inline]
    pub fn shape(&self) -> VolumeShape {
        self.shape
    }

    /// Voxel spacing.
    #[inline]
    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    /// Voxel values in C order.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consume the volume, returning its values.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Voxelwise `self - other`.
    pub fn difference(&self, other: &Volume) -> Result<Volume> {
        if self.shape != other.shape {
            return Err(shape_mismatch(self.shape, other.shape));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();
        Ok(Self {
            shape: self.shape,
            data,
            spacing: self.spacing,
        })
    }
}

pub(crate) fn shape_mismatch(expected: VolumeShape, got: VolumeShape) -> VolumeIoError {
    let dims = |s: VolumeShape| [s.depth, s.height, s.width, s.channels];
    VolumeIoError::ShapeMismatch {
        expected: dims(expected),
        got: dims(got),
    }
}

/// Index into a C-ordered buffer for voxel `(i, j, k)` channel `c`.
#[inline]
fn c_index(shape: &VolumeShape, i: usize, j: usize, k: usize, c: usize) -> usize {
    ((i * shape.height + j) * shape.width + k) * shape.channels + c
}

/// Write a volume in NIfTI-1 format.
pub fn write_nifti<W: Write>(volume: &Volume, writer: &mut W) -> Result<()> {
    let shape = volume.shape;
    let mut header = NiftiHeader::new([shape.depth, shape.height, shape.width, shape.channels]);
    header.spacing = volume.spacing;

    writer.write_all(&header.to_bytes())?;
    // Empty extension flag.
    writer.write_all(&[0u8; VOX_OFFSET - HEADER_SIZE])?;

    let mut bytes = Vec::with_capacity(shape.num_values() * 4);
    for c in 0..shape.channels {
        for k in 0..shape.width {
            for j in 0..shape.height {
                for i in 0..shape.depth {
                    let value = volume.data[c_index(&shape, i, j, k, c)];
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
    writer.write_all(&bytes)?;

    Ok(())
}

/// Read a NIfTI-1 volume, converting voxel values to `f32`.
///
/// Intensity scaling (`scl_slope`, `scl_inter`) is applied when the slope is
/// non-zero.
pub fn read_nifti<R: Read>(reader: &mut R) -> Result<Volume> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;
    let header = NiftiHeader::from_bytes(&header_bytes)?;

    let mut skip = vec![0u8; header.vox_offset - HEADER_SIZE];
    reader.read_exact(&mut skip)?;

    let size = header.datatype.size();
    let mut raw = vec![0u8; header.num_values() * size];
    reader.read_exact(&mut raw)?;

    let decode = |chunk: &[u8]| -> f32 {
        match header.datatype {
            Datatype::U8 => chunk[0] as f32,
            Datatype::I16 => i16::from_le_bytes([chunk[0], chunk[1]]) as f32,
            Datatype::I32 => {
                i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f32
            }
            Datatype::F32 => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            Datatype::F64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(chunk);
                f64::from_le_bytes(b) as f32
            }
        }
    };
    let (slope, inter) = if header.scl_slope != 0.0 {
        (header.scl_slope, header.scl_inter)
    } else {
        (1.0, 0.0)
    };

    let [d, h, w, ch] = header.dims;
    let shape = VolumeShape::new(d, h, w, ch);
    let mut data = vec![0.0f32; shape.num_values()];
    let mut chunks = raw.chunks_exact(size);
    for c in 0..ch {
        for k in 0..w {
            for j in 0..h {
                for i in 0..d {
                    // The buffer holds exactly num_values chunks.
                    if let Some(chunk) = chunks.next() {
                        data[c_index(&shape, i, j, k, c)] = decode(chunk) * slope + inter;
                    }
                }
            }
        }
    }

    Ok(Volume {
        shape,
        data,
        spacing: header.spacing,
    })
}

/// Save a volume to `path`, gzip-compressing when the name ends in `.gz`.
pub fn save_volume<P: AsRef<Path>>(volume: &Volume, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);

    let compressed = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if compressed {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_nifti(volume, &mut encoder)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        write_nifti(volume, &mut file)?;
        file.flush()?;
    }
    Ok(())
}

/// Load a volume from `path`, transparently handling gzip compression.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Volume> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path.as_ref())?).read_to_end(&mut bytes)?;

    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes.as_slice());
        read_nifti(&mut decoder)
    } else {
        read_nifti(&mut bytes.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: VolumeShape) -> Volume {
        let data = (0..shape.num_values()).map(|v| v as f32 * 0.5).collect();
        Volume::new(shape, data).unwrap()
    }

    #[test]
    fn test_volume_rejects_wrong_length() {
        let shape = VolumeShape::from_spatial([2, 2, 2]);
        assert!(matches!(
            Volume::new(shape, vec![0.0; 7]),
            Err(VolumeIoError::DataLength { expected: 8, got: 7 })
        ));
    }

    #[test]
    fn test_first_axis_is_fastest_on_disk() {
        let shape = VolumeShape::from_spatial([2, 1, 2]);
        // C order: (0,0,0)=0, (0,0,1)=1, (1,0,0)=2, (1,0,1)=3
        let volume = Volume::new(shape, vec![0.0, 1.0, 2.0, 3.0]).unwrap();

        let mut buffer = Vec::new();
        write_nifti(&volume, &mut buffer).unwrap();

        let voxels: Vec<f32> = buffer[VOX_OFFSET..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(voxels, vec![0.0, 2.0, 1.0, 3.0]);

        let loaded = read_nifti(&mut buffer.as_slice()).unwrap();
        assert_eq!(loaded, volume);
    }

    #[test]
    fn test_multichannel_volume() {
        let volume = ramp(VolumeShape::new(2, 3, 2, 2));
        let mut buffer = Vec::new();
        write_nifti(&volume, &mut buffer).unwrap();
        assert_eq!(read_nifti(&mut buffer.as_slice()).unwrap(), volume);
    }

    #[test]
    fn test_difference() {
        let shape = VolumeShape::from_spatial([1, 1, 3]);
        let a = Volume::new(shape, vec![3.0, 2.0, 1.0]).unwrap();
        let b = Volume::new(shape, vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(a.difference(&b).unwrap().data(), &[2.0, 1.0, 0.0]);

        let other = Volume::new(VolumeShape::from_spatial([3, 1, 1]), vec![0.0; 3]).unwrap();
        assert!(matches!(
            a.difference(&other),
            Err(VolumeIoError::ShapeMismatch { .. })
        ));
    }
}
