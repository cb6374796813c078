//! NIfTI-1 single-file header definition.

use crate::error::{Result, VolumeIoError};

/// Size of the NIfTI-1 header in bytes.
pub const HEADER_SIZE: usize = 348;

/// Offset of voxel data in a single-file image (header + empty extension flag).
pub const VOX_OFFSET: usize = 352;

/// Magic bytes for single-file (`.nii`) images.
pub const NIFTI_MAGIC: [u8; 4] = *b"n+1\0";

/// Supported voxel datatypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// Unsigned 8-bit integer (code 2).
    U8,
    /// Signed 16-bit integer (code 4).
    I16,
    /// Signed 32-bit integer (code 8).
    I32,
    /// 32-bit float (code 16).
    F32,
    /// 64-bit float (code 64).
    F64,
}

impl Datatype {
    /// Map a NIfTI datatype code.
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            2 => Ok(Datatype::U8),
            4 => Ok(Datatype::I16),
            8 => Ok(Datatype::I32),
            16 => Ok(Datatype::F32),
            64 => Ok(Datatype::F64),
            _ => Err(VolumeIoError::UnsupportedDatatype { code }),
        }
    }

    /// NIfTI datatype code.
    pub const fn code(&self) -> i16 {
        match self {
            Datatype::U8 => 2,
            Datatype::I16 => 4,
            Datatype::I32 => 8,
            Datatype::F32 => 16,
            Datatype::F64 => 64,
        }
    }

    /// Bytes per voxel value.
    pub const fn size(&self) -> usize {
        match self {
            Datatype::U8 => 1,
            Datatype::I16 => 2,
            Datatype::I32 | Datatype::F32 => 4,
            Datatype::F64 => 8,
        }
    }
}

/// The subset of the NIfTI-1 header used for volumetric scans.
///
/// Layout offsets (little endian):
/// - 0: `sizeof_hdr` (i32, always 348)
/// - 40: `dim[8]` (i16)
/// - 70: `datatype` (i16), 72: `bitpix` (i16)
/// - 76: `pixdim[8]` (f32)
/// - 108: `vox_offset` (f32)
/// - 112: `scl_slope` (f32), 116: `scl_inter` (f32)
/// - 344: magic `"n+1\0"`
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// `dim[1..=4]`: depth, height, width, channels.
    pub dims: [usize; 4],
    /// Voxel datatype.
    pub datatype: Datatype,
    /// Voxel spacing for the three spatial axes.
    pub spacing: [f32; 3],
    /// Byte offset of the voxel data.
    pub vox_offset: usize,
    /// Intensity scaling slope (0 means no scaling).
    pub scl_slope: f32,
    /// Intensity scaling intercept.
    pub scl_inter: f32,
}

impl NiftiHeader {
    /// Header for a float32 volume with unit spacing.
    pub fn new(dims: [usize; 4]) -> Self {
        Self {
            dims,
            datatype: Datatype::F32,
            spacing: [1.0; 3],
            vox_offset: VOX_OFFSET,
            scl_slope: 0.0,
            scl_inter: 0.0,
        }
    }

    /// Number of voxel values described by the header.
    pub fn num_values(&self) -> usize {
        self.dims.iter().product()
    }

    /// Serialize the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());
        bytes[38] = b'r';

        let ndim: i16 = if self.dims[3] > 1 { 4 } else { 3 };
        let mut dim = [1i16; 8];
        dim[0] = ndim;
        for (i, &d) in self.dims.iter().enumerate() {
            dim[i + 1] = d as i16;
        }
        for (i, d) in dim.iter().enumerate() {
            bytes[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
        }

        bytes[70..72].copy_from_slice(&self.datatype.code().to_le_bytes());
        let bitpix = (self.datatype.size() * 8) as i16;
        bytes[72..74].copy_from_slice(&bitpix.to_le_bytes());

        let mut pixdim = [1.0f32; 8];
        pixdim[1..4].copy_from_slice(&self.spacing);
        for (i, p) in pixdim.iter().enumerate() {
            bytes[76 + 4 * i..80 + 4 * i].copy_from_slice(&p.to_le_bytes());
        }

        bytes[108..112].copy_from_slice(&(self.vox_offset as f32).to_le_bytes());
        bytes[112..116].copy_from_slice(&self.scl_slope.to_le_bytes());
        bytes[116..120].copy_from_slice(&self.scl_inter.to_le_bytes());
        // xyzt_units: millimetres.
        bytes[123] = 2;
        bytes[344..348].copy_from_slice(&NIFTI_MAGIC);

        bytes
    }

    /// Deserialize a little-endian single-file header.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if sizeof_hdr != HEADER_SIZE as i32 {
            return Err(VolumeIoError::InvalidHeader {
                message: format!("sizeof_hdr is {} (big-endian files are not supported)", sizeof_hdr),
            });
        }
        if bytes[344..348] != NIFTI_MAGIC {
            return Err(VolumeIoError::InvalidHeader {
                message: "magic is not n+1".to_string(),
            });
        }

        let read_i16 = |offset: usize| i16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let read_f32 = |offset: usize| {
            f32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        let ndim = read_i16(40);
        if !(1..=4).contains(&ndim) {
            return Err(VolumeIoError::InvalidHeader {
                message: format!("unsupported dimensionality {}", ndim),
            });
        }
        let mut dims = [1usize; 4];
        for (i, d) in dims.iter_mut().enumerate().take(ndim as usize) {
            let value = read_i16(42 + 2 * i);
            if value < 1 {
                return Err(VolumeIoError::InvalidHeader {
                    message: format!("dim[{}] is {}", i + 1, value),
                });
            }
            *d = value as usize;
        }

        let datatype = Datatype::from_code(read_i16(70))?;
        let spacing = [read_f32(80), read_f32(84), read_f32(88)];
        let vox_offset = read_f32(108).max(VOX_OFFSET as f32) as usize;

        Ok(Self {
            dims,
            datatype,
            spacing,
            vox_offset,
            scl_slope: read_f32(112),
            scl_inter: read_f32(116),
        })
    }
}
