//! Hardware buffer description and pixel formats

use serde::{Deserialize, Serialize};

use crate::error::{BufferHubError, Result};

/// Pixel formats understood by the hub's allocators
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    R8G8B8A8Unorm = 0x01,
    R8G8B8X8Unorm = 0x02,
    R8G8B8Unorm = 0x03,
    R5G6B5Unorm = 0x04,
    R16G16B16A16Float = 0x16,
    R10G10B10A2Unorm = 0x2b,
    Blob = 0x21,
    Y8Cb8Cr8_420 = 0x23,
    D16Unorm = 0x30,
    D24Unorm = 0x31,
    D24UnormS8Uint = 0x32,
    D32Float = 0x33,
    D32FloatS8Uint = 0x34,
    S8Uint = 0x35,
}

impl PixelFormat {
    /// Storage cost of one pixel in bits
    pub fn bits_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::R8G8B8A8Unorm
            | PixelFormat::R8G8B8X8Unorm
            | PixelFormat::R10G10B10A2Unorm
            | PixelFormat::D24UnormS8Uint
            | PixelFormat::D32Float => 32,
            PixelFormat::R8G8B8Unorm | PixelFormat::D24Unorm => 24,
            PixelFormat::R5G6B5Unorm | PixelFormat::D16Unorm => 16,
            PixelFormat::R16G16B16A16Float => 64,
            PixelFormat::D32FloatS8Uint => 40,
            PixelFormat::Y8Cb8Cr8_420 => 12,
            PixelFormat::Blob | PixelFormat::S8Uint => 8,
        }
    }

    /// Raw format value as sent over the wire
    pub fn raw(&self) -> u32 {
        *self as u32
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = BufferHubError;

    fn try_from(value: u32) -> Result<Self> {
        let format = match value {
            0x01 => PixelFormat::R8G8B8A8Unorm,
            0x02 => PixelFormat::R8G8B8X8Unorm,
            0x03 => PixelFormat::R8G8B8Unorm,
            0x04 => PixelFormat::R5G6B5Unorm,
            0x16 => PixelFormat::R16G16B16A16Float,
            0x2b => PixelFormat::R10G10B10A2Unorm,
            0x21 => PixelFormat::Blob,
            0x23 => PixelFormat::Y8Cb8Cr8_420,
            0x30 => PixelFormat::D16Unorm,
            0x31 => PixelFormat::D24Unorm,
            0x32 => PixelFormat::D24UnormS8Uint,
            0x33 => PixelFormat::D32Float,
            0x34 => PixelFormat::D32FloatS8Uint,
            0x35 => PixelFormat::S8Uint,
            other => {
                return Err(BufferHubError::invalid_parameter(
                    "format",
                    format!("Unknown pixel format {:#x}", other),
                ))
            }
        };
        Ok(format)
    }
}

/// Description of a hardware buffer
///
/// `stride` is an output filled in by the allocator. `rfu0` and `rfu1` are
/// reserved; the hub ignores whatever the caller sends and reports zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareBufferDescription {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: u32,
    pub usage: u64,
    pub stride: u32,
    pub rfu0: u32,
    pub rfu1: u64,
}

impl HardwareBufferDescription {
    /// Create a request description; stride and reserved words are zero
    pub fn new(width: u32, height: u32, layers: u32, format: PixelFormat, usage: u64) -> Self {
        Self {
            width,
            height,
            layers,
            format: format.raw(),
            usage,
            ..Default::default()
        }
    }

    /// Copy of the request with the output and reserved fields cleared
    pub fn sanitized(&self) -> Self {
        Self {
            stride: 0,
            rfu0: 0,
            rfu1: 0,
            ..*self
        }
    }

    /// Copy with the allocator-assigned stride filled in
    pub fn with_stride(&self, stride: u32) -> Self {
        Self {
            stride,
            ..self.sanitized()
        }
    }

    /// Decoded pixel format
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        PixelFormat::try_from(self.format)
    }

    /// True if the caller-controlled fields are equal
    pub fn matches_request(&self, request: &HardwareBufferDescription) -> bool {
        self.width == request.width
            && self.height == request.height
            && self.layers == request.layers
            && self.format == request.format
            && self.usage == request.usage
    }

    /// Validate the request before it reaches an allocator
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(BufferHubError::invalid_parameter("width", "Width cannot be zero"));
        }

        if self.height == 0 {
            return Err(BufferHubError::invalid_parameter("height", "Height cannot be zero"));
        }

        if self.layers == 0 {
            return Err(BufferHubError::invalid_parameter(
                "layers",
                "Layer count cannot be zero",
            ));
        }

        let format = self.pixel_format()?;
        if format == PixelFormat::Blob && (self.height != 1 || self.layers != 1) {
            return Err(BufferHubError::invalid_parameter(
                "format",
                "Blob buffers must have height and layer count of 1",
            ));
        }

        Ok(())
    }

    /// Bytes needed to store the buffer at `stride` pixels per row
    pub fn storage_size(&self, stride: u32) -> Result<usize> {
        let bits = self.pixel_format()?.bits_per_pixel() as u64;
        let total_bits = (stride as u64)
            .checked_mul(self.height as u64)
            .and_then(|v| v.checked_mul(self.layers as u64))
            .and_then(|v| v.checked_mul(bits))
            .ok_or_else(|| BufferHubError::allocation("Buffer dimensions overflow"))?;

        usize::try_from(total_bits.div_ceil(8))
            .map_err(|_| BufferHubError::allocation("Buffer does not fit in address space"))
    }
}
