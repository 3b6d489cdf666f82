use {
    crate::format::Format,
    std::{cell::Cell, fmt::Debug},
};

/// Identifies a decoded frame inside the allocator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct MemId(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransferFunction {
    Sdr,
    Pq,
    Hlg,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColorPrimaries {
    Bt709,
    Bt2020,
}

/// A CIE 1931 xy coordinate in units of 0.00002.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Chromaticity {
    pub x: u16,
    pub y: u16,
}

/// Mastering display color volume as carried in the bitstream.
///
/// Luminance values are in units of 0.0001 cd/m².
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct MasteringDisplay {
    pub red: Chromaticity,
    pub green: Chromaticity,
    pub blue: Chromaticity,
    pub white_point: Chromaticity,
    pub max_luminance: u32,
    pub min_luminance: u32,
}

/// Content light level in cd/m².
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct ContentLightLevel {
    pub max_cll: u16,
    pub max_fall: u16,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ColorDescription {
    pub transfer: TransferFunction,
    pub primaries: ColorPrimaries,
    pub mastering: Option<MasteringDisplay>,
    pub content_light: Option<ContentLightLevel>,
}

impl ColorDescription {
    pub fn is_hdr(&self) -> bool {
        self.transfer != TransferFunction::Sdr
    }
}

/// A decoded frame as seen by the renderer.
#[derive(Debug)]
pub struct FrameSurface {
    pub mem: MemId,
    pub width: u32,
    pub height: u32,
    pub format: &'static Format,
    pub color: Option<ColorDescription>,
    locked: Cell<u16>,
}

impl FrameSurface {
    pub fn new(mem: MemId, width: u32, height: u32, format: &'static Format) -> Self {
        Self {
            mem,
            width,
            height,
            format,
            color: None,
            locked: Cell::new(0),
        }
    }

    pub fn with_color(mut self, color: ColorDescription) -> Self {
        self.color = Some(color);
        self
    }

    /// The HDR description of this frame, if it should be signaled as HDR.
    pub fn hdr(&self) -> Option<&ColorDescription> {
        self.color.as_ref().filter(|c| c.is_hdr())
    }

    pub fn lock(&self) {
        self.locked.set(self.locked.get().saturating_add(1));
    }

    pub fn unlock(&self) {
        self.locked.set(self.locked.get().saturating_sub(1));
    }

    /// Whether the display still references this frame.
    pub fn is_locked(&self) -> bool {
        self.locked.get() > 0
    }
}
