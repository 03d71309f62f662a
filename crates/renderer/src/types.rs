use std::cell::Cell;
use std::rc::Rc;

use catalog::AntialiasSetting;

/// Logical size used when a surface's layout box reports zero.
pub const DEFAULT_SURFACE_WIDTH: f32 = 340.0;
pub const DEFAULT_SURFACE_HEIGHT: f32 = 180.0;

/// Device pixel ratios above this are clamped to bound fill-rate on dense displays.
pub const MAX_PIXEL_RATIO: f32 = 2.0;

/// Axis-aligned box in logical page coordinates (origin top-left, Y down).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutBox {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }
}

pub fn clamp_pixel_ratio(device_pixel_ratio: f32) -> f32 {
    if !device_pixel_ratio.is_finite() || device_pixel_ratio <= 0.0 {
        return 1.0;
    }
    device_pixel_ratio.min(MAX_PIXEL_RATIO)
}

/// Logical dimensions of a drawing surface plus the pixel ratio it renders at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            pixel_ratio: clamp_pixel_ratio(device_pixel_ratio),
        }
    }

    /// Size of a card surface with the given layout box. Each zero (or
    /// non-finite) dimension falls back to the default card surface size.
    pub fn from_layout(layout: &LayoutBox, device_pixel_ratio: f32) -> Self {
        let width = if layout.width > 0.0 && layout.width.is_finite() {
            layout.width
        } else {
            DEFAULT_SURFACE_WIDTH
        };
        let height = if layout.height > 0.0 && layout.height.is_finite() {
            layout.height
        } else {
            DEFAULT_SURFACE_HEIGHT
        };
        Self {
            width,
            height,
            pixel_ratio: clamp_pixel_ratio(device_pixel_ratio),
        }
    }

    /// Backing store size in physical pixels, never smaller than 1x1.
    pub fn physical(&self) -> (u32, u32) {
        let width = (self.width * self.pixel_ratio).round().max(1.0);
        let height = (self.height * self.pixel_ratio).round().max(1.0);
        (width as u32, height as u32)
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// What the page adapter currently reports for one surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub layout: LayoutBox,
    pub device_pixel_ratio: f32,
}

/// Shared view of a surface's geometry. The page adapter writes it when the
/// layout changes; scenes read it on construction, resize and pointer moves.
#[derive(Debug, Clone)]
pub struct SurfaceHandle(Rc<Cell<SurfaceGeometry>>);

impl SurfaceHandle {
    pub fn new(layout: LayoutBox, device_pixel_ratio: f32) -> Self {
        Self(Rc::new(Cell::new(SurfaceGeometry {
            layout,
            device_pixel_ratio,
        })))
    }

    pub fn geometry(&self) -> SurfaceGeometry {
        self.0.get()
    }

    pub fn layout(&self) -> LayoutBox {
        self.0.get().layout
    }

    pub fn set_layout(&self, layout: LayoutBox) {
        let mut geometry = self.0.get();
        geometry.layout = layout;
        self.0.set(geometry);
    }

    pub fn set_device_pixel_ratio(&self, device_pixel_ratio: f32) {
        let mut geometry = self.0.get();
        geometry.device_pixel_ratio = device_pixel_ratio;
        self.0.set(geometry);
    }

    /// Current size derived from the layout box, with the default fallback.
    pub fn size(&self) -> SurfaceSize {
        let geometry = self.0.get();
        SurfaceSize::from_layout(&geometry.layout, geometry.device_pixel_ratio)
    }

    pub fn ptr_eq(&self, other: &SurfaceHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Logical window size and scale factor as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale_factor: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    pub fn surface_size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width, self.height, self.scale_factor)
    }
}

/// Multi-sample anti-aliasing preference for card targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the target format.
    Auto,
    /// Render card targets without MSAA.
    Off,
    /// Request a specific sample count (clamped to what the device supports).
    Samples(u32),
}

impl Default for Antialiasing {
    fn default() -> Self {
        Self::Samples(4)
    }
}

impl Antialiasing {
    pub fn requested_samples(self) -> Option<u32> {
        match self {
            Antialiasing::Auto => None,
            Antialiasing::Off => Some(1),
            Antialiasing::Samples(count) => Some(count),
        }
    }
}

impl From<AntialiasSetting> for Antialiasing {
    fn from(setting: AntialiasSetting) -> Self {
        match setting {
            AntialiasSetting::Auto => Antialiasing::Auto,
            AntialiasSetting::Off => Antialiasing::Off,
            AntialiasSetting::Samples2 => Antialiasing::Samples(2),
            AntialiasSetting::Samples4 => Antialiasing::Samples(4),
            AntialiasSetting::Samples8 => Antialiasing::Samples(8),
            AntialiasSetting::Samples16 => Antialiasing::Samples(16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_fall_back_independently() {
        let size = SurfaceSize::from_layout(&LayoutBox::new(0.0, 0.0, 0.0, 120.0), 1.0);
        assert_eq!(size.width, DEFAULT_SURFACE_WIDTH);
        assert_eq!(size.height, 120.0);

        let size = SurfaceSize::from_layout(&LayoutBox::default(), 1.0);
        assert_eq!((size.width, size.height), (340.0, 180.0));
    }

    #[test]
    fn pixel_ratio_is_clamped() {
        let size = SurfaceSize::from_layout(&LayoutBox::new(0.0, 0.0, 100.0, 50.0), 3.0);
        assert_eq!(size.pixel_ratio, 2.0);
        assert_eq!(size.physical(), (200, 100));
        assert_eq!(clamp_pixel_ratio(f32::NAN), 1.0);
        assert_eq!(clamp_pixel_ratio(1.25), 1.25);
    }

    #[test]
    fn handle_shares_geometry_between_clones() {
        let handle = SurfaceHandle::new(LayoutBox::new(10.0, 20.0, 300.0, 150.0), 1.0);
        let reader = handle.clone();
        handle.set_layout(LayoutBox::new(0.0, 0.0, 200.0, 100.0));
        handle.set_device_pixel_ratio(2.0);
        assert_eq!(reader.size().physical(), (400, 200));
        assert!(reader.ptr_eq(&handle));
    }

    #[test]
    fn layout_box_contains_is_half_open() {
        let layout = LayoutBox::new(10.0, 10.0, 20.0, 20.0);
        assert!(layout.contains(10.0, 10.0));
        assert!(!layout.contains(30.0, 15.0));
    }
}
