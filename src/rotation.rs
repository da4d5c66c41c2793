//! Orientation table shared by the panel and the touch sensor.
//!
//! Native panel frame is 450x600 portrait (`Deg270`, USB on the left). The
//! touch sensor reports in that same fixed frame regardless of rotation.

use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

// MADCTL bits
const MADCTL_MY: u8 = 0x80;
const MADCTL_MX: u8 = 0x40;
const MADCTL_MV: u8 = 0x20;

/// Display rotation, counter-clockwise from the landscape default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// Landscape, USB at the bottom
    #[default]
    Deg0,
    /// Portrait, USB on the right
    Deg90,
    /// Landscape, USB at the top
    Deg180,
    /// Portrait, USB on the left (panel native)
    Deg270,
}

/// Everything a rotation decides about the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub madctl: u8,
    pub width: u16,
    pub height: u16,
    pub offset_x: u16,
    pub offset_y: u16,
}

impl Rotation {
    /// Get the next rotation in the cycle
    pub fn next(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }

    /// Get rotation angle in degrees for logging
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Rotation for index `0..=3`; higher bits are ignored.
    pub fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub const fn geometry(self) -> Geometry {
        match self {
            Rotation::Deg0 => Geometry {
                madctl: MADCTL_MY | MADCTL_MV,
                width: SCREEN_HEIGHT,
                height: SCREEN_WIDTH,
                offset_x: 0,
                offset_y: 16,
            },
            Rotation::Deg90 => Geometry {
                madctl: MADCTL_MY | MADCTL_MX,
                width: SCREEN_WIDTH,
                height: SCREEN_HEIGHT,
                offset_x: 14,
                offset_y: 0,
            },
            Rotation::Deg180 => Geometry {
                madctl: MADCTL_MX | MADCTL_MV,
                width: SCREEN_HEIGHT,
                height: SCREEN_WIDTH,
                offset_x: 0,
                offset_y: 14,
            },
            Rotation::Deg270 => Geometry {
                madctl: 0x00,
                width: SCREEN_WIDTH,
                height: SCREEN_HEIGHT,
                offset_x: 16,
                offset_y: 0,
            },
        }
    }

    /// Maps a raw touch sample from the sensor's native frame to logical
    /// coordinates under this rotation. Out-of-frame samples clamp at 0.
    pub fn map_touch(self, raw_x: u16, raw_y: u16) -> (u16, u16) {
        match self {
            Rotation::Deg0 => (SCREEN_HEIGHT.saturating_sub(raw_y), raw_x),
            Rotation::Deg90 => (
                SCREEN_WIDTH.saturating_sub(raw_x),
                SCREEN_HEIGHT.saturating_sub(raw_y),
            ),
            Rotation::Deg180 => (raw_y, SCREEN_WIDTH.saturating_sub(raw_x)),
            Rotation::Deg270 => (raw_x, raw_y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    // Where on the sensor a logical point under `rotation` physically lies.
    fn physical(rotation: Rotation, x: u16, y: u16) -> (u16, u16) {
        match rotation {
            Rotation::Deg0 => (y, SCREEN_HEIGHT - x),
            Rotation::Deg90 => (SCREEN_WIDTH - x, SCREEN_HEIGHT - y),
            Rotation::Deg180 => (SCREEN_WIDTH - y, x),
            Rotation::Deg270 => (x, y),
        }
    }

    #[test]
    fn table_matches_panel_configuration() {
        let rows: [(u8, u16, u16, u16, u16); 4] = [
            (0xA0, 600, 450, 0, 16),
            (0xC0, 450, 600, 14, 0),
            (0x60, 600, 450, 0, 14),
            (0x00, 450, 600, 16, 0),
        ];
        for (rotation, (madctl, w, h, ox, oy)) in ALL.into_iter().zip(rows) {
            let g = rotation.geometry();
            assert_eq!((g.madctl, g.width, g.height, g.offset_x, g.offset_y), (madctl, w, h, ox, oy));
        }
    }

    #[test]
    fn index_round_trip_and_cycle() {
        for (i, rotation) in ALL.into_iter().enumerate() {
            assert_eq!(rotation.index(), i as u8);
            assert_eq!(Rotation::from_index(i as u8), rotation);
            assert_eq!(rotation.next(), ALL[(i + 1) % 4]);
        }
        assert_eq!(Rotation::from_index(5), Rotation::Deg90);
    }

    #[test]
    fn documented_touch_samples() {
        assert_eq!(Rotation::Deg270.map_touch(100, 200), (100, 200));
        assert_eq!(Rotation::Deg0.map_touch(100, 200), (400, 100));
        assert_eq!(Rotation::Deg90.map_touch(100, 200), (350, 400));
        assert_eq!(Rotation::Deg180.map_touch(100, 200), (200, 350));
    }

    #[test]
    fn touch_lands_on_drawn_point() {
        for rotation in ALL {
            let g = rotation.geometry();
            for x in (0..=g.width).step_by(25) {
                for y in (0..=g.height).step_by(25) {
                    let (rx, ry) = physical(rotation, x, y);
                    assert_eq!(rotation.map_touch(rx, ry), (x, y), "{rotation:?}");
                }
            }
        }
    }

    #[test]
    fn sensor_frame_maps_inside_logical_frame() {
        for rotation in ALL {
            let g = rotation.geometry();
            for rx in (0..=SCREEN_WIDTH).step_by(15) {
                for ry in (0..=SCREEN_HEIGHT).step_by(15) {
                    let (x, y) = rotation.map_touch(rx, ry);
                    assert!(x <= g.width && y <= g.height, "{rotation:?} ({rx},{ry})");
                }
            }
        }
    }

    #[test]
    fn out_of_frame_sample_clamps() {
        assert_eq!(Rotation::Deg0.map_touch(10, 700), (0, 10));
        assert_eq!(Rotation::Deg90.map_touch(500, 650), (0, 0));
    }
}
