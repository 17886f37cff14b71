//! Display orientation

/// Display rotation relative to the panel's native orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rotation {
    /// Landscape, keyboard below the screen
    #[default]
    Landscape,
    /// Portrait, rotated 90° clockwise
    Portrait,
    /// Landscape, upside down
    LandscapeInverted,
    /// Portrait, rotated 90° counter-clockwise
    PortraitInverted,
}

impl Rotation {
    /// MIPI DCS `MADCTL` value for this rotation on the T-Deck's ST7789.
    pub fn madctl(self) -> u8 {
        // MY=0x80, MX=0x40, MV=0x20; the panel is mounted with MX|MV as its
        // landscape baseline.
        match self {
            Self::Landscape => 0x60,
            Self::Portrait => 0x00,
            Self::LandscapeInverted => 0xA0,
            Self::PortraitInverted => 0xC0,
        }
    }

    /// Whether the logical width and height are swapped from landscape.
    pub fn is_portrait(self) -> bool {
        matches!(self, Self::Portrait | Self::PortraitInverted)
    }

    /// Next rotation clockwise (the `' '` key in the demo firmware).
    pub fn next(self) -> Self {
        match self {
            Self::Landscape => Self::Portrait,
            Self::Portrait => Self::LandscapeInverted,
            Self::LandscapeInverted => Self::PortraitInverted,
            Self::PortraitInverted => Self::Landscape,
        }
    }

    /// Index 0..=3 used for lock-free storage.
    pub fn index(self) -> u8 {
        match self {
            Self::Landscape => 0,
            Self::Portrait => 1,
            Self::LandscapeInverted => 2,
            Self::PortraitInverted => 3,
        }
    }

    /// Inverse of [`Rotation::index`]; out-of-range values wrap.
    pub fn from_index(index: u8) -> Self {
        match index % 4 {
            1 => Self::Portrait,
            2 => Self::LandscapeInverted,
            3 => Self::PortraitInverted,
            _ => Self::Landscape,
        }
    }
}
