//! Track colour palette.

use core::fmt;
use core::str::FromStr;

use arrayvec::ArrayString;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::EventError;

macro_rules! palette {
    ($($variant:ident = $hex:literal,)*) => {
        /// Display colours assigned to tracks, in assignment order.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum TrackColor {
            $($variant,)*
        }

        impl TrackColor {
            pub const ALL: &'static [TrackColor] = &[$(TrackColor::$variant,)*];

            /// `0xRRGGBB`.
            pub const fn rgb(self) -> u32 {
                match self {
                    $(TrackColor::$variant => $hex,)*
                }
            }
        }
    };
}

palette! {
    MuddyWaters = 0xBD7651,
    SteelBlue = 0x4875A8,
    Celery = 0x9FB44D,
    Chestnut = 0xBA5055,
    CrayonPurple = 0x8048A8,
    Verdigris = 0x48A4A8,
    Twine = 0xBD8F51,
    Tapestry = 0xAB4A8D,
    VegasGold = 0xBDBA51,
    RichBlue = 0x5048A8,
    FruitSalad = 0x53A949,
    Husk = 0xBDA451,
    Mahogany = 0xC24100,
    MediumElectricBlue = 0x00499B,
    AppleGreen = 0x8EB200,
    VenetianRed = 0xBC000A,
    Indigo = 0x5B009B,
    EasternBlue = 0x00959B,
    Indochine = 0xC26E00,
    Flirt = 0xA2006F,
    Ultramarine = 0x0C009B,
    LaRioja = 0xC2BC00,
    ForestGreen = 0x119E00,
    Pizza = 0xC29500,
}

impl TrackColor {
    /// Colour for the `index`th track, cycling through the palette.
    pub fn for_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn from_rgb(rgb: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.rgb() == rgb)
    }

    /// Uppercase `#RRGGBB`.
    pub fn hex(self) -> ArrayString<7> {
        let mut out = ArrayString::new();
        let _ = fmt::write(&mut out, format_args!("#{:06X}", self.rgb()));
        out
    }

    /// Palette name such as `muddyWaters`.
    pub fn name(self) -> &'static str {
        match self {
            TrackColor::MuddyWaters => "muddyWaters",
            TrackColor::SteelBlue => "steelBlue",
            TrackColor::Celery => "celery",
            TrackColor::Chestnut => "chestnut",
            TrackColor::CrayonPurple => "crayonPurple",
            TrackColor::Verdigris => "verdigris",
            TrackColor::Twine => "twine",
            TrackColor::Tapestry => "tapestry",
            TrackColor::VegasGold => "vegasGold",
            TrackColor::RichBlue => "richBlue",
            TrackColor::FruitSalad => "fruitSalad",
            TrackColor::Husk => "husk",
            TrackColor::Mahogany => "mahogany",
            TrackColor::MediumElectricBlue => "mediumElectricBlue",
            TrackColor::AppleGreen => "appleGreen",
            TrackColor::VenetianRed => "venetianRed",
            TrackColor::Indigo => "indigo",
            TrackColor::EasternBlue => "easternBlue",
            TrackColor::Indochine => "indochine",
            TrackColor::Flirt => "flirt",
            TrackColor::Ultramarine => "ultramarine",
            TrackColor::LaRioja => "laRioja",
            TrackColor::ForestGreen => "forestGreen",
            TrackColor::Pizza => "pizza",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl Default for TrackColor {
    fn default() -> Self {
        TrackColor::MuddyWaters
    }
}

impl fmt::Display for TrackColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl FromStr for TrackColor {
    type Err = EventError;

    /// Accepts `#RRGGBB` in either case, or a palette name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const BAD: EventError = EventError::InvalidPayload("track colour");
        match s.strip_prefix('#') {
            Some(hex) if hex.len() == 6 => {
                let rgb = u32::from_str_radix(hex, 16).map_err(|_| BAD)?;
                Self::from_rgb(rgb).ok_or(BAD)
            }
            Some(_) => Err(BAD),
            None => Self::from_name(s).ok_or(BAD),
        }
    }
}

impl Serialize for TrackColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for TrackColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = alloc::string::String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
