//! Closed wire vocabularies of the Denon/Marantz control protocol.
//!
//! Every enum here mirrors a literal set the receiver actually speaks.
//! `wire()` returns the exact byte sequence used on the wire; `from_wire`
//! is its inverse and rejects anything outside the set.

use std::fmt;

/// Defines a closed literal set with `wire()` / `from_wire()` and a
/// `MEMBERS` table used by the generic catalogue handler.
macro_rules! closed_set {
    ($(#[$doc:meta])* $name:ident { $($variant:ident => $lit:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// All members, in catalogue order.
            pub const MEMBERS: &'static [$name] = &[$($name::$variant,)+];

            /// The literal as the device speaks it.
            pub fn wire(self) -> &'static str {
                match self {
                    $($name::$variant => $lit,)+
                }
            }

            /// Parses an exact wire literal.
            pub fn from_wire(s: &str) -> Option<Self> {
                match s {
                    $($lit => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.wire())
            }
        }
    };
}

closed_set! {
    /// Power state of the whole device or a zone.
    Power {
        Off => "OFF",
        On => "ON",
        Standby => "STANDBY",
    }
}

closed_set! {
    /// Selectable input sources.
    InputSource {
        Phono => "PHONO",
        Cd => "CD",
        Dvd => "DVD",
        Bluray => "BD",
        Tv => "TV",
        SetTopBox => "SAT/CBL",
        MediaPlayer => "MPLAY",
        Game => "GAME",
        Tuner => "TUNER",
        HdRadio => "HDRADIO",
        SiriusXm => "SIRIUSXM",
        Pandora => "PANDORA",
        LastFm => "LASTFM",
        Flickr => "FLICKR",
        Spotify => "SPOTIFY",
        InternetRadio => "IRADIO",
        Server => "SERVER",
        Favourites => "FAVORITES",
        Aux1 => "AUX1",
        Aux2 => "AUX2",
        Aux3 => "AUX3",
        Aux4 => "AUX4",
        Aux5 => "AUX5",
        Aux6 => "AUX6",
        Aux7 => "AUX7",
        OnlineMusic => "NET",
        Bluetooth => "BT",
        MxPort => "MXPORT",
        Usb => "USB",
        IpodDirect => "IPOD DIRECT",
        Ipod => "IPOD",
        UsbIpod => "USB/IPOD",
        None => "OFF",
        MainSource => "SOURCE",
        EightK => "8K",
    }
}

closed_set! {
    /// Surround/sound programme. `Left`/`Right` rotate through options.
    SurroundMode {
        Movie => "MOVIE",
        Music => "MUSIC",
        Game => "GAME",
        Direct => "DIRECT",
        PureDirect => "PURE DIRECT",
        Stereo => "STEREO",
        Auto => "AUTO",
        DolbyDigital => "DOLBY DIGITAL",
        DtsSurround => "DTS SURROUND",
        Auro3d => "AURO3D",
        Auro2dSurround => "AURO2DSURR",
        MultiChannelStereo => "MCH STEREO",
        SuperStadium => "SUPER STADIUM",
        RockArena => "ROCK ARENA",
        JazzClub => "JAZZ CLUB",
        ClassicConcert => "CLASSIC CONCERT",
        MonoMovie => "MONO MOVIE",
        Matrix => "MATRIX",
        Virtual => "VIRTUAL",
        Left => "LEFT",
        Right => "RIGHT",
    }
}

closed_set! {
    /// Video processing mode.
    PictureMode {
        Off => "OFF",
        Standard => "STD",
        Movie => "MOV",
        Vivid => "VVD",
        Stream => "STM",
        Custom => "CTM",
        IsfDay => "DAY",
        IsfNight => "NGT",
    }
}

closed_set! {
    /// Power-saving mode.
    EcoMode {
        Off => "OFF",
        On => "ON",
        Auto => "AUTO",
    }
}

closed_set! {
    /// Dynamic range compression.
    DrcMode {
        Off => "OFF",
        Auto => "AUTO",
        High => "HI",
        Medium => "MID",
        Low => "LOW",
    }
}

closed_set! {
    /// Audyssey dynamic volume.
    DynamicVolume {
        Off => "OFF",
        Light => "LIT",
        Medium => "MED",
        Heavy => "HEV",
    }
}

closed_set! {
    /// Compressed-audio restorer.
    AudioRestorer {
        Off => "OFF",
        Low => "LOW",
        Medium => "MED",
        High => "HI",
    }
}

closed_set! {
    /// Auto-standby timer.
    StandbyTimer {
        After15Min => "15M",
        After30Min => "30M",
        After60Min => "60M",
        Off => "OFF",
    }
}

closed_set! {
    /// Bluetooth transmitter output routing.
    BluetoothOutputMode {
        SpeakerAndBt => "SP",
        BtOnly => "BT",
    }
}

closed_set! {
    /// Firmware block reported by `SSINFFRM`.
    MicroCodeType {
        Dts => "DTS",
        Avr => "AVR",
    }
}

closed_set! {
    /// Dimension of the combined `BTTX` cell.
    BluetoothDimension {
        Transmitter => "Transmitter",
        OutputMode => "OutputMode",
    }
}

/// Logical output zone of the receiver.
///
/// The host boundary identifies zones by the literals `1`/`2`/`3`
/// (`UNDEFINED` for system-wide codes); the wire uses the `Z2`/`Z3`
/// mnemonic prefixes instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zone {
    Undefined,
    Main,
    Zone2,
    Zone3,
}

impl Zone {
    /// Literal used in host-facing keys and payloads.
    pub fn host(self) -> &'static str {
        match self {
            Zone::Undefined => "UNDEFINED",
            Zone::Main => "1",
            Zone::Zone2 => "2",
            Zone::Zone3 => "3",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host())
    }
}

/// Speaker positions addressable for bias (`CV`) and level (`SSLEV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    FrontLeft,
    FrontRight,
    Centre,
    Subwoofer,
    Subwoofer2,
    SurroundLeft,
    SurroundRight,
    SurroundBackLeft,
    SurroundBackRight,
    SurroundBack,
    FrontHeightLeft,
    FrontHeightRight,
    FrontWideLeft,
    FrontWideRight,
    FrontTopLeft,
    FrontTopRight,
    MiddleTopLeft,
    MiddleTopRight,
    RearTopLeft,
    RearTopRight,
    RearHeightLeft,
    RearHeightRight,
    FrontDolbyLeft,
    FrontDolbyRight,
    SurroundDolbyLeft,
    SurroundDolbyRight,
    BackDolbyLeft,
    BackDolbyRight,
    SurroundHeightLeft,
    SurroundHeightRight,
    TopSurround,
    CentreHeight,
}

impl Channel {
    const CODES: &'static [(Channel, &'static str)] = &[
        (Channel::FrontLeft, "FL"),
        (Channel::FrontRight, "FR"),
        (Channel::Centre, "C"),
        (Channel::Subwoofer, "SW"),
        (Channel::Subwoofer2, "SW2"),
        (Channel::SurroundLeft, "SL"),
        (Channel::SurroundRight, "SR"),
        (Channel::SurroundBackLeft, "SBL"),
        (Channel::SurroundBackRight, "SBR"),
        (Channel::SurroundBack, "SB"),
        (Channel::FrontHeightLeft, "FHL"),
        (Channel::FrontHeightRight, "FHR"),
        (Channel::FrontWideLeft, "FWL"),
        (Channel::FrontWideRight, "FWR"),
        (Channel::FrontTopLeft, "TFL"),
        (Channel::FrontTopRight, "TFR"),
        (Channel::MiddleTopLeft, "TML"),
        (Channel::MiddleTopRight, "TMR"),
        (Channel::RearTopLeft, "TRL"),
        (Channel::RearTopRight, "TRR"),
        (Channel::RearHeightLeft, "RHL"),
        (Channel::RearHeightRight, "RHR"),
        (Channel::FrontDolbyLeft, "FDL"),
        (Channel::FrontDolbyRight, "FDR"),
        (Channel::SurroundDolbyLeft, "SDL"),
        (Channel::SurroundDolbyRight, "SDR"),
        (Channel::BackDolbyLeft, "BDL"),
        (Channel::BackDolbyRight, "BDR"),
        (Channel::SurroundHeightLeft, "SHL"),
        (Channel::SurroundHeightRight, "SHR"),
        (Channel::TopSurround, "TS"),
        (Channel::CentreHeight, "CH"),
    ];

    /// The 2-3 letter code used on the wire.
    pub fn wire(self) -> &'static str {
        Self::CODES
            .iter()
            .find(|(c, _)| *c == self)
            .map(|(_, s)| *s)
            .unwrap_or("?")
    }

    /// Parses a wire code (`FL`, `SW2`, ...).
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::CODES.iter().find(|(_, w)| *w == s).map(|(c, _)| *c)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}
