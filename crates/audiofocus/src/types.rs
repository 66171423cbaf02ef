//! Domain types describing what a stream is and how it competes for focus.
//!
//! The enums a client passes in carry the numeric value used on the wire
//! (`as_raw`/`from_raw`). All of them have the snake_case name that config
//! files, the CLI and serde use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A name that did not match any variant of the named enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Whether a session produces or consumes audio. Also serves as the route:
/// renderers only compete with renderers, capturers with capturers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Renderer,
    Capturer,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Direction::Renderer => "renderer",
            Direction::Capturer => "capturer",
        }
    }
}

/// What the audio contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Unknown,
    Speech,
    Music,
    Movie,
    Sonification,
    Ringtone,
    Ultrasonic,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Unknown,
        ContentType::Speech,
        ContentType::Music,
        ContentType::Movie,
        ContentType::Sonification,
        ContentType::Ringtone,
        ContentType::Ultrasonic,
    ];

    pub fn as_raw(self) -> i64 {
        match self {
            ContentType::Unknown => 0,
            ContentType::Speech => 1,
            ContentType::Music => 2,
            ContentType::Movie => 3,
            ContentType::Sonification => 4,
            ContentType::Ringtone => 5,
            ContentType::Ultrasonic => 9,
        }
    }

    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_raw() == raw)
    }

    pub fn name(self) -> &'static str {
        match self {
            ContentType::Unknown => "unknown",
            ContentType::Speech => "speech",
            ContentType::Music => "music",
            ContentType::Movie => "movie",
            ContentType::Sonification => "sonification",
            ContentType::Ringtone => "ringtone",
            ContentType::Ultrasonic => "ultrasonic",
        }
    }
}

/// What the stream is used for. This drives the interrupt policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamUsage {
    Unknown,
    Media,
    VoiceCommunication,
    NotificationRingtone,
    VoiceAssistant,
    Alarm,
    Accessibility,
    System,
    Notification,
    Game,
    Navigation,
    VoiceMessage,
    Movie,
    Music,
    Audiobook,
}

impl StreamUsage {
    pub const ALL: [StreamUsage; 15] = [
        StreamUsage::Unknown,
        StreamUsage::Media,
        StreamUsage::VoiceCommunication,
        StreamUsage::NotificationRingtone,
        StreamUsage::VoiceAssistant,
        StreamUsage::Alarm,
        StreamUsage::Accessibility,
        StreamUsage::System,
        StreamUsage::Notification,
        StreamUsage::Game,
        StreamUsage::Navigation,
        StreamUsage::VoiceMessage,
        StreamUsage::Movie,
        StreamUsage::Music,
        StreamUsage::Audiobook,
    ];

    /// `Music` shares value 1 with `Media`; decoding 1 yields `Media`.
    pub fn as_raw(self) -> i64 {
        match self {
            StreamUsage::Unknown => 0,
            StreamUsage::Media | StreamUsage::Music => 1,
            StreamUsage::VoiceCommunication => 2,
            StreamUsage::VoiceAssistant => 3,
            StreamUsage::Alarm => 4,
            StreamUsage::VoiceMessage => 5,
            StreamUsage::NotificationRingtone => 6,
            StreamUsage::Notification => 7,
            StreamUsage::Accessibility => 8,
            StreamUsage::System => 9,
            StreamUsage::Movie => 10,
            StreamUsage::Game => 11,
            StreamUsage::Audiobook => 12,
            StreamUsage::Navigation => 13,
        }
    }

    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|u| u.as_raw() == raw)
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamUsage::Unknown => "unknown",
            StreamUsage::Media => "media",
            StreamUsage::VoiceCommunication => "voice_communication",
            StreamUsage::NotificationRingtone => "notification_ringtone",
            StreamUsage::VoiceAssistant => "voice_assistant",
            StreamUsage::Alarm => "alarm",
            StreamUsage::Accessibility => "accessibility",
            StreamUsage::System => "system",
            StreamUsage::Notification => "notification",
            StreamUsage::Game => "game",
            StreamUsage::Navigation => "navigation",
            StreamUsage::VoiceMessage => "voice_message",
            StreamUsage::Movie => "movie",
            StreamUsage::Music => "music",
            StreamUsage::Audiobook => "audiobook",
        }
    }

    /// Usages in the same class stop each other when no earlier rule applies.
    pub fn focus_class(self) -> FocusClass {
        match self {
            StreamUsage::Unknown
            | StreamUsage::Media
            | StreamUsage::Movie
            | StreamUsage::Music
            | StreamUsage::Audiobook
            | StreamUsage::Game => FocusClass::Media,
            StreamUsage::VoiceCommunication => FocusClass::VoiceCommunication,
            StreamUsage::NotificationRingtone => FocusClass::Ringtone,
            StreamUsage::VoiceAssistant => FocusClass::VoiceAssistant,
            StreamUsage::Alarm => FocusClass::Alarm,
            StreamUsage::Accessibility => FocusClass::Accessibility,
            StreamUsage::System => FocusClass::System,
            StreamUsage::Notification => FocusClass::Notification,
            StreamUsage::Navigation => FocusClass::Navigation,
            StreamUsage::VoiceMessage => FocusClass::VoiceMessage,
        }
    }
}

/// Coarse grouping of usages that the policy reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusClass {
    Media,
    VoiceCommunication,
    Ringtone,
    VoiceAssistant,
    Alarm,
    Accessibility,
    System,
    Notification,
    Navigation,
    VoiceMessage,
}

impl FocusClass {
    pub const ALL: [FocusClass; 10] = [
        FocusClass::Media,
        FocusClass::VoiceCommunication,
        FocusClass::Ringtone,
        FocusClass::VoiceAssistant,
        FocusClass::Alarm,
        FocusClass::Accessibility,
        FocusClass::System,
        FocusClass::Notification,
        FocusClass::Navigation,
        FocusClass::VoiceMessage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FocusClass::Media => "media",
            FocusClass::VoiceCommunication => "voice_communication",
            FocusClass::Ringtone => "ringtone",
            FocusClass::VoiceAssistant => "voice_assistant",
            FocusClass::Alarm => "alarm",
            FocusClass::Accessibility => "accessibility",
            FocusClass::System => "system",
            FocusClass::Notification => "notification",
            FocusClass::Navigation => "navigation",
            FocusClass::VoiceMessage => "voice_message",
        }
    }
}

/// Capture source of a capturer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Mic,
    VoiceRecognition,
    PlaybackCapture,
    VoiceCommunication,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::Mic,
        SourceType::VoiceRecognition,
        SourceType::PlaybackCapture,
        SourceType::VoiceCommunication,
    ];

    pub fn as_raw(self) -> i64 {
        match self {
            SourceType::Mic => 0,
            SourceType::VoiceRecognition => 1,
            SourceType::PlaybackCapture => 2,
            SourceType::VoiceCommunication => 7,
        }
    }

    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_raw() == raw)
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceType::Mic => "mic",
            SourceType::VoiceRecognition => "voice_recognition",
            SourceType::PlaybackCapture => "playback_capture",
            SourceType::VoiceCommunication => "voice_communication",
        }
    }

    /// The usage a capturer with this source arbitrates as.
    pub fn usage(self) -> StreamUsage {
        match self {
            SourceType::VoiceCommunication => StreamUsage::VoiceCommunication,
            SourceType::VoiceRecognition => StreamUsage::VoiceAssistant,
            SourceType::Mic | SourceType::PlaybackCapture => StreamUsage::Unknown,
        }
    }
}

/// Whether a session takes part in arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterruptMode {
    /// Never interrupts others and never receives interrupt events.
    #[default]
    Share,
    /// Arbitrated against other independent sessions and told about every verdict.
    Independent,
}

impl InterruptMode {
    pub const ALL: [InterruptMode; 2] = [InterruptMode::Share, InterruptMode::Independent];

    pub fn as_raw(self) -> i64 {
        match self {
            InterruptMode::Share => 0,
            InterruptMode::Independent => 1,
        }
    }

    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_raw() == raw)
    }

    pub fn name(self) -> &'static str {
        match self {
            InterruptMode::Share => "share",
            InterruptMode::Independent => "independent",
        }
    }
}

/// Declared purpose of a session, the input to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIntent {
    pub content_type: ContentType,
    pub usage: StreamUsage,
}

impl SessionIntent {
    pub fn new(content_type: ContentType, usage: StreamUsage) -> Self {
        Self {
            content_type,
            usage,
        }
    }

    pub fn focus_class(&self) -> FocusClass {
        self.usage.focus_class()
    }
}

impl fmt::Display for SessionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.content_type, self.usage)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! named_enum {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == s)
                    .ok_or_else(|| ParseEnumError::new($kind, s))
            }
        }
    };
}

named_enum!(ContentType, "content type");
named_enum!(StreamUsage, "stream usage");
named_enum!(FocusClass, "focus class");
named_enum!(SourceType, "source type");
named_enum!(InterruptMode, "interrupt mode");
