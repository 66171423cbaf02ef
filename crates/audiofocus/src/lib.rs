//! Audio focus and interrupt arbitration.
//!
//! When several streams want to play at once, the engine decides which keeps
//! playing, which is paused or ducked, and which is stopped, and drives each
//! stream through its lifecycle.
//!
//! ```rust
//! use audiofocus::{AudioManager, AudioRendererOptions, ArbitratorConfig};
//! use audiofocus::{ContentType, InterruptMode, SessionState, StreamUsage};
//!
//! let manager = AudioManager::new(ArbitratorConfig::default());
//! let music = manager
//!     .create_audio_renderer(AudioRendererOptions::new(ContentType::Music, StreamUsage::Media))
//!     .unwrap();
//! let call = manager
//!     .create_audio_renderer(AudioRendererOptions::new(
//!         ContentType::Speech,
//!         StreamUsage::VoiceCommunication,
//!     ))
//!     .unwrap();
//! music.set_interrupt_mode(InterruptMode::Independent).unwrap();
//! call.set_interrupt_mode(InterruptMode::Independent).unwrap();
//!
//! music.start().unwrap();
//! call.start().unwrap();
//! assert_eq!(music.state(), SessionState::Paused);
//!
//! call.stop().unwrap();
//! assert_eq!(music.state(), SessionState::Running);
//! ```

pub mod api;
pub mod app_focus;
pub mod audio_session;
pub mod arbitrator;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod policy;
pub mod registry;
pub mod session;
pub mod state;
pub mod types;

pub use api::{
    AudioCapturer, AudioCapturerInfo, AudioCapturerOptions, AudioManager, AudioRenderer,
    AudioRendererInfo, AudioRendererOptions, SessionHandle, StreamInfo,
};
pub use app_focus::{AppFocus, ClientId, FocusListener};
pub use audio_session::{
    AudioSessionListener, AudioSessionService, AudioSessionStrategy, ConcurrencyMode,
    DeactiveReason,
};
pub use arbitrator::{ArbitrationResult, ArbitratorConfig, FocusArbitrator, FocusInfo, FocusStatus};
pub use dispatcher::{EventDispatcher, InterruptListener, Listener, StateListener};
pub use error::{FocusError, Result};
pub use event::{
    EventKind, InterruptEvent, InterruptForceType, InterruptHint, InterruptType, StateChange,
};
pub use policy::{decide, InterruptPolicy, PolicyRule, Verdict};
pub use registry::{InMemoryRegistry, RegistryStats, SessionRegistry};
pub use session::{SessionId, SessionSpec, StreamSession};
pub use state::{SessionState, TransitionCause};
pub use types::{
    ContentType, Direction, FocusClass, InterruptMode, SessionIntent, SourceType, StreamUsage,
};
