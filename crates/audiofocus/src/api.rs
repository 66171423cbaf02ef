//! Client-facing adapter: renderer and capturer handles over the arbitrator.
//!
//! Options are validated here, before anything reaches the registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app_focus::{AppFocus, ClientId, FocusListener};
use crate::arbitrator::{ArbitratorConfig, FocusArbitrator, FocusInfo};
use crate::audio_session::{AudioSessionListener, AudioSessionService, AudioSessionStrategy};
use crate::dispatcher::{InterruptListener, StateListener};
use crate::error::{FocusError, Result};
use crate::event::{EventKind, InterruptEvent};
use crate::registry::SessionRegistry;
use crate::session::{SessionId, SessionSpec};
use crate::state::SessionState;
use crate::types::{ContentType, InterruptMode, SessionIntent, SourceType, StreamUsage};

const SAMPLE_RATES: &[u32] = &[
    8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000, 64000, 96000,
];
const MAX_CHANNELS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    U8,
    S16Le,
    S24Le,
    S32Le,
    F32Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingType {
    Raw,
}

/// Stream format. Opaque to arbitration but checked on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub sampling_rate: u32,
    pub channels: u8,
    pub sample_format: SampleFormat,
    pub encoding_type: EncodingType,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            sampling_rate: 44100,
            channels: 2,
            sample_format: SampleFormat::S16Le,
            encoding_type: EncodingType::Raw,
        }
    }
}

impl StreamInfo {
    /// Missing fields keep their defaults. Range checks are left to `validate`.
    fn from_raw_value(value: Option<&Value>) -> Result<Self> {
        let mut info = Self::default();
        let Some(value) = value else {
            return Ok(info);
        };
        if let Some(rate) = int_field(value, "samplingRate")? {
            info.sampling_rate = u32::try_from(rate).map_err(|_| unknown("sampling rate", rate))?;
        }
        if let Some(channels) = int_field(value, "channels")? {
            info.channels = u8::try_from(channels).map_err(|_| unknown("channel count", channels))?;
        }
        Ok(info)
    }

    pub fn validate(&self) -> Result<()> {
        if !SAMPLE_RATES.contains(&self.sampling_rate) {
            return Err(FocusError::IllegalValue(format!(
                "unsupported sampling rate {}",
                self.sampling_rate
            )));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(FocusError::IllegalValue(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRendererInfo {
    pub content: ContentType,
    pub usage: StreamUsage,
    #[serde(default)]
    pub renderer_flags: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRendererOptions {
    #[serde(default)]
    pub stream_info: StreamInfo,
    pub renderer_info: AudioRendererInfo,
}

impl AudioRendererOptions {
    pub fn new(content: ContentType, usage: StreamUsage) -> Self {
        Self {
            stream_info: StreamInfo::default(),
            renderer_info: AudioRendererInfo {
                content,
                usage,
                renderer_flags: 0,
            },
        }
    }

    /// Options as a scripting caller sends them, with numeric enum values:
    /// `{"streamInfo": {...}, "rendererInfo": {"content": 2, "usage": 1}}`.
    pub fn from_raw_value(value: &Value) -> Result<Self> {
        let info = object_field(value, "rendererInfo")?.ok_or_else(|| missing("rendererInfo"))?;
        let content = int_field(info, "content")?.ok_or_else(|| missing("rendererInfo.content"))?;
        let usage = int_field(info, "usage")?.ok_or_else(|| missing("rendererInfo.usage"))?;

        Ok(Self {
            stream_info: StreamInfo::from_raw_value(object_field(value, "streamInfo")?)?,
            renderer_info: AudioRendererInfo {
                content: ContentType::from_raw(content).ok_or_else(|| unknown("content", content))?,
                usage: StreamUsage::from_raw(usage).ok_or_else(|| unknown("usage", usage))?,
                renderer_flags: flags(int_field(info, "rendererFlags")?)?,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCapturerInfo {
    pub source: SourceType,
    #[serde(default)]
    pub capturer_flags: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCapturerOptions {
    #[serde(default)]
    pub stream_info: StreamInfo,
    pub capturer_info: AudioCapturerInfo,
}

impl AudioCapturerOptions {
    pub fn new(source: SourceType) -> Self {
        Self {
            stream_info: StreamInfo::default(),
            capturer_info: AudioCapturerInfo {
                source,
                capturer_flags: 0,
            },
        }
    }

    /// Numeric form: `{"streamInfo": {...}, "capturerInfo": {"source": 0}}`.
    pub fn from_raw_value(value: &Value) -> Result<Self> {
        let info = object_field(value, "capturerInfo")?.ok_or_else(|| missing("capturerInfo"))?;
        let source = int_field(info, "source")?.ok_or_else(|| missing("capturerInfo.source"))?;

        Ok(Self {
            stream_info: StreamInfo::from_raw_value(object_field(value, "streamInfo")?)?,
            capturer_info: AudioCapturerInfo {
                source: SourceType::from_raw(source).ok_or_else(|| unknown("source", source))?,
                capturer_flags: flags(int_field(info, "capturerFlags")?)?,
            },
        })
    }
}

fn missing(field: &str) -> FocusError {
    FocusError::IllegalArgument(format!("missing {field}"))
}

fn unknown(field: &str, raw: i64) -> FocusError {
    FocusError::IllegalValue(format!("unknown {field} {raw}"))
}

/// `Ok(None)` when absent; a present non-object is an argument error.
fn object_field<'a>(value: &'a Value, key: &str) -> Result<Option<&'a Value>> {
    let object = value
        .as_object()
        .ok_or_else(|| FocusError::IllegalArgument(format!("expected an object, got {value}")))?;
    match object.get(key) {
        None => Ok(None),
        Some(field) if field.is_object() => Ok(Some(field)),
        Some(field) => Err(FocusError::IllegalArgument(format!(
            "{key} must be an object, got {field}"
        ))),
    }
}

fn int_field(object: &Value, key: &str) -> Result<Option<i64>> {
    match object.get(key) {
        None => Ok(None),
        Some(field) => field.as_i64().map(Some).ok_or_else(|| {
            FocusError::IllegalArgument(format!("{key} must be an integer, got {field}"))
        }),
    }
}

fn flags(raw: Option<i64>) -> Result<i32> {
    let raw = raw.unwrap_or(0);
    i32::try_from(raw).map_err(|_| FocusError::IllegalValue(format!("flags out of range: {raw}")))
}

/// Entry point for clients. Cheap to clone; clones share one arbitrator.
#[derive(Clone, Debug)]
pub struct AudioManager {
    arbitrator: Arc<FocusArbitrator>,
    app_focus: Arc<AppFocus>,
    audio_sessions: Arc<AudioSessionService>,
}

impl AudioManager {
    pub fn new(config: ArbitratorConfig) -> Self {
        Self::from_arbitrator(FocusArbitrator::new(config))
    }

    pub fn with_registry(config: ArbitratorConfig, registry: Box<dyn SessionRegistry>) -> Self {
        Self::from_arbitrator(FocusArbitrator::with_registry(config, registry))
    }

    pub fn from_config(config: &focusconf::FocusConfig) -> Result<Self> {
        Ok(Self::new(ArbitratorConfig::from_config(config)?))
    }

    fn from_arbitrator(arbitrator: FocusArbitrator) -> Self {
        Self {
            arbitrator: Arc::new(arbitrator),
            app_focus: Arc::new(AppFocus::new()),
            audio_sessions: Arc::new(AudioSessionService::new()),
        }
    }

    pub fn arbitrator(&self) -> &Arc<FocusArbitrator> {
        &self.arbitrator
    }

    /// Create a renderer in state `Prepared`.
    pub fn create_audio_renderer(&self, options: AudioRendererOptions) -> Result<AudioRenderer> {
        options.stream_info.validate()?;
        let intent = SessionIntent::new(options.renderer_info.content, options.renderer_info.usage);
        let handle = self.open(SessionSpec::renderer(intent))?;
        Ok(AudioRenderer { handle, options })
    }

    /// Create a capturer in state `Prepared`. Its usage follows its source.
    pub fn create_audio_capturer(&self, options: AudioCapturerOptions) -> Result<AudioCapturer> {
        options.stream_info.validate()?;
        let source = options.capturer_info.source;
        let intent = SessionIntent::new(ContentType::Unknown, source.usage());
        let handle = self.open(SessionSpec::capturer(intent))?;
        Ok(AudioCapturer { handle, options })
    }

    fn open(&self, spec: SessionSpec) -> Result<SessionHandle> {
        let id = self.arbitrator.create_session(spec)?;
        if let Err(err) = self.arbitrator.prepare(id) {
            self.arbitrator.release(id)?;
            return Err(err);
        }
        Ok(SessionHandle {
            id,
            arbitrator: Arc::clone(&self.arbitrator),
        })
    }

    pub fn focus_info(&self) -> Vec<FocusInfo> {
        self.arbitrator.focus_info()
    }

    pub fn request_audio_focus(&self, client: ClientId, intent: SessionIntent) {
        self.app_focus.request(client, intent);
    }

    pub fn abandon_audio_focus(&self, client: ClientId) {
        self.app_focus.abandon(client);
    }

    pub fn set_focus_callback<L>(&self, client: ClientId, listener: L)
    where
        L: FocusListener + 'static,
    {
        self.app_focus.set_callback(client, listener);
    }

    pub fn unset_focus_callback(&self, client: ClientId) {
        self.app_focus.unset_callback(client);
    }

    pub fn app_focus(&self) -> &AppFocus {
        &self.app_focus
    }

    /// Fails with `ERR_ILLEGAL_STATE` if `client` already has a session.
    pub fn activate_audio_session(
        &self,
        client: ClientId,
        strategy: AudioSessionStrategy,
    ) -> Result<()> {
        self.audio_sessions.activate(client, strategy)
    }

    /// Fails with `ERR_ILLEGAL_STATE` if `client` has no session.
    pub fn deactivate_audio_session(&self, client: ClientId) -> Result<()> {
        self.audio_sessions.deactivate(client)
    }

    pub fn is_audio_session_active(&self, client: ClientId) -> bool {
        self.audio_sessions.is_active(client)
    }

    pub fn set_audio_session_callback<L>(&self, client: ClientId, listener: L)
    where
        L: AudioSessionListener + 'static,
    {
        self.audio_sessions.set_callback(client, listener);
    }

    pub fn unset_audio_session_callback(&self, client: ClientId) {
        self.audio_sessions.unset_callback(client);
    }

    pub fn audio_sessions(&self) -> &AudioSessionService {
        &self.audio_sessions
    }
}

/// Operations shared by renderers and capturers.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    arbitrator: Arc<FocusArbitrator>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state. A deregistered session reports `Released`.
    pub fn state(&self) -> SessionState {
        self.arbitrator
            .state(self.id)
            .unwrap_or(SessionState::Released)
    }

    /// Start playback or capture once arbitration has resolved.
    pub fn start(&self) -> Result<()> {
        self.arbitrator
            .start(self.id)
            .map(|_| ())
            .map_err(|err| self.map_released(err, "start"))
    }

    pub fn pause(&self) -> Result<()> {
        self.arbitrator
            .pause(self.id)
            .map_err(|err| self.map_released(err, "pause"))
    }

    pub fn stop(&self) -> Result<()> {
        self.arbitrator
            .stop(self.id)
            .map_err(|err| self.map_released(err, "stop"))
    }

    pub fn release(&self) -> Result<()> {
        self.arbitrator.release(self.id)
    }

    pub fn interrupt_mode(&self) -> Option<InterruptMode> {
        self.arbitrator.session(self.id).map(|s| s.interrupt_mode)
    }

    pub fn volume_scale(&self) -> f32 {
        self.arbitrator
            .session(self.id)
            .map(|s| s.volume_scale())
            .unwrap_or(1.0)
    }

    pub fn set_interrupt_mode(&self, mode: InterruptMode) -> Result<()> {
        self.arbitrator
            .set_interrupt_mode(self.id, mode)
            .map_err(|err| self.map_released(err, "set interrupt mode"))
    }

    /// Loosely typed form for callers that cannot give us an `InterruptMode`.
    ///
    /// Wrong arity or a non-integer argument is `IllegalArgument`; an integer
    /// that names no mode is `IllegalValue`.
    pub fn set_interrupt_mode_sync(&self, args: &[Value]) -> Result<()> {
        let [arg] = args else {
            return Err(FocusError::IllegalArgument(format!(
                "expected 1 argument, got {}",
                args.len()
            )));
        };
        let raw = arg.as_i64().ok_or_else(|| {
            FocusError::IllegalArgument(format!("interrupt mode must be an integer, got {arg}"))
        })?;
        let mode = InterruptMode::from_raw(raw)
            .ok_or_else(|| FocusError::IllegalValue(format!("unknown interrupt mode {raw}")))?;
        self.set_interrupt_mode(mode)
    }

    pub fn on_interrupt<L>(&self, listener: L) -> Result<()>
    where
        L: InterruptListener + 'static,
    {
        self.arbitrator.dispatcher().on_interrupt(self.id, listener)
    }

    pub fn off_interrupt(&self) {
        self.arbitrator
            .dispatcher()
            .unsubscribe(self.id, EventKind::Interrupt);
    }

    pub fn on_state_change<L>(&self, listener: L) -> Result<()>
    where
        L: StateListener + 'static,
    {
        self.arbitrator.dispatcher().on_state_change(self.id, listener)
    }

    pub fn off_state_change(&self) {
        self.arbitrator
            .dispatcher()
            .unsubscribe(self.id, EventKind::StateChange);
    }

    /// Interrupt events as a channel for async consumers.
    pub fn interrupt_events(&self) -> Result<mpsc::UnboundedReceiver<InterruptEvent>> {
        self.arbitrator.dispatcher().interrupt_channel(self.id)
    }

    /// A handle outlives its registration, so an unknown id means released.
    fn map_released(&self, err: FocusError, op: &'static str) -> FocusError {
        match err {
            FocusError::UnknownSession(session) => FocusError::IllegalState {
                session,
                state: SessionState::Released,
                op,
            },
            other => other,
        }
    }
}

/// A playback session.
#[derive(Debug, Clone)]
pub struct AudioRenderer {
    handle: SessionHandle,
    options: AudioRendererOptions,
}

impl AudioRenderer {
    pub fn renderer_info(&self) -> AudioRendererInfo {
        self.options.renderer_info
    }

    /// Play alongside other streams without interrupting or being interrupted.
    pub fn set_parallel_play(&self, parallel: bool) -> Result<()> {
        self.handle
            .arbitrator
            .set_parallel_play(self.handle.id, parallel)
            .map_err(|err| self.handle.map_released(err, "set parallel play"))
    }

    pub fn stream_info(&self) -> StreamInfo {
        self.options.stream_info
    }
}

impl Deref for AudioRenderer {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

/// A capture session.
#[derive(Debug, Clone)]
pub struct AudioCapturer {
    handle: SessionHandle,
    options: AudioCapturerOptions,
}

impl AudioCapturer {
    pub fn capturer_info(&self) -> AudioCapturerInfo {
        self.options.capturer_info
    }

    pub fn stream_info(&self) -> StreamInfo {
        self.options.stream_info
    }
}

impl Deref for AudioCapturer {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ERR_ILLEGAL_STATE, ERR_INVALID_ARGUMENT, ERR_INVALID_VALUE};
    use serde_json::json;

    fn manager() -> AudioManager {
        AudioManager::new(ArbitratorConfig::default())
    }

    #[test]
    fn test_renderer_starts_prepared() {
        let renderer = manager()
            .create_audio_renderer(AudioRendererOptions::new(
                ContentType::Music,
                StreamUsage::Media,
            ))
            .unwrap();
        assert_eq!(renderer.state(), SessionState::Prepared);
        assert_eq!(renderer.interrupt_mode(), Some(InterruptMode::Share));
    }

    #[test]
    fn test_bad_stream_info_rejected_before_registration() {
        let manager = manager();
        let mut options = AudioRendererOptions::new(ContentType::Music, StreamUsage::Media);
        options.stream_info.sampling_rate = 12345;
        let err = manager.create_audio_renderer(options).unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_VALUE);
        assert_eq!(manager.arbitrator().stats().total, 0);
    }

    #[test]
    fn test_set_interrupt_mode_sync_validation() {
        let renderer = manager()
            .create_audio_renderer(AudioRendererOptions::new(
                ContentType::Music,
                StreamUsage::Media,
            ))
            .unwrap();

        assert_eq!(renderer.set_interrupt_mode_sync(&[]).unwrap_err().code(), ERR_INVALID_ARGUMENT);
        assert_eq!(
            renderer.set_interrupt_mode_sync(&[json!("Invalid type")]).unwrap_err().code(),
            ERR_INVALID_ARGUMENT
        );
        assert_eq!(
            renderer.set_interrupt_mode_sync(&[json!(1), json!(2)]).unwrap_err().code(),
            ERR_INVALID_ARGUMENT
        );
        assert_eq!(
            renderer.set_interrupt_mode_sync(&[json!(100)]).unwrap_err().code(),
            ERR_INVALID_VALUE
        );
        assert_eq!(renderer.interrupt_mode(), Some(InterruptMode::Share));

        renderer.set_interrupt_mode_sync(&[json!(1)]).unwrap();
        assert_eq!(renderer.interrupt_mode(), Some(InterruptMode::Independent));
    }

    #[test]
    fn test_released_handle() {
        let renderer = manager()
            .create_audio_renderer(AudioRendererOptions::new(
                ContentType::Speech,
                StreamUsage::Media,
            ))
            .unwrap();
        renderer.release().unwrap();
        renderer.release().unwrap();
        assert_eq!(renderer.state(), SessionState::Released);

        let err = renderer.start().unwrap_err();
        assert_eq!(err.code(), ERR_ILLEGAL_STATE);
        assert!(renderer.on_interrupt(|_: SessionId, _: &InterruptEvent| {}).is_err());
    }

    #[test]
    fn test_capturer_intent_follows_source() {
        let manager = manager();
        let capturer = manager
            .create_audio_capturer(AudioCapturerOptions::new(SourceType::VoiceRecognition))
            .unwrap();
        let session = manager.arbitrator().session(capturer.id()).unwrap();
        assert_eq!(session.intent.usage, StreamUsage::VoiceAssistant);
        assert_eq!(session.direction, crate::types::Direction::Capturer);
    }

    #[test]
    fn test_renderer_options_from_raw_value() {
        let options = AudioRendererOptions::from_raw_value(&json!({
            "streamInfo": { "samplingRate": 48000, "channels": 1 },
            "rendererInfo": { "content": 1, "usage": 2, "rendererFlags": 0 }
        }))
        .unwrap();
        assert_eq!(options.renderer_info.content, ContentType::Speech);
        assert_eq!(options.renderer_info.usage, StreamUsage::VoiceCommunication);
        assert_eq!(options.stream_info.sampling_rate, 48000);
        assert_eq!(options.stream_info.channels, 1);

        let defaults = AudioRendererOptions::from_raw_value(&json!({
            "rendererInfo": { "content": 2, "usage": 1 }
        }))
        .unwrap();
        assert_eq!(defaults.renderer_info.usage, StreamUsage::Media);
        assert_eq!(defaults.stream_info, StreamInfo::default());
    }

    #[test]
    fn test_raw_value_errors() {
        let code = |value: serde_json::Value| {
            AudioRendererOptions::from_raw_value(&value).unwrap_err().code()
        };
        assert_eq!(code(json!("renderer")), ERR_INVALID_ARGUMENT);
        assert_eq!(code(json!({})), ERR_INVALID_ARGUMENT);
        assert_eq!(
            code(json!({ "rendererInfo": { "content": "music", "usage": 1 } })),
            ERR_INVALID_ARGUMENT
        );
        assert_eq!(
            code(json!({ "rendererInfo": { "content": 2, "usage": 99 } })),
            ERR_INVALID_VALUE
        );

        let err = AudioCapturerOptions::from_raw_value(&json!({ "capturerInfo": { "source": 42 } }))
            .unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_VALUE);
    }

    #[test]
    fn test_capturer_options_from_raw_value() {
        let options =
            AudioCapturerOptions::from_raw_value(&json!({ "capturerInfo": { "source": 7 } }))
                .unwrap();
        assert_eq!(options.capturer_info.source, SourceType::VoiceCommunication);
        assert_eq!(options.capturer_info.capturer_flags, 0);
    }

    #[test]
    fn test_renderer_parallel_play() {
        let manager = manager();
        let renderer = manager
            .create_audio_renderer(AudioRendererOptions::new(
                ContentType::Music,
                StreamUsage::Media,
            ))
            .unwrap();
        renderer.set_parallel_play(true).unwrap();
        assert!(manager.arbitrator().session(renderer.id()).unwrap().parallel_play);

        renderer.release().unwrap();
        assert_eq!(renderer.set_parallel_play(false).unwrap_err().code(), ERR_ILLEGAL_STATE);
    }

    #[test]
    fn test_manager_audio_sessions() {
        use crate::audio_session::{ConcurrencyMode, DeactiveReason};
        use std::sync::Mutex as StdMutex;

        let manager = manager();
        let reasons = Arc::new(StdMutex::new(Vec::new()));
        let r = Arc::clone(&reasons);
        manager.set_audio_session_callback(100, move |_client: ClientId, reason: DeactiveReason| {
            r.lock().unwrap().push(reason)
        });

        let strategy = AudioSessionStrategy::new(ConcurrencyMode::MixWithOthers);
        manager.activate_audio_session(100, strategy).unwrap();
        assert!(manager.is_audio_session_active(100));
        let err = manager.activate_audio_session(100, strategy).unwrap_err();
        assert_eq!(err.code(), ERR_ILLEGAL_STATE);

        manager.audio_sessions().time_out(100).unwrap();
        assert!(!manager.is_audio_session_active(100));
        assert_eq!(*reasons.lock().unwrap(), vec![DeactiveReason::Timeout]);
        let err = manager.deactivate_audio_session(100).unwrap_err();
        assert_eq!(err.code(), ERR_ILLEGAL_STATE);

        manager.unset_audio_session_callback(100);
        manager.activate_audio_session(100, strategy).unwrap();
        manager.deactivate_audio_session(100).unwrap();
        assert_eq!(reasons.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_options_from_json() {
        let options: AudioRendererOptions = serde_json::from_value(json!({
            "renderer_info": { "content": "speech", "usage": "voice_communication" }
        }))
        .unwrap();
        assert_eq!(options.renderer_info.usage, StreamUsage::VoiceCommunication);
        assert_eq!(options.stream_info, StreamInfo::default());
    }
}
