use log::{ debug, warn };
use std::fmt;

use super::WidgetError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoicePhase {
    Idle,
    RequestingPermission,
    Recording,
    Transcribing,
    Thinking,
    Speaking,
    Error(String),
}

impl VoicePhase {
    pub fn name(&self) -> &'static str {
        match self {
            VoicePhase::Idle => "idle",
            VoicePhase::RequestingPermission => "requesting_permission",
            VoicePhase::Recording => "recording",
            VoicePhase::Transcribing => "transcribing",
            VoicePhase::Thinking => "thinking",
            VoicePhase::Speaking => "speaking",
            VoicePhase::Error(_) => "error",
        }
    }

    /// Phases during which the microphone is held.
    pub fn holds_microphone(&self) -> bool {
        matches!(self, VoicePhase::RequestingPermission | VoicePhase::Recording)
    }
}

impl fmt::Display for VoicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Start,
    PermissionGranted,
    PermissionDenied,
    StopRecording,
    Transcribed(String),
    ReplyReady(String),
    PlaybackFinished,
    Cancel,
    Failed(String),
}

impl VoiceEvent {
    fn name(&self) -> &'static str {
        match self {
            VoiceEvent::Start => "start",
            VoiceEvent::PermissionGranted => "permission_granted",
            VoiceEvent::PermissionDenied => "permission_denied",
            VoiceEvent::StopRecording => "stop_recording",
            VoiceEvent::Transcribed(_) => "transcribed",
            VoiceEvent::ReplyReady(_) => "reply_ready",
            VoiceEvent::PlaybackFinished => "playback_finished",
            VoiceEvent::Cancel => "cancel",
            VoiceEvent::Failed(_) => "failed",
        }
    }
}

/// One voice widget: record, transcribe, think, speak, repeat.
#[derive(Debug, Clone)]
pub struct VoiceAssistant {
    phase: VoicePhase,
    transcript: Option<String>,
    reply: Option<String>,
}

impl Default for VoiceAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceAssistant {
    pub fn new() -> Self {
        Self { phase: VoicePhase::Idle, transcript: None, reply: None }
    }

    pub fn phase(&self) -> &VoicePhase {
        &self.phase
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn reply(&self) -> Option<&str> {
        self.reply.as_deref()
    }

    pub fn transition(&mut self, event: VoiceEvent) -> Result<VoicePhase, WidgetError> {
        use VoiceEvent as E;
        use VoicePhase as P;

        let next = match (&self.phase, event) {
            (P::Idle, E::Start) => P::RequestingPermission,
            (P::Error(_), E::Start) => P::RequestingPermission,
            (P::RequestingPermission, E::PermissionGranted) => P::Recording,
            (P::RequestingPermission, E::PermissionDenied) =>
                P::Error("microphone permission denied".into()),
            (P::Recording, E::StopRecording) => P::Transcribing,
            (P::Transcribing, E::Transcribed(text)) => {
                if text.trim().is_empty() {
                    P::Error("no speech detected".into())
                } else {
                    self.transcript = Some(text);
                    P::Thinking
                }
            }
            (P::Thinking, E::ReplyReady(text)) => {
                self.reply = Some(text);
                P::Speaking
            }
            (P::Speaking, E::PlaybackFinished) => P::Idle,
            (_, E::Cancel) => P::Idle,
            (P::Idle, event @ E::Failed(_)) => {
                return Err(self.reject(&event));
            }
            (_, E::Failed(reason)) => P::Error(reason),
            (_, event) => {
                return Err(self.reject(&event));
            }
        };

        debug!("Voice widget: {} -> {}", self.phase, next);
        if let P::Error(reason) = &next {
            warn!("Voice widget error: {}", reason);
        }
        self.phase = next.clone();
        Ok(next)
    }

    pub fn reset(&mut self) {
        self.phase = VoicePhase::Idle;
        self.transcript = None;
        self.reply = None;
    }

    fn reject(&self, event: &VoiceEvent) -> WidgetError {
        WidgetError::InvalidTransition {
            from: self.phase.name().to_string(),
            event: event.name().to_string(),
        }
    }
}

/// Something that can be opened for audio capture and must be closed afterwards.
pub trait CaptureDevice {
    type Error;

    fn acquire(&mut self) -> Result<(), Self::Error>;
    fn release(&mut self);
}

/// Holds a capture device open for its lifetime.
///
/// Construction acquires; dropping releases, whichever way the owning scope ends.
pub struct MicrophoneLease<D: CaptureDevice> {
    device: D,
}

impl<D: CaptureDevice> MicrophoneLease<D> {
    pub fn acquire(mut device: D) -> Result<Self, D::Error> {
        device.acquire()?;
        Ok(Self { device })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: CaptureDevice> Drop for MicrophoneLease<D> {
    fn drop(&mut self) {
        self.device.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn full_happy_path() {
        let mut voice = VoiceAssistant::new();
        voice.transition(VoiceEvent::Start).unwrap();
        voice.transition(VoiceEvent::PermissionGranted).unwrap();
        assert!(voice.phase().holds_microphone());
        voice.transition(VoiceEvent::StopRecording).unwrap();
        assert!(!voice.phase().holds_microphone());
        voice.transition(VoiceEvent::Transcribed("book a call".into())).unwrap();
        assert_eq!(voice.transcript(), Some("book a call"));
        assert_eq!(voice.transition(VoiceEvent::ReplyReady("Sure!".into())).unwrap(), VoicePhase::Speaking);
        assert_eq!(voice.transition(VoiceEvent::PlaybackFinished).unwrap(), VoicePhase::Idle);
    }

    #[test]
    fn invalid_transition_is_rejected_and_phase_kept() {
        let mut voice = VoiceAssistant::new();
        let err = voice.transition(VoiceEvent::StopRecording).unwrap_err();
        assert_eq!(err, WidgetError::InvalidTransition {
            from: "idle".into(),
            event: "stop_recording".into(),
        });
        assert_eq!(voice.phase(), &VoicePhase::Idle);
    }

    #[test]
    fn errors_reachable_from_any_busy_phase() {
        let mut voice = VoiceAssistant::new();
        voice.transition(VoiceEvent::Start).unwrap();
        voice.transition(VoiceEvent::PermissionGranted).unwrap();
        voice.transition(VoiceEvent::StopRecording).unwrap();
        let phase = voice.transition(VoiceEvent::Failed("upstream".into())).unwrap();
        assert_eq!(phase, VoicePhase::Error("upstream".into()));
        assert!(voice.transition(VoiceEvent::Failed("again".into())).is_ok());

        let mut idle = VoiceAssistant::new();
        assert!(idle.transition(VoiceEvent::Failed("x".into())).is_err());
    }

    #[test]
    fn denied_permission_and_silence_are_errors() {
        let mut voice = VoiceAssistant::new();
        voice.transition(VoiceEvent::Start).unwrap();
        assert!(matches!(voice.transition(VoiceEvent::PermissionDenied).unwrap(), VoicePhase::Error(_)));
        voice.transition(VoiceEvent::Start).unwrap();
        voice.transition(VoiceEvent::PermissionGranted).unwrap();
        voice.transition(VoiceEvent::StopRecording).unwrap();
        assert!(matches!(voice.transition(VoiceEvent::Transcribed("  ".into())).unwrap(), VoicePhase::Error(_)));
    }

    #[test]
    fn reset_clears_everything() {
        let mut voice = VoiceAssistant::new();
        voice.transition(VoiceEvent::Start).unwrap();
        voice.reset();
        assert_eq!(voice.phase(), &VoicePhase::Idle);
        assert!(voice.transcript().is_none());
    }

    struct FakeMic {
        open: Rc<Cell<bool>>,
        fail: bool,
    }

    impl CaptureDevice for FakeMic {
        type Error = &'static str;

        fn acquire(&mut self) -> Result<(), Self::Error> {
            if self.fail {
                return Err("denied");
            }
            self.open.set(true);
            Ok(())
        }

        fn release(&mut self) {
            self.open.set(false);
        }
    }

    fn record(open: Rc<Cell<bool>>, fail_midway: bool) -> Result<(), &'static str> {
        let _lease = MicrophoneLease::acquire(FakeMic { open, fail: false })?;
        if fail_midway {
            return Err("transcription failed");
        }
        Ok(())
    }

    #[test]
    fn lease_releases_on_success_and_error() {
        let open = Rc::new(Cell::new(false));
        record(open.clone(), false).unwrap();
        assert!(!open.get());
        assert!(record(open.clone(), true).is_err());
        assert!(!open.get());
    }

    #[test]
    fn lease_holds_device_while_alive() {
        let open = Rc::new(Cell::new(false));
        let lease = MicrophoneLease::acquire(FakeMic { open: open.clone(), fail: false }).unwrap();
        assert!(open.get());
        drop(lease);
        assert!(!open.get());
    }

    #[test]
    fn failed_acquire_yields_no_lease() {
        let open = Rc::new(Cell::new(false));
        assert!(MicrophoneLease::acquire(FakeMic { open: open.clone(), fail: true }).is_err());
        assert!(!open.get());
    }
}
