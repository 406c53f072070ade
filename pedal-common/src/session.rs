//! Capture/identify session state machine
//!
//! One session covers a single capture-identify-display cycle at a time:
//!
//! ```text
//! Idle ─request_camera─▶ RequestingPermission ─granted─▶ Streaming ─capture─▶ Captured
//!  ▲                            │ denied                                    │ ▲
//!  └────────────────────────────┘                          upload ──────────┘ │
//!                                                                             │
//! Captured ─begin_identify─▶ Identifying ─complete─▶ Resulted ─clear─▶ Idle / RequestingPermission
//!                                   └────fail─────▶ Failed
//! ```
//!
//! The camera itself lives in the browser. The session tracks whether a stream
//! is held and tells the browser, through [`StateTransition::release_camera`]
//! and [`StateTransition::request_camera`], when to stop or start one. Every
//! path out of `Streaming` releases the stream.
//!
//! Identification requests carry a sequence number. A completion whose number
//! is not the one currently in flight is discarded, so a slow response can
//! never overwrite the state of a newer request or a cleared session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data_uri::DataUri;
use crate::model::IdentificationResult;
use crate::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// Nothing captured, no camera stream
    Idle,
    /// Waiting for the browser to grant or deny camera access
    RequestingPermission,
    /// Camera stream live, ready to capture a frame
    Streaming,
    /// Image available, ready to identify
    Captured,
    /// Identification request outstanding
    Identifying,
    /// Identification result available
    Resulted,
    /// Last identification failed
    Failed,
}

/// How the user supplies the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    Camera,
    Upload,
}

/// Record of one state change plus camera directives for the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CaptureState,
    pub to: CaptureState,
    pub at: DateTime<Utc>,
    /// Browser must stop all camera tracks
    pub release_camera: bool,
    /// Browser should acquire a camera stream
    pub request_camera: bool,
    /// Browser acquired a second stream while one is held; stop the new one
    pub drop_surplus_camera: bool,
}

/// Outcome of reporting an identification completion
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Result applied to the session
    Applied(StateTransition),
    /// Sequence number did not match the in-flight request; session unchanged
    Stale { seq: u64, current: Option<u64> },
}

/// Serializable view of a session for the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: CaptureState,
    pub mode: InputMode,
    pub has_camera_permission: Option<bool>,
    pub camera_held: bool,
    pub has_image: bool,
    pub can_capture: bool,
    pub can_identify: bool,
    pub in_flight: Option<u64>,
    pub result: Option<IdentificationResult>,
    pub last_error: Option<String>,
}

/// Capture/identify session
#[derive(Debug, Clone)]
pub struct CaptureSession {
    session_id: Uuid,
    state: CaptureState,
    mode: InputMode,
    has_camera_permission: Option<bool>,
    camera_held: bool,
    image: Option<DataUri>,
    result: Option<IdentificationResult>,
    last_error: Option<String>,
    last_seq: u64,
    in_flight: Option<u64>,
    started_at: DateTime<Utc>,
}

impl CaptureSession {
    /// Create a new idle session
    pub fn new(mode: InputMode) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: CaptureState::Idle,
            mode,
            has_camera_permission: None,
            camera_held: false,
            image: None,
            result: None,
            last_error: None,
            last_seq: 0,
            in_flight: None,
            started_at: Utc::now(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn has_camera_permission(&self) -> Option<bool> {
        self.has_camera_permission
    }

    pub fn camera_held(&self) -> bool {
        self.camera_held
    }

    pub fn image(&self) -> Option<&DataUri> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&IdentificationResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Capture button enabled: camera live and nothing captured yet
    pub fn can_capture(&self) -> bool {
        self.mode == InputMode::Camera
            && self.state == CaptureState::Streaming
            && self.camera_held
            && self.image.is_none()
    }

    /// Identify button enabled: an image exists and no request is outstanding
    pub fn can_identify(&self) -> bool {
        self.image.is_some() && self.in_flight.is_none()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            started_at: self.started_at,
            state: self.state,
            mode: self.mode,
            has_camera_permission: self.has_camera_permission,
            camera_held: self.camera_held,
            has_image: self.image.is_some(),
            can_capture: self.can_capture(),
            can_identify: self.can_identify(),
            in_flight: self.in_flight,
            result: self.result.clone(),
            last_error: self.last_error.clone(),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn transition_to(&mut self, to: CaptureState) -> StateTransition {
        let from = self.state;
        self.state = to;

        if from != to {
            tracing::debug!(session_id = %self.session_id, ?from, ?to, "Session state transition");
        }

        StateTransition {
            from,
            to,
            at: Utc::now(),
            release_camera: false,
            request_camera: false,
            drop_surplus_camera: false,
        }
    }

    /// Drop the camera stream if held; returns whether the browser must stop tracks
    fn release_camera(&mut self) -> bool {
        std::mem::replace(&mut self.camera_held, false)
    }

    /// Switch between camera and upload input
    ///
    /// Any outstanding identification is abandoned and the previous result is
    /// cleared. Entering camera mode also clears the image and requests a
    /// stream if none is held; leaving it releases the stream.
    pub fn switch_mode(&mut self, mode: InputMode) -> StateTransition {
        self.mode = mode;
        self.in_flight = None;
        self.result = None;
        self.last_error = None;

        match mode {
            InputMode::Camera => {
                self.image = None;
                if self.camera_held {
                    self.transition_to(CaptureState::Streaming)
                } else {
                    let mut t = self.transition_to(CaptureState::RequestingPermission);
                    t.request_camera = true;
                    t
                }
            }
            InputMode::Upload => {
                let released = self.release_camera();
                let to = if self.image.is_some() {
                    CaptureState::Captured
                } else {
                    CaptureState::Idle
                };
                let mut t = self.transition_to(to);
                t.release_camera = released;
                t
            }
        }
    }

    /// Ask the browser for a camera stream (camera mode, no stream, no image)
    pub fn request_camera(&mut self) -> Result<StateTransition> {
        if self.mode != InputMode::Camera {
            return Err(Error::InvalidState(
                "camera can only be started in camera mode".to_string(),
            ));
        }
        if self.camera_held {
            // One stream at a time; treat as a no-op
            self.has_camera_permission = Some(true);
            return Ok(self.transition_to(CaptureState::Streaming));
        }
        if self.image.is_some() {
            return Err(Error::InvalidState(
                "clear the captured image before restarting the camera".to_string(),
            ));
        }

        let mut t = self.transition_to(CaptureState::RequestingPermission);
        t.request_camera = true;
        Ok(t)
    }

    /// Browser acquired a camera stream
    ///
    /// If a stream is already held, the held one stays and the browser drops
    /// the new one. If the session no longer wants a stream (mode switched,
    /// image captured meanwhile) the grant is recorded but the stream is
    /// released at once.
    pub fn permission_granted(&mut self) -> StateTransition {
        self.has_camera_permission = Some(true);

        if self.camera_held {
            tracing::debug!(session_id = %self.session_id, "Duplicate camera stream; dropping the new one");
            let mut t = self.transition_to(self.state);
            t.drop_surplus_camera = true;
            return t;
        }

        if self.state != CaptureState::RequestingPermission || self.mode != InputMode::Camera {
            tracing::debug!(
                session_id = %self.session_id,
                state = ?self.state,
                "Camera stream arrived when not requested; releasing"
            );
            let mut t = self.transition_to(self.state);
            t.release_camera = true;
            self.camera_held = false;
            return t;
        }

        self.camera_held = true;
        self.last_error = None;
        self.transition_to(CaptureState::Streaming)
    }

    /// Browser could not acquire a camera stream
    ///
    /// Never fails: the session returns to `Idle` with no stream held so the
    /// user can retry or switch to upload.
    pub fn permission_denied(&mut self, reason: &str) -> StateTransition {
        self.has_camera_permission = Some(false);
        let released = self.release_camera();
        self.last_error = Some(if reason.trim().is_empty() {
            "Camera access denied. Please enable camera permissions in your browser settings."
                .to_string()
        } else {
            format!("Could not access camera: {}", reason.trim())
        });

        tracing::info!(session_id = %self.session_id, reason = %reason, "Camera permission denied");

        let to = if self.state == CaptureState::Identifying {
            CaptureState::Identifying
        } else if self.image.is_some() {
            CaptureState::Captured
        } else {
            CaptureState::Idle
        };
        let mut t = self.transition_to(to);
        t.release_camera = released;
        t
    }

    /// Store a camera frame and release the stream
    pub fn capture(&mut self, image: DataUri) -> Result<StateTransition> {
        if !self.can_capture() {
            return Err(Error::InvalidState(format!(
                "cannot capture in state {:?} (mode {:?}, camera held: {})",
                self.state, self.mode, self.camera_held
            )));
        }

        self.image = Some(image);
        self.result = None;
        self.last_error = None;
        let released = self.release_camera();

        let mut t = self.transition_to(CaptureState::Captured);
        t.release_camera = released;
        Ok(t)
    }

    /// Frame grab failed in the browser; the stream stays live for a retry
    pub fn capture_failed(&mut self, reason: &str) -> StateTransition {
        self.last_error = Some(format!("Could not capture image from camera: {}", reason));
        tracing::warn!(session_id = %self.session_id, reason = %reason, "Camera capture failed");
        self.transition_to(self.state)
    }

    /// Store an uploaded image
    pub fn upload(&mut self, image: DataUri) -> Result<StateTransition> {
        if self.mode != InputMode::Upload {
            return Err(Error::InvalidState(
                "switch to upload mode before uploading".to_string(),
            ));
        }

        self.image = Some(image);
        self.result = None;
        self.last_error = None;
        self.in_flight = None;
        Ok(self.transition_to(CaptureState::Captured))
    }

    /// Discard image, result and any outstanding request
    ///
    /// In camera mode with permission already granted, a new stream is
    /// requested so the user can capture again.
    pub fn clear(&mut self) -> StateTransition {
        self.image = None;
        self.result = None;
        self.last_error = None;
        self.in_flight = None;

        if self.camera_held {
            return self.transition_to(CaptureState::Streaming);
        }

        if self.mode == InputMode::Camera && self.has_camera_permission == Some(true) {
            let mut t = self.transition_to(CaptureState::RequestingPermission);
            t.request_camera = true;
            t
        } else {
            self.transition_to(CaptureState::Idle)
        }
    }

    /// Start an identification request for the current image
    ///
    /// Returns the request sequence number and the image to send. Fails with
    /// `Conflict` while another request is outstanding.
    pub fn begin_identify(&mut self) -> Result<(u64, DataUri, StateTransition)> {
        if let Some(seq) = self.in_flight {
            return Err(Error::Conflict(format!(
                "identification request {} is still in progress",
                seq
            )));
        }
        let image = self.image.clone().ok_or_else(|| {
            Error::InvalidState(match self.mode {
                InputMode::Upload => "Please upload an image first.".to_string(),
                InputMode::Camera => "Please capture a photo first.".to_string(),
            })
        })?;

        self.last_seq += 1;
        let seq = self.last_seq;
        self.in_flight = Some(seq);
        self.result = None;
        self.last_error = None;

        tracing::info!(session_id = %self.session_id, seq, "Identification started");

        Ok((seq, image, self.transition_to(CaptureState::Identifying)))
    }

    /// Apply a successful identification
    pub fn complete_identify(&mut self, seq: u64, result: IdentificationResult) -> Completion {
        if self.in_flight != Some(seq) {
            tracing::warn!(
                session_id = %self.session_id,
                seq,
                current = ?self.in_flight,
                "Discarding stale identification result"
            );
            return Completion::Stale { seq, current: self.in_flight };
        }

        self.in_flight = None;
        self.result = Some(result);
        Completion::Applied(self.transition_to(CaptureState::Resulted))
    }

    /// Record a failed identification; no partial result is kept
    pub fn fail_identify(&mut self, seq: u64, message: &str) -> Completion {
        if self.in_flight != Some(seq) {
            tracing::warn!(
                session_id = %self.session_id,
                seq,
                current = ?self.in_flight,
                "Discarding stale identification failure"
            );
            return Completion::Stale { seq, current: self.in_flight };
        }

        self.in_flight = None;
        self.result = None;
        self.last_error = Some(message.to_string());
        Completion::Applied(self.transition_to(CaptureState::Failed))
    }

    /// Leave the capture UI entirely (page unload, component teardown)
    ///
    /// Everything captured or derived is discarded along with the stream.
    pub fn teardown(&mut self) -> StateTransition {
        let released = self.release_camera();
        self.image = None;
        self.result = None;
        self.last_error = None;
        self.in_flight = None;
        let mut t = self.transition_to(CaptureState::Idle);
        t.release_camera = released;
        t
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new(InputMode::Camera)
    }
}
