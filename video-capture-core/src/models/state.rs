/// Capture session lifecycle.
///
/// State transitions:
/// ```text
/// Uninitialized → Initializing → Ready → Started ↔ Stopped
///                                        (any) ↓
///                                              Lost
/// ```
/// Transient backend errors do not move the state machine; they surface
/// through the session's `on_error` signal only. `Lost` is terminal: the
/// owner is expected to discard the session and create a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Started,
    Stopped,
    Lost,
}

impl SessionState {
    pub fn is_initializing(&self) -> bool {
        matches!(self, Self::Initializing)
    }

    /// The backend pipeline is set up and `start()` is accepted.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready | Self::Started | Self::Stopped)
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Lost)
    }
}
