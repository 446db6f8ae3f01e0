/// Playback phase of a rendering engine, derived from the play position.
///
/// State transitions:
/// ```text
/// BeforeLoop → Looping { 0 } → Looping { 1 } → … ─┬→ Fading ──────┐
///     │                                            ├→ PostLoopTail ├→ Done
///     │                                            └───────────────┘
///     └──────────────── (stream without loop) ─────────────────────→ Done
/// ```
/// `Looping` never leaves when playing forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    BeforeLoop,
    /// `iteration` counts the jumps back to the loop start taken so far.
    Looping { iteration: usize },
    PostLoopTail,
    Fading,
    Done,
}

impl PlaybackState {
    pub fn is_looping(&self) -> bool {
        matches!(self, Self::Looping { .. })
    }

    pub fn is_fading(&self) -> bool {
        matches!(self, Self::Fading)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn loop_iteration(&self) -> Option<usize> {
        match self {
            Self::Looping { iteration } => Some(*iteration),
            _ => None,
        }
    }
}
