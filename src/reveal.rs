//! Simulated incremental reveal of an already-complete reply
//!
//! The reply is fully known before the animation starts; this only paces how
//! it appears. The caller appends the empty assistant message first, then
//! applies each frame to that message in place.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default pause between frames
pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

/// How an animation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Every prefix was delivered, the last one being the full text
    Completed,
    /// The token fired before the final frame
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct RevealAnimator {
    tick: Duration,
}

impl Default for RevealAnimator {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl RevealAnimator {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Deliver every non-empty prefix of `full_text`, one character per tick.
    ///
    /// Frames are strictly growing and end with `full_text` itself. An empty
    /// text completes at once without frames.
    pub async fn animate<F>(
        &self,
        full_text: &str,
        cancel: &CancellationToken,
        mut on_frame: F,
    ) -> RevealOutcome
    where
        F: FnMut(String),
    {
        let boundaries = full_text
            .char_indices()
            .skip(1)
            .map(|(i, _)| i)
            .chain((!full_text.is_empty()).then_some(full_text.len()));

        for end in boundaries {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return RevealOutcome::Cancelled,
                () = tokio::time::sleep(self.tick) => {}
            }
            on_frame(full_text.get(..end).unwrap_or(full_text).to_string());
        }

        RevealOutcome::Completed
    }
}
