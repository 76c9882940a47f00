// Display rules for the presenting surface: the confidence gate and
// stale-result suppression keyed by conversation snapshot.

use parley_core::config::EngineSettings;
use parley_core::model::{SnapshotKey, SuggestionResult};

/// Shows a suggestion only when its confidence reaches the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayGate {
    min_confidence: u8,
}

impl DisplayGate {
    pub const DEFAULT_MIN_CONFIDENCE: u8 = 40;

    pub fn new(min_confidence: u8) -> Self {
        Self { min_confidence }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.display_min_confidence)
    }

    pub fn min_confidence(&self) -> u8 {
        self.min_confidence
    }

    pub fn should_display(&self, result: &SuggestionResult) -> bool {
        result.confidence >= self.min_confidence
    }

    /// The text offered as a pre-filled reply, when the result is shown at all.
    pub fn prefill<'a>(&self, result: &'a SuggestionResult) -> Option<&'a str> {
        self.should_display(result).then_some(result.suggestion.as_str())
    }
}

impl Default for DisplayGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_CONFIDENCE)
    }
}

/// The suggestion currently held for one conversation view.
///
/// Analyses are not cancelled when the conversation changes; a result is
/// accepted only if it was computed for the snapshot still on screen.
#[derive(Debug, Default)]
pub struct SuggestionSlot {
    key: Option<SnapshotKey>,
    result: Option<SuggestionResult>,
}

impl SuggestionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the snapshot now on screen. Returns `true` when it differs
    /// from the previous one, in which case the held result is dropped and
    /// a new analysis is due.
    pub fn observe(&mut self, key: SnapshotKey) -> bool {
        if self.key == Some(key) {
            return false;
        }
        self.key = Some(key);
        self.result = None;
        true
    }

    /// Offer a finished analysis. Returns `false` (and discards it) when
    /// `key` is no longer the current snapshot.
    pub fn offer(&mut self, key: SnapshotKey, result: SuggestionResult) -> bool {
        if self.key != Some(key) {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub fn current(&self) -> Option<&SuggestionResult> {
        self.result.as_ref()
    }

    /// The held result if `gate` lets it through.
    pub fn visible(&self, gate: &DisplayGate) -> Option<&SuggestionResult> {
        self.result.as_ref().filter(|r| gate.should_display(r))
    }
}
