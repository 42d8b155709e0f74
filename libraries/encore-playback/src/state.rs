//! Playback state flags
//!
//! In memory the state is a plain struct of named fields. The packed `u32`
//! form only exists at the persistence boundary.

use crate::types::{FinishAction, ShuffleMode};
use serde::{Deserialize, Serialize};

const PLAYING: u32 = 1 << 0;
const NO_MEDIA: u32 = 1 << 1;
const ERROR: u32 = 1 << 2;
const EMPTY_QUEUE: u32 = 1 << 3;
const FINISH_SHIFT: u32 = 4;
const FINISH_MASK: u32 = 0b111;
const SHUFFLE_SHIFT: u32 = 7;
const SHUFFLE_MASK: u32 = 0b11;
const DUCKING: u32 = 1 << 9;

/// Observable playback state
///
/// Invariant: whenever `no_media`, `error` or `empty_queue` is set, `playing`
/// is false. Every setter re-establishes it, so a state value can never be
/// observed in violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    playing: bool,
    no_media: bool,
    error: bool,
    empty_queue: bool,
    ducking: bool,
    finish_action: FinishAction,
    shuffle_mode: ShuffleMode,
}

impl PlaybackState {
    /// Whether audio is (supposed to be) playing
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Library holds no playable track
    pub fn no_media(&self) -> bool {
        self.no_media
    }

    /// Current track failed to load
    pub fn error(&self) -> bool {
        self.error
    }

    /// Nothing left to play in the queue
    pub fn empty_queue(&self) -> bool {
        self.empty_queue
    }

    /// Volume is lowered for a transient focus loss
    pub fn ducking(&self) -> bool {
        self.ducking
    }

    /// Finish action mirrored from the queue
    pub fn finish_action(&self) -> FinishAction {
        self.finish_action
    }

    /// Shuffle mode mirrored from the queue
    pub fn shuffle_mode(&self) -> ShuffleMode {
        self.shuffle_mode
    }

    /// Whether a blocking condition prevents playback
    pub fn is_blocked(&self) -> bool {
        self.no_media || self.error || self.empty_queue
    }

    pub(crate) fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        self.normalize();
    }

    pub(crate) fn set_no_media(&mut self, no_media: bool) {
        self.no_media = no_media;
        self.normalize();
    }

    pub(crate) fn set_error(&mut self, error: bool) {
        self.error = error;
        self.normalize();
    }

    pub(crate) fn set_empty_queue(&mut self, empty_queue: bool) {
        self.empty_queue = empty_queue;
        self.normalize();
    }

    pub(crate) fn set_ducking(&mut self, ducking: bool) {
        self.ducking = ducking;
        self.normalize();
    }

    pub(crate) fn set_finish_action(&mut self, action: FinishAction) {
        self.finish_action = action;
        self.normalize();
    }

    pub(crate) fn set_shuffle_mode(&mut self, mode: ShuffleMode) {
        self.shuffle_mode = mode;
        self.normalize();
    }

    fn normalize(&mut self) {
        if self.is_blocked() {
            self.playing = false;
        }
    }

    /// Pack into the persisted form
    pub fn to_bits(&self) -> u32 {
        let mut bits = 0;
        if self.playing {
            bits |= PLAYING;
        }
        if self.no_media {
            bits |= NO_MEDIA;
        }
        if self.error {
            bits |= ERROR;
        }
        if self.empty_queue {
            bits |= EMPTY_QUEUE;
        }
        if self.ducking {
            bits |= DUCKING;
        }
        bits |= (self.finish_action.to_bits() & FINISH_MASK) << FINISH_SHIFT;
        bits |= (self.shuffle_mode.to_bits() & SHUFFLE_MASK) << SHUFFLE_SHIFT;
        bits
    }

    /// Unpack from the persisted form, re-establishing the invariant
    pub fn from_bits(bits: u32) -> Self {
        let mut state = Self {
            playing: bits & PLAYING != 0,
            no_media: bits & NO_MEDIA != 0,
            error: bits & ERROR != 0,
            empty_queue: bits & EMPTY_QUEUE != 0,
            ducking: bits & DUCKING != 0,
            finish_action: FinishAction::from_bits((bits >> FINISH_SHIFT) & FINISH_MASK),
            shuffle_mode: ShuffleMode::from_bits((bits >> SHUFFLE_SHIFT) & SHUFFLE_MASK),
        };
        state.normalize();
        state
    }
}
