//! Per-view command-composition state.
//!
//! Lifecycle: created on first use, mutated one key at a time by the state
//! machine, `reset_command_data` after every dispatch (and every error), and
//! `reset_volatile_data` at session start.

use core_events::{ConcreteCommand, KeyToken, Mode};
use core_keymap::{InputSpec, Motion, Operator};
use serde::Deserialize;

use crate::StateError;

/// Upper bound applied to composed counts.
pub const MAX_COUNT: u32 = 999_999;

/// Which installed command a pending input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSlot {
    Action,
    Motion,
}

/// A command waiting for more keys before it can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInput {
    pub slot: InputSlot,
    pub spec: InputSpec,
    pub collected: String,
    /// Mode to restore when a prompt is submitted or cancelled.
    pub return_mode: Mode,
}

/// Shape of the selection a Visual-mode command ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VisualRepeatInfo {
    pub line_span: u32,
    pub column_span: u32,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepeatKind {
    /// Replay keys through the machine; `count` is replaced by `N.`.
    Keys {
        keys: Vec<KeyToken>,
        count: Option<u32>,
        register: Option<char>,
    },
    /// Re-run a concrete command against an equivalent selection.
    Native(ConcreteCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatData {
    pub kind: RepeatKind,
    pub mode: Mode,
    pub visual: Option<VisualRepeatInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputState {
    pub mode: Mode,
    /// Every key since the last dispatch, counts and register included.
    pub sequence: Vec<KeyToken>,
    /// Keys since the last fully resolved sub-command.
    pub partial_sequence: Vec<KeyToken>,
    /// `sequence` without counts and register selection, used for `.`.
    pub command_keys: Vec<KeyToken>,
    pub action: Option<Operator>,
    /// Keys that resolved to `action`, used to retry `dd`-style doubles.
    pub action_keys: Vec<KeyToken>,
    pub motion: Option<Motion>,
    action_count: String,
    motion_count: String,
    pub register: char,
    pub capture_register: bool,
    pub pending: Option<PendingInput>,
    pub action_input: Option<String>,
    pub motion_input: Option<String>,
    /// Held keys are only waiting on a user-mapping prefix.
    pub held_for_mapping: bool,
    pub last_character_search: Option<char>,
    pub last_char_search_command: Option<Motion>,
    pub last_buffer_search: Option<String>,
    pub last_buffer_search_command: Option<Motion>,
    pub recording_macro: bool,
    pub macro_register: Option<char>,
    pub macro_buffer: Vec<KeyToken>,
    pub last_macro: Option<Vec<KeyToken>>,
    /// Keys typed until the next return to Normal extend the repeat payload.
    pub glue_until_normal_mode: bool,
    /// A macro or repeat replay is feeding keys.
    pub gluing_sequence: bool,
    pub repeat_data: Option<RepeatData>,
    /// Current selection shape as reported by the host.
    pub selection: Option<VisualRepeatInfo>,
    /// Column a run of vertical motions keeps returning to.
    pub xpos: Option<u32>,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            sequence: Vec::new(),
            partial_sequence: Vec::new(),
            command_keys: Vec::new(),
            action: None,
            action_keys: Vec::new(),
            motion: None,
            action_count: String::new(),
            motion_count: String::new(),
            register: '"',
            capture_register: false,
            pending: None,
            action_input: None,
            motion_input: None,
            held_for_mapping: false,
            last_character_search: None,
            last_char_search_command: None,
            last_buffer_search: None,
            last_buffer_search_command: None,
            recording_macro: false,
            macro_register: None,
            macro_buffer: Vec::new(),
            last_macro: None,
            glue_until_normal_mode: false,
            gluing_sequence: false,
            repeat_data: None,
            selection: None,
            xpos: None,
        }
    }
}

fn parse_count(s: &str) -> Result<Option<u32>, StateError> {
    if s.is_empty() {
        return Ok(None);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StateError::InvalidCount(s.to_string()));
    }
    let n: u64 = s.parse().unwrap_or(u64::MAX);
    if n == 0 {
        return Err(StateError::InvalidCount(s.to_string()));
    }
    Ok(Some(n.min(u64::from(MAX_COUNT)) as u32))
}

impl InputState {
    pub fn action_count(&self) -> &str {
        &self.action_count
    }

    pub fn motion_count(&self) -> &str {
        &self.motion_count
    }

    /// Replace both count strings; they are validated lazily by `count`.
    pub fn set_counts(&mut self, action: impl Into<String>, motion: impl Into<String>) {
        self.action_count = action.into();
        self.motion_count = motion.into();
    }

    /// Digits typed before the action go to `action_count`; digits typed in
    /// Operator-pending go to `motion_count`.
    pub fn push_count_digit(&mut self, digit: char) {
        if self.action.is_some() && self.mode == Mode::OperatorPending {
            self.motion_count.push(digit);
        } else {
            self.action_count.push(digit);
        }
    }

    /// Whether a `0` typed now extends a count rather than meaning line-start.
    pub fn has_count_in_progress(&self) -> bool {
        if self.action.is_some() && self.mode == Mode::OperatorPending {
            !self.motion_count.is_empty()
        } else {
            !self.action_count.is_empty()
        }
    }

    /// `max(1, action_count * motion_count)`, empty strings counting as 1.
    pub fn count(&self) -> Result<u32, StateError> {
        let a = parse_count(&self.action_count)?.unwrap_or(1);
        let m = parse_count(&self.motion_count)?.unwrap_or(1);
        Ok(a.saturating_mul(m).clamp(1, MAX_COUNT))
    }

    /// `Some(count)` only when the user actually typed a count.
    pub fn explicit_count(&self) -> Option<u32> {
        if self.action_count.is_empty() && self.motion_count.is_empty() {
            return None;
        }
        self.count().ok()
    }

    pub fn set_action(&mut self, action: Operator, keys: Vec<KeyToken>) -> Result<(), StateError> {
        if let Some(existing) = self.action {
            return Err(StateError::TooManyActions {
                existing: existing.name(),
                new: action.name(),
            });
        }
        self.action = Some(action);
        self.action_keys = keys;
        Ok(())
    }

    pub fn set_motion(&mut self, motion: Motion) -> Result<(), StateError> {
        if let Some(existing) = self.motion {
            return Err(StateError::TooManyMotions {
                existing: existing.name(),
                new: motion.name(),
            });
        }
        self.motion = Some(motion);
        Ok(())
    }

    /// Replace the installed action (`d` becoming `dd`).
    pub fn replace_action(&mut self, action: Operator, keys: Vec<KeyToken>) {
        self.action = Some(action);
        self.action_keys = keys;
    }

    pub fn is_runnable(&self) -> bool {
        if self.pending.is_some() {
            return false;
        }
        match (self.action, self.motion) {
            (Some(_), Some(_)) => true,
            (Some(action), None) => !action.motion_required() || self.mode.is_visual(),
            (None, Some(_)) => self.mode != Mode::OperatorPending,
            (None, None) => false,
        }
    }

    /// Clear everything collected for the current command.
    pub fn reset_command_data(&mut self) {
        self.sequence.clear();
        self.partial_sequence.clear();
        self.command_keys.clear();
        self.action = None;
        self.action_keys.clear();
        self.motion = None;
        self.action_count.clear();
        self.motion_count.clear();
        self.register = '"';
        self.capture_register = false;
        self.pending = None;
        self.action_input = None;
        self.motion_input = None;
        self.held_for_mapping = false;
    }

    /// Session-start reset: command data plus replay/glue flags.
    pub fn reset_volatile_data(&mut self) {
        self.reset_command_data();
        self.glue_until_normal_mode = false;
        self.gluing_sequence = false;
    }

    /// True when no command is being composed.
    pub fn is_idle(&self) -> bool {
        self.sequence.is_empty()
            && self.partial_sequence.is_empty()
            && self.command_keys.is_empty()
            && self.action.is_none()
            && self.action_keys.is_empty()
            && self.motion.is_none()
            && self.action_count.is_empty()
            && self.motion_count.is_empty()
            && self.register == '"'
            && !self.capture_register
            && self.pending.is_none()
            && self.action_input.is_none()
            && self.motion_input.is_none()
            && !self.held_for_mapping
    }
}
