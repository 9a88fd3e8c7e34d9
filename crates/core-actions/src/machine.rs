//! The command state machine: one key in, at most one result out.
//!
//! Order of handling for each key:
//! 1. `<esc>` resets to Normal (flushing a held mapping prefix first).
//! 2. A register name after `"`.
//! 3. Input owed to an installed command (`f{char}`, `q{reg}`, prompt text).
//! 4. `"` and count digits while nothing else is pending.
//! 5. Mapping / registry resolution of the partial sequence.
//!
//! Expansions, macro replays and `.` feed keys back through the same path,
//! so every nested dispatch obeys the same rules as typed keys.

use std::mem;
use std::time::{Duration, Instant};

use core_events::{ConcreteCommand, KeyToken, Mode, NamedKey, notation};
use core_keymap::{
    CommandDef, InputKind, Lookup, MappingResolver, Motion, Operator, ResolvedCommand,
};
use core_state::registers::REG_LAST_INSERTED;
use core_state::{
    InputSlot, InputState, PendingInput, Registers, RepeatData, RepeatKind, VisualRepeatInfo,
};
use tracing::{debug, info, trace, warn};

use crate::MachineError;
use crate::dispatch::{DispatchResult, combine};
use crate::ex;
use crate::session::Session;

/// Per-view input interpreter. Shared state lives in `Session`.
#[derive(Debug, Default)]
pub struct CommandStateMachine {
    pub(crate) state: InputState,
    mapping_depth: u32,
    macro_depth: u32,
    /// Length of the macro buffer when the current command started.
    macro_mark: usize,
    held_since: Option<Instant>,
    /// Text typed since the last insert-type command, for the `.` register.
    inserted: String,
}

impl CommandStateMachine {
    pub fn new() -> Self {
        let mut machine = Self::default();
        machine.state.reset_volatile_data();
        machine
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    /// Host-driven mode change (mouse selection, focus change). Drops any
    /// command in progress.
    pub fn set_mode(&mut self, mode: Mode) {
        self.state.reset_command_data();
        self.state.mode = mode;
        self.held_since = None;
    }

    /// Shape of the current selection, remembered for Visual-mode `.`.
    pub fn set_selection(&mut self, selection: Option<VisualRepeatInfo>) {
        self.state.selection = selection;
    }

    /// When a held mapping prefix should be flushed with `flush_pending`.
    pub fn pending_deadline(&self, session: &Session) -> Option<Instant> {
        if !session.input.timeout {
            return None;
        }
        self.held_since
            .map(|since| since + Duration::from_millis(u64::from(session.input.timeoutlen)))
    }

    /// Feed one key. On error the machine is reset to an idle Normal state.
    pub fn feed(
        &mut self,
        session: &mut Session,
        key: KeyToken,
    ) -> Result<DispatchResult, MachineError> {
        if self.state.is_idle() {
            self.macro_mark = self.state.macro_buffer.len();
        }
        if self.state.recording_macro && !self.state.gluing_sequence {
            self.state.macro_buffer.push(key.clone());
        }
        let result = self.process(session, key, true);
        match &result {
            Ok(out) => trace!(target: "input.machine", mode = %self.state.mode, result = ?out, "fed"),
            Err(err) => {
                warn!(target: "input.machine", error = %err, "feed_failed");
                self.abort();
            }
        }
        result
    }

    /// Tokenize `keys` and feed each one, collecting every result.
    pub fn feed_notation(
        &mut self,
        session: &mut Session,
        keys: &str,
    ) -> Result<Vec<DispatchResult>, MachineError> {
        let tokens = core_input::tokenize(keys)?;
        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            results.push(self.feed(session, token)?);
        }
        Ok(results)
    }

    /// Timeout for a held user-mapping prefix: the first held key is
    /// interpreted without user mappings and the rest are fed again.
    pub fn flush_pending(&mut self, session: &mut Session) -> Result<DispatchResult, MachineError> {
        if !self.state.held_for_mapping || self.state.partial_sequence.is_empty() {
            return Ok(DispatchResult::NeedMore);
        }
        debug!(
            target: "input.machine",
            held = %notation(&self.state.partial_sequence),
            "mapping_timeout"
        );
        let result = self.replay_held(session);
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Run an Ex line directly (scripts, `@:`), abandoning any command in progress.
    pub fn run_ex(&mut self, session: &mut Session, line: &str) -> DispatchResult {
        self.state.reset_command_data();
        self.state.mode = Mode::Normal;
        ex::run_ex_line(session, line)
    }

    fn abort(&mut self) {
        self.state.reset_command_data();
        self.state.mode = Mode::Normal;
        self.state.gluing_sequence = false;
        self.held_since = None;
        self.mapping_depth = 0;
        self.macro_depth = 0;
    }

    fn process(
        &mut self,
        session: &mut Session,
        key: KeyToken,
        user_mappings: bool,
    ) -> Result<DispatchResult, MachineError> {
        trace!(target: "input.machine", key = %key, mode = %self.state.mode, "key");
        if key == KeyToken::ESC {
            if self.state.held_for_mapping && !self.state.partial_sequence.is_empty() {
                let flushed = self.replay_held(session)?;
                let escaped = self.escape(session);
                return Ok(combine(vec![flushed, escaped], false));
            }
            return Ok(self.escape(session));
        }
        if self.state.capture_register {
            return Ok(self.capture_register(key));
        }
        if self.state.pending.is_some() {
            return self.accept_input(session, key);
        }

        let mode = self.state.mode;
        let composing = !mode.is_text_entry() && mode != Mode::CommandLine;
        if composing && self.state.partial_sequence.is_empty() {
            if key == KeyToken::Char('"') && self.state.action.is_none() {
                self.state.capture_register = true;
                self.state.sequence.push(key);
                return Ok(DispatchResult::NeedMore);
            }
            if let Some(digit) = key.as_char().filter(char::is_ascii_digit)
                && (digit != '0' || self.state.has_count_in_progress())
            {
                self.state.push_count_digit(digit);
                self.state.sequence.push(key);
                return Ok(DispatchResult::NeedMore);
            }
        }

        self.state.partial_sequence.push(key.clone());
        self.state.sequence.push(key);
        let resolved = MappingResolver::new(&session.mappings, &session.registry).resolve(
            mode,
            &self.state.partial_sequence,
            user_mappings,
        );
        let held = mem::take(&mut self.state.held_for_mapping);
        if !resolved.needs_more() {
            self.held_since = None;
        }
        match resolved {
            ResolvedCommand::Incomplete => {
                self.state.held_for_mapping = true;
                self.held_since.get_or_insert_with(Instant::now);
                Ok(DispatchResult::NeedMore)
            }
            ResolvedCommand::OpenNamespace => {
                self.state.held_for_mapping = held;
                Ok(DispatchResult::NeedMore)
            }
            ResolvedCommand::Missing if held => {
                self.state.held_for_mapping = true;
                self.replay_held(session)
            }
            ResolvedCommand::Missing => self.missing(session),
            ResolvedCommand::Keys { keys, recursive } => self.expand(session, keys, recursive),
            ResolvedCommand::Command(CommandDef::Motion(motion)) => {
                self.install_motion(session, motion)
            }
            ResolvedCommand::Command(CommandDef::Operator(op)) => self.install_operator(session, op),
        }
    }

    fn escape(&mut self, session: &mut Session) -> DispatchResult {
        let from = self.state.mode;
        if self.state.glue_until_normal_mode {
            if let Some(RepeatData {
                kind: RepeatKind::Keys { keys, .. },
                ..
            }) = self.state.repeat_data.as_mut()
            {
                keys.push(KeyToken::ESC);
            }
            self.state.glue_until_normal_mode = false;
            let text = mem::take(&mut self.inserted);
            if let Err(err) = session.registers.set_special(REG_LAST_INSERTED, vec![text]) {
                warn!(target: "input.repeat", error = %err, "last_inserted_failed");
            }
        }
        self.state.reset_command_data();
        self.state.mode = Mode::Normal;
        self.held_since = None;
        debug!(target: "input.machine", from = %from, "escape");
        DispatchResult::Dispatched(
            ConcreteCommand::new("enter-normal-mode").with_arg("from", from.as_str()),
        )
    }

    fn capture_register(&mut self, key: KeyToken) -> DispatchResult {
        self.state.capture_register = false;
        match key.as_char().filter(|c| Registers::is_valid_name(*c)) {
            Some(name) => {
                self.state.register = name;
                self.state.sequence.push(key);
                DispatchResult::NeedMore
            }
            None => self.unmapped("invalid_register"),
        }
    }

    fn unmapped(&mut self, reason: &'static str) -> DispatchResult {
        debug!(
            target: "input.machine",
            reason,
            mode = %self.state.mode,
            seq = %notation(&self.state.sequence),
            "unmapped"
        );
        self.state.reset_command_data();
        if !self.state.mode.is_text_entry() {
            self.state.mode = Mode::Normal;
        }
        self.held_since = None;
        DispatchResult::Unmapped
    }

    fn passthrough(&mut self, key: KeyToken) -> DispatchResult {
        if self.state.glue_until_normal_mode && !self.state.gluing_sequence {
            if let Some(RepeatData {
                kind: RepeatKind::Keys { keys, .. },
                ..
            }) = self.state.repeat_data.as_mut()
            {
                keys.push(key.clone());
            }
            if let Some(c) = key.text() {
                self.inserted.push(c);
            }
        }
        DispatchResult::Passthrough(key)
    }

    /// Nothing resolves. In Operator-pending the action keys are retried in
    /// Normal mode so doubled operators (`dd`, `gUU`, `ys`) are found.
    fn missing(&mut self, session: &mut Session) -> Result<DispatchResult, MachineError> {
        let mode = self.state.mode;
        if mode == Mode::OperatorPending && self.state.action.is_some() {
            let mut combined = self.state.action_keys.clone();
            combined.extend(self.state.partial_sequence.iter().cloned());
            match session.registry.lookup(Mode::Normal, &combined) {
                Lookup::Exact {
                    command: CommandDef::Operator(op),
                    ..
                } => {
                    let partial = mem::take(&mut self.state.partial_sequence);
                    self.state.command_keys.extend(partial);
                    debug!(target: "input.machine", op = op.name(), "operator_replaced");
                    self.state.replace_action(op, combined);
                    if op.motion_required() {
                        return Ok(DispatchResult::NeedMore);
                    }
                    self.state.mode = Mode::Normal;
                    return self.try_eval(session);
                }
                Lookup::Prefix => return Ok(DispatchResult::NeedMore),
                _ => {}
            }
        }
        if mode.is_text_entry() {
            let keys = mem::take(&mut self.state.partial_sequence);
            self.state.reset_command_data();
            let results: Vec<DispatchResult> =
                keys.into_iter().map(|key| self.passthrough(key)).collect();
            return Ok(combine(results, false));
        }
        Ok(self.unmapped("no_command"))
    }

    /// Re-interpret keys held for a user mapping that did not complete.
    fn replay_held(&mut self, session: &mut Session) -> Result<DispatchResult, MachineError> {
        let held = mem::take(&mut self.state.partial_sequence);
        let keep = self.state.sequence.len().saturating_sub(held.len());
        self.state.sequence.truncate(keep);
        self.state.held_for_mapping = false;
        self.held_since = None;

        let mut keys = held.into_iter();
        let mut results = Vec::new();
        if let Some(first) = keys.next() {
            results.push(self.process(session, first, false)?);
        }
        for key in keys {
            results.push(self.process(session, key, true)?);
        }
        Ok(combine(results, false))
    }

    fn expand(
        &mut self,
        session: &mut Session,
        keys: Vec<KeyToken>,
        recursive: bool,
    ) -> Result<DispatchResult, MachineError> {
        let limit = session.input.max_mapping_depth;
        if self.mapping_depth >= limit {
            return Err(MachineError::MappingDepth { limit });
        }
        self.state.partial_sequence.clear();
        debug!(
            target: "input.machine",
            keys = %notation(&keys),
            recursive,
            depth = self.mapping_depth,
            "mapping_expanded"
        );
        self.mapping_depth += 1;
        let outcome = self.feed_all(session, &keys, recursive);
        self.mapping_depth -= 1;
        Ok(combine(outcome?, false))
    }

    fn feed_all(
        &mut self,
        session: &mut Session,
        keys: &[KeyToken],
        user_mappings: bool,
    ) -> Result<Vec<DispatchResult>, MachineError> {
        keys.iter()
            .map(|key| self.process(session, key.clone(), user_mappings))
            .collect()
    }

    fn install_motion(
        &mut self,
        session: &mut Session,
        motion: Motion,
    ) -> Result<DispatchResult, MachineError> {
        self.state.set_motion(motion)?;
        let keys = mem::take(&mut self.state.partial_sequence);
        self.state.command_keys.extend(keys);
        if let Some(spec) = motion.input() {
            self.state.pending = Some(PendingInput {
                slot: InputSlot::Motion,
                spec,
                collected: String::new(),
                return_mode: self.state.mode,
            });
            if spec.kind == InputKind::ViaExternalPrompt {
                self.state.mode = Mode::CommandLine;
                return Ok(DispatchResult::Prompt(self.prompt_text()));
            }
            return Ok(DispatchResult::NeedMore);
        }
        self.try_eval(session)
    }

    fn install_operator(
        &mut self,
        session: &mut Session,
        op: Operator,
    ) -> Result<DispatchResult, MachineError> {
        let keys = mem::take(&mut self.state.partial_sequence);
        if op == Operator::RecordMacro && self.state.recording_macro {
            return self.stop_recording(session);
        }
        self.state.set_action(op, keys.clone())?;
        self.state.command_keys.extend(keys);
        let mode = self.state.mode;
        if op.motion_required() && !mode.is_visual() {
            self.state.mode = Mode::OperatorPending;
        }
        if let Some(spec) = op.input()
            && spec.kind != InputKind::AfterMotion
        {
            let mut collected = String::new();
            if op == Operator::CommandLine {
                if mode.is_visual() {
                    collected.push_str("'<,'>");
                } else if let Some(n) = self.state.explicit_count().filter(|n| *n > 1) {
                    collected = format!(".,.+{}", n - 1);
                }
            }
            self.state.pending = Some(PendingInput {
                slot: InputSlot::Action,
                spec,
                collected,
                return_mode: mode,
            });
            if spec.kind == InputKind::ViaExternalPrompt {
                self.state.mode = Mode::CommandLine;
                return Ok(DispatchResult::Prompt(self.prompt_text()));
            }
            return Ok(DispatchResult::NeedMore);
        }
        self.try_eval(session)
    }

    fn accept_input(
        &mut self,
        session: &mut Session,
        key: KeyToken,
    ) -> Result<DispatchResult, MachineError> {
        let Some(pending) = self.state.pending.take() else {
            return Ok(DispatchResult::NeedMore);
        };
        if pending.spec.kind == InputKind::ViaExternalPrompt {
            return self.prompt_key(session, pending, key);
        }
        let Some(c) = key.text().filter(|c| pending.spec.class.accepts(*c)) else {
            return Ok(self.unmapped("invalid_input"));
        };
        self.state.sequence.push(key.clone());
        self.state.command_keys.push(key);
        match pending.slot {
            InputSlot::Action => self.state.action_input = Some(c.to_string()),
            InputSlot::Motion => self.state.motion_input = Some(c.to_string()),
        }
        self.try_eval(session)
    }

    fn prompt_text(&self) -> String {
        let Some(pending) = &self.state.pending else {
            return String::new();
        };
        let leader = match pending.slot {
            InputSlot::Action => ':',
            InputSlot::Motion if self.state.motion == Some(Motion::SearchBackward) => '?',
            InputSlot::Motion => '/',
        };
        format!("{leader}{}", pending.collected)
    }

    fn prompt_key(
        &mut self,
        session: &mut Session,
        mut pending: PendingInput,
        key: KeyToken,
    ) -> Result<DispatchResult, MachineError> {
        self.state.sequence.push(key.clone());
        self.state.command_keys.push(key.clone());
        if key == KeyToken::ENTER {
            return self.submit_prompt(session, pending);
        }
        if key == KeyToken::Named(NamedKey::Backspace) {
            if pending.collected.pop().is_none() {
                let back = pending.return_mode;
                self.state.reset_command_data();
                self.state.mode = if back.is_visual() { back } else { Mode::Normal };
                debug!(target: "input.machine", "prompt_cancelled");
                return Ok(DispatchResult::Prompt(String::new()));
            }
        } else if let Some(c) = key.text() {
            pending.collected.push(c);
        }
        self.state.pending = Some(pending);
        Ok(DispatchResult::Prompt(self.prompt_text()))
    }

    fn submit_prompt(
        &mut self,
        session: &mut Session,
        pending: PendingInput,
    ) -> Result<DispatchResult, MachineError> {
        let text = pending.collected;
        match pending.slot {
            InputSlot::Action => {
                self.state.reset_command_data();
                self.state.mode = Mode::Normal;
                info!(target: "ex.dispatch", line = %text, "command_line_submitted");
                Ok(ex::run_ex_line(session, &text))
            }
            InputSlot::Motion => {
                let pattern = if text.is_empty() {
                    match self.state.last_buffer_search.clone() {
                        Some(previous) => previous,
                        None => {
                            self.state.reset_command_data();
                            self.state.mode = Mode::Normal;
                            return Ok(DispatchResult::ExFailed(core_ex::ExError::new(
                                core_ex::ExErrorKind::NoPreviousRegex,
                            )));
                        }
                    }
                } else {
                    text
                };
                self.state.last_buffer_search = Some(pattern.clone());
                self.state.last_buffer_search_command = self.state.motion;
                self.state.motion_input = Some(pattern);
                self.state.mode = pending.return_mode;
                self.try_eval(session)
            }
        }
    }

    fn try_eval(&mut self, session: &mut Session) -> Result<DispatchResult, MachineError> {
        if self.state.mode == Mode::OperatorPending
            && self.state.action.is_some()
            && self.state.motion.is_some()
            && self.state.pending.is_none()
        {
            self.state.mode = Mode::Normal;
        }
        if let (Some(op), Some(_)) = (self.state.action, self.state.motion)
            && self.state.pending.is_none()
            && self.state.action_input.is_none()
            && let Some(spec) = op.input()
            && spec.kind == InputKind::AfterMotion
        {
            self.state.pending = Some(PendingInput {
                slot: InputSlot::Action,
                spec,
                collected: String::new(),
                return_mode: self.state.mode,
            });
            return Ok(DispatchResult::NeedMore);
        }
        if !self.state.is_runnable() {
            return Ok(DispatchResult::NeedMore);
        }
        if self.state.mode == Mode::OperatorPending {
            return Err(MachineError::RunnableInOperatorPending);
        }
        let result = self.eval(session);
        self.state.reset_command_data();
        result
    }

    fn eval(&mut self, session: &mut Session) -> Result<DispatchResult, MachineError> {
        let mode = self.state.mode;
        let count = self.state.count()?;
        let explicit = self.state.explicit_count();
        let register = self.state.register;
        match (self.state.action, self.state.motion) {
            (Some(op), Some(motion)) => {
                self.state.mode = Mode::InternalNormal;
                let Some(motion_cmd) =
                    self.translate_motion(session, motion, count, explicit, Mode::OperatorPending)?
                else {
                    return Ok(self.unmapped("motion_unavailable"));
                };
                let cmd = self
                    .translate_operator(session, op, 1, Mode::Normal, register)?
                    .with_arg("motion", motion_cmd.to_value());
                self.state.mode = op.mode_after(Mode::Normal);
                self.record_repeat(op, Mode::Normal, &cmd, explicit, register);
                debug!(target: "input.machine", command = %cmd, "dispatch");
                Ok(DispatchResult::Dispatched(cmd))
            }
            (None, Some(motion)) => {
                match self.translate_motion(session, motion, count, explicit, mode)? {
                    Some(cmd) => {
                        debug!(target: "input.machine", command = %cmd, "dispatch");
                        Ok(DispatchResult::Dispatched(cmd))
                    }
                    None => Ok(self.unmapped("motion_unavailable")),
                }
            }
            (Some(op), None) => self.eval_operator(session, op, mode, count, explicit, register),
            (None, None) => Ok(DispatchResult::NeedMore),
        }
    }

    fn eval_operator(
        &mut self,
        session: &mut Session,
        op: Operator,
        mode: Mode,
        count: u32,
        explicit: Option<u32>,
        register: char,
    ) -> Result<DispatchResult, MachineError> {
        match op {
            Operator::RecordMacro => return Ok(self.start_recording()),
            Operator::PlayMacro => return self.play_macro(session, count),
            Operator::RepeatLast => return self.repeat_last(session, explicit),
            Operator::RepeatSubstitute => {
                let result = ex::repeat_substitute(session);
                if let DispatchResult::Dispatched(cmd) = &result {
                    self.record_repeat(op, mode, cmd, explicit, register);
                }
                return Ok(result);
            }
            Operator::SetMark => {
                let Some(name) = self.action_char() else {
                    return Ok(self.unmapped("missing_mark"));
                };
                session.marks.set(name, session.cursor)?;
                self.state.mode = op.mode_after(mode);
                return Ok(DispatchResult::Dispatched(
                    ConcreteCommand::new(op.name()).with_arg("mark", name.to_string()),
                ));
            }
            _ => {}
        }
        if mode == Mode::Normal {
            self.state.mode = Mode::InternalNormal;
        }
        let cmd = self.translate_operator(session, op, count, mode, register)?;
        self.state.mode = op.mode_after(mode);
        self.record_repeat(op, mode, &cmd, explicit, register);
        debug!(target: "input.machine", command = %cmd, mode = %self.state.mode, "dispatch");
        Ok(DispatchResult::Dispatched(cmd))
    }

    fn action_char(&self) -> Option<char> {
        self.state.action_input.as_deref().and_then(|s| s.chars().next())
    }

    fn record_repeat(
        &mut self,
        op: Operator,
        mode: Mode,
        cmd: &ConcreteCommand,
        explicit: Option<u32>,
        register: char,
    ) {
        if self.state.gluing_sequence || !op.repeatable() {
            return;
        }
        let data = if mode.is_visual() {
            let visual = self.state.selection.unwrap_or(VisualRepeatInfo {
                line_span: 1,
                column_span: 1,
                mode,
            });
            RepeatData {
                kind: RepeatKind::Native(cmd.clone()),
                mode,
                visual: Some(visual),
            }
        } else {
            RepeatData {
                kind: RepeatKind::Keys {
                    keys: self.state.command_keys.clone(),
                    count: explicit,
                    register: (register != '"').then_some(register),
                },
                mode,
                visual: None,
            }
        };
        let glue = matches!(data.kind, RepeatKind::Keys { .. })
            && matches!(self.state.mode, Mode::Insert | Mode::Replace);
        debug!(
            target: "input.repeat",
            command = %cmd.name,
            keys = %notation(&self.state.command_keys),
            glue,
            "repeat_recorded"
        );
        self.state.repeat_data = Some(data);
        self.state.glue_until_normal_mode = glue;
        self.inserted.clear();
    }

    fn repeat_last(
        &mut self,
        session: &mut Session,
        explicit: Option<u32>,
    ) -> Result<DispatchResult, MachineError> {
        let Some(data) = self.state.repeat_data.clone() else {
            return Ok(self.unmapped("nothing_to_repeat"));
        };
        self.state.reset_command_data();
        self.state.mode = Mode::Normal;
        match data.kind {
            RepeatKind::Keys {
                keys,
                count,
                register,
            } => {
                let mut replay = Vec::with_capacity(keys.len() + 4);
                if let Some(name) = register {
                    replay.push(KeyToken::Char('"'));
                    replay.push(KeyToken::Char(name));
                }
                if let Some(n) = explicit.or(count) {
                    replay.extend(n.to_string().chars().map(KeyToken::Char));
                }
                replay.extend(keys);
                debug!(target: "input.repeat", keys = %notation(&replay), "repeat_replayed");
                let (results, _) = self.replay(session, &replay, false)?;
                Ok(combine(results, true))
            }
            RepeatKind::Native(cmd) => {
                let info = data.visual.unwrap_or(VisualRepeatInfo {
                    line_span: 1,
                    column_span: 1,
                    mode: data.mode,
                });
                let select = ConcreteCommand::new("select-like-previous")
                    .with_arg("line_span", info.line_span)
                    .with_arg("column_span", info.column_span)
                    .with_arg("mode", info.mode.as_str());
                debug!(target: "input.repeat", command = %cmd.name, "repeat_native");
                Ok(DispatchResult::Dispatched(ConcreteCommand::sequence(
                    vec![select, cmd],
                    true,
                )))
            }
        }
    }

    /// Feed keys as a replay: no repeat recording, no macro capture. Stops at
    /// the first unmapped key and reports whether it did.
    fn replay(
        &mut self,
        session: &mut Session,
        keys: &[KeyToken],
        user_mappings: bool,
    ) -> Result<(Vec<DispatchResult>, bool), MachineError> {
        let previous = mem::replace(&mut self.state.gluing_sequence, true);
        let outcome = self.feed_until_unmapped(session, keys, user_mappings);
        self.state.gluing_sequence = previous;
        outcome
    }

    fn feed_until_unmapped(
        &mut self,
        session: &mut Session,
        keys: &[KeyToken],
        user_mappings: bool,
    ) -> Result<(Vec<DispatchResult>, bool), MachineError> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let result = self.process(session, key.clone(), user_mappings)?;
            let stop = result == DispatchResult::Unmapped;
            results.push(result);
            if stop {
                return Ok((results, true));
            }
        }
        Ok((results, false))
    }

    fn start_recording(&mut self) -> DispatchResult {
        let Some(name) = self.action_char() else {
            return self.unmapped("missing_register");
        };
        self.state.recording_macro = true;
        self.state.macro_register = Some(name);
        self.state.macro_buffer.clear();
        info!(target: "input.macro", register = %name, "recording_started");
        DispatchResult::Dispatched(
            ConcreteCommand::new("start-recording").with_arg("register", name.to_string()),
        )
    }

    fn stop_recording(&mut self, session: &mut Session) -> Result<DispatchResult, MachineError> {
        let mut keys = mem::take(&mut self.state.macro_buffer);
        keys.truncate(self.macro_mark);
        self.state.recording_macro = false;
        self.state.reset_command_data();
        let Some(name) = self.state.macro_register.take() else {
            return Ok(DispatchResult::Handled);
        };
        let text = notation(&keys);
        info!(target: "input.macro", register = %name, keys = %text, "recording_stopped");
        session.registers.store_macro(name, vec![text])?;
        self.state.last_macro = Some(keys);
        Ok(DispatchResult::Dispatched(
            ConcreteCommand::new("stop-recording").with_arg("register", name.to_string()),
        ))
    }

    fn macro_keys(
        &mut self,
        session: &mut Session,
        name: char,
    ) -> Result<Option<Vec<KeyToken>>, MachineError> {
        if name == '@' {
            return Ok(self.state.last_macro.clone());
        }
        let Some(lines) = session.registers.get(name)? else {
            return Ok(None);
        };
        let mut keys = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                keys.push(KeyToken::ENTER);
            }
            keys.extend(core_input::tokenize(line)?);
        }
        Ok(Some(keys))
    }

    fn play_macro(
        &mut self,
        session: &mut Session,
        count: u32,
    ) -> Result<DispatchResult, MachineError> {
        let Some(name) = self.action_char() else {
            return Ok(self.unmapped("missing_register"));
        };
        let limit = session.input.max_macro_depth;
        if self.macro_depth >= limit {
            return Err(MachineError::MacroDepth { limit });
        }
        self.state.reset_command_data();
        self.state.mode = Mode::Normal;

        if name == ':' {
            let Some(line) = session.registers.peek(':').and_then(|l| l.into_iter().next()) else {
                return Ok(self.unmapped("no_previous_command_line"));
            };
            let results = (0..count).map(|_| ex::run_ex_line(session, &line)).collect();
            return Ok(combine(results, count > 1));
        }

        let keys = match self.macro_keys(session, name)? {
            Some(keys) if !keys.is_empty() => keys,
            _ => return Ok(self.unmapped("empty_macro")),
        };
        self.state.last_macro = Some(keys.clone());
        info!(target: "input.macro", register = %name, count, keys = %notation(&keys), "macro_replay");

        self.macro_depth += 1;
        let mut all = Vec::new();
        let mut outcome = Ok(());
        for _ in 0..count {
            match self.replay(session, &keys, true) {
                Ok((results, aborted)) => {
                    all.extend(results);
                    if aborted {
                        debug!(target: "input.macro", register = %name, "macro_aborted");
                        break;
                    }
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        self.macro_depth -= 1;
        outcome?;
        Ok(match combine(all, true) {
            DispatchResult::NeedMore => DispatchResult::Handled,
            other => other,
        })
    }
}
