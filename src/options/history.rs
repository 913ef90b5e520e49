use std::collections::VecDeque;

use crate::options::frame_options::{FrameOptions, RevertableOption};

/// Maximum number of snapshots kept on each stack.
pub const HISTORY_CAPACITY: usize = 10;

/// Bounded undo/redo over [`FrameOptions`] snapshots.
///
/// The history owns the current options; everything else reads them from
/// here. A new change after an undo discards the redo stack.
#[derive(Clone, Debug, Default)]
pub struct OptionsHistory {
    undo: VecDeque<FrameOptions>,
    redo: VecDeque<FrameOptions>,
    current: FrameOptions,
    last_changed: Option<RevertableOption>,
}

fn push_bounded(stack: &mut VecDeque<FrameOptions>, snapshot: FrameOptions) {
    if stack.len() >= HISTORY_CAPACITY {
        stack.pop_front();
    }
    stack.push_back(snapshot);
}

impl OptionsHistory {
    pub fn new(initial: FrameOptions) -> Self {
        Self {
            current: initial,
            ..Self::default()
        }
    }

    /// Record a change of `option` to `value`.
    pub fn add(&mut self, option: RevertableOption, value: i16) {
        push_bounded(&mut self.undo, self.current);
        self.current.set(option, value);
        self.current.last_changed = Some(option);
        self.last_changed = Some(option);
        self.redo.clear();
    }

    /// Like [`Self::add`] but takes the option by name. Unknown names change
    /// nothing, are not recorded and return `false`.
    pub fn add_named(&mut self, option: &str, value: i16) -> bool {
        match option.parse::<RevertableOption>() {
            Ok(option) => {
                self.add(option, value);
                true
            }
            Err(err) => {
                log::debug!("history: {err}, ignored");
                false
            }
        }
    }

    pub fn undo(&mut self) {
        if let Some(previous) = self.undo.pop_back() {
            self.last_changed = self.current.last_changed;
            push_bounded(&mut self.redo, self.current);
            self.current = previous;
        }
    }

    pub fn redo(&mut self) {
        if let Some(next) = self.redo.pop_back() {
            self.last_changed = next.last_changed;
            push_bounded(&mut self.undo, self.current);
            self.current = next;
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn current(&self) -> &FrameOptions {
        &self.current
    }

    /// Replace the current options without recording history.
    pub fn set_current(&mut self, options: FrameOptions) {
        self.current = options;
    }

    /// Forget both stacks. The current options stay as they are.
    pub fn reset(&mut self) {
        self.undo.clear();
        self.redo.clear();
        log::debug!("history reset");
    }

    pub fn last_changed(&self) -> Option<RevertableOption> {
        self.last_changed
    }

    /// Describe the most recent change, undo or redo.
    pub fn last_change(&self) -> &'static str {
        self.last_changed
            .map(|o| o.phrase())
            .unwrap_or("last action")
    }
}
