//! Completion Reconciliation
//!
//! Keeps a task's main checkbox and its step tags consistent.
//!
//! - Checkbox workflows complete when every step is ticked, in any order.
//! - Chain workflows complete when the last step is ticked; at most one
//!   step may be ticked at a time, and when several are, the one furthest
//!   along the chain is kept.
//!
//! Corrections are computed, not applied: the caller hands the resulting
//! text and checkbox state to whatever owns the document.

use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use super::model::{Task, Workflow, WorkflowKind};
use super::text::{add_tag, extract_tags, remove_tag};

/// Main checkbox plus ticked step indices (into the workflow's step list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionState {
    pub main_ticked: bool,
    pub ticked: BTreeSet<usize>,
}

impl CompletionState {
    pub fn new(main_ticked: bool, ticked: impl IntoIterator<Item = usize>) -> Self {
        Self {
            main_ticked,
            ticked: ticked.into_iter().collect(),
        }
    }

    /// State carried by a parsed task.
    pub fn of_task(task: &Task, workflow: &Workflow) -> Self {
        Self::new(
            task.checked,
            task.ticked_steps
                .iter()
                .filter_map(|s| workflow.step_index(&s.tag)),
        )
    }

    /// State as written in a line of text; tags outside the workflow are ignored.
    pub fn from_text(checked: bool, text: &str, workflow: &Workflow) -> Self {
        Self::new(
            checked,
            extract_tags(text)
                .iter()
                .filter_map(|tag| workflow.step_index(tag)),
        )
    }

    fn all_ticked(&self, step_count: usize) -> bool {
        step_count > 0 && (0..step_count).all(|i| self.ticked.contains(&i))
    }
}

/// Corrects an inconsistent state. Consistent states are returned as is,
/// so `correct(correct(s)) == correct(s)`.
pub fn correct(kind: WorkflowKind, step_count: usize, state: &CompletionState) -> CompletionState {
    if step_count == 0 {
        return state.clone();
    }

    match kind {
        WorkflowKind::Checkbox => {
            let all = state.all_ticked(step_count);
            if !state.main_ticked && all {
                CompletionState::new(true, state.ticked.iter().copied())
            } else if state.main_ticked && !all {
                CompletionState::new(true, 0..step_count)
            } else {
                state.clone()
            }
        }
        WorkflowKind::Chain => {
            let last = step_count - 1;
            let highest = state.ticked.iter().next_back().copied();
            match highest {
                Some(idx) if idx == last => CompletionState::new(true, [last]),
                // Main cannot be ticked while the chain stops short of the end.
                Some(idx) => CompletionState::new(false, [idx]),
                None if state.main_ticked => CompletionState::new(true, [last]),
                None => CompletionState::new(false, []),
            }
        }
    }
}

/// User ticks or unticks the main checkbox.
pub fn set_main(
    kind: WorkflowKind,
    step_count: usize,
    _state: &CompletionState,
    ticked: bool,
) -> CompletionState {
    if !ticked || step_count == 0 {
        return CompletionState::new(false, []);
    }
    match kind {
        WorkflowKind::Checkbox => CompletionState::new(true, 0..step_count),
        WorkflowKind::Chain => CompletionState::new(true, [step_count - 1]),
    }
}

/// User ticks or unticks one step.
pub fn set_step(
    kind: WorkflowKind,
    step_count: usize,
    state: &CompletionState,
    index: usize,
    ticked: bool,
) -> CompletionState {
    if index >= step_count {
        return state.clone();
    }

    match kind {
        WorkflowKind::Checkbox => {
            let mut next = state.ticked.clone();
            if ticked {
                next.insert(index);
            } else {
                next.remove(&index);
            }
            let main = (0..step_count).all(|i| next.contains(&i));
            CompletionState {
                main_ticked: main,
                ticked: next,
            }
        }
        WorkflowKind::Chain => {
            if ticked {
                CompletionState::new(index == step_count - 1, [index])
            } else {
                let mut next = state.ticked.clone();
                next.remove(&index);
                correct(kind, step_count, &CompletionState::new(false, next))
            }
        }
    }
}

/// Text and checkbox changes that move a task to a new state.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Correction {
    pub checked: bool,
    pub text: String,
    pub added_tags: Vec<String>,
    pub removed_tags: Vec<String>,
}

impl Correction {
    /// Whether anything differs from the task's current text and checkbox.
    pub fn changes(&self, checked: bool, text: &str) -> bool {
        self.checked != checked || self.text != text
    }
}

/// Rewrites `text` from state `from` to state `to`.
pub fn transition(
    text: &str,
    workflow: &Workflow,
    from: &CompletionState,
    to: &CompletionState,
) -> Correction {
    let mut new_text = text.to_string();
    let mut added_tags = Vec::new();
    let mut removed_tags = Vec::new();

    for (idx, step) in workflow.steps.iter().enumerate() {
        let was = from.ticked.contains(&idx);
        let now = to.ticked.contains(&idx);
        if now && !was {
            new_text = add_tag(&new_text, &step.tag);
            added_tags.push(step.tag.clone());
        } else if was && !now {
            new_text = remove_tag(&new_text, &step.tag);
            removed_tags.push(step.tag.clone());
        }
    }

    Correction {
        checked: to.main_ticked,
        text: new_text,
        added_tags,
        removed_tags,
    }
}

/// Correction needed to make `task` consistent, or `None` if it already is.
pub fn reconcile(task: &Task, workflow: &Workflow) -> Option<Correction> {
    let current = CompletionState::of_task(task, workflow);
    let fixed = correct(workflow.kind, workflow.len(), &current);
    if fixed == current {
        return None;
    }

    debug!(
        "Reconciling {} ({}): main {} -> {}, steps {:?} -> {:?}",
        task.location, workflow.kind, current.main_ticked, fixed.main_ticked, current.ticked, fixed.ticked
    );
    Some(transition(&task.text, workflow, &current, &fixed))
}

/// Reconciles raw text and checkbox state directly.
pub fn reconcile_text(checked: bool, text: &str, workflow: &Workflow) -> Correction {
    let current = CompletionState::from_text(checked, text, workflow);
    let fixed = correct(workflow.kind, workflow.len(), &current);
    transition(text, workflow, &current, &fixed)
}

/// Edit produced by the user toggling the main checkbox.
pub fn edit_main(task: &Task, workflow: &Workflow, ticked: bool) -> Correction {
    let current = CompletionState::of_task(task, workflow);
    let next = set_main(workflow.kind, workflow.len(), &current, ticked);
    transition(&task.text, workflow, &current, &next)
}

/// Edit produced by the user toggling one step tag. `None` if the tag is
/// not a step of the task's workflow.
pub fn edit_step(task: &Task, workflow: &Workflow, step_tag: &str, ticked: bool) -> Option<Correction> {
    let index = workflow.step_index(step_tag)?;
    let current = CompletionState::of_task(task, workflow);
    let next = set_step(workflow.kind, workflow.len(), &current, index, ticked);
    Some(transition(&task.text, workflow, &current, &next))
}
