//! Rectangle selection state machine
//!
//! `Idle -> Drawing -> Committed -> Idle`, with `Drawing -> Idle` on abort.
//! Drawing only starts while a field is armed. A committed selection stays
//! in `Committed` until the engine has bound its result and calls
//! [`SelectionTracker::finish`], so a new drag cannot start while one is
//! still in flight.

use log::debug;

use super::binder::FieldKey;
use super::geometry::{DeviceRect, Point};
use super::viewport::ViewportGeneration;

/// Input driving the tracker, independent of any UI toolkit
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionEvent {
    Down(Point),
    Move(Point),
    Up(Point),
    /// Pointer left the viewing surface
    Leave,
    ViewportChanged,
}

/// A finished drag waiting to be mapped and bound
#[derive(Clone, Debug, PartialEq)]
pub struct Commit {
    /// Final rectangle, normalized
    pub rect: DeviceRect,
    /// Field armed when the drag started
    pub field: FieldKey,
    /// Viewport the rectangle was drawn under
    pub generation: ViewportGeneration,
}

/// What a single event did to the tracker
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    Ignored,
    Started { field: FieldKey },
    /// Live rubber-band rectangle, normalized
    Resized(DeviceRect),
    Committed(Commit),
    Aborted { field: FieldKey },
}

#[derive(Clone, Debug, Default, PartialEq)]
enum SelectionState {
    #[default]
    Idle,
    Drawing {
        anchor: Point,
        current: Point,
        field: FieldKey,
        generation: ViewportGeneration,
    },
    Committed(Commit),
}

#[derive(Clone, Debug, Default)]
pub struct SelectionTracker {
    state: SelectionState,
    armed: Option<FieldKey>,
}

impl SelectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn armed(&self) -> Option<&FieldKey> {
        self.armed.as_ref()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == SelectionState::Idle
    }

    #[must_use]
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, SelectionState::Drawing { .. })
    }

    /// Commit still waiting for its result, if any
    #[must_use]
    pub fn pending_commit(&self) -> Option<&Commit> {
        match &self.state {
            SelectionState::Committed(commit) => Some(commit),
            _ => None,
        }
    }

    /// Make `field` the write target. Anything in flight for the previously
    /// armed field is abandoned.
    pub fn arm(&mut self, field: FieldKey) -> Transition {
        let aborted = self.abort();
        self.armed = Some(field);
        aborted
    }

    pub fn disarm(&mut self) -> Transition {
        let aborted = self.abort();
        self.armed = None;
        aborted
    }

    /// Feed one event. `generation` is the viewport in effect right now.
    pub fn handle(&mut self, event: SelectionEvent, generation: ViewportGeneration) -> Transition {
        match event {
            SelectionEvent::Down(point) => {
                if self.state != SelectionState::Idle {
                    return Transition::Ignored;
                }
                let Some(field) = self.armed.clone() else {
                    return Transition::Ignored;
                };
                debug!("Selection started at ({:.1}, {:.1}) for {field}", point.x, point.y);
                self.state = SelectionState::Drawing {
                    anchor: point,
                    current: point,
                    field: field.clone(),
                    generation,
                };
                Transition::Started { field }
            }

            SelectionEvent::Move(point) => match &mut self.state {
                SelectionState::Drawing {
                    anchor, current, ..
                } => {
                    *current = point;
                    Transition::Resized(DeviceRect::from_drag(*anchor, point).normalized())
                }
                _ => Transition::Ignored,
            },

            SelectionEvent::Up(point) => {
                if let SelectionState::Drawing { current, .. } = &mut self.state {
                    *current = point;
                }
                self.commit()
            }

            SelectionEvent::Leave => self.commit(),

            SelectionEvent::ViewportChanged => self.abort(),
        }
    }

    /// Drop back to idle once a commit has been bound
    pub fn finish(&mut self) {
        if matches!(self.state, SelectionState::Committed(_)) {
            self.state = SelectionState::Idle;
        }
    }

    fn commit(&mut self) -> Transition {
        let SelectionState::Drawing {
            anchor,
            current,
            field,
            generation,
        } = &self.state
        else {
            return Transition::Ignored;
        };
        let commit = Commit {
            rect: DeviceRect::from_drag(*anchor, *current).normalized(),
            field: field.clone(),
            generation: *generation,
        };
        debug!("Selection committed: {:?}", commit.rect);
        self.state = SelectionState::Committed(commit.clone());
        Transition::Committed(commit)
    }

    fn abort(&mut self) -> Transition {
        match std::mem::take(&mut self.state) {
            SelectionState::Drawing { field, .. }
            | SelectionState::Committed(Commit { field, .. }) => {
                debug!("Selection for {field} aborted");
                Transition::Aborted { field }
            }
            SelectionState::Idle => Transition::Ignored,
        }
    }
}
