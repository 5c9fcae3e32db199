//! The task entity
//!
//! A task belongs to at most one project (empty string = unaffiliated) and
//! may carry a time estimate, a deadline, and a prerequisite grouping over
//! other tasks.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::grouping::GroupRef;

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u32,
    pub name: String,
    /// Owning project name; empty means unaffiliated.
    pub project: String,
    pub done: bool,
    /// Estimated time needed to finish the task.
    pub time: Option<TimeDelta>,
    pub deadline: Option<DateTime<Utc>>,
    /// Groupings that must be done before this task can be worked on.
    pub prerequisites: Vec<GroupRef>,
}

impl Task {
    pub fn new(id: u32, name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            project: project.into(),
            done: false,
            time: None,
            deadline: None,
            prerequisites: Vec::new(),
        }
    }

    pub fn short_repr(&self) -> String {
        format!("t{}", self.id)
    }
}

/// Two tasks are the same task when they have the same name in the same
/// project. Ids deliberately do not participate, so deduplication works
/// across sessions.
impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.project == other.project
    }
}

impl Eq for Task {}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.done { "DONE" } else { "    " };
        if self.project.is_empty() {
            write!(f, "{state} {}", self.name)
        } else {
            write!(f, "{state} {} ({})", self.name, self.project)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_name_and_project() {
        let a = Task::new(0, "write report", "work");
        let b = Task::new(7, "write report", "work");
        let c = Task::new(0, "write report", "home");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_encodes_done_state() {
        let mut t = Task::new(0, "water plants", "home");
        assert_eq!(t.to_string(), "     water plants (home)");
        t.done = true;
        assert_eq!(t.to_string(), "DONE water plants (home)");

        let loose = Task::new(1, "nap", "");
        assert_eq!(loose.to_string(), "     nap");
    }

    #[test]
    fn short_repr() {
        assert_eq!(Task::new(12, "x", "").short_repr(), "t12");
    }
}
