//! And/Or/List groupings of tasks and subgroups
//!
//! A grouping is a boolean expression over tasks: done-ness of the group is
//! computed from done-ness of its members. Subgroups may be shared between
//! groupings, so groups live behind `Rc<RefCell<_>>` and serialization has
//! to preserve that sharing.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};

/// Shared handle to a group. Sharing is semantic: the same subgroup may be
/// a member of several groupings and must stay one instance.
pub type GroupRef = Rc<RefCell<Group>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    And,
    Or,
    List,
}

impl GroupKind {
    /// The wire name used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::And => "and",
            GroupKind::Or => "or",
            GroupKind::List => "list",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "and" => Ok(GroupKind::And),
            "or" => Ok(GroupKind::Or),
            "list" => Ok(GroupKind::List),
            other => Err(Error::GroupTypeUnknown(other.to_string())),
        }
    }

    /// Prefix of the short repr: `ga`, `go`, or `gl`.
    pub fn short_prefix(&self) -> &'static str {
        match self {
            GroupKind::And => "ga",
            GroupKind::Or => "go",
            GroupKind::List => "gl",
        }
    }
}

/// A member of a group: a task (by id) or a nested group.
#[derive(Debug, Clone)]
pub enum Member {
    Task(u32),
    Group(GroupRef),
}

#[derive(Debug)]
pub struct Group {
    pub id: u32,
    pub kind: GroupKind,
    pub members: Vec<Member>,
}

impl Group {
    pub fn new(id: u32, kind: GroupKind) -> GroupRef {
        Rc::new(RefCell::new(Self {
            id,
            kind,
            members: Vec::new(),
        }))
    }

    pub fn short_repr(&self) -> String {
        format!("{}{}", self.kind.short_prefix(), self.id)
    }

    /// Whether the grouping is done, given a way to look up task done-ness.
    ///
    /// And and List require every member done (vacuously true when empty);
    /// Or requires some member done (false when empty). A task member the
    /// lookup does not know is an error.
    pub fn is_done<F>(&self, done_of: &F) -> Result<bool>
    where
        F: Fn(u32) -> Option<bool>,
    {
        match self.kind {
            GroupKind::And | GroupKind::List => {
                for member in &self.members {
                    if !member_done(member, done_of)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            GroupKind::Or => {
                for member in &self.members {
                    if member_done(member, done_of)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn member_done<F>(member: &Member, done_of: &F) -> Result<bool>
where
    F: Fn(u32) -> Option<bool>,
{
    match member {
        Member::Task(id) => done_of(*id).ok_or(Error::TaskNotFound(*id)),
        Member::Group(group) => group.borrow().is_done(done_of),
    }
}

/// Parse a short repr (`t3`, `ws7`, `ga2`, ...) down to its numeric id.
pub fn parse_short_repr(raw: &str) -> Result<u32> {
    let digits = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if digits.is_empty() || digits.len() == raw.len() {
        return Err(Error::Validation(format!("malformed short repr '{raw}'")));
    }
    digits
        .parse()
        .map_err(|_| Error::Validation(format!("malformed short repr '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(done: &[(u32, bool)]) -> impl Fn(u32) -> Option<bool> + '_ {
        let map: HashMap<u32, bool> = done.iter().copied().collect();
        move |id| map.get(&id).copied()
    }

    #[test]
    fn kind_wire_names_round_trip() {
        for kind in [GroupKind::And, GroupKind::Or, GroupKind::List] {
            assert_eq!(GroupKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(matches!(
            GroupKind::parse("xor"),
            Err(Error::GroupTypeUnknown(name)) if name == "xor"
        ));
    }

    #[test]
    fn short_reprs() {
        assert_eq!(Group::new(3, GroupKind::And).borrow().short_repr(), "ga3");
        assert_eq!(Group::new(0, GroupKind::Or).borrow().short_repr(), "go0");
        assert_eq!(Group::new(9, GroupKind::List).borrow().short_repr(), "gl9");
    }

    #[test]
    fn and_requires_all_members_done() {
        let done = [(0, true), (1, false)];
        let g = Group::new(0, GroupKind::And);
        g.borrow_mut().members = vec![Member::Task(0), Member::Task(1)];
        assert!(!g.borrow().is_done(&lookup(&done)).unwrap());

        g.borrow_mut().members = vec![Member::Task(0)];
        assert!(g.borrow().is_done(&lookup(&done)).unwrap());
    }

    #[test]
    fn or_requires_some_member_done() {
        let done = [(0, true), (1, false)];
        let g = Group::new(0, GroupKind::Or);
        g.borrow_mut().members = vec![Member::Task(1), Member::Task(0)];
        assert!(g.borrow().is_done(&lookup(&done)).unwrap());

        g.borrow_mut().members = vec![Member::Task(1)];
        assert!(!g.borrow().is_done(&lookup(&done)).unwrap());
    }

    #[test]
    fn empty_groups() {
        let done: [(u32, bool); 0] = [];
        assert!(Group::new(0, GroupKind::And)
            .borrow()
            .is_done(&lookup(&done))
            .unwrap());
        assert!(Group::new(1, GroupKind::List)
            .borrow()
            .is_done(&lookup(&done))
            .unwrap());
        assert!(!Group::new(2, GroupKind::Or)
            .borrow()
            .is_done(&lookup(&done))
            .unwrap());
    }

    #[test]
    fn nested_groups_recurse() {
        let done = [(0, true), (1, true), (2, false)];
        let inner = Group::new(1, GroupKind::Or);
        inner.borrow_mut().members = vec![Member::Task(2), Member::Task(1)];
        let outer = Group::new(0, GroupKind::And);
        outer.borrow_mut().members = vec![Member::Task(0), Member::Group(Rc::clone(&inner))];
        assert!(outer.borrow().is_done(&lookup(&done)).unwrap());
    }

    #[test]
    fn unknown_task_member_is_an_error() {
        let done = [(0, true)];
        let g = Group::new(0, GroupKind::And);
        g.borrow_mut().members = vec![Member::Task(42)];
        assert!(matches!(
            g.borrow().is_done(&lookup(&done)),
            Err(Error::TaskNotFound(42))
        ));
    }

    #[test]
    fn short_repr_parsing() {
        assert_eq!(parse_short_repr("ga3").unwrap(), 3);
        assert_eq!(parse_short_repr("t12").unwrap(), 12);
        assert_eq!(parse_short_repr("ws0").unwrap(), 0);
        assert!(parse_short_repr("ga").is_err());
        assert!(parse_short_repr("12").is_err());
        assert!(parse_short_repr("").is_err());
    }
}
