//! XML persistence backend
//!
//! The store is a `<wyrdinData>` document holding a `<defaults>` section
//! (file-level timezone), `<tasks>`, `<groups>`, and `<workslots>`. Groups
//! form a shared graph, so the writer emits each group's body exactly once
//! and later occurrences as empty reference elements; the reader coalesces
//! elements with the same id back into one shared instance.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use crate::grouping::{parse_short_repr, Group, GroupKind, GroupRef, Member};
use crate::task::Task;
use crate::timerepr;
use crate::worktime::WorkSlot;

const ROOT_TAG: &str = "wyrdinData";

/// Prerequisite references read from task elements, keyed by task id. They
/// are short reprs of groups that can only be resolved once the `<groups>`
/// section has been read.
pub type PrereqRefs = HashMap<u32, Vec<String>>;

/// Encoder/decoder for the XML store.
pub struct XmlCodec {
    time_format: String,
    default_tz: Tz,
}

impl XmlCodec {
    pub fn new(time_format: impl Into<String>, default_tz: Tz) -> Self {
        Self {
            time_format: time_format.into(),
            default_tz,
        }
    }

    // ------------------------------------------------------------------
    // Writing

    /// Serialize a complete standalone document. Either side may be absent
    /// (the separate-files layout stores tasks and the work log apart).
    pub fn write_document(
        &self,
        tasks: Option<(&[Task], &[GroupRef])>,
        slots: Option<&[WorkSlot]>,
    ) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT_TAG)))?;
        self.write_defaults(&mut writer)?;
        if let Some((tasks, groups)) = tasks {
            self.write_task_sections(&mut writer, tasks, groups)?;
        }
        if let Some(slots) = slots {
            self.write_slot_section(&mut writer, slots)?;
        }
        writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    /// The `<tasks>` and `<groups>` sections alone, for splicing into an
    /// already-written document.
    pub fn tasks_fragment(&self, tasks: &[Task], groups: &[GroupRef]) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_task_sections(&mut writer, tasks, groups)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    /// The `<workslots>` section alone.
    pub fn slots_fragment(&self, slots: &[WorkSlot]) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_slot_section(&mut writer, slots)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    fn write_defaults(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("defaults")))?;
        writer.write_event(Event::Start(BytesStart::new("timezone")))?;
        writer.write_event(Event::Text(BytesText::new(self.default_tz.name())))?;
        writer.write_event(Event::End(BytesEnd::new("timezone")))?;
        writer.write_event(Event::End(BytesEnd::new("defaults")))?;
        Ok(())
    }

    fn write_task_sections(
        &self,
        writer: &mut Writer<Vec<u8>>,
        tasks: &[Task],
        groups: &[GroupRef],
    ) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("tasks")))?;
        for task in tasks {
            self.write_task(writer, task)?;
        }
        writer.write_event(Event::End(BytesEnd::new("tasks")))?;

        writer.write_event(Event::Start(BytesStart::new("groups")))?;
        // One seen set for the whole section, so a group shared between
        // top-level groupings is spelled out exactly once.
        let mut seen: HashSet<*const RefCell<Group>> = HashSet::new();
        for group in groups {
            self.write_group(writer, group, &mut seen)?;
        }
        writer.write_event(Event::End(BytesEnd::new("groups")))?;
        Ok(())
    }

    fn write_task(&self, writer: &mut Writer<Vec<u8>>, task: &Task) -> Result<()> {
        let mut el = BytesStart::new("task");
        el.push_attribute(("id", task.id.to_string().as_str()));
        el.push_attribute(("done", if task.done { "1" } else { "0" }));
        if !task.project.is_empty() {
            el.push_attribute(("project", task.project.as_str()));
        }
        if let Some(time) = task.time {
            el.push_attribute(("time", timerepr::format_duration(time).as_str()));
        }
        if let Some(deadline) = task.deadline {
            el.push_attribute(("deadline", self.format_time(deadline).as_str()));
        }
        if !task.prerequisites.is_empty() {
            let reprs: Vec<String> = task
                .prerequisites
                .iter()
                .map(|g| g.borrow().short_repr())
                .collect();
            el.push_attribute(("prerequisites", reprs.join(", ").as_str()));
        }
        writer.write_event(Event::Start(el))?;
        writer.write_event(Event::Text(BytesText::new(&task.name)))?;
        writer.write_event(Event::End(BytesEnd::new("task")))?;
        Ok(())
    }

    fn write_group(
        &self,
        writer: &mut Writer<Vec<u8>>,
        group: &GroupRef,
        seen: &mut HashSet<*const RefCell<Group>>,
    ) -> Result<()> {
        let g = group.borrow();
        let mut el = BytesStart::new("group");
        el.push_attribute(("id", g.short_repr().as_str()));
        el.push_attribute(("type", g.kind.as_str()));

        if !seen.insert(Rc::as_ptr(group)) {
            // Already spelled out: a bare reference suffices.
            writer.write_event(Event::Empty(el))?;
            return Ok(());
        }

        writer.write_event(Event::Start(el))?;
        for member in &g.members {
            match member {
                Member::Task(id) => {
                    let mut leaf = BytesStart::new("task");
                    leaf.push_attribute(("id", id.to_string().as_str()));
                    writer.write_event(Event::Empty(leaf))?;
                }
                Member::Group(sub) => self.write_group(writer, sub, seen)?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new("group")))?;
        Ok(())
    }

    fn write_slot_section(&self, writer: &mut Writer<Vec<u8>>, slots: &[WorkSlot]) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("workslots")))?;
        for slot in slots {
            let mut el = BytesStart::new("workslot");
            el.push_attribute(("id", slot.id().to_string().as_str()));
            el.push_attribute(("task", slot.task.to_string().as_str()));
            if let Some(start) = slot.start() {
                el.push_attribute(("start", self.format_time(start).as_str()));
            }
            if let Some(end) = slot.end() {
                el.push_attribute(("end", self.format_time(end).as_str()));
            }
            writer.write_event(Event::Empty(el))?;
        }
        writer.write_event(Event::End(BytesEnd::new("workslots")))?;
        Ok(())
    }

    fn format_time(&self, time: DateTime<Utc>) -> String {
        timerepr::format_timestamp(time, &self.time_format, self.default_tz)
    }

    // ------------------------------------------------------------------
    // Reading

    /// Read the `<tasks>` section. Prerequisite attributes are returned
    /// unresolved; the caller re-links them after reading the groups.
    pub fn read_tasks(&self, xml: &str) -> Result<(Vec<Task>, PrereqRefs)> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut tasks = Vec::new();
        let mut prereqs: PrereqRefs = HashMap::new();
        let mut file_tz = self.default_tz;
        let mut in_timezone = false;
        let mut in_tasks = false;
        let mut pending: Option<Task> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"timezone" => in_timezone = true,
                    b"tasks" => in_tasks = true,
                    b"task" if in_tasks => {
                        pending = Some(self.read_task_element(&e, file_tz, &mut prereqs)?);
                    }
                    _ => {}
                },
                // A self-closing task element carries an empty name.
                Event::Empty(e) if in_tasks && e.name().as_ref() == b"task" => {
                    tasks.push(self.read_task_element(&e, file_tz, &mut prereqs)?);
                }
                Event::Text(e) => {
                    let text = e.unescape()?;
                    if in_timezone {
                        file_tz = timerepr::parse_zone(text.trim())?;
                    } else if let Some(task) = pending.as_mut() {
                        task.name = text.into_owned();
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"timezone" => in_timezone = false,
                    b"task" => {
                        if let Some(task) = pending.take() {
                            tasks.push(task);
                        }
                    }
                    b"tasks" => break,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok((tasks, prereqs))
    }

    /// Parse one task element's attributes, recording its prerequisite refs.
    /// The repr list is `", "`-joined on the wire, but stray spacing around
    /// the commas is tolerated on the way in.
    fn read_task_element(
        &self,
        e: &BytesStart,
        file_tz: Tz,
        prereqs: &mut PrereqRefs,
    ) -> Result<Task> {
        let attrs = attr_map(e)?;
        let id = parse_id(&attrs, "id", "task")?;
        let mut task = Task::new(id, "", attrs.get("project").cloned().unwrap_or_default());
        task.done = parse_done(&attrs)?;
        if let Some(raw) = attrs.get("time") {
            task.time = Some(timerepr::parse_duration(raw)?);
        }
        task.deadline = self.read_time(&attrs, "deadline", file_tz)?;
        if let Some(raw) = attrs.get("prerequisites") {
            let reprs = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            prereqs.insert(id, reprs);
        }
        Ok(task)
    }

    /// Read the `<groups>` section. Returns the top-level groupings in file
    /// order plus the short-repr index used to resolve prerequisite refs.
    pub fn read_groups(
        &self,
        xml: &str,
        known_tasks: &HashSet<u32>,
    ) -> Result<(Vec<GroupRef>, HashMap<String, GroupRef>)> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut top_level = Vec::new();
        let mut by_repr: HashMap<String, GroupRef> = HashMap::new();
        let mut in_groups = false;
        // Open ancestors of the element currently being read.
        let mut stack: Vec<GroupRef> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"groups" => in_groups = true,
                    b"group" if in_groups => {
                        let group = open_group(&e, &mut by_repr)?;
                        if let Some(parent) = stack.last() {
                            parent.borrow_mut().members.push(Member::Group(Rc::clone(&group)));
                        }
                        stack.push(group);
                    }
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"group" if in_groups => {
                        // Reference to a group spelled out elsewhere, or a
                        // genuinely empty group.
                        let group = open_group(&e, &mut by_repr)?;
                        match stack.last() {
                            Some(parent) => parent
                                .borrow_mut()
                                .members
                                .push(Member::Group(Rc::clone(&group))),
                            None => top_level.push(group),
                        }
                    }
                    b"task" if !stack.is_empty() => {
                        let attrs = attr_map(&e)?;
                        let id = parse_id(&attrs, "id", "task")?;
                        if !known_tasks.contains(&id) {
                            return Err(Error::TaskNotFound(id));
                        }
                        if let Some(parent) = stack.last() {
                            parent.borrow_mut().members.push(Member::Task(id));
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"group" => {
                        if let Some(group) = stack.pop() {
                            if stack.is_empty() {
                                top_level.push(group);
                            }
                        }
                    }
                    b"groups" => break,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok((top_level, by_repr))
    }

    /// Read the `<workslots>` section, resolving task ids against the
    /// already-loaded task set.
    pub fn read_workslots(&self, xml: &str, known_tasks: &HashSet<u32>) -> Result<Vec<WorkSlot>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut slots = Vec::new();
        let mut file_tz = self.default_tz;
        let mut in_timezone = false;
        let mut in_slots = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"timezone" => in_timezone = true,
                    b"workslots" => in_slots = true,
                    _ => {}
                },
                Event::Text(e) => {
                    if in_timezone {
                        file_tz = timerepr::parse_zone(e.unescape()?.trim())?;
                    }
                }
                Event::Empty(e) if in_slots && e.name().as_ref() == b"workslot" => {
                    let attrs = attr_map(&e)?;
                    let id = parse_id(&attrs, "id", "workslot")?;
                    let task = parse_id(&attrs, "task", "workslot")?;
                    if !known_tasks.contains(&task) {
                        return Err(Error::TaskNotFound(task));
                    }
                    let start = self.read_time(&attrs, "start", file_tz)?;
                    let end = self.read_time(&attrs, "end", file_tz)?;
                    slots.push(WorkSlot::from_parts(id, task, start, end)?);
                }
                Event::End(e) => match e.name().as_ref() {
                    b"timezone" => in_timezone = false,
                    b"workslots" => break,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(slots)
    }

    /// Parse an optional timestamp attribute, honoring its per-attribute
    /// `{name}_tz` override over the file-level default zone.
    fn read_time(
        &self,
        attrs: &HashMap<String, String>,
        name: &str,
        file_tz: Tz,
    ) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = attrs.get(name) else {
            return Ok(None);
        };
        let zone = match attrs.get(&format!("{name}_tz")) {
            Some(zone_name) => timerepr::parse_zone(zone_name)?,
            None => file_tz,
        };
        Ok(Some(timerepr::parse_timestamp(raw, &self.time_format, zone)?))
    }
}

fn attr_map(e: &BytesStart) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_id(attrs: &HashMap<String, String>, key: &str, element: &str) -> Result<u32> {
    let raw = attrs
        .get(key)
        .ok_or_else(|| Error::Validation(format!("<{element}> element missing '{key}'")))?;
    raw.parse()
        .map_err(|_| Error::Validation(format!("<{element}> has malformed {key} '{raw}'")))
}

fn parse_done(attrs: &HashMap<String, String>) -> Result<bool> {
    match attrs.get("done").map(String::as_str) {
        Some("1") => Ok(true),
        Some("0") | None => Ok(false),
        Some(other) => Err(Error::Validation(format!(
            "malformed done flag '{other}'"
        ))),
    }
}

/// Instantiate a group element, or return the shared instance when a group
/// with the same short repr was seen before.
fn open_group(e: &BytesStart, by_repr: &mut HashMap<String, GroupRef>) -> Result<GroupRef> {
    let attrs = attr_map(e)?;
    let repr = attrs
        .get("id")
        .ok_or_else(|| Error::Validation("<group> element missing 'id'".to_string()))?;
    let kind_name = attrs
        .get("type")
        .ok_or_else(|| Error::Validation("<group> element missing 'type'".to_string()))?;
    let kind = GroupKind::parse(kind_name)?;

    if let Some(existing) = by_repr.get(repr) {
        return Ok(Rc::clone(existing));
    }
    let group = Group::new(parse_short_repr(repr)?, kind);
    by_repr.insert(repr.clone(), Rc::clone(&group));
    Ok(group)
}
