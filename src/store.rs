//! The session store
//!
//! A [`Session`] owns the in-memory universe of one invocation: projects,
//! tasks, groupings, and work slots, plus the id allocator. It loads the
//! collections from the data directory at startup and flushes them back
//! through the backup-before-write discipline.
//!
//! The task/group file and the work log may share one XML document or live
//! in separate files; with a shared document the workslot section is
//! appended by reopening the already-written envelope.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backup::backed_up_write;
use crate::config::{Config, StoreFormat};
use crate::error::{Error, Result};
use crate::grouping::{Group, GroupKind, GroupRef};
use crate::ident::{EntityKind, IdAllocator};
use crate::task::Task;
use crate::worktime::WorkSlot;
use crate::xml::XmlCodec;

const ENVELOPE_CLOSE: &str = "</wyrdinData>";

pub struct Session {
    config: Config,
    data_dir: PathBuf,
    pub projects: Vec<String>,
    pub tasks: Vec<Task>,
    pub groups: Vec<GroupRef>,
    pub slots: Vec<WorkSlot>,
    alloc: IdAllocator,
    /// Whether the shared document's envelope has been written during this
    /// save cycle; later section writes splice into it instead.
    header_written: bool,
}

impl Session {
    /// Create a session over `data_dir` with an explicit configuration.
    /// Nothing is loaded; collections start empty.
    pub fn new(data_dir: impl Into<PathBuf>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            data_dir: data_dir.into(),
            projects: Vec::new(),
            tasks: Vec::new(),
            groups: Vec::new(),
            slots: Vec::new(),
            alloc: IdAllocator::new(),
            header_written: false,
        })
    }

    /// Open a session: read the configuration from `data_dir` (defaults when
    /// absent) and load all collections.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let config = Config::load_from_dir(&data_dir)?;
        let mut session = Self::new(data_dir, config)?;
        session.load()?;
        Ok(session)
    }

    /// The platform's conventional data directory for this tool.
    pub fn default_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "wyrd").map(|d| d.data_dir().to_path_buf())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn projects_path(&self) -> PathBuf {
        self.data_dir.join(&self.config.projects_file)
    }

    fn tasks_path(&self) -> PathBuf {
        self.data_dir.join(&self.config.tasks_file)
    }

    fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.config.log_file)
    }

    /// Whether tasks and the work log share one document.
    fn shared_layout(&self) -> bool {
        self.config.tasks_file == self.config.log_file
    }

    fn codec(&self) -> Result<XmlCodec> {
        match self.config.store_format()? {
            StoreFormat::Xml => Ok(XmlCodec::new(
                self.config.time_format.clone(),
                self.config.default_tz(),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Loading

    /// Load all collections from the data directory. Missing files mean
    /// empty collections; malformed files are errors.
    pub fn load(&mut self) -> Result<()> {
        self.load_projects()?;

        let codec = self.codec()?;
        let tasks_path = self.tasks_path();
        let tasks_text = match fs::read_to_string(&tasks_path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(text) = &tasks_text {
            let (tasks, prereq_refs) = codec.read_tasks(text)?;
            let known: HashSet<u32> = tasks.iter().map(|t| t.id).collect();
            for task in &tasks {
                self.alloc.claim(EntityKind::Task, task.id);
            }

            let (groups, by_repr) = codec.read_groups(text, &known)?;
            for group in by_repr.values() {
                self.alloc.claim(EntityKind::Group, group.borrow().id);
            }

            self.tasks = tasks;
            self.groups = groups;

            // Prerequisite attributes point at groups by short repr; they
            // can only be resolved now that the groups exist.
            for (task_id, reprs) in prereq_refs {
                for repr in reprs {
                    match by_repr.get(&repr) {
                        Some(group) => {
                            if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                                task.prerequisites.push(Rc::clone(group));
                            }
                        }
                        None => warn!(task = task_id, group = %repr, "unresolved prerequisite reference"),
                    }
                }
            }
        }

        let known: HashSet<u32> = self.tasks.iter().map(|t| t.id).collect();
        let log_text = if self.shared_layout() {
            tasks_text
        } else {
            match fs::read_to_string(self.log_path()) {
                Ok(text) => Some(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            }
        };
        if let Some(text) = &log_text {
            self.slots = codec.read_workslots(text, &known)?;
            for slot in &self.slots {
                self.alloc.claim(EntityKind::WorkSlot, slot.id());
            }
        }

        info!(
            projects = self.projects.len(),
            tasks = self.tasks.len(),
            groups = self.groups.len(),
            slots = self.slots.len(),
            "session loaded"
        );
        Ok(())
    }

    fn load_projects(&mut self) -> Result<()> {
        match fs::read_to_string(self.projects_path()) {
            Ok(text) => {
                self.projects = text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
                self.projects.sort();
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Saving

    /// Flush everything: the project list, then tasks and the work log.
    pub fn save_all(&mut self) -> Result<()> {
        self.write_projects()?;
        // Start a fresh document; the log write reopens it when shared.
        self.header_written = false;
        self.write_tasks()?;
        self.write_log()?;
        info!("session saved");
        Ok(())
    }

    pub fn write_projects(&self) -> Result<()> {
        let path = self.projects_path();
        let mut sorted = self.projects.clone();
        sorted.sort();
        let mut text = sorted.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        debug!(path = %path.display(), count = sorted.len(), "writing projects");
        backed_up_write(&path, &self.config.backup_suffix, || {
            fs::write(&path, &text)?;
            Ok(())
        })
    }

    /// Write the tasks and groups sections. In the shared layout this
    /// starts the document (or splices into one already started this
    /// cycle); in the separate layout it always writes a full document.
    pub fn write_tasks(&mut self) -> Result<()> {
        let codec = self.codec()?;
        let path = self.tasks_path();
        debug!(path = %path.display(), count = self.tasks.len(), "writing tasks");
        if self.shared_layout() && self.header_written {
            let fragment = codec.tasks_fragment(&self.tasks, &self.groups)?;
            self.splice_section(&path, &fragment)
        } else {
            let doc = codec.write_document(Some((&self.tasks, &self.groups)), None)?;
            self.write_text(&path, &doc)?;
            if self.shared_layout() {
                self.header_written = true;
            }
            Ok(())
        }
    }

    /// Write the workslot section, appending to the shared document when
    /// its envelope was already written this cycle.
    pub fn write_log(&mut self) -> Result<()> {
        let codec = self.codec()?;
        let path = self.log_path();
        debug!(path = %path.display(), count = self.slots.len(), "writing work log");
        if self.shared_layout() && self.header_written {
            let fragment = codec.slots_fragment(&self.slots)?;
            self.splice_section(&path, &fragment)
        } else {
            let doc = codec.write_document(None, Some(&self.slots))?;
            self.write_text(&path, &doc)?;
            if self.shared_layout() {
                self.header_written = true;
            }
            Ok(())
        }
    }

    /// Insert a section fragment just before the document's closing tag.
    fn splice_section(&self, path: &Path, fragment: &str) -> Result<()> {
        let text = fs::read_to_string(path)?;
        let pos = text.rfind(ENVELOPE_CLOSE).ok_or_else(|| {
            Error::Validation(format!(
                "{} is not a wyrd document (missing {ENVELOPE_CLOSE})",
                path.display()
            ))
        })?;
        let mut spliced = String::with_capacity(text.len() + fragment.len() + 1);
        spliced.push_str(&text[..pos]);
        spliced.push_str(fragment);
        spliced.push('\n');
        spliced.push_str(&text[pos..]);
        self.write_text(path, &spliced)
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        let mut content = content.to_string();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        backed_up_write(path, &self.config.backup_suffix, || {
            fs::write(path, &content)?;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Projects and tasks

    /// Register a project name. Duplicates are rejected.
    pub fn add_project(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.projects.contains(&name) {
            return Err(Error::Validation(format!(
                "project '{name}' already exists"
            )));
        }
        self.projects.push(name);
        self.projects.sort();
        Ok(())
    }

    /// Register a task, returning its id. A task with the same name in the
    /// same project already existing, its id is returned instead. The
    /// project is registered as a side effect when new.
    pub fn add_task(&mut self, name: impl Into<String>, project: impl Into<String>) -> u32 {
        let name = name.into();
        let project = project.into();
        if let Some(existing) = self
            .tasks
            .iter()
            .find(|t| t.name == name && t.project == project)
        {
            return existing.id;
        }
        if !project.is_empty() && !self.projects.contains(&project) {
            self.projects.push(project.clone());
            self.projects.sort();
        }
        let id = self.alloc.next(EntityKind::Task);
        self.tasks.push(Task::new(id, name, project));
        id
    }

    pub fn get_task(&self, id: u32) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or(Error::TaskNotFound(id))
    }

    pub fn get_task_mut(&mut self, id: u32) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(Error::TaskNotFound(id))
    }

    /// Create an empty top-level grouping of the given kind.
    pub fn add_group(&mut self, kind: GroupKind) -> GroupRef {
        let group = Group::new(self.alloc.next(EntityKind::Group), kind);
        self.groups.push(Rc::clone(&group));
        group
    }

    /// Done-ness of a grouping, resolved against this session's tasks.
    pub fn group_done(&self, group: &GroupRef) -> Result<bool> {
        let done_of = |id: u32| self.tasks.iter().find(|t| t.id == id).map(|t| t.done);
        group.borrow().is_done(&done_of)
    }

    /// Tasks sorted by their display string, for listing.
    pub fn sorted_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by_key(|t| t.to_string());
        tasks
    }

    // ------------------------------------------------------------------
    // Work slots

    pub fn find_open_slots(&self) -> Vec<&WorkSlot> {
        self.slots.iter().filter(|s| s.is_open()).collect()
    }

    /// Start working: register the task (and project) as needed and open a
    /// slot on it. Returns the new slot's id.
    pub fn begin(
        &mut self,
        name: impl Into<String>,
        project: impl Into<String>,
        start: DateTime<Utc>,
    ) -> u32 {
        let task = self.add_task(name, project);
        let id = self.alloc.next(EntityKind::WorkSlot);
        self.slots.push(WorkSlot::open(id, task, start));
        id
    }

    /// Close every open slot on `task`. Returns how many were closed;
    /// none open is [`Error::NoOpenSlot`].
    pub fn close_open_slots(&mut self, task: u32, end: DateTime<Utc>) -> Result<usize> {
        let mut closed = 0;
        for slot in self.slots.iter_mut().filter(|s| s.task == task && s.is_open()) {
            slot.close(end);
            closed += 1;
        }
        if closed == 0 {
            return Err(Error::NoOpenSlot);
        }
        Ok(closed)
    }

    /// Record a slot retrospectively. The task must exist; the interval is
    /// validated.
    pub fn record_slot(
        &mut self,
        task: u32,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<u32> {
        self.get_task(task)?;
        let id = self.alloc.next(EntityKind::WorkSlot);
        let slot = WorkSlot::from_parts(id, task, Some(start), end)?;
        self.slots.push(slot);
        Ok(id)
    }

    pub fn remove_workslot(&mut self, id: u32) -> Result<WorkSlot> {
        match self.slots.iter().position(|s| s.id() == id) {
            Some(index) => Ok(self.slots.remove(index)),
            None => Err(Error::Validation(format!("no work slot with id {id}"))),
        }
    }

    /// Remove a task and every slot recorded against it.
    pub fn remove_task(&mut self, id: u32) -> Result<Task> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::TaskNotFound(id))?;
        self.slots.retain(|s| s.task != id);
        Ok(self.tasks.remove(index))
    }

    /// Remove a project, cascading into its tasks and their slots.
    pub fn remove_project(&mut self, name: &str) -> Result<()> {
        if !self.projects.iter().any(|p| p == name) {
            return Err(Error::ProjectNotFound(name.to_string()));
        }
        let task_ids: Vec<u32> = self
            .tasks
            .iter()
            .filter(|t| t.project == name)
            .map(|t| t.id)
            .collect();
        for id in task_ids {
            self.remove_task(id)?;
        }
        self.projects.retain(|p| p != name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::new(dir.path(), Config::default()).expect("session");
        (dir, session)
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn add_task_dedups_and_registers_project() {
        let (_dir, mut s) = session();
        let a = s.add_task("write report", "work");
        let b = s.add_task("write report", "work");
        assert_eq!(a, b);
        assert_eq!(s.tasks.len(), 1);
        assert_eq!(s.projects, vec!["work".to_string()]);

        let c = s.add_task("write report", "home");
        assert_ne!(a, c);
        assert_eq!(s.tasks.len(), 2);
    }

    #[test]
    fn duplicate_project_rejected() {
        let (_dir, mut s) = session();
        s.add_project("work").unwrap();
        assert!(s.add_project("work").is_err());
    }

    #[test]
    fn begin_and_close_lifecycle() {
        let (_dir, mut s) = session();
        s.begin("write report", "work", at(9));
        let task = s.tasks[0].id;

        let open = s.find_open_slots();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].task, task);

        assert_eq!(s.close_open_slots(task, at(11)).unwrap(), 1);
        assert!(s.find_open_slots().is_empty());
        assert!(matches!(
            s.close_open_slots(task, at(12)),
            Err(Error::NoOpenSlot)
        ));
    }

    #[test]
    fn multiple_open_slots_on_one_task_are_allowed() {
        let (_dir, mut s) = session();
        s.begin("task", "", at(9));
        s.begin("task", "", at(10));
        assert_eq!(s.tasks.len(), 1);
        assert_eq!(s.find_open_slots().len(), 2);

        let task = s.tasks[0].id;
        assert_eq!(s.close_open_slots(task, at(11)).unwrap(), 2);
    }

    #[test]
    fn record_slot_requires_known_task_and_valid_interval() {
        let (_dir, mut s) = session();
        assert!(matches!(
            s.record_slot(9, at(1), None),
            Err(Error::TaskNotFound(9))
        ));
        let task = s.add_task("t", "");
        assert!(s.record_slot(task, at(5), Some(at(3))).is_err());
        let id = s.record_slot(task, at(3), Some(at(5))).unwrap();
        assert_eq!(s.slots[0].id(), id);
    }

    #[test]
    fn remove_task_cascades_into_slots() {
        let (_dir, mut s) = session();
        s.begin("a", "", at(9));
        s.begin("b", "", at(9));
        let a = s.tasks[0].id;

        s.remove_task(a).unwrap();
        assert_eq!(s.tasks.len(), 1);
        assert!(s.slots.iter().all(|slot| slot.task != a));
        assert_eq!(s.slots.len(), 1);
    }

    #[test]
    fn remove_project_cascades_into_tasks_and_slots() {
        let (_dir, mut s) = session();
        s.begin("a", "work", at(9));
        s.begin("b", "work", at(9));
        s.begin("c", "home", at(9));

        s.remove_project("work").unwrap();
        assert_eq!(s.tasks.len(), 1);
        assert_eq!(s.tasks[0].project, "home");
        assert_eq!(s.slots.len(), 1);
        assert!(s.projects.iter().all(|p| p != "work"));

        assert!(matches!(
            s.remove_project("missing"),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn group_done_resolves_against_session_tasks() {
        let (_dir, mut s) = session();
        let a = s.add_task("a", "");
        let b = s.add_task("b", "");
        let group = s.add_group(GroupKind::And);
        group.borrow_mut().members.push(crate::grouping::Member::Task(a));
        group.borrow_mut().members.push(crate::grouping::Member::Task(b));

        assert!(!s.group_done(&group).unwrap());
        s.get_task_mut(a).unwrap().done = true;
        s.get_task_mut(b).unwrap().done = true;
        assert!(s.group_done(&group).unwrap());
    }

    #[test]
    fn sorted_tasks_orders_by_display() {
        let (_dir, mut s) = session();
        let b = s.add_task("beta", "");
        let a = s.add_task("alpha", "");
        s.get_task_mut(b).unwrap().done = true;

        let sorted = s.sorted_tasks();
        // Pending tasks lead with spaces, so they sort before done ones.
        assert_eq!(sorted[0].id, a);
        assert_eq!(sorted[1].id, b);
    }
}
