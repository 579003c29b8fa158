//! Persisted resources and their patches
//!
//! Provides the [`Resource`] trait shared by every server-owned entity the
//! sync engine reconciles, and the concrete resource types of a checklist
//! project: [`Module`], [`TestCase`], [`ChecklistModule`] and [`TestResult`].

use crate::id::{ResourceId, TesterId};
use crate::status::TestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

/// Kind of resource, used in diagnostics and batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Reusable group of test cases
    Module,
    /// Single test case inside a module
    TestCase,
    /// Module attached to a project checklist
    ChecklistModule,
    /// One tester's result for one test case
    TestResult,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Module => "module",
            Self::TestCase => "test case",
            Self::ChecklistModule => "checklist module",
            Self::TestResult => "test result",
        })
    }
}

/// Server-owned entity reconciled by the sync engine
///
/// Siblings are the resources sharing a [`Resource::parent_id`]; their
/// relative position is [`Resource::order`].
///
/// # Invariants
/// - [`Resource::patch_from`] compares exactly the *comparable fields* of the
///   type and never the order, which is reconciled separately
/// - `a.patch_from(b).is_none()` iff every comparable field is equal
/// - applying `a.patch_from(b)` to `b` makes the comparable fields of `b`
///   equal to those of `a`
pub trait Resource: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Partial update carrying only the comparable fields that change
    type Patch: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Resource kind
    const KIND: ResourceKind;

    /// Resource id
    fn id(&self) -> &ResourceId;

    /// Replace the id (used when minting local ids)
    fn set_id(&mut self, id: ResourceId);

    /// Owning parent, `None` for top-level resources
    fn parent_id(&self) -> Option<&ResourceId> {
        None
    }

    /// Re-point to another parent (used when a local parent gets its server id)
    fn set_parent_id(&mut self, _parent: ResourceId) {}

    /// Position among siblings
    fn order(&self) -> u32;

    /// Set position among siblings
    fn set_order(&mut self, order: u32);

    /// Merge a patch into this resource
    fn apply(&mut self, patch: &Self::Patch);

    /// Patch turning `baseline` into `self`, or `None` if nothing comparable differs
    fn patch_from(&self, baseline: &Self) -> Option<Self::Patch>;

    /// Key that must be unique among siblings (e.g. a module name)
    fn unique_key(&self) -> Option<String> {
        None
    }
}

fn normalized(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Set `slot` to `new` when it differs from `old`, returning whether it did
fn diff_field<T: Clone + PartialEq>(slot: &mut Option<T>, new: &T, old: &T) -> bool {
    if new == old {
        false
    } else {
        *slot = Some(new.clone());
        true
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Reusable group of test cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Id; empty for a module not yet created
    #[serde(default)]
    pub id: ResourceId,
    /// Display name, unique within the collection
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Icon name
    #[serde(default)]
    pub icon: Option<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Position
    #[serde(default)]
    pub order: u32,
}

impl Module {
    /// Create module payload (id is replaced when created locally)
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(""),
            name: name.into(),
            description: String::new(),
            icon: None,
            tags: Vec::new(),
            order: 0,
        }
    }

    /// With id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.id = id.into();
        self
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With tags
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// With order
    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

/// Changed module fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePatch {
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New icon (`Some(None)` clears it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Option<String>>,
    /// New tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ModulePatch {
    /// Rename
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Change description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Change icon
    #[must_use]
    pub fn icon(mut self, icon: Option<String>) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Replace tags
    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

impl Resource for Module {
    type Patch = ModulePatch;

    const KIND: ResourceKind = ResourceKind::Module;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn set_id(&mut self, id: ResourceId) {
        self.id = id;
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    fn apply(&mut self, patch: &Self::Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(icon) = &patch.icon {
            self.icon.clone_from(icon);
        }
        if let Some(tags) = &patch.tags {
            self.tags.clone_from(tags);
        }
    }

    fn patch_from(&self, baseline: &Self) -> Option<Self::Patch> {
        let mut patch = ModulePatch::default();
        let changed = [
            diff_field(&mut patch.name, &self.name, &baseline.name),
            diff_field(&mut patch.description, &self.description, &baseline.description),
            diff_field(&mut patch.icon, &self.icon, &baseline.icon),
            diff_field(&mut patch.tags, &self.tags, &baseline.tags),
        ];
        changed.contains(&true).then_some(patch)
    }

    fn unique_key(&self) -> Option<String> {
        Some(normalized(&self.name))
    }
}

// ---------------------------------------------------------------------------
// TestCase
// ---------------------------------------------------------------------------

/// Test case priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
    /// Critical
    Critical,
}

/// Single test case inside a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Id
    pub id: ResourceId,
    /// Owning module
    pub module_id: ResourceId,
    /// Title, unique within the module
    pub title: String,
    /// Steps / expectations
    #[serde(default)]
    pub description: String,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Position within the module
    #[serde(default)]
    pub order: u32,
}

impl TestCase {
    /// Create test case payload under `module_id`
    #[must_use]
    pub fn new(module_id: impl Into<ResourceId>, title: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(""),
            module_id: module_id.into(),
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            order: 0,
        }
    }

    /// With id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.id = id.into();
        self
    }

    /// With priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// With order
    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

/// Changed test case fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCasePatch {
    /// New title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New priority
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl TestCasePatch {
    /// Retitle
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Change description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Change priority
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl Resource for TestCase {
    type Patch = TestCasePatch;

    const KIND: ResourceKind = ResourceKind::TestCase;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn set_id(&mut self, id: ResourceId) {
        self.id = id;
    }

    fn parent_id(&self) -> Option<&ResourceId> {
        Some(&self.module_id)
    }

    fn set_parent_id(&mut self, parent: ResourceId) {
        self.module_id = parent;
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    fn apply(&mut self, patch: &Self::Patch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
    }

    fn patch_from(&self, baseline: &Self) -> Option<Self::Patch> {
        let mut patch = TestCasePatch::default();
        let changed = [
            diff_field(&mut patch.title, &self.title, &baseline.title),
            diff_field(&mut patch.description, &self.description, &baseline.description),
            diff_field(&mut patch.priority, &self.priority, &baseline.priority),
        ];
        changed.contains(&true).then_some(patch)
    }

    fn unique_key(&self) -> Option<String> {
        Some(normalized(&self.title))
    }
}

// ---------------------------------------------------------------------------
// ChecklistModule
// ---------------------------------------------------------------------------

/// A module attached to a project checklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistModule {
    /// Id
    pub id: ResourceId,
    /// Attached module
    pub module_id: ResourceId,
    /// Position in the checklist
    #[serde(default)]
    pub order: u32,
}

impl ChecklistModule {
    /// Attach `module_id`
    #[must_use]
    pub fn new(module_id: impl Into<ResourceId>) -> Self {
        Self {
            id: ResourceId::new(""),
            module_id: module_id.into(),
            order: 0,
        }
    }

    /// With id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.id = id.into();
        self
    }
}

/// Changed checklist module fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistModulePatch {
    /// Swap the attached module
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<ResourceId>,
}

impl Resource for ChecklistModule {
    type Patch = ChecklistModulePatch;

    const KIND: ResourceKind = ResourceKind::ChecklistModule;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn set_id(&mut self, id: ResourceId) {
        self.id = id;
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    fn apply(&mut self, patch: &Self::Patch) {
        if let Some(module_id) = &patch.module_id {
            self.module_id.clone_from(module_id);
        }
    }

    fn patch_from(&self, baseline: &Self) -> Option<Self::Patch> {
        let mut patch = ChecklistModulePatch::default();
        diff_field(&mut patch.module_id, &self.module_id, &baseline.module_id).then_some(patch)
    }

    fn unique_key(&self) -> Option<String> {
        // A module can only be attached once.
        Some(self.module_id.to_string())
    }
}

// ---------------------------------------------------------------------------
// TestResult
// ---------------------------------------------------------------------------

/// One tester's result for one test case
///
/// Created for every assigned tester when a module is attached to a
/// checklist; only ever mutated by the owning tester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Id
    pub id: ResourceId,
    /// Test case this result belongs to
    pub test_case_id: ResourceId,
    /// Owning tester
    pub tester_id: TesterId,
    /// Recorded status
    #[serde(default)]
    pub status: TestStatus,
    /// Tester notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Attachment references
    #[serde(default)]
    pub attachments: Vec<String>,
    /// When the status was last set to a tested value
    #[serde(default)]
    pub tested_at: Option<DateTime<Utc>>,
}

impl TestResult {
    /// Create a pending result
    #[must_use]
    pub fn pending(
        id: impl Into<ResourceId>,
        test_case_id: impl Into<ResourceId>,
        tester_id: impl Into<TesterId>,
    ) -> Self {
        Self {
            id: id.into(),
            test_case_id: test_case_id.into(),
            tester_id: tester_id.into(),
            status: TestStatus::Pending,
            notes: None,
            attachments: Vec::new(),
            tested_at: None,
        }
    }

    /// With status
    #[must_use]
    pub fn with_status(mut self, status: TestStatus) -> Self {
        self.status = status;
        self
    }
}

/// Changed test result fields
///
/// Doubles as the set of fields a local tester can override while an edit
/// is pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPatch {
    /// New status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    /// New notes (`Some(None)` clears them)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    /// New attachment list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
    /// New tested-at stamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tested_at: Option<Option<DateTime<Utc>>>,
}

impl ResultPatch {
    /// Set status
    #[must_use]
    pub fn status(mut self, status: TestStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set notes
    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(Some(notes.into()));
        self
    }

    /// Clear notes
    #[must_use]
    pub fn clear_notes(mut self) -> Self {
        self.notes = Some(None);
        self
    }

    /// Set tested-at
    #[must_use]
    pub fn tested_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.tested_at = Some(at);
        self
    }

    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.notes.is_none()
            && self.attachments.is_none()
            && self.tested_at.is_none()
    }

    /// Fold a newer patch into this one (newer fields win)
    pub fn merge(&mut self, newer: &Self) {
        if newer.status.is_some() {
            self.status = newer.status;
        }
        if newer.notes.is_some() {
            self.notes.clone_from(&newer.notes);
        }
        if newer.attachments.is_some() {
            self.attachments.clone_from(&newer.attachments);
        }
        if newer.tested_at.is_some() {
            self.tested_at = newer.tested_at;
        }
    }
}

impl Resource for TestResult {
    type Patch = ResultPatch;

    const KIND: ResourceKind = ResourceKind::TestResult;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn set_id(&mut self, id: ResourceId) {
        self.id = id;
    }

    fn parent_id(&self) -> Option<&ResourceId> {
        Some(&self.test_case_id)
    }

    fn set_parent_id(&mut self, parent: ResourceId) {
        self.test_case_id = parent;
    }

    // Results are not ordered; one per tester.
    fn order(&self) -> u32 {
        0
    }

    fn set_order(&mut self, _order: u32) {}

    fn apply(&mut self, patch: &Self::Patch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = &patch.notes {
            self.notes.clone_from(notes);
        }
        if let Some(attachments) = &patch.attachments {
            self.attachments.clone_from(attachments);
        }
        if let Some(tested_at) = patch.tested_at {
            self.tested_at = tested_at;
        }
    }

    fn patch_from(&self, baseline: &Self) -> Option<Self::Patch> {
        let mut patch = ResultPatch::default();
        let changed = [
            diff_field(&mut patch.status, &self.status, &baseline.status),
            diff_field(&mut patch.notes, &self.notes, &baseline.notes),
            diff_field(&mut patch.attachments, &self.attachments, &baseline.attachments),
            diff_field(&mut patch.tested_at, &self.tested_at, &baseline.tested_at),
        ];
        changed.contains(&true).then_some(patch)
    }
}
