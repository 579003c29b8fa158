use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tally_draft::{save_flat, BatchReport, Draft, DraftError, EditSession, Operation, SyncError};
use tally_model::{
    Module, ModulePatch, Resource, ResourceId, ResourceKind, ResourceStore, StoreError, StoreOp,
    TestCase, TestCasePatch,
};
use tally_test_utils::{case_store, module_store, MemoryStore};

type Log = Arc<Mutex<Vec<(ResourceKind, StoreOp)>>>;

/// Store decorator logging mutating calls of several stores into one shared log
struct Recording<R: Resource> {
    inner: Arc<MemoryStore<R>>,
    log: Log,
}

impl<R: Resource> Recording<R> {
    fn record(&self, op: StoreOp) {
        self.log.lock().push((R::KIND, op));
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for Recording<R> {
    async fn list(&self) -> Result<Vec<R>, StoreError> {
        self.inner.list().await
    }

    async fn create(&self, payload: &R) -> Result<R, StoreError> {
        self.record(StoreOp::Create);
        self.inner.create(payload).await
    }

    async fn update(&self, id: &ResourceId, patch: &R::Patch) -> Result<R, StoreError> {
        self.record(StoreOp::Update);
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), StoreError> {
        self.record(StoreOp::Delete);
        self.inner.delete(id).await
    }

    async fn reorder(&self, parent: Option<&ResourceId>, ids: &[ResourceId]) -> Result<(), StoreError> {
        self.record(StoreOp::Reorder);
        self.inner.reorder(parent, ids).await
    }
}

fn id(s: &str) -> ResourceId {
    ResourceId::new(s)
}

async fn load(
    modules: &Arc<MemoryStore<Module>>,
    cases: &Arc<MemoryStore<TestCase>>,
) -> EditSession<Module, TestCase> {
    EditSession::<Module, TestCase>::load(modules.clone(), cases.clone())
        .await
        .unwrap()
}

fn partial(result: Result<BatchReport, SyncError>) -> BatchReport {
    match result {
        Err(SyncError::PartialBatchFailure(report)) => report,
        other => panic!("expected partial batch failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_phases_run_in_dependency_order() {
    let log: Log = Arc::default();
    let modules = module_store();
    let cases = case_store();
    let mut session = EditSession::<Module, TestCase>::load(
        Arc::new(Recording {
            inner: modules.clone(),
            log: log.clone(),
        }),
        Arc::new(Recording {
            inner: cases.clone(),
            log: log.clone(),
        }),
    )
    .await
    .unwrap();

    session.delete_child(&id("t4")).unwrap();
    session.delete_parent(&id("m3")).unwrap();
    let profile = session.create_parent(Module::new("Profile")).unwrap();
    session
        .create_child(&profile, TestCase::new(profile.clone(), "Change avatar"))
        .unwrap();
    session
        .update_parent(&id("m1"), &ModulePatch::default().description("auth flows"))
        .unwrap();
    session
        .update_child(&id("t1"), &TestCasePatch::default().title("Valid login"))
        .unwrap();
    session
        .reorder_parents(&[id("m2"), profile.clone(), id("m1")])
        .unwrap();
    session.reorder_children(&id("m1"), &[id("t2"), id("t1")]).unwrap();

    let report = session.save().await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.creates.succeeded, 2);
    assert_eq!(report.deletes.succeeded, 2);
    assert_eq!(report.updates.succeeded, 2);
    assert_eq!(report.reorders.succeeded, 2);

    let phase = |entry: &(ResourceKind, StoreOp)| match entry {
        (ResourceKind::TestCase, StoreOp::Delete) => 1,
        (ResourceKind::Module, StoreOp::Delete) => 2,
        (ResourceKind::Module, StoreOp::Create) => 3,
        (ResourceKind::TestCase, StoreOp::Create) => 4,
        (ResourceKind::Module, StoreOp::Update) => 5,
        (ResourceKind::TestCase, StoreOp::Update) => 6,
        (ResourceKind::Module, StoreOp::Reorder) => 7,
        (ResourceKind::TestCase, StoreOp::Reorder) => 8,
        other => panic!("unexpected call {other:?}"),
    };
    let phases: Vec<u8> = log.lock().iter().map(phase).collect();
    assert_eq!(phases, vec![1, 2, 3, 4, 5, 6, 7, 8]);

    let listed = modules.list().await.unwrap();
    let names: Vec<String> = listed.into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["Checkout", "Profile", "Login"]);
}

#[tokio::test]
async fn test_delete_failure_does_not_stop_later_phases() {
    let log: Log = Arc::default();
    let modules = module_store();
    modules.fail_on(StoreOp::Delete, id("m3"), StoreError::Network("reset".into()));
    let recording: Arc<dyn ResourceStore<Module>> = Arc::new(Recording {
        inner: modules.clone(),
        log: log.clone(),
    });
    let mut draft = Draft::new(modules.list().await.unwrap());

    draft.delete_local(&id("m3")).unwrap();
    let profile = draft.create_local(Module::new("Profile")).unwrap();
    draft
        .update_local(&id("m1"), &ModulePatch::default().description("auth flows"))
        .unwrap();
    draft.reorder_local(None, &[id("m2"), id("m1"), profile]).unwrap();

    let report = partial(save_flat(&*recording, &mut draft).await);
    assert_eq!(report.deletes.failed, 1);
    assert_eq!(report.creates.succeeded, 1);
    assert_eq!(report.updates.succeeded, 1);
    assert_eq!(report.reorders.succeeded, 1);

    let ops: Vec<StoreOp> = log.lock().iter().map(|(_, op)| *op).collect();
    assert_eq!(
        ops,
        vec![StoreOp::Delete, StoreOp::Create, StoreOp::Update, StoreOp::Reorder]
    );
    assert_eq!(modules.get(&id("m1")).unwrap().description, "auth flows");
    // The failed delete is back in the rebased draft.
    assert!(draft.get(&id("m3")).is_some());
}

#[tokio::test]
async fn test_created_entry_keeps_its_place_among_siblings() {
    let store = module_store();
    let mut draft = Draft::new(store.list().await.unwrap());

    let profile = draft.create_local(Module::new("Profile")).unwrap();
    draft
        .reorder_local(None, &[profile, id("m1"), id("m2"), id("m3")])
        .unwrap();

    let backend: &dyn ResourceStore<Module> = &*store;
    let report = save_flat(backend, &mut draft).await.unwrap();
    assert_eq!(report.reorders.succeeded, 1);

    let names: Vec<String> = draft.siblings(None).iter().map(|m| m.name.clone()).collect();
    assert_eq!(names, vec!["Profile", "Login", "Checkout", "Search"]);
}

#[tokio::test]
async fn test_created_entry_appended_last_needs_no_reorder() {
    let store = module_store();
    let mut draft = Draft::new(store.list().await.unwrap());

    draft.create_local(Module::new("Profile")).unwrap();

    let backend: &dyn ResourceStore<Module> = &*store;
    let report = save_flat(backend, &mut draft).await.unwrap();
    assert_eq!(report.reorders.succeeded, 0);

    let names: Vec<String> = draft.siblings(None).iter().map(|m| m.name.clone()).collect();
    assert_eq!(names, vec!["Login", "Checkout", "Search", "Profile"]);
}

#[tokio::test]
async fn test_new_child_is_created_under_the_new_parent_server_id() {
    let modules = module_store();
    let cases = case_store();
    let mut session = load(&modules, &cases).await;

    let profile = session.create_parent(Module::new("Profile")).unwrap();
    session
        .create_child(&profile, TestCase::new(profile.clone(), "Change avatar"))
        .unwrap();

    let report = session.save().await.unwrap();
    let server_id = report.id_map.get(&profile).cloned().unwrap();
    assert!(!server_id.is_local());

    let created = cases
        .records()
        .into_iter()
        .find(|c| c.title == "Change avatar")
        .unwrap();
    assert_eq!(created.module_id, server_id);

    // Rebased: the draft holds server ids only.
    assert!(session.parents().draft().iter().all(|m| !m.id.is_local()));
    assert!(session.children().draft().iter().all(|c| !c.id.is_local()));
    assert!(!session.has_unsaved_changes());
}

#[tokio::test]
async fn test_failed_update_is_isolated_and_draft_rebased() {
    let modules = module_store();
    let cases = case_store();
    modules.fail_on(StoreOp::Update, id("m2"), StoreError::Network("reset".into()));
    let mut session = load(&modules, &cases).await;

    session
        .update_parent(&id("m1"), &ModulePatch::default().description("auth flows"))
        .unwrap();
    session
        .update_parent(&id("m2"), &ModulePatch::default().name("Payments"))
        .unwrap();
    session.delete_child(&id("t3")).unwrap();

    let report = partial(session.save().await);
    assert_eq!(report.updates.succeeded, 1);
    assert_eq!(report.updates.failed, 1);
    assert_eq!(report.deletes.succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].operation, Operation::Update);
    assert_eq!(report.failures[0].resource_id, Some(id("m2")));

    // Successful operations reached the server.
    assert_eq!(modules.get(&id("m1")).unwrap().description, "auth flows");
    assert!(cases.get(&id("t3")).is_none());

    // The draft now mirrors the server, failed edit included.
    let m2 = session.parents().get(&id("m2")).unwrap();
    assert_eq!(m2.name, "Checkout");
    assert!(!session.has_unsaved_changes());
}

#[tokio::test]
async fn test_child_of_failed_parent_is_not_sent() {
    let modules = module_store();
    let cases = case_store();
    let mut session = load(&modules, &cases).await;
    modules.fail_next(StoreOp::Create, StoreError::Network("timeout".into()));

    let profile = session.create_parent(Module::new("Profile")).unwrap();
    let avatar = session
        .create_child(&profile, TestCase::new(profile.clone(), "Change avatar"))
        .unwrap();

    let report = partial(session.save().await);
    assert_eq!(report.creates.failed, 2);
    assert_eq!(report.failures[1].kind, ResourceKind::TestCase);
    assert_eq!(report.failures[1].resource_id, Some(avatar));
    assert_eq!(report.failures[1].error, StoreError::NotFound(profile));
    assert!(cases.mutations().is_empty());
}

#[tokio::test]
async fn test_child_delete_failures_under_deleted_parent_are_ignored() {
    let modules = module_store();
    let cases = case_store();
    cases.fail_on(StoreOp::Delete, id("t1"), StoreError::NotFound(id("t1")));
    let mut session = load(&modules, &cases).await;

    let removed = session.delete_parent(&id("m1")).unwrap();
    assert_eq!(removed, vec![id("t1"), id("t2")]);
    assert!(session.children_of(&id("m1")).is_empty());

    let report = session.save().await.unwrap();
    assert_eq!(report.deletes.succeeded, 3);
    assert!(modules.get(&id("m1")).is_none());
}

#[tokio::test]
async fn test_standalone_child_delete_failure_is_reported() {
    let modules = module_store();
    let cases = case_store();
    cases.fail_on(StoreOp::Delete, id("t3"), StoreError::Network("reset".into()));
    let mut session = load(&modules, &cases).await;

    session.delete_child(&id("t3")).unwrap();

    let report = partial(session.save().await);
    assert_eq!(report.deletes.failed, 1);
    assert!(session.children().get(&id("t3")).is_some());
}

#[tokio::test]
async fn test_refetch_failure_keeps_the_draft() {
    let modules = module_store();
    let cases = case_store();
    let mut session = load(&modules, &cases).await;
    modules.fail_next(StoreOp::List, StoreError::Network("timeout".into()));

    session
        .update_parent(&id("m1"), &ModulePatch::default().description("auth flows"))
        .unwrap();

    let err = session.save().await.unwrap_err();
    assert!(matches!(err, SyncError::Refetch { .. }));
    assert_eq!(err.report().unwrap().updates.succeeded, 1);
    assert!(session.has_unsaved_changes());

    session.reload().await.unwrap();
    assert!(!session.has_unsaved_changes());
    assert_eq!(
        session.parents().get(&id("m1")).unwrap().description,
        "auth flows"
    );
}

#[tokio::test]
async fn test_create_child_requires_a_known_parent() {
    let modules = module_store();
    let cases = case_store();
    let mut session = load(&modules, &cases).await;

    let err = session
        .create_child(&id("m9"), TestCase::new("m9", "Orphan"))
        .unwrap_err();
    assert_eq!(err, DraftError::NotFound(id("m9")));
}

#[tokio::test]
async fn test_discard_drops_every_edit() {
    let modules = module_store();
    let cases = case_store();
    let mut session = load(&modules, &cases).await;

    session.delete_parent(&id("m2")).unwrap();
    session.create_parent(Module::new("Profile")).unwrap();
    assert!(session.has_unsaved_changes());

    session.discard();
    assert!(!session.has_unsaved_changes());
    assert_eq!(session.children_of(&id("m2")).len(), 2);
}

#[tokio::test]
async fn test_nothing_to_save_sends_nothing() {
    let modules = module_store();
    let cases = case_store();
    let mut session = load(&modules, &cases).await;

    let report = session.save().await.unwrap();
    assert_eq!(report, BatchReport::default());
    assert!(modules.mutations().is_empty());
    assert!(cases.mutations().is_empty());
}

#[tokio::test]
async fn test_save_flat_persists_a_single_collection() {
    let store = module_store();
    let mut draft = Draft::new(store.list().await.unwrap());

    draft
        .update_local(&id("m3"), &ModulePatch::default().name("Find"))
        .unwrap();
    let profile = draft.create_local(Module::new("Profile")).unwrap();
    draft
        .reorder_local(None, &[id("m3"), id("m1"), id("m2"), profile])
        .unwrap();

    let backend: &dyn ResourceStore<Module> = &*store;
    let report = save_flat(backend, &mut draft).await.unwrap();
    assert_eq!(report.creates.succeeded, 1);
    assert_eq!(report.updates.succeeded, 1);
    assert_eq!(report.reorders.succeeded, 1);

    let names: Vec<String> = draft.siblings(None).iter().map(|m| m.name.clone()).collect();
    assert_eq!(names, vec!["Find", "Login", "Checkout", "Profile"]);
    assert!(!draft.has_unsaved_changes());
}
