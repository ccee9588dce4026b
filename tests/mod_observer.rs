mod common;

use bson::doc;
use parking_lot::Mutex;
use std::sync::Arc;

use common::{AuditedUser, Post, Recorder, User, event_log, faulty_odm, memory_odm, users_ns};
use odmkit::errors::OdmError;
use odmkit::model::Entity;
use odmkit::observer::{
    HookResult, ModelObserver, ObserverRecord, OnlyType, Prioritized, Stage, StageFilter, StageSet,
    TypeFilter,
};

#[test]
fn dispatch_order_follows_priority_then_registration() {
    let (odm, _) = memory_odm();
    let log = event_log();
    odm.observe(Recorder::new("p5", &log).record().with_priority(5));
    odm.observe(Recorder::new("p10", &log).record().with_priority(10));
    odm.observe(Recorder::new("p0", &log).record().with_priority(0));
    odm.observe(Recorder::new("p5b", &log).record().with_priority(5));

    odm.query::<User>("users").create(&User::new("alice", 30)).unwrap();
    let creating: Vec<String> =
        log.lock().iter().filter(|e| e.ends_with(":creating")).cloned().collect();
    assert_eq!(creating, ["p10:creating", "p5:creating", "p5b:creating", "p0:creating"]);
}

#[test]
fn rejected_type_is_never_invoked() {
    let (odm, _) = memory_odm();
    let log = event_log();
    let posts_only: Arc<dyn TypeFilter> = Arc::new(OnlyType::<Post>::new());
    odm.observe(Recorder::new("posts", &log).record().with_type_filter(posts_only));

    let q = odm.query::<User>("users").where_("name", "=", "alice");
    let user = User::new("alice", 30);
    q.create(&user).unwrap();
    q.update(&user, doc! { "age": 31 }).unwrap();
    q.delete(&user).unwrap();
    assert!(log.lock().is_empty());
}

#[test]
fn stage_filter_limits_hooks() {
    let (odm, _) = memory_odm();
    let log = event_log();
    odm.observe(
        Recorder::new("post-only", &log)
            .record()
            .with_stage_filter(Arc::new(StageSet::of(&[Stage::Created, Stage::Deleted]))),
    );
    odm.observe(Recorder::new("closure", &log).record().with_stage_filter(Arc::new(|s: Stage| s.is_pre())));

    odm.query::<User>("users").create(&User::new("a", 1)).unwrap();
    assert_eq!(*log.lock(), ["closure:creating", "post-only:created"]);
}

#[test]
fn creating_failure_skips_insert() {
    let (odm, store) = faulty_odm();
    let log = event_log();
    odm.observe(Recorder::new("guard", &log).failing_at(Stage::Creating).record());

    let err = odm.query::<User>("users").create(&User::new("alice", 30)).unwrap_err();
    match err {
        OdmError::ObserverHook { stage, ref model, ref source } => {
            assert_eq!(stage, Stage::Creating);
            assert!(model.ends_with("User"));
            assert_eq!(source.to_string(), "guard rejected creating");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!store.called("insert_one"));
    assert!(store.inner.documents(&users_ns()).is_empty());
    assert_eq!(*log.lock(), ["guard:creating"]);
}

#[test]
fn updating_and_deleting_failures_skip_the_write() {
    let (odm, store) = faulty_odm();
    let user = User::new("alice", 30);
    let q = odm.query::<User>("users").where_("name", "=", "alice");
    q.create(&user).unwrap();

    let log = event_log();
    let vetoed = q
        .clone()
        .observe(Recorder::new("veto-update", &log).failing_at(Stage::Updating).record())
        .update(&user, doc! { "age": 99 });
    assert!(matches!(vetoed, Err(OdmError::ObserverHook { stage: Stage::Updating, .. })));
    assert!(!store.called("update_one"));

    let vetoed = q
        .clone()
        .observe(Recorder::new("veto-delete", &log).failing_at(Stage::Deleting).record())
        .delete(&user);
    assert!(matches!(vetoed, Err(OdmError::ObserverHook { stage: Stage::Deleting, .. })));
    assert!(!store.called("delete_one"));
    assert_eq!(q.first().unwrap().age, 30);
}

#[test]
fn post_hook_failure_is_reported_after_the_write() {
    let (odm, store) = memory_odm();
    let log = event_log();
    odm.observe(Recorder::new("after", &log).failing_at(Stage::Created).record());

    let err = odm.query::<User>("users").create(&User::new("alice", 30)).unwrap_err();
    assert!(matches!(err, OdmError::ObserverHook { stage: Stage::Created, .. }));
    assert_eq!(store.documents(&users_ns()).len(), 1);
}

#[test]
fn failures_reach_the_error_handler_and_later_observers_still_run() {
    let (odm, _) = memory_odm();
    let log = event_log();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    odm.observers().set_error_handler(move |err, stage, model| {
        sink.lock().push(format!("{stage}/{}/{err}", model.type_name().rsplit("::").next().unwrap_or("")));
    });
    odm.observe(Recorder::new("first", &log).failing_at(Stage::Creating).record().with_priority(1));
    odm.observe(Recorder::new("second", &log).failing_at(Stage::Creating).record());

    let err = odm.query::<User>("users").create(&User::new("a", 1)).unwrap_err();
    assert!(err.to_string().contains("first rejected creating"));
    assert_eq!(*log.lock(), ["first:creating", "second:creating"]);
    assert_eq!(
        *seen.lock(),
        ["creating/User/first rejected creating", "creating/User/second rejected creating"]
    );
}

#[test]
fn query_and_model_observers_join_global_ones() {
    let (odm, _) = memory_odm();
    let log = event_log();
    odm.observe(Recorder::new("global", &log).record());
    let model = AuditedUser { name: "x".into(), log: Some(Arc::clone(&log)) };

    odm.query::<AuditedUser>("audited")
        .observe(Recorder::new("query", &log).record())
        .create(&model)
        .unwrap();
    assert_eq!(
        *log.lock(),
        [
            "global:creating",
            "query:creating",
            "model:creating",
            "global:created",
            "query:created",
            "model:created"
        ]
    );
}

#[test]
fn bulk_create_does_not_notify() {
    let (odm, store) = memory_odm();
    let log = event_log();
    odm.observe(Recorder::new("any", &log).record());
    let ids = odm
        .query::<User>("users")
        .bulk_create(&[User::new("a", 1), User::new("b", 2)])
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert!(log.lock().is_empty());
    assert_eq!(store.documents(&users_ns()).len(), 2);
    assert!(odm.query::<User>("users").bulk_create(&[]).unwrap().is_empty());
}

struct Auditor {
    hits: Mutex<Vec<String>>,
}

impl ModelObserver for Auditor {
    fn deleted(&self, model: &dyn Entity) -> HookResult {
        if let Some(user) = model.downcast_ref::<User>() {
            self.hits.lock().push(user.name.clone());
        }
        Ok(())
    }
}

impl StageFilter for Auditor {
    fn interested_in(&self, stage: Stage) -> bool {
        stage == Stage::Deleted
    }
}

impl Prioritized for Auditor {
    fn priority(&self) -> i32 {
        7
    }
}

impl TypeFilter for Auditor {
    fn accepts(&self, model: &dyn Entity) -> bool {
        model.is::<User>()
    }
}

#[test]
fn full_capability_observer() {
    let (odm, _) = memory_odm();
    let auditor = Arc::new(Auditor { hits: Mutex::new(Vec::new()) });
    let record = ObserverRecord::from_full(Arc::clone(&auditor));
    assert!(record.has_priority() && record.has_stage_filter() && record.has_type_filter());
    assert_eq!(record.priority(), 7);
    odm.observe(record);

    let bob = User::new("bob", 41);
    let q = odm.query::<User>("users").where_("name", "=", "bob");
    q.create(&bob).unwrap();
    q.delete(&bob).unwrap();
    odm.query::<Post>("posts").create(&Post { id: None, title: "t".into(), author_id: None }).unwrap();
    assert_eq!(*auditor.hits.lock(), ["bob"]);
}

#[test]
fn hooks_may_register_observers_without_deadlock() {
    struct Registrar {
        odm: odmkit::Odm,
        log: common::EventLog,
    }
    impl ModelObserver for Registrar {
        fn created(&self, _model: &dyn Entity) -> HookResult {
            self.odm.observe(Recorder::new("late", &self.log).record());
            Ok(())
        }
    }

    let (odm, _) = memory_odm();
    let log = event_log();
    odm.observe(ObserverRecord::new(Arc::new(Registrar { odm: odm.clone(), log: Arc::clone(&log) })));
    odm.query::<User>("users").create(&User::new("a", 1)).unwrap();
    assert!(log.lock().is_empty());
    assert_eq!(odm.observers().len(), 2);
}
