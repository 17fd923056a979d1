use super::*;
use crate::executor::{InlineExecutor, Job, SharedPoolExecutor};
use crate::principals::{
    ApplicationRef, DirectoryError, DirectoryErrorCode, OsEntry, PrincipalTableReader,
    StaticApplications,
};
use std::cell::RefCell;
use std::sync::Mutex;

struct FixedTable {
    namespace: Namespace,
    entries: std::vec::IntoIter<OsEntry>,
    fail: bool,
}

impl FixedTable {
    fn boxed(namespace: Namespace, entries: Vec<OsEntry>) -> Box<Self> {
        Box::new(Self {
            namespace,
            entries: entries.into_iter(),
            fail: false,
        })
    }

    fn failing(namespace: Namespace) -> Box<Self> {
        Box::new(Self {
            namespace,
            entries: Vec::new().into_iter(),
            fail: true,
        })
    }
}

impl PrincipalTableReader for FixedTable {
    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn open(&mut self) -> DirectoryResult<()> {
        Ok(())
    }

    fn next_entry(&mut self) -> DirectoryResult<Option<OsEntry>> {
        if self.fail {
            return Err(DirectoryError::enumeration("getpwent failed: I/O error"));
        }
        Ok(self.entries.next())
    }

    fn close(&mut self) -> DirectoryResult<()> {
        Ok(())
    }
}

struct FailingApps;

impl ApplicationDirectory for FailingApps {
    fn list_installed_applications(&self) -> DirectoryResult<Vec<ApplicationRef>> {
        Err(DirectoryError::package_query(
            "Failed to list installed applications: service unavailable",
        ))
    }

    fn label(&self, app: &ApplicationRef) -> String {
        app.package_name.clone()
    }
}

struct PanickingApps;

impl ApplicationDirectory for PanickingApps {
    fn list_installed_applications(&self) -> DirectoryResult<Vec<ApplicationRef>> {
        panic!("package service crashed");
    }

    fn label(&self, app: &ApplicationRef) -> String {
        app.package_name.clone()
    }
}

/// Holds jobs until the test runs them, so ordering can be observed.
#[derive(Default)]
struct ManualExecutor {
    jobs: RefCell<Vec<Job>>,
}

impl ManualExecutor {
    fn run_all(&self) {
        let jobs: Vec<Job> = self.jobs.borrow_mut().drain(..).collect();
        for job in jobs {
            job();
        }
    }

    fn drop_all(&self) {
        self.jobs.borrow_mut().clear();
    }
}

impl TaskExecutor for ManualExecutor {
    fn execute(&self, job: Job) {
        self.jobs.borrow_mut().push(job);
    }
}

fn os_users() -> Vec<OsEntry> {
    vec![
        OsEntry::new(0, Some("root")),
        OsEntry::new(1000, Some("alice")),
        OsEntry::new(65_534, Some("nobody")),
    ]
}

fn example_apps() -> Arc<dyn ApplicationDirectory> {
    Arc::new(
        StaticApplications::new(vec![
            ApplicationRef::new("com.example.app", 12, 10_042),
            ApplicationRef::new("org.sample.viewer", 3, 10_077),
        ])
        .with_label("com.example.app", "Example")
        .with_label("org.sample.viewer", "Viewer"),
    )
}

fn user_request() -> LoadRequest {
    LoadRequest::new(FixedTable::boxed(Namespace::User, os_users()), example_apps())
}

fn ids(state: &LoadState) -> Vec<u32> {
    state
        .principals()
        .map(|list| list.iter().map(|p| p.id).collect())
        .unwrap_or_default()
}

fn record_states(directory: &PrincipalDirectory) -> (Rc<RefCell<Vec<LoadState>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let sub = directory.observe_load_state(move |state| sink.borrow_mut().push(state.clone()));
    (seen, sub)
}

#[test]
fn loading_is_published_before_the_job_runs() {
    let executor = ManualExecutor::default();
    let directory = PrincipalDirectory::new(user_request(), &executor);
    let (seen, _sub) = record_states(&directory);

    assert_eq!(directory.load_state(), LoadState::Loading);
    assert_eq!(executor.jobs.borrow().len(), 1);
    assert!(!directory.dispatch_pending());

    executor.run_all();
    assert_eq!(directory.load_state(), LoadState::Loading);
    assert!(directory.dispatch_pending());
    assert!(!directory.dispatch_pending());

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], LoadState::Loading);
    assert_eq!(ids(&seen[1]), vec![0, 1000, 10_042, 10_077, 65_534]);
}

#[test]
fn success_carries_synthesized_app_principals() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    let state = directory.wait_until_loaded();
    let list = state.principals().unwrap();
    let app = &list[2];
    assert_eq!(app.id, 10_042);
    assert_eq!(app.name.as_deref(), Some("u0_a42"));
    assert_eq!(app.associated_labels, vec!["Example"]);
    assert_eq!(app.display_text(), "u0_a42 (10042)");
    assert!(!directory.is_pending());
}

#[test]
fn enumeration_failure_publishes_error_without_partial_results() {
    let request = LoadRequest::new(FixedTable::failing(Namespace::Group), example_apps());
    let directory = PrincipalDirectory::new(request, &InlineExecutor);
    match directory.wait_until_loaded() {
        LoadState::Error(err) => assert_eq!(err.code(), DirectoryErrorCode::EnumerationFailed),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(matches!(directory.filtered_view(), LoadState::Error(_)));
}

#[test]
fn package_query_failure_publishes_error() {
    let request = LoadRequest::new(FixedTable::boxed(Namespace::User, os_users()), Arc::new(FailingApps));
    let directory = PrincipalDirectory::new(request, &InlineExecutor);
    match directory.wait_until_loaded() {
        LoadState::Error(err) => assert_eq!(err.code(), DirectoryErrorCode::PackageQueryFailed),
        other => panic!("expected error, got {other:?}"),
    }
}

#[test]
fn lost_worker_still_publishes_one_terminal_state() {
    let executor = ManualExecutor::default();
    let directory = PrincipalDirectory::new(user_request(), &executor);
    let (seen, _sub) = record_states(&directory);
    executor.drop_all();
    assert!(directory.dispatch_pending());
    match directory.load_state() {
        LoadState::Error(err) => assert_eq!(err.code(), DirectoryErrorCode::WorkerUnavailable),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn panicking_worker_publishes_worker_unavailable() {
    let request = LoadRequest::new(
        FixedTable::boxed(Namespace::User, os_users()),
        Arc::new(PanickingApps),
    );
    let directory = PrincipalDirectory::new(request, &SharedPoolExecutor);
    let (seen, _sub) = record_states(&directory);
    match directory.wait_until_loaded() {
        LoadState::Error(err) => assert_eq!(err.code(), DirectoryErrorCode::WorkerUnavailable),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(seen.borrow().len(), 2);
    assert!(!directory.is_pending());

    let again = PrincipalDirectory::new(user_request(), &SharedPoolExecutor);
    assert_eq!(ids(&again.wait_until_loaded()).len(), 5);
}

#[test]
fn result_is_discarded_when_directory_is_gone() {
    let executor = ManualExecutor::default();
    let directory = PrincipalDirectory::new(user_request(), &executor);
    drop(directory);
    executor.run_all();
}

#[test]
fn shared_pool_load_completes() {
    let directory = PrincipalDirectory::new(user_request(), &SharedPoolExecutor);
    let state = directory.wait_until_loaded();
    assert_eq!(ids(&state).len(), 5);
}

#[test]
fn filter_view_follows_both_inputs() {
    let executor = ManualExecutor::default();
    let directory = PrincipalDirectory::new(user_request(), &executor);
    let views = Rc::new(RefCell::new(Vec::new()));
    let sink = views.clone();
    let _sub = directory.observe_filtered_view(move |state| sink.borrow_mut().push(ids(state)));

    directory.set_filter("10");
    assert_eq!(directory.filtered_view(), LoadState::Loading);

    executor.run_all();
    directory.dispatch_pending();
    assert_eq!(ids(&directory.filtered_view()), vec![1000, 10_042, 10_077]);

    directory.set_filter("Viewer");
    assert_eq!(ids(&directory.filtered_view()), vec![10_077]);

    directory.set_filter("");
    assert_eq!(ids(&directory.filtered_view()).len(), 5);
    assert_eq!(directory.filter(), "");
    assert_eq!(views.borrow().len(), 5);
}

#[test]
fn repeated_filter_text_does_not_republish() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    directory.wait_until_loaded();
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    let _sub = directory.observe_filtered_view(move |_| counter.set(counter.get() + 1));
    directory.set_filter("ali");
    directory.set_filter("ali");
    assert_eq!(count.get(), 2);
}

#[test]
fn match_predicate_is_case_sensitive_substring() {
    let principal = Principal {
        id: 10_042,
        name: Some("u0_a32".into()),
        associated_apps: vec![ApplicationRef::new("com.example.app", 1, 10_042)],
        associated_labels: vec!["Example".into()],
    };
    assert!(matches(&principal, "32"));
    assert!(matches(&principal, "1004"));
    assert!(matches(&principal, "com.example"));
    assert!(matches(&principal, "Exam"));
    assert!(!matches(&principal, "EXAMPLE"));

    let label_only = Principal {
        associated_apps: vec![ApplicationRef::new("org.other", 1, 10_042)],
        ..principal
    };
    assert!(!matches(&label_only, "example"));
    assert!(matches(&label_only, "Example"));
}

#[test]
fn recompute_is_idempotent_and_passes_through() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    let loaded = directory.wait_until_loaded();
    for filter in ["", "a", "10", "Example", "zzz"] {
        let once = recompute(&loaded, filter);
        assert_eq!(recompute(&once, filter), once);
        assert_eq!(recompute(&LoadState::Loading, filter), LoadState::Loading);
        let error = LoadState::Error(DirectoryError::enumeration("getgrent failed"));
        assert_eq!(recompute(&error, filter), error);
    }
    assert_eq!(recompute(&loaded, ""), loaded);
}

#[test]
fn positions_come_from_the_filtered_view() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    assert_eq!(directory.find_position_by_id(1000), None);
    directory.wait_until_loaded();
    assert_eq!(directory.find_position_by_id(1000), Some(1));
    assert_eq!(directory.find_position_by_id(4), None);

    directory.set_filter("u0_a");
    assert_eq!(directory.find_position_by_id(10_077), Some(1));
    assert_eq!(directory.find_position_by_id(1000), None);
    assert!(directory.principal_by_id(1000).is_some());
}

#[test]
fn initial_scroll_fires_once() {
    let executor = ManualExecutor::default();
    let directory = PrincipalDirectory::new(user_request(), &executor);
    let picker = PrincipalPicker::new(directory, "/srv/data", 1000);
    assert_eq!(picker.directory().selection(), Some(1000));
    assert_eq!(picker.take_scroll_target(), None);

    executor.run_all();
    picker.directory().dispatch_pending();
    assert_eq!(picker.take_scroll_target(), Some(1));
    assert_eq!(picker.take_scroll_target(), None);

    picker.directory().set_filter("a");
    picker.directory().set_filter("");
    assert_eq!(picker.take_scroll_target(), None);
}

#[test]
fn initial_scroll_is_spent_when_seeded_row_is_filtered_out() {
    let executor = ManualExecutor::default();
    let directory = PrincipalDirectory::new(user_request(), &executor);
    directory.set_filter("root");
    let picker = PrincipalPicker::new(directory, "/srv/data", 1000);

    executor.run_all();
    picker.directory().dispatch_pending();
    assert_eq!(picker.directory().find_position_by_id(1000), None);
    assert_eq!(picker.take_scroll_target(), None);

    picker.directory().set_filter("");
    assert_eq!(picker.directory().find_position_by_id(1000), Some(1));
    assert_eq!(picker.take_scroll_target(), None);
    assert_eq!(picker.directory().selection(), Some(1000));
}

#[test]
fn seed_does_not_override_existing_selection() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    directory.set_selection(65_534);
    let picker = PrincipalPicker::new(directory, "/srv/data", 1000);
    assert_eq!(picker.directory().selection(), Some(65_534));
    picker.directory().wait_until_loaded();
    assert_eq!(picker.take_scroll_target(), None);
}

#[test]
fn selection_changes_invalidate_all_rows() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = kinds.clone();
    let _sub = directory.observe_selection(move |kind| sink.borrow_mut().push(kind));
    directory.set_selection(0);
    directory.set_selection(10_042);
    assert_eq!(
        *kinds.borrow(),
        vec![ChangeKind::FullInvalidate, ChangeKind::FullInvalidate]
    );
    assert_eq!(directory.selection(), Some(10_042));
}

#[derive(Default)]
struct RecordingJobs {
    submitted: Mutex<Vec<PrincipalChange>>,
}

impl FileJobExecutor for RecordingJobs {
    fn submit(&self, change: PrincipalChange) -> DirectoryResult<()> {
        self.submitted.lock().unwrap().push(change);
        Ok(())
    }
}

#[test]
fn confirm_skips_unchanged_non_recursive_selection() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    let picker = PrincipalPicker::new(directory, "/srv/data", 1000);
    assert_eq!(picker.confirm(false), None);
    picker.directory().wait_until_loaded();
    assert_eq!(picker.confirm(false), None);

    let change = picker.confirm(true).unwrap();
    assert_eq!(change.principal.id, 1000);
    assert!(change.recursive);
}

#[test]
fn apply_submits_selected_principal() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    let picker = PrincipalPicker::new(directory, "/srv/data", 1000);
    picker.directory().wait_until_loaded();
    picker.directory().set_filter("Viewer");
    picker.directory().set_selection(10_042);

    let jobs = RecordingJobs::default();
    assert!(picker.apply(false, &jobs).unwrap());
    let submitted = jobs.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].path, PathBuf::from("/srv/data"));
    assert_eq!(submitted[0].namespace, Namespace::User);
    assert_eq!(submitted[0].principal.name.as_deref(), Some("u0_a42"));
}

#[test]
fn apply_ignores_unknown_selection() {
    let directory = PrincipalDirectory::new(user_request(), &InlineExecutor);
    let picker = PrincipalPicker::new(directory, "/srv/data", 1000);
    picker.directory().wait_until_loaded();
    picker.directory().set_selection(4242);
    let jobs = RecordingJobs::default();
    assert!(!picker.apply(true, &jobs).unwrap());
    assert!(jobs.submitted.lock().unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn picker_for_path_seeds_from_file_owner() {
    use std::os::unix::fs::MetadataExt;

    let path = std::env::temp_dir().join(format!("principal-dir-picker-{}", std::process::id()));
    std::fs::write(&path, b"x").unwrap();
    let gid = std::fs::metadata(&path).unwrap().gid();
    let directory = PrincipalDirectory::system(
        Namespace::Group,
        Arc::new(crate::principals::NoApplications),
        &SharedPoolExecutor,
    );
    let picker = PrincipalPicker::for_path(directory, &path).unwrap();
    assert_eq!(picker.original_id(), gid);
    assert_eq!(picker.directory().selection(), Some(gid));
    assert!(picker.directory().wait_until_loaded().is_terminal());
    let _ = std::fs::remove_file(&path);
}
