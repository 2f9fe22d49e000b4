use super::*;

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use dorsey_core::{
    error_kind, normalize_path, DorseyError, PackageSpec, VersionConstraint,
};
use dorsey_registry::{RegistryClient, VersionSource};
use flate2::write::GzEncoder;
use flate2::Compression;
use semver::Version;

const PKG: &str = "@imooc-cli/init";

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn build_test_root_path(nanos: u128) -> PathBuf {
    let mut path = std::env::temp_dir();
    let sequence = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "dorsey-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    path
}

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    build_test_root_path(nanos)
}

struct FakeRegistry {
    versions: RefCell<Vec<String>>,
    queries: Cell<usize>,
}

impl FakeRegistry {
    fn with_versions(versions: &[&str]) -> Self {
        Self {
            versions: RefCell::new(versions.iter().map(|v| v.to_string()).collect()),
            queries: Cell::new(0),
        }
    }

    fn publish(&self, version: &str) {
        self.versions.borrow_mut().push(version.to_string());
    }
}

impl VersionSource for FakeRegistry {
    fn registry_url(&self) -> &str {
        "http://registry.test"
    }

    fn fetch_versions(&self, _name: &str) -> anyhow::Result<Vec<String>> {
        self.queries.set(self.queries.get() + 1);
        Ok(self.versions.borrow().clone())
    }
}

struct FakeFetcher {
    calls: RefCell<Vec<String>>,
    main: Option<&'static str>,
    fail: bool,
}

impl FakeFetcher {
    fn with_main(main: &'static str) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            main: Some(main),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            main: Some("lib/index.js"),
            fail: true,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl PackageFetcher for FakeFetcher {
    fn fetch(&self, name: &str, version: &Version, destination: &Path) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(format!("{name}@{version}"));
        write_package_files(destination, name, &version.to_string(), self.main);
        if self.fail {
            return Err(anyhow!("connection reset while downloading"));
        }
        Ok(())
    }
}

fn write_package_files(dir: &Path, name: &str, version: &str, main: Option<&str>) {
    fs::create_dir_all(dir.join("lib")).expect("must create package dir");
    let manifest = match main {
        Some(main) => format!(r#"{{"name":"{name}","version":"{version}","main":"{main}"}}"#),
        None => format!(r#"{{"name":"{name}","version":"{version}"}}"#),
    };
    fs::write(dir.join("package.json"), manifest).expect("must write manifest");
    fs::write(dir.join("lib").join("index.js"), "module.exports = () => {};")
        .expect("must write entry");
}

fn cached_spec(root: &Path, version: VersionConstraint) -> PackageSpec {
    let target = root.join("dependencies");
    PackageSpec::new(PKG, version, &target, Some(target.join("node_modules")))
        .expect("valid spec")
}

#[test]
fn build_test_root_path_disambiguates_same_timestamp_calls() {
    assert_ne!(build_test_root_path(42), build_test_root_path(42));
}

#[test]
fn prepare_creates_store_and_resolves_latest_once() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0", "1.2.0", "2.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );

    package.prepare().expect("must prepare");
    package.prepare().expect("second prepare is a no-op");

    assert_eq!(package.resolved_version(), Some(&Version::new(2, 0, 0)));
    assert_eq!(registry.queries.get(), 1);
    assert!(root.join("dependencies").join("node_modules").is_dir());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn prepare_resolves_range_to_highest_match() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0", "1.4.0", "2.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::parse("^1.0").expect("range")),
        &registry,
        &fetcher,
    );

    package.prepare().expect("must prepare");
    assert_eq!(package.resolved_version(), Some(&Version::new(1, 4, 0)));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn prepare_with_exact_version_skips_registry() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Exact(Version::new(0, 9, 0))),
        &registry,
        &fetcher,
    );

    package.prepare().expect("must prepare");
    assert_eq!(package.resolved_version(), Some(&Version::new(0, 9, 0)));
    assert_eq!(registry.queries.get(), 0);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn prepare_fails_when_nothing_is_published() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&[]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );

    let err = package.prepare().expect_err("must fail");
    assert!(matches!(
        error_kind(&err),
        Some(DorseyError::NoMatchingVersion { .. })
    ));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_materializes_cache_entry() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0", "1.2.0", "2.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );

    assert!(!package.exists().expect("must check existence"));
    let outcome = package.install().expect("must install");
    assert_eq!(outcome, InstallOutcome::Installed(Version::new(2, 0, 0)));
    assert!(package.exists().expect("must check existence"));

    let entry = package.cache_entry_path().expect("must derive entry");
    assert_eq!(
        entry,
        root.join("dependencies")
            .join("node_modules")
            .join("_@imooc-cli_init@2.0.0@@imooc-cli")
    );
    assert!(entry.join("package.json").is_file());
    assert_eq!(*fetcher.calls.borrow(), vec!["@imooc-cli/init@2.0.0"]);
    assert_eq!(registry.queries.get(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn failed_install_leaves_no_cache_entry() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::failing();
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );

    let err = package.install().expect_err("install must fail");
    assert!(matches!(
        error_kind(&err),
        Some(DorseyError::InstallFailed { version, .. }) if version == "1.0.0"
    ));
    assert!(format!("{err:#}").contains("connection reset"));
    assert!(!package.exists().expect("must check existence"));

    let store = root.join("dependencies").join("node_modules");
    let leftovers: Vec<_> = fs::read_dir(&store)
        .expect("store must exist")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert!(
        leftovers.is_empty(),
        "failed install must not leave staging dirs or locks: {leftovers:?}"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_skips_fetch_when_entry_already_present() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");

    let mut first = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );
    first.install().expect("first install");

    let mut second = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );
    let outcome = second.install().expect("second install");
    assert_eq!(outcome, InstallOutcome::AlreadyPresent(Version::new(1, 0, 0)));
    assert_eq!(fetcher.call_count(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn repeated_updates_install_at_most_once() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0", "1.1.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );

    let first = package.update().expect("first update");
    let second = package.update().expect("second update");

    assert!(matches!(first, UpdateOutcome::Updated { ref to, .. } if *to == Version::new(1, 1, 0)));
    assert_eq!(second, UpdateOutcome::UpToDate(Version::new(1, 1, 0)));
    assert_eq!(fetcher.call_count(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn update_to_newer_release_installs_once_and_keeps_old_entry() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");

    let mut original = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );
    original.install().expect("must install 1.0.0");
    let old_entry = original.cache_entry_path().expect("old entry");
    let old_manifest = fs::read_to_string(old_entry.join("package.json")).expect("old manifest");

    registry.publish("1.1.0");
    let mut pinned = Package::new(
        cached_spec(&root, VersionConstraint::Exact(Version::new(1, 0, 0))),
        &registry,
        &fetcher,
    );
    let outcome = pinned.update().expect("must update");

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: Some(Version::new(1, 0, 0)),
            to: Version::new(1, 1, 0),
        }
    );
    assert_eq!(pinned.resolved_version(), Some(&Version::new(1, 1, 0)));
    assert_eq!(
        *fetcher.calls.borrow(),
        vec!["@imooc-cli/init@1.0.0", "@imooc-cli/init@1.1.0"]
    );
    assert_eq!(
        fs::read_to_string(old_entry.join("package.json")).expect("old manifest"),
        old_manifest
    );
    assert!(pinned
        .cache_entry_path()
        .expect("new entry")
        .join("package.json")
        .is_file());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn update_reuses_latest_resolved_by_prepare() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    )
    .install()
    .expect("must install");

    registry.queries.set(0);
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );
    assert!(package.exists().expect("must check"));
    let outcome = package.update().expect("must update");

    assert_eq!(outcome, UpdateOutcome::UpToDate(Version::new(1, 0, 0)));
    assert_eq!(registry.queries.get(), 1);
    assert_eq!(fetcher.call_count(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn entry_point_path_joins_manifest_main() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );
    package.install().expect("must install");

    let entry = package.cache_entry_path().expect("entry");
    let resolved = package
        .entry_point_path()
        .expect("must read manifest")
        .expect("main must resolve");
    assert_eq!(resolved, normalize_path(&entry.join("lib").join("index.js")));
    assert!(!resolved.contains('\\'));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn entry_point_path_without_main_is_none() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher {
        calls: RefCell::new(Vec::new()),
        main: None,
        fail: false,
    };
    let mut package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );
    package.install().expect("must install");

    assert_eq!(package.entry_point_path().expect("must read"), None);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn entry_point_path_folds_relative_segments() {
    let root = test_root();
    write_package_files(&root, "local", "0.0.1", Some("./lib/../lib/index.js"));

    let resolved = resolve_entry_point(&root)
        .expect("must read")
        .expect("main must resolve");
    assert_eq!(resolved, normalize_path(&root.join("lib").join("index.js")));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn entry_point_search_walks_up_to_nearest_manifest() {
    let root = test_root();
    write_package_files(&root, "local", "0.0.1", Some("lib/index.js"));
    let nested = root.join("lib").join("nested");
    fs::create_dir_all(&nested).expect("must create nested dir");

    assert_eq!(find_package_root(&nested), Some(root.clone()));
    let resolved = resolve_entry_point(&nested)
        .expect("must read")
        .expect("main must resolve");
    assert_eq!(resolved, normalize_path(&root.join("lib").join("index.js")));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn entry_point_rejects_corrupt_manifest() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    fs::write(root.join("package.json"), "{ broken").expect("must write manifest");

    assert!(resolve_entry_point(&root).is_err());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn direct_mode_never_installs() {
    let root = test_root();
    write_package_files(&root, "local-init", "0.0.1", Some("lib/index.js"));
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let spec = PackageSpec::new(PKG, VersionConstraint::Latest, &root, None).expect("spec");
    let mut package = Package::new(spec, &registry, &fetcher);

    assert!(package.exists().expect("must check"));
    assert_eq!(package.install().expect("install"), InstallOutcome::Skipped);
    assert_eq!(package.update().expect("update"), UpdateOutcome::Skipped);
    assert_eq!(fetcher.call_count(), 0);
    assert_eq!(registry.queries.get(), 0);

    let resolved = package
        .entry_point_path()
        .expect("must read")
        .expect("main must resolve");
    assert_eq!(resolved, normalize_path(&root.join("lib").join("index.js")));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn direct_mode_missing_target_does_not_exist() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let spec = PackageSpec::new(PKG, VersionConstraint::Latest, root.join("missing"), None)
        .expect("spec");
    let mut package = Package::new(spec, &registry, &fetcher);

    assert!(!package.exists().expect("must check"));
}

#[test]
fn cache_entry_path_requires_resolved_version() {
    let root = test_root();
    let registry = FakeRegistry::with_versions(&["1.0.0"]);
    let fetcher = FakeFetcher::with_main("lib/index.js");
    let package = Package::new(
        cached_spec(&root, VersionConstraint::Latest),
        &registry,
        &fetcher,
    );

    assert!(package.cache_entry_path().is_err());
}

#[test]
fn store_layout_paths_are_siblings_of_the_entry() {
    let layout = StoreLayout::new("/store");
    let entry = layout.entry_path(PKG, "1.0.0").expect("entry");
    let lock = layout.lock_path(PKG, "1.0.0").expect("lock");
    let staging = layout.staging_path(PKG, "1.0.0", "42").expect("staging");

    assert_eq!(entry, PathBuf::from("/store/_@imooc-cli_init@1.0.0@@imooc-cli"));
    assert_eq!(lock.parent(), entry.parent());
    assert_eq!(staging.parent(), entry.parent());
    assert_ne!(lock, entry);
    assert_ne!(staging, entry);
}

#[test]
fn entry_lock_waits_for_holder_to_release() {
    let root = test_root();
    let lock_path = root.join("entry.lock");
    let held = EntryLock::acquire(&lock_path, Duration::from_secs(30)).expect("must acquire");

    let releaser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        drop(held);
    });

    let started = Instant::now();
    let second = EntryLock::acquire(&lock_path, Duration::from_secs(30)).expect("must acquire");
    assert!(started.elapsed() >= Duration::from_millis(200));
    releaser.join().expect("releaser must join");

    drop(second);
    assert!(!lock_path.exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn entry_lock_reclaims_stale_lock() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    let lock_path = root.join("entry.lock");
    fs::write(&lock_path, "99999\n").expect("must write abandoned lock");

    let lock = EntryLock::acquire(&lock_path, Duration::ZERO).expect("must reclaim");
    assert_eq!(lock.path(), lock_path.as_path());

    drop(lock);
    let _ = fs::remove_dir_all(&root);
}

fn leftover_stale_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .expect("must list lock dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".stale-") || name.ends_with(".reclaim"))
        .collect()
}

fn write_abandoned_lock(path: &Path, age: Duration) {
    let file = fs::File::create(path).expect("must write abandoned lock");
    (&file).write_all(b"99999\n").expect("must write pid");
    file.set_modified(std::time::SystemTime::now() - age)
        .expect("must backdate lock");
}

#[test]
fn stale_lock_reclaim_leaves_no_parked_files() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    let lock_path = root.join("entry.lock");
    write_abandoned_lock(&lock_path, Duration::from_secs(3600));

    let lock = EntryLock::acquire(&lock_path, Duration::from_secs(60)).expect("must reclaim");
    assert_eq!(
        fs::read_to_string(&lock_path).expect("lock must exist"),
        format!("{}\n", std::process::id())
    );
    assert!(leftover_stale_files(&root).is_empty());

    drop(lock);
    assert!(!lock_path.exists());
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn concurrent_reclaimers_never_share_a_stale_lock() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    let lock_path = root.join("entry.lock");
    write_abandoned_lock(&lock_path, Duration::from_secs(3600));

    let holders = AtomicUsize::new(0);
    let max_holders = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..6 {
            handles.push(scope.spawn(|| {
                let lock = EntryLock::acquire(&lock_path, Duration::from_secs(60))
                    .expect("must acquire");
                let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                max_holders.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                holders.fetch_sub(1, Ordering::SeqCst);
                drop(lock);
            }));
        }
        for handle in handles {
            handle.join().expect("reclaimer must join");
        }
    });

    assert_eq!(max_holders.load(Ordering::SeqCst), 1);
    assert!(!lock_path.exists());
    assert!(leftover_stale_files(&root).is_empty());
    let _ = fs::remove_dir_all(&root);
}

struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("disk full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_owner_write_removes_the_lock_file() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    let lock_path = root.join("entry.lock");
    fs::File::create(&lock_path).expect("must create lock");

    let err = lock::write_lock_owner(BrokenWriter, &lock_path).expect_err("write must fail");
    assert!(format!("{err:#}").contains("disk full"));
    assert!(!lock_path.exists());

    let lock = EntryLock::acquire(&lock_path, Duration::from_secs(60))
        .expect("a failed claim must not block the next one");
    drop(lock);
    let _ = fs::remove_dir_all(&root);
}

struct SlowFetcher {
    calls: AtomicUsize,
}

impl PackageFetcher for SlowFetcher {
    fn fetch(&self, name: &str, version: &Version, destination: &Path) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(200));
        write_package_files(destination, name, &version.to_string(), Some("lib/index.js"));
        Ok(())
    }
}

struct StaticRegistry;

impl VersionSource for StaticRegistry {
    fn registry_url(&self) -> &str {
        "http://registry.test"
    }

    fn fetch_versions(&self, _name: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec!["3.0.0".to_string()])
    }
}

#[test]
fn concurrent_installs_of_one_entry_fetch_once() {
    let root = test_root();
    let fetcher = SlowFetcher {
        calls: AtomicUsize::new(0),
    };
    let registry = StaticRegistry;

    let outcomes: Vec<InstallOutcome> = std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..3 {
            handles.push(scope.spawn(|| {
                let mut package = Package::new(
                    cached_spec(&root, VersionConstraint::Latest),
                    &registry,
                    &fetcher,
                );
                package.install().expect("install must succeed")
            }));
        }
        handles
            .into_iter()
            .map(|handle| handle.join().expect("installer thread must join"))
            .collect()
    });

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, InstallOutcome::Installed(_)))
            .count(),
        1
    );

    let _ = fs::remove_dir_all(&root);
}

fn build_tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .expect("must append tar entry");
    }
    builder
        .into_inner()
        .expect("must finish tar")
        .finish()
        .expect("must finish gzip")
}

#[test]
fn unpack_strips_top_level_directory() {
    let root = test_root();
    let tarball = build_tarball(&[
        ("package/package.json", r#"{"name":"x","main":"lib/index.js"}"#),
        ("package/lib/index.js", "module.exports = () => {};"),
    ]);

    let written = unpack_package_tarball(&tarball, &root).expect("must unpack");
    assert_eq!(written, 2);
    assert!(root.join("package.json").is_file());
    assert!(root.join("lib").join("index.js").is_file());
    assert!(!root.join("package").exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unpack_rejects_entries_escaping_destination() {
    let root = test_root();
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let payload = b"owned";
    let mut header = tar::Header::new_old();
    let name = b"package/../../escape.txt";
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_size(payload.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, &payload[..])
        .expect("must append raw entry");
    let tarball = builder
        .into_inner()
        .expect("must finish tar")
        .finish()
        .expect("must finish gzip");

    let err = unpack_package_tarball(&tarball, &root.join("dst")).expect_err("must reject");
    assert!(err.to_string().contains("escapes"));
    assert!(!root.join("escape.txt").exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unpack_rejects_empty_archive() {
    let root = test_root();
    let tarball = build_tarball(&[]);
    assert!(unpack_package_tarball(&tarball, &root).is_err());
    let _ = fs::remove_dir_all(&root);
}

/// Serves a version manifest and then the tarball it points to.
fn start_package_server(tarball: Vec<u8>, integrity: String) -> (String, std::thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("must bind test registry");
    let address = listener.local_addr().expect("must read address");
    let base = format!("http://{address}");
    let tarball_url = format!("{base}/init/-/init-1.0.0.tgz");
    let handle = std::thread::spawn(move || {
        let manifest = format!(
            r#"{{"name":"init","version":"1.0.0","dist":{{"tarball":"{tarball_url}","integrity":"{integrity}"}}}}"#
        );
        for body in [manifest.into_bytes(), tarball] {
            let (mut stream, _) = listener.accept().expect("must accept");
            let mut request = Vec::new();
            let mut buffer = [0_u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = stream.read(&mut buffer).expect("must read request");
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..read]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).expect("must write head");
            stream.write_all(&body).expect("must write body");
            stream.flush().expect("must flush");
        }
    });
    (base, handle)
}

fn registry_client(url: &str) -> RegistryClient {
    RegistryClient::new(url, Duration::from_secs(5), Duration::from_secs(5))
        .expect("must build client")
}

#[test]
fn registry_fetcher_downloads_verifies_and_unpacks() {
    let root = test_root();
    let tarball = build_tarball(&[
        ("package/package.json", r#"{"name":"init","main":"lib/index.js"}"#),
        ("package/lib/index.js", "module.exports = () => {};"),
    ]);
    let integrity = dorsey_security::sha512_integrity(&tarball);
    let (url, server) = start_package_server(tarball, integrity);
    let fetcher = RegistryFetcher::new(registry_client(&url));

    fetcher
        .fetch("init", &Version::new(1, 0, 0), &root)
        .expect("must fetch");
    server.join().expect("server must join");

    assert!(root.join("package.json").is_file());
    assert!(root.join("lib").join("index.js").is_file());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn registry_fetcher_rejects_integrity_mismatch() {
    let root = test_root();
    let tarball = build_tarball(&[("package/package.json", r#"{"name":"init"}"#)]);
    let integrity = dorsey_security::sha512_integrity(b"something else");
    let (url, server) = start_package_server(tarball, integrity);
    let fetcher = RegistryFetcher::new(registry_client(&url));

    let err = fetcher
        .fetch("init", &Version::new(1, 0, 0), &root)
        .expect_err("must reject");
    server.join().expect("server must join");

    assert!(matches!(
        error_kind(&err),
        Some(DorseyError::IntegrityMismatch { .. })
    ));
    assert!(!root.join("package.json").exists());

    let _ = fs::remove_dir_all(&root);
}
