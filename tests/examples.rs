// SPDX-License-Identifier: MPL-2.0

//! End-to-end scenarios driving the whole pipeline: graph build,
//! configuration resolution, settings aggregation, persistence.

use std::sync::Arc;

use confsolve::{
    expand_vars, Action, BuildSettings, Configuration, Dependency, OfflinePackageStore, Package,
    Platform, Project, ProjectError, SelectedVersions, TargetType, FILE_VERSION,
};
use log::LevelFilter;
use std::io::Write;

fn init_log() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

fn platform() -> Platform {
    Platform::new("linux", "x86_64", "gcc")
}

fn lib_package(name: &str, version: &str, deps: &[&str]) -> Package {
    let mut pack = Package::new(name, version, format!("/packs/{name}-{version}"));
    for dep in deps {
        pack.add_dependency(*dep, Dependency::new("*"));
    }
    pack.add_configuration(Configuration::new("library"));
    pack
}

#[test]
fn linear_chain() {
    init_log();
    let mut store = OfflinePackageStore::new();
    store.add_package(lib_package("b", "1.0.0", &["c"]));
    store.add_package(lib_package("c", "2.0.0", &[]));

    let root = Arc::new(lib_package("a", "0.1.0", &["b"]));
    let mut selections = SelectedVersions::new();
    selections.select("b", "1.0.0");
    selections.select("c", "2.0.0");

    let project = Project::new(root, &store, selections);
    let names: Vec<_> = project
        .dependencies()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, ["b", "c"]);

    let configs = project.package_configs(&platform(), None, true).unwrap();
    assert_eq!(configs["a"], "library");
    assert_eq!(configs["b"], "library");
    assert_eq!(configs["c"], "library");

    let order: Vec<_> = project
        .topological_packages(true)
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(order, ["c", "b", "a"]);
}

/// Both sides of a diamond accept `d`, but one side pins a
/// non-default configuration; the pin must win for everyone.
#[test]
fn diamond_with_pinned_subconfiguration() {
    init_log();
    let mut store = OfflinePackageStore::new();

    // b's library configuration forces d into its alt configuration.
    let mut b = Package::new("b", "1.0.0", "/packs/b-1.0.0");
    b.add_dependency("d", Dependency::new("*"));
    let mut b_lib = Configuration::new("library");
    b_lib.sub_configurations.insert("d".into(), "alt".into());
    b.add_configuration(b_lib);
    store.add_package(b);
    store.add_package(lib_package("c", "1.0.0", &["d"]));

    let mut d = Package::new("d", "1.0.0", "/packs/d-1.0.0");
    d.add_configuration(Configuration::new("default"));
    d.add_configuration(Configuration::new("alt"));
    store.add_package(d);

    let root = Arc::new(lib_package("a", "0.1.0", &["b", "c"]));
    let mut selections = SelectedVersions::new();
    for name in ["b", "c", "d"] {
        selections.select(name, "1.0.0");
    }

    let project = Project::new(root, &store, selections);
    let configs = project.package_configs(&platform(), None, true).unwrap();
    assert_eq!(configs["d"], "alt");
    assert_eq!(configs["b"], "library");
    assert_eq!(configs["c"], "library");
}

/// The two sides pin `d` to different configurations; no assignment
/// can satisfy both parents.
#[test]
fn conflicting_pins_are_unresolvable() {
    init_log();
    let mut store = OfflinePackageStore::new();

    let mut b = Package::new("b", "1.0.0", "/packs/b-1.0.0");
    b.add_dependency("d", Dependency::new("*"));
    let mut b_lib = Configuration::new("library");
    b_lib.sub_configurations.insert("d".into(), "alt".into());
    b.add_configuration(b_lib);
    store.add_package(b);

    let mut c = Package::new("c", "1.0.0", "/packs/c-1.0.0");
    c.add_dependency("d", Dependency::new("*"));
    let mut c_lib = Configuration::new("library");
    c_lib.sub_configurations.insert("d".into(), "default".into());
    c.add_configuration(c_lib);
    store.add_package(c);

    let mut d = Package::new("d", "1.0.0", "/packs/d-1.0.0");
    d.add_configuration(Configuration::new("default"));
    d.add_configuration(Configuration::new("alt"));
    store.add_package(d);

    let root = Arc::new(lib_package("a", "0.1.0", &["b", "c"]));
    let mut selections = SelectedVersions::new();
    for name in ["b", "c", "d"] {
        selections.select(name, "1.0.0");
    }

    let project = Project::new(root, &store, selections);
    let err = project
        .package_configs(&platform(), None, true)
        .unwrap_err();
    assert!(matches!(err, ProjectError::Unresolvable { name } if name == "d"));
}

/// A dependency without a selection is skipped with a diagnostic; the
/// project still opens, resolves and aggregates without it.
#[test]
fn missing_selection_is_tolerated() {
    init_log();
    let store = OfflinePackageStore::new();
    let root = Arc::new(lib_package("a", "0.1.0", &["x"]));

    let project = Project::new(root, &store, SelectedVersions::new());
    assert!(project.dependency("x").is_none());
    assert!(!project.has_all_dependencies());
    assert!(matches!(
        project.pending_actions(),
        [Action::Failure { name, .. }] if name == "x"
    ));

    let configs = project.package_configs(&platform(), None, true).unwrap();
    assert_eq!(configs["a"], "library");
    assert!(!configs.contains_key("x"));

    let mut recipe = BuildSettings::new();
    project
        .add_build_settings(&mut recipe, &platform(), None, None, false)
        .unwrap();
    assert!(recipe.version_ids.contains(&"Have_a".to_string()));
    assert!(!recipe.version_ids.iter().any(|id| id.contains("Have_x")));
}

#[test]
fn variable_expansion() {
    init_log();
    std::env::set_var("CONFSOLVE_EXAMPLE_FOO", "bar");
    let out = expand_vars(
        "$PACKAGE_DIR/src/$CONFSOLVE_EXAMPLE_FOO/$$literal",
        std::path::Path::new("/p"),
        true,
    )
    .unwrap();
    assert_eq!(out, "/p/src/bar/$literal");

    let err = expand_vars("$CONFSOLVE_EXAMPLE_UNSET", std::path::Path::new("/p"), false)
        .unwrap_err();
    assert!(matches!(err, ProjectError::UnknownVariable { name } if name == "CONFSOLVE_EXAMPLE_UNSET"));
}

#[test]
fn lockfile_version_mismatch() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("selections.json");
    std::fs::write(&file, r#"{"fileVersion": 99, "versions": {"b": "1.0.0"}}"#).unwrap();

    let mut selections = SelectedVersions::new();
    selections.select("stale", "0.0.1");
    let err = selections.load(&file).unwrap_err();
    assert!(matches!(
        err,
        ProjectError::FileVersionMismatch { found: 99, expected: FILE_VERSION }
    ));
    assert!(selections.is_empty());
}

/// A full pipeline run: resolve, aggregate, persist, reload.
#[test]
fn aggregate_and_save() {
    init_log();
    let dir = tempfile::tempdir().unwrap();

    let mut store = OfflinePackageStore::new();
    let mut util = Package::new("util", "1.0.0", "/packs/util-1.0.0");
    let mut util_lib = Configuration::new("library");
    util_lib.settings.import_paths.push("include".into());
    util_lib.settings.version_ids.push("UtilBackend".into());
    util.add_configuration(util_lib);
    store.add_package(util);

    let mut root = Package::new("app", "0.1.0", dir.path().to_string_lossy().into_owned());
    root.add_dependency("util", Dependency::new("*"));
    let mut app_cfg = Configuration::new("application");
    app_cfg.settings.target_type = Some(TargetType::Executable);
    app_cfg.settings.main_source_file = Some("src/main.c".into());
    app_cfg.settings.import_paths.push("src".into());
    root.add_configuration(app_cfg);
    let root = Arc::new(root);

    let mut selections = SelectedVersions::new();
    selections.select("util", "1.0.0");

    let project = Project::new(Arc::clone(&root), &store, selections);
    let mut recipe = BuildSettings::new();
    project
        .add_build_settings(&mut recipe, &platform(), None, None, false)
        .unwrap();

    assert_eq!(recipe.target_type, Some(TargetType::Executable));
    assert_eq!(recipe.target_name.as_deref(), Some("app"));
    assert_eq!(
        recipe.main_source_file.as_deref(),
        Some(dir.path().join("src/main.c").to_string_lossy().as_ref())
    );
    assert!(recipe
        .import_paths
        .contains(&"/packs/util-1.0.0/include".to_string()));
    assert!(recipe.version_ids.contains(&"Have_app".to_string()));
    assert!(recipe.version_ids.contains(&"Have_util".to_string()));
    assert!(recipe.version_ids.contains(&"UtilBackend".to_string()));

    project.save().unwrap();
    let mut reloaded = SelectedVersions::new();
    reloaded
        .load(&root.path().join(confsolve::SELECTIONS_FILE))
        .unwrap();
    assert_eq!(reloaded.selected_version("util").unwrap().as_str(), "1.0.0");
}
