//! Integration tests: registry.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use sprig_core::registry::{GetOptions, PackageRegistry, RegistryError};
use sprig_core::DirectoryLayout;
use sprig_schema::Spec;

fn add_recipe(root: &Path, name: &str, class: &str, body: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("package.toml"), format!("[{class}]\n{body}")).unwrap();
}

fn spec(s: &str) -> Spec {
    s.parse().unwrap()
}

fn fixture() -> (tempfile::TempDir, PackageRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    add_recipe(
        root,
        "libelf",
        "Libelf",
        "url = \"http://www.mr511.de/software/libelf-{{version}}.tar.gz\"\n",
    );
    add_recipe(root, "libdwarf", "Libdwarf", "depends_on = [\"libelf\"]\n");
    add_recipe(
        root,
        "mpich",
        "Mpich",
        "provides = [{ spec = \"mpi@:3\", when = \"3:\" }]\n",
    );
    add_recipe(root, "openmpi", "Openmpi", "provides = [\"mpi@:2.2\"]\n");
    let registry = PackageRegistry::new(root);
    (dir, registry)
}

#[test]
fn test_equal_specs_share_an_instance() {
    let (_dir, mut registry) = fixture();

    let a = registry.get(&spec("libelf@0.8.13")).unwrap();
    let b = registry.get(&spec("libelf@0.8.13")).unwrap();
    let c = registry.get(&spec("libelf@0.8.12")).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.name(), "libelf");
}

#[test]
fn test_cache_key_is_a_copy() {
    let (_dir, mut registry) = fixture();

    let mut request = spec("libelf@0.8.13");
    let first = registry.get(&request).unwrap();
    request = request.with_version("0.8.12".into());
    let other = registry.get(&request).unwrap();

    assert!(!Arc::ptr_eq(&first, &other));
    assert!(Arc::ptr_eq(
        &first,
        &registry.get(&spec("libelf@0.8.13")).unwrap()
    ));
}

#[test]
fn test_new_replaces_cached_instance() {
    let (_dir, mut registry) = fixture();
    let s = spec("libelf@0.8.13");

    let old = registry.get(&s).unwrap();
    let fresh = registry
        .get_with_options(&s, GetOptions { new: true })
        .unwrap();
    assert!(!Arc::ptr_eq(&old, &fresh));
    assert!(Arc::ptr_eq(&fresh, &registry.get(&s).unwrap()));
}

#[test]
fn test_delete_and_purge() {
    let (_dir, mut registry) = fixture();
    let s = spec("libelf@0.8.13");

    let old = registry.get(&s).unwrap();
    let deleted = registry.delete(&s).unwrap();
    assert!(Arc::ptr_eq(&old, &deleted));
    assert!(!Arc::ptr_eq(&old, &registry.get(&s).unwrap()));

    registry.purge();
    assert!(matches!(registry.delete(&s), Err(RegistryError::NotCached(_))));
}

#[test]
fn test_class_loaded_once() {
    let (_dir, mut registry) = fixture();

    let a = registry.get_class_for_package_name("libelf").unwrap();
    registry.purge();
    let b = registry.get_class_for_package_name("libelf").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(
        &a,
        registry.get(&spec("libelf@1.0")).unwrap().class()
    ));
}

#[test]
fn test_providers() {
    let (_dir, mut registry) = fixture();

    let all = registry.providers_for(&spec("mpi")).unwrap();
    let names: Vec<String> = all.iter().map(|s| s.name.to_string()).collect();
    assert_eq!(names, vec!["mpich", "openmpi"]);

    let recent = registry.providers_for(&spec("mpi@3")).unwrap();
    assert_eq!(recent.len(), 1);

    assert!(matches!(
        registry.providers_for(&spec("blas")),
        Err(RegistryError::UnknownPackage(ref name)) if name == "blas"
    ));
}

#[test]
fn test_names_skip_directories_without_recipe() {
    let dir = tempfile::tempdir().unwrap();
    add_recipe(dir.path(), "zlib", "Zlib", "");
    add_recipe(dir.path(), "boost", "Boost", "");
    fs::create_dir_all(dir.path().join("scratch")).unwrap();

    let mut registry = PackageRegistry::new(dir.path());
    let names: Vec<&str> = registry
        .all_package_names()
        .unwrap()
        .iter()
        .map(|n| n.as_str())
        .collect();
    assert_eq!(names, vec!["boost", "zlib"]);

    // Memoized for the registry's lifetime.
    add_recipe(dir.path(), "bzip2", "Bzip2", "");
    assert_eq!(registry.all_package_names().unwrap().len(), 2);
}

#[test]
fn test_graph_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    add_recipe(dir.path(), "a", "A", "depends_on = [\"b\"]\n");
    add_recipe(dir.path(), "b", "B", "");

    let mut registry = PackageRegistry::new(dir.path());
    let mut out = Vec::new();
    registry.graph_dependencies(&mut out, "Dependencies").unwrap();

    let expected = "\
digraph G {
  label = \"Dependencies\"
  labelloc = \"b\"
  rankdir = \"LR\"
  ranksep = \"5\"

  \"a\" [label=\"a\"]
  \"b\" [label=\"b\"]

  \"b\" -> \"a\"
}
";
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn test_graph_links_providers_to_virtuals() {
    let (_dir, mut registry) = fixture();
    let mut out = Vec::new();
    registry.graph_dependencies(&mut out, "Deps").unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("  \"libelf\" -> \"libdwarf\"\n"));
    assert!(text.contains("  \"mpich\" -> \"mpi\"\n"));
    assert!(text.contains("  \"openmpi\" -> \"mpi\"\n"));
}

#[test]
fn test_installed_specs() {
    let (dir, registry) = fixture();
    let opt = dir.path().join("opt");
    for p in ["libelf/0.8.13", "libelf/0.8.12", "gone/1.0"] {
        fs::create_dir_all(opt.join(p)).unwrap();
    }
    let layout = DirectoryLayout::new(&opt);

    let installed = registry
        .get_installed(&layout, &spec("libelf@0.8.13:"))
        .unwrap();
    assert_eq!(installed, vec![spec("libelf@0.8.13")]);

    let known = registry.installed_known_package_specs(&layout).unwrap();
    assert_eq!(known.len(), 2);
    assert!(known.iter().all(|s| s.name == "libelf"));
}

#[cfg(unix)]
#[test]
fn test_dangling_recipe_link_is_unknown() {
    let (dir, mut registry) = fixture();
    let pkg = dir.path().join("ghost");
    fs::create_dir_all(&pkg).unwrap();
    std::os::unix::fs::symlink(dir.path().join("missing.toml"), pkg.join("package.toml")).unwrap();

    assert!(!registry.exists("ghost"));
    let err = registry.get_class_for_package_name("ghost").unwrap_err();
    assert!(matches!(err, RegistryError::UnknownPackage(ref name) if name == "ghost"));
    assert!(!err.is_fatal());
}
