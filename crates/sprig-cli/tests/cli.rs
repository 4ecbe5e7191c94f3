//! Integration tests: cli.
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test context that sets up a temporary sprig home
struct TestContext {
    temp_dir: TempDir,
    sprig_home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let sprig_home = temp_dir.path().join(".sprig");
        fs::create_dir_all(sprig_home.join("packages")).expect("failed to create sprig home");
        fs::write(sprig_home.join("config.toml"), "[stage]\nuse_tmp = false\n")
            .expect("failed to write config");
        Self {
            temp_dir,
            sprig_home,
        }
    }

    fn with_recipes() -> Self {
        let ctx = Self::new();
        ctx.add_recipe(
            "libelf",
            "[Libelf]\nurl = \"http://www.mr511.de/software/libelf-{{version}}.tar.gz\"\n\
             [Libelf.versions.\"0.8.13\"]\n",
        );
        ctx.add_recipe("libdwarf", "[Libdwarf]\ndepends_on = [\"libelf\"]\n");
        ctx.add_recipe("mpich", "[Mpich]\nprovides = [\"mpi@:3\"]\n");
        ctx.add_recipe("openmpi", "[Openmpi]\nprovides = [\"mpi@:2.2\"]\n");
        ctx
    }

    fn add_recipe(&self, name: &str, body: &str) {
        let dir = self.sprig_home.join("packages").join(name);
        fs::create_dir_all(&dir).expect("failed to create recipe dir");
        fs::write(dir.join("package.toml"), body).expect("failed to write recipe");
    }

    fn sprig_cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sprig"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("SPRIG_HOME", &self.sprig_home);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.sprig_cmd()
            .args(args)
            .output()
            .expect("failed to run sprig")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("sprig "));
}

#[test]
fn test_list_shows_every_recipe() {
    let ctx = TestContext::with_recipes();
    let output = ctx.run(&["list"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    for name in ["libdwarf", "libelf", "mpich", "openmpi"] {
        assert!(out.contains(name), "missing {name} in {out}");
    }
}

#[test]
fn test_list_without_recipes() {
    let ctx = TestContext::new();
    let output = ctx.run(&["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No packages found"));
}

#[test]
fn test_graph_is_dot() {
    let ctx = TestContext::with_recipes();
    let output = ctx.run(&["graph", "--title", "Deps"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.starts_with("digraph G {\n  label = \"Deps\"\n"));
    assert!(out.contains("  \"libelf\" -> \"libdwarf\"\n"));
    assert!(out.contains("  \"mpich\" -> \"mpi\"\n"));
    assert!(out.ends_with("}\n"));
}

#[test]
fn test_providers_of_virtual() {
    let ctx = TestContext::with_recipes();
    let output = ctx.run(&["providers", "mpi"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("mpich"));
    assert!(out.contains("openmpi"));

    let output = ctx.run(&["providers", "mpi@3"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("mpich"));
    assert!(!out.contains("openmpi"));
}

#[test]
fn test_info_unknown_package_fails() {
    let ctx = TestContext::with_recipes();
    let output = ctx.run(&["info", "nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Package nope not found."));
}

#[test]
fn test_info_shows_versions_and_dependencies() {
    let ctx = TestContext::with_recipes();
    let output = ctx.run(&["info", "libdwarf"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Dependencies"));
    assert!(out.contains("libelf"));
}

#[test]
fn test_mirrors_in_config_order() {
    let ctx = TestContext::new();
    fs::write(
        ctx.sprig_home.join("config.toml"),
        "[mirror.site]\nurl = \"file:///srv/mirror/\"\n",
    )
    .unwrap();
    let output = ctx.run(&["mirrors"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("  1  file:///srv/mirror\n"));
}

#[test]
fn test_find_lists_installed_known_packages() {
    let ctx = TestContext::with_recipes();
    let opt = ctx.sprig_home.join("opt");
    fs::create_dir_all(opt.join("libelf").join("0.8.13")).unwrap();
    fs::create_dir_all(opt.join("unknown").join("1.0")).unwrap();

    let output = ctx.run(&["find"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("libelf@0.8.13"));
    assert!(!out.contains("unknown"));
}
