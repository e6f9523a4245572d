extern crate env_logger;
extern crate respak;
extern crate tempfile;

use std::fs;
use std::path::Path;

use respak::prelude::*;
use respak::res::vfs::MAX_LIST_DEPTH;

fn system(root: &Path) -> ResourceSystem {
    let _ = env_logger::try_init();
    let mut params = ResourceParams::default();
    params.path_prefix = root.to_owned();
    ResourceSystem::headless(params).unwrap()
}

fn touch(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn package(root: &Path) -> std::path::PathBuf {
    let path = root.join("assets.pkg");
    let mut builder = PackageBuilder::new();
    builder
        .add("levels/one.bin", vec![1; 64], true)
        .add("levels/two.bin", vec![2; 64], false)
        .add("levels/deep/three.bin", vec![3; 8], false)
        .add("title.txt", b"title".to_vec(), false);
    builder.save(&path).unwrap();
    path
}

#[test]
fn host_names() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("data/a.txt"), b"a");

    let res = system(dir.path());
    assert!(res.exists("data/a.txt"));
    assert!(!res.exists("data/b.txt"));
    assert!(!res.exists("data"));

    let absolute = dir.path().join("data/a.txt");
    let absolute = absolute.to_str().unwrap();
    assert!(res.exists(absolute));
    assert!(res.exists(&format!("host:{}", absolute)));
    assert!(res.exists(&format!("HOST:{}", absolute)));
}

#[test]
fn package_answers_definitively() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("pkg/only_on_host.txt"), b"host");
    touch(&dir.path().join("pkg/title.txt"), b"host");

    let mut res = system(dir.path());
    assert!(res.exists("pkg/only_on_host.txt"));

    let path = package(dir.path());
    let handle = res.register_package(PkgArchive::new("pkg/", path)).unwrap();

    assert!(res.exists("pkg/title.txt"));
    assert!(res.exists("PKG/LEVELS/ONE.BIN"));
    assert!(!res.exists("pkg/only_on_host.txt"));

    let mgr = res.create_manager(4).unwrap();
    match res.open_file(mgr, "pkg/only_on_host.txt") {
        Err(Error::NotFound(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    res.unregister_package(handle).unwrap();
    assert!(res.exists("pkg/only_on_host.txt"));
    assert!(!res.exists("pkg/levels/one.bin"));
}

#[test]
fn list_package() {
    let dir = tempfile::tempdir().unwrap();
    let mut res = system(dir.path());
    res.register_package(PkgArchive::new("pkg/", package(dir.path())))
        .unwrap();

    let names: Vec<String> = res.list_files("pkg/levels", false).collect();
    assert_eq!(names, vec!["one.bin", "two.bin"]);

    let names: Vec<String> = res.list_files("pkg/levels/", true).collect();
    assert_eq!(names, vec!["deep/three.bin", "one.bin", "two.bin"]);

    let names: Vec<String> = res.list_files("pkg", false).collect();
    assert_eq!(names, vec!["title.txt"]);

    let mut list = res.list_files("pkg/levels/deep", false);
    assert_eq!(list.next_name(), Some("three.bin"));
    assert_eq!(list.next_name(), None);
}

#[test]
fn list_host() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("tree/b.txt"), b"b");
    touch(&dir.path().join("tree/a.txt"), b"a");
    touch(&dir.path().join("tree/sub/c.txt"), b"c");
    touch(&dir.path().join("tree/sub/inner/d.txt"), b"d");

    let res = system(dir.path());

    let names: Vec<String> = res.list_files("tree", false).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);

    let mut names: Vec<String> = res.list_files("tree", true).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["a.txt", "b.txt", "sub/c.txt", "sub/inner/d.txt"]
    );

    let mut list = res.list_files("missing", true);
    assert!(list.next_name().is_none());
}

#[test]
fn list_depth_ceiling() {
    let dir = tempfile::tempdir().unwrap();

    let mut path = dir.path().join("deep");
    for _ in 0..MAX_LIST_DEPTH + 4 {
        touch(&path.join("f.txt"), b"f");
        path = path.join("d");
    }

    let res = system(dir.path());
    let names: Vec<String> = res.list_files("deep", true).collect();
    assert_eq!(names.len(), MAX_LIST_DEPTH + 1);

    let deepest = names.iter().map(|v| v.matches('/').count()).max().unwrap();
    assert_eq!(deepest, MAX_LIST_DEPTH);
}
