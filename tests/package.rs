extern crate env_logger;
extern crate respak;
extern crate tempfile;

use std::fs;
use std::io::Write;

use respak::errors::Error;
use respak::res::package::format;
use respak::res::package::prelude::*;
use respak::res::package::PackageRegistry;

fn bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add((i % 7) as u8)).collect()
}

fn archive(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("assets.pkg");
    let mut builder = PackageBuilder::new();
    builder
        .add("Readme.txt", b"hello".to_vec(), false)
        .add("levels/one.bin", bytes(1, 4000), true)
        .add("levels/two.bin", bytes(2, 100), false)
        .add("levels/deep/three.bin", bytes(3, 10), true);
    builder.save(&path).unwrap();
    path
}

#[test]
fn lookup() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let mut pkg = PkgArchive::new("pkg/", archive(&dir));
    pkg.init().unwrap();

    let entry = pkg.file_info("README.TXT").unwrap();
    assert!(!entry.compressed);
    assert_eq!(entry.stored_len, 5);
    assert_eq!(entry.uncompressed_len, 5);

    let mut buf = vec![0; 5];
    entry.file.read_at(&mut buf, entry.offset).unwrap();
    assert_eq!(&buf, b"hello");

    let entry = pkg.file_info("levels/one.bin").unwrap();
    assert!(entry.compressed);
    assert_eq!(entry.uncompressed_len, 4000);
    assert!(entry.stored_len < 4000);

    let mut stored = vec![0; entry.stored_len as usize];
    entry.file.read_at(&mut stored, entry.offset).unwrap();
    let mut output = vec![0; 4000];
    pkg.decompress(&stored, &mut output).unwrap();
    assert_eq!(output, bytes(1, 4000));

    assert!(pkg.file_info("levels/missing.bin").is_none());
    assert!(pkg.file_info("levels").is_none());
}

#[test]
fn streaming_decoder() {
    let dir = tempfile::tempdir().unwrap();
    let mut pkg = PkgArchive::new("pkg/", archive(&dir));
    pkg.init().unwrap();

    let entry = pkg.file_info("levels/one.bin").unwrap();
    let mut stored = vec![0; entry.stored_len as usize];
    entry.file.read_at(&mut stored, entry.offset).unwrap();

    let mut decoder = pkg.decompress_init().unwrap();
    let mut output = vec![0; 4000];
    let mut result = Inflate::NeedMore;
    for chunk in stored.chunks(3) {
        result = decoder.decompress(chunk, &mut output);
        if result != Inflate::NeedMore {
            break;
        }
    }

    assert_eq!(result, Inflate::Complete);
    assert_eq!(decoder.total_out(), 4000);
    assert_eq!(output, bytes(1, 4000));
}

#[test]
fn index_is_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let mut pkg = PkgArchive::new("pkg/", archive(&dir));
    pkg.init().unwrap();

    let entries: Vec<(String, u32)> = pkg.entries().map(|(n, e)| (n.to_owned(), e.hash)).collect();
    assert_eq!(entries.len(), 4);
    for pair in entries.windows(2) {
        let order = format::compare_keys(
            pair[0].1,
            pair[0].0.as_bytes(),
            pair[1].1,
            pair[1].0.as_bytes(),
        );
        assert_eq!(order, std::cmp::Ordering::Less);
    }

    for (name, hash) in &entries {
        assert_eq!(format::hash(&name.to_uppercase()), *hash);
    }

    let mut names = pkg.list_files();
    names.sort();
    assert_eq!(
        names,
        vec!["Readme.txt", "levels/deep/three.bin", "levels/one.bin", "levels/two.bin"]
    );
}

#[test]
fn duplicate_members() {
    let mut builder = PackageBuilder::new();
    builder.add("a.txt", vec![1], false).add("A.TXT", vec![2], false);

    let mut out = Vec::new();
    match builder.write(&mut out) {
        Err(Error::InvalidArgument(_)) => {}
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn corrupt_headers() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let good = fs::read(archive(&dir)).unwrap();

    let corrupt = |at: usize, value: u8| {
        let mut bytes = good.clone();
        bytes[at] = value;
        let path = dir.path().join(format!("bad{}.pkg", at));
        fs::File::create(&path).unwrap().write_all(&bytes).unwrap();
        path
    };

    let mut registry = PackageRegistry::new();
    for &(at, value) in &[(0, b'X'), (4, 2), (5, 15), (6, 21), (11, 0xFF)] {
        let pkg = PkgArchive::new("pkg/", corrupt(at, value));
        match registry.register(Box::new(pkg)) {
            Err(Error::Malformed(..)) => {}
            other => panic!("byte {} accepted: {:?}", at, other.map(|_| ())),
        }
    }

    let short = dir.path().join("short.pkg");
    fs::File::create(&short).unwrap().write_all(&good[..10]).unwrap();
    assert!(registry.register(Box::new(PkgArchive::new("pkg/", short))).is_err());

    assert!(registry.is_empty());
    assert!(registry.find("pkg/Readme.txt").is_none());
}

#[test]
fn registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive(&dir);
    let mut registry = PackageRegistry::new();

    let handle = registry.register(Box::new(PkgArchive::new("pkg/", &path))).unwrap();
    match registry.register(Box::new(PkgArchive::new("PKG/", &path))) {
        Err(Error::PackageExists(_)) => {}
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }

    {
        let (package, rest) = registry.find("Pkg/levels/two.bin").unwrap();
        assert_eq!(rest, "levels/two.bin");
        assert_eq!(package.prefix(), "pkg/");
    }

    assert!(registry.find("other/levels/two.bin").is_none());

    let package = registry.unregister(handle).unwrap();
    assert!(package.file_info("levels/two.bin").is_none());
    assert!(registry.find("pkg/levels/two.bin").is_none());
    assert!(registry.unregister(handle).is_err());
}

#[test]
fn embedded_archive() {
    let dir = tempfile::tempdir().unwrap();
    let inner = fs::read(archive(&dir)).unwrap();

    let mut container = vec![0xAB; 333];
    container.extend_from_slice(&inner);
    container.extend_from_slice(&[0xCD; 77]);

    let path = dir.path().join("container.bin");
    fs::write(&path, &container).unwrap();

    let mut pkg = PkgArchive::embedded("emb/", &path, 333, inner.len() as u64);
    pkg.init().unwrap();
    assert_eq!(pkg.len(), inner.len() as u64);

    let entry = pkg.file_info("readme.txt").unwrap();
    let mut buf = vec![0; 5];
    entry.file.read_at(&mut buf, entry.offset).unwrap();
    assert_eq!(&buf, b"hello");

    let mut pkg = PkgArchive::embedded("emb/", &path, 333, container.len() as u64);
    assert!(pkg.init().is_err());
}
