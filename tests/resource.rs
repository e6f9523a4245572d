extern crate env_logger;
extern crate respak;
extern crate tempfile;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use respak::prelude::*;

struct Testbed {
    dir: tempfile::TempDir,
    res: ResourceSystem,
    stats: Arc<HeadlessStats>,
}

fn testbed_with(setup: impl FnOnce(&mut ResourceParams)) -> Testbed {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();

    let mut params = ResourceParams::default();
    params.path_prefix = dir.path().to_owned();
    setup(&mut params);

    let factory = HeadlessFactory::new();
    let stats = factory.stats();
    let res = ResourceSystem::new(params, Box::new(factory)).unwrap();
    Testbed { dir, res, stats }
}

fn testbed() -> Testbed {
    testbed_with(|_| {})
}

fn write(root: &Path, name: &str, bytes: &[u8]) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Calls `sync` until it reports every load before `mark` as done.
fn sync_until_done(res: &mut ResourceSystem, mgr: ManagerHandle, mark: Mark) {
    for _ in 0..5000 {
        if res.sync(mgr, mark).unwrap() {
            return;
        }

        thread::sleep(Duration::from_millis(1));
    }

    panic!("loads before mark {} never finished", mark);
}

#[test]
fn ids_and_growth() {
    let Testbed { mut res, .. } = testbed();
    let mgr = res.create_manager(2).unwrap();

    let a = res.strdup(mgr, "abc").unwrap();
    let b = res.strdup(mgr, "de").unwrap();
    assert_eq!((a.get(), b.get()), (1, 2));

    let c = res.new_data(mgr, 1, 0, MemFlags::empty()).unwrap();
    assert_eq!(c.get(), 3);
    assert_eq!(res.get_size(mgr, c), Some(1));
    assert_eq!(res.get_data(mgr, c), Some(&[0u8][..]));

    assert_eq!(res.get_data(mgr, a), Some(&b"abc\0"[..]));
    assert_eq!(res.get_size(mgr, a), Some(4));
    assert_eq!(res.get_data(mgr, b), Some(&b"de\0"[..]));

    res.free(mgr, b).unwrap();
    assert_eq!(res.get_data(mgr, b), None);
    assert!(!res.is_stale(mgr, b));
    assert_eq!(res.strdup(mgr, "f").unwrap(), b);

    res.free_all(mgr).unwrap();
    assert_eq!(res.manager(mgr).unwrap().len(), 0);
    assert_eq!(res.live_assets(), 0);
}

#[test]
fn data_round_trips() {
    let Testbed { mut res, .. } = testbed();
    let mgr = res.create_manager(8).unwrap();

    let bytes = pattern(300);
    let id = res.copy_data(mgr, &bytes, 16, MemFlags::TEMP).unwrap();
    assert_eq!(res.get_data(mgr, id), Some(&bytes[..]));
    assert_eq!(res.get_size(mgr, id), Some(300));

    let id = res.take_data(mgr, bytes.clone(), 0, MemFlags::empty()).unwrap();
    assert_eq!(res.get_data(mgr, id), Some(&bytes[..]));

    {
        let (id, buf) = res.get_new_data(mgr, 4, 4, MemFlags::CLEAR).unwrap();
        assert_eq!(buf, &[0, 0, 0, 0]);
        buf.copy_from_slice(b"wxyz");
        assert_eq!(id.get(), 3);
    }

    let id3 = ResourceId::new(3).unwrap();
    assert_eq!(res.get_data(mgr, id3), Some(&b"wxyz"[..]));

    {
        let (_, buf) = res.get_copy_data(mgr, b"12", 0, MemFlags::empty()).unwrap();
        buf[0] = b'3';
    }

    let id4 = ResourceId::new(4).unwrap();
    assert_eq!(res.get_data(mgr, id4), Some(&b"32"[..]));

    let (id, text) = res.get_strdup(mgr, "hello").unwrap();
    assert_eq!(text, "hello");
    assert_eq!(res.get_size(mgr, id), Some(6));

    res.get_data_mut(mgr, id).unwrap()[0] = b'j';
    assert_eq!(res.get_data(mgr, id), Some(&b"jello\0"[..]));
}

#[test]
fn data_honors_alignment() {
    let Testbed { dir, mut res, .. } = testbed();
    write(dir.path(), "a.bin", &pattern(700));

    let path = dir.path().join("aligned.pkg");
    let mut builder = PackageBuilder::new();
    builder.add("packed.bin", pattern(5000), true);
    builder.save(&path).unwrap();
    res.register_package(PkgArchive::new("pkg/", &path)).unwrap();

    let mgr = res.create_manager(16).unwrap();
    let created: Vec<ResourceId> = (0..8)
        .map(|_| res.new_data(mgr, 100, 4096, MemFlags::empty()).unwrap())
        .collect();
    let copied = res.copy_data(mgr, b"abc", 64, MemFlags::TOP).unwrap();
    let taken = res.take_data(mgr, pattern(33), 256, MemFlags::empty()).unwrap();
    let loaded = res.load_data(mgr, "a.bin", 4096, MemFlags::empty()).unwrap();
    let inflated = res.load_data(mgr, "pkg/packed.bin", 128, MemFlags::empty()).unwrap();

    let mark = res.mark(mgr).unwrap();
    res.wait(mgr, mark).unwrap();

    let aligned = |id: ResourceId, align: usize| {
        let bytes = res.get_data(mgr, id).unwrap();
        bytes.as_ptr() as usize % align == 0
    };

    for &id in &created {
        assert!(aligned(id, 4096));
        assert_eq!(res.get_data(mgr, id), Some(&[0u8; 100][..]));
    }

    assert!(aligned(copied, 64));
    assert!(aligned(taken, 256));
    assert!(aligned(loaded, 4096));
    assert!(aligned(inflated, 128));
    assert_eq!(res.get_data(mgr, loaded), Some(&pattern(700)[..]));
    assert_eq!(res.get_data(mgr, inflated), Some(&pattern(5000)[..]));
}

#[test]
fn client_errors() {
    let Testbed { mut res, .. } = testbed();
    let mgr = res.create_manager(4).unwrap();

    match res.new_data(mgr, 0, 0, MemFlags::empty()) {
        Err(Error::InvalidArgument(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    assert!(res.copy_data(mgr, b"x", 3, MemFlags::empty()).is_err());
    assert!(res.load_data(mgr, "", 0, MemFlags::empty()).is_err());

    match res.sync(mgr, 0) {
        Err(Error::InvalidArgument(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    assert!(res.wait(mgr, 0).is_err());

    let id = res.strdup(mgr, "x").unwrap();
    assert_eq!(res.get_texture(mgr, id), None);
    assert_eq!(res.get_sound(mgr, id), None);
    assert!(res.get_file_handle(mgr, id).is_none());

    let unused = ResourceId::new(4).unwrap();
    assert_eq!(res.get_data(mgr, unused), None);
    assert_eq!(res.resource_state(mgr, unused), ResourceState::Err);
    assert!(res.free(mgr, unused).is_err());

    res.destroy_manager(mgr).unwrap();
    match res.strdup(mgr, "y") {
        Err(Error::InvalidManager(h)) => assert_eq!(h, mgr),
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(res.get_data(mgr, id), None);
    assert!(res.mark(mgr).is_err());
}

#[test]
fn missing_names_take_no_slot() {
    let Testbed { mut res, .. } = testbed();
    let mgr = res.create_manager(4).unwrap();

    match res.load_data(mgr, "nowhere.bin", 0, MemFlags::empty()) {
        Err(Error::NotFound(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    assert!(res.load_texture(mgr, "nowhere.png", true).is_err());
    assert_eq!(res.manager(mgr).unwrap().len(), 0);
    assert_eq!(res.loads_in_flight(), 0);
}

#[test]
fn load_host_files() {
    let Testbed { dir, mut res, stats } = testbed();
    write(dir.path(), "blob.bin", &pattern(5000));
    write(dir.path(), "crate.png", &pattern(64));
    write(dir.path(), "font.fnt", b"bitmap");
    write(dir.path(), "font.ttf", b"scalable");
    write(dir.path(), "theme.ogg", &pattern(128));

    let mgr = res.create_manager(0).unwrap();
    let blob = res.load_data(mgr, "blob.bin", 0, MemFlags::empty()).unwrap();
    let texture = res.load_texture(mgr, "crate.png", true).unwrap();
    let bitmap = res.load_bitmap_font(mgr, "font.fnt").unwrap();
    let freetype = res.load_freetype_font(mgr, "font.ttf").unwrap();
    let sound = res.load_sound(mgr, "theme.ogg").unwrap();

    assert!(res.slot(mgr, blob).unwrap().is_loading());
    assert_eq!(res.resource_state(mgr, blob), ResourceState::NotReady);

    let mark = res.mark(mgr).unwrap();
    res.wait(mgr, mark).unwrap();
    assert_eq!(res.loads_in_flight(), 0);

    assert_eq!(res.get_data(mgr, blob), Some(&pattern(5000)[..]));
    assert!(res.get_texture(mgr, texture).is_some());
    assert!(res.get_font(mgr, bitmap).is_some());
    assert!(res.get_font(mgr, freetype).is_some());
    assert!(res.get_sound(mgr, sound).is_some());
    assert_eq!(res.resource_state(mgr, sound), ResourceState::Ok);
    assert_eq!(stats.live(), 4);

    res.destroy_manager(mgr).unwrap();
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.bad_destroys(), 0);
}

#[test]
fn failed_parse_leaves_empty_slot() {
    let Testbed { dir, mut res, stats } = testbed();
    write(dir.path(), "empty.png", b"");

    let mgr = res.create_manager(4).unwrap();
    let id = res.load_texture(mgr, "empty.png", false).unwrap();
    let mark = res.mark(mgr).unwrap();
    res.wait(mgr, mark).unwrap();

    assert_eq!(res.get_texture(mgr, id), None);
    assert_eq!(res.resource_state(mgr, id), ResourceState::Err);
    assert_eq!(res.slot(mgr, id).unwrap().kind(), SlotKind::Texture);
    assert_eq!(stats.live(), 0);

    res.free(mgr, id).unwrap();
}

#[test]
fn marks_select_loads() {
    let Testbed { dir, mut res, .. } = testbed();
    write(dir.path(), "a.bin", b"aaaa");
    write(dir.path(), "b.bin", b"bbbb");

    let mgr = res.create_manager(4).unwrap();
    let a = res.load_data(mgr, "a.bin", 0, MemFlags::empty()).unwrap();
    let first = res.mark(mgr).unwrap();

    res.set_block_loads(true);
    let b = res.load_data(mgr, "b.bin", 0, MemFlags::empty()).unwrap();
    let second = res.mark(mgr).unwrap();
    assert!(second > first);

    res.wait(mgr, first).unwrap();
    assert_eq!(res.get_data(mgr, a), Some(&b"aaaa"[..]));
    assert_eq!(res.resource_state(mgr, b), ResourceState::NotReady);

    assert!(!res.sync(mgr, second).unwrap());
    assert!(res.sync(mgr, first).unwrap());

    res.set_block_loads(false);
    sync_until_done(&mut res, mgr, second);
    assert_eq!(res.get_data(mgr, b), Some(&b"bbbb"[..]));
    assert!(res.manager(mgr).unwrap().slots().iter().all(|v| !v.is_loading()));
}

#[test]
fn blocked_loads() {
    let Testbed { dir, mut res, .. } = testbed();
    write(dir.path(), "a.bin", b"blocked");

    let mgr = res.create_manager(4).unwrap();
    res.set_block_loads(true);

    let id = res.load_data(mgr, "a.bin", 0, MemFlags::empty()).unwrap();
    let mark = res.mark(mgr).unwrap();

    thread::sleep(Duration::from_millis(20));
    assert!(!res.sync(mgr, mark).unwrap());
    assert!(!res.sync(mgr, mark).unwrap());
    assert_eq!(res.get_data(mgr, id), None);

    res.set_block_loads(false);
    sync_until_done(&mut res, mgr, mark);
    assert_eq!(res.get_data(mgr, id), Some(&b"blocked"[..]));
}

#[test]
fn few_read_slots() {
    for &order in &[WaitOrder::Forward, WaitOrder::Reverse] {
        let Testbed { dir, mut res, .. } = testbed_with(|params| {
            params.async_read_slots = 2;
            params.io_threads = 1;
            params.wait_order = order;
        });

        let mgr = res.create_manager(0).unwrap();
        let mut ids = Vec::new();
        for i in 0..24 {
            let name = format!("files/{}.bin", i);
            write(dir.path(), &name, &pattern(100 + i));
            ids.push(res.load_data(mgr, &name, 0, MemFlags::empty()).unwrap());
        }

        let mark = res.mark(mgr).unwrap();
        res.wait(mgr, mark).unwrap();

        for (i, &id) in ids.iter().enumerate() {
            assert_eq!(res.get_data(mgr, id), Some(&pattern(100 + i)[..]));
        }

        assert_eq!(res.loads_in_flight(), 0);
    }
}

#[test]
fn few_read_slots_sync() {
    let Testbed { dir, mut res, .. } = testbed_with(|params| {
        params.async_read_slots = 1;
        params.io_threads = 1;
    });

    let mgr = res.create_manager(0).unwrap();
    let ids: Vec<ResourceId> = (0..8)
        .map(|i| {
            let name = format!("{}.bin", i);
            write(dir.path(), &name, &[i as u8; 32]);
            res.load_data(mgr, &name, 0, MemFlags::empty()).unwrap()
        })
        .collect();

    let mark = res.mark(mgr).unwrap();
    sync_until_done(&mut res, mgr, mark);

    for (i, &id) in ids.iter().enumerate() {
        assert_eq!(res.get_data(mgr, id), Some(&[i as u8; 32][..]));
    }
}

#[test]
fn free_while_loading() {
    let Testbed { dir, mut res, stats } = testbed();
    write(dir.path(), "big.bin", &pattern(1 << 20));
    write(dir.path(), "tex.png", &pattern(16));

    let mgr = res.create_manager(4).unwrap();
    let data = res.load_data(mgr, "big.bin", 0, MemFlags::empty()).unwrap();
    let texture = res.load_texture(mgr, "tex.png", false).unwrap();
    assert_eq!(res.loads_in_flight(), 2);

    res.free(mgr, data).unwrap();
    assert_eq!(res.loads_in_flight(), 1);

    res.free_all(mgr).unwrap();
    assert_eq!(res.loads_in_flight(), 0);
    assert_eq!(res.get_texture(mgr, texture), None);

    let mark = res.mark(mgr).unwrap();
    assert!(res.sync(mgr, mark).unwrap());
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.bad_destroys(), 0);
}

#[test]
fn packages_load_through_links() {
    let Testbed { dir, mut res, .. } = testbed();

    let path = dir.path().join("assets.pkg");
    let mut builder = PackageBuilder::new();
    builder
        .add("foo.bin", pattern(3000), false)
        .add("packed.bin", pattern(9000), true);
    builder.save(&path).unwrap();
    let handle = res.register_package(PkgArchive::new("pkg/", &path)).unwrap();

    let mgr = res.create_manager(4).unwrap();
    let mgr2 = res.create_manager(4).unwrap();

    let i = res.load_data(mgr, "pkg/foo.bin", 0, MemFlags::empty()).unwrap();
    let j = res.link(mgr2, mgr, i).unwrap();

    let load = res.slot(mgr, i).unwrap().load();
    assert!(load.is_some());
    assert_eq!(res.slot(mgr2, j).unwrap().load(), load);
    assert_eq!(res.slot(mgr2, j).unwrap().kind(), SlotKind::Data);

    let packed = res.load_data(mgr, "PKG/Packed.bin", 0, MemFlags::empty()).unwrap();

    assert!(res.unregister_package(handle).is_err());

    let mark = res.mark(mgr).unwrap();
    sync_until_done(&mut res, mgr, mark);

    assert_eq!(res.get_data(mgr, i), Some(&pattern(3000)[..]));
    assert_eq!(res.get_data(mgr2, j), res.get_data(mgr, i));
    assert_eq!(res.slot(mgr2, j).unwrap().load(), None);
    assert_eq!(res.slot(mgr2, j).unwrap().asset(), res.slot(mgr, i).unwrap().asset());
    assert_eq!(res.get_data(mgr, packed), Some(&pattern(9000)[..]));

    assert!(res.unregister_package(handle).is_ok());
    assert_eq!(res.get_data(mgr2, j), Some(&pattern(3000)[..]));
}

#[test]
fn weak_links_go_stale() {
    let Testbed { mut res, .. } = testbed();
    let mgr = res.create_manager(4).unwrap();
    let mgr2 = res.create_manager(4).unwrap();

    let i = res.copy_data(mgr, b"shared", 0, MemFlags::empty()).unwrap();
    let k = res.link_weak(mgr2, mgr, i).unwrap();
    assert!(res.slot(mgr2, k).unwrap().is_weak());
    assert_eq!(res.get_data(mgr2, k), Some(&b"shared"[..]));
    assert!(!res.is_stale(mgr2, k));

    res.free(mgr, i).unwrap();
    assert!(res.is_stale(mgr2, k));
    assert_eq!(res.get_data(mgr2, k), None);
    assert_eq!(res.resource_state(mgr2, k), ResourceState::Err);
    assert_eq!(res.live_assets(), 0);

    match res.link(mgr, mgr2, k) {
        Err(Error::StaleLink(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(res.manager(mgr).unwrap().len(), 0);
    res.free(mgr2, k).unwrap();
    assert!(!res.is_stale(mgr2, k));
}

#[test]
fn strong_links_survive_their_source() {
    let Testbed { dir, mut res, stats } = testbed();
    write(dir.path(), "shared.png", &pattern(40));
    write(dir.path(), "shared.bin", b"same bytes");

    let a = res.create_manager(4).unwrap();
    let b = res.create_manager(4).unwrap();

    let in_a = res.load_data(a, "shared.bin", 0, MemFlags::empty()).unwrap();
    let own_b = res.load_data(b, "shared.bin", 0, MemFlags::empty()).unwrap();
    let linked = res.link(b, a, in_a).unwrap();
    let weak = res.link_weak(b, a, in_a).unwrap();

    let texture = res.load_texture(a, "shared.png", false).unwrap();
    let texture_b = res.link(b, a, texture).unwrap();

    res.free(a, in_a).unwrap();
    res.free(a, texture).unwrap();

    let mark = res.mark(b).unwrap();
    res.wait(b, mark).unwrap();

    assert_eq!(res.get_data(b, own_b), Some(&b"same bytes"[..]));
    assert_eq!(res.get_data(b, linked), Some(&b"same bytes"[..]));
    assert_eq!(res.get_data(b, weak), Some(&b"same bytes"[..]));
    assert!(res.get_texture(b, texture_b).is_some());
    assert_eq!(stats.live(), 1);

    res.free(b, linked).unwrap();
    assert!(res.is_stale(b, weak));
    assert_eq!(res.get_data(b, own_b), Some(&b"same bytes"[..]));

    res.free_all(b).unwrap();
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.bad_destroys(), 0);
}

#[test]
fn files() {
    let Testbed { dir, mut res, .. } = testbed();
    write(dir.path(), "notes.txt", b"0123456789");

    let path = dir.path().join("assets.pkg");
    let mut builder = PackageBuilder::new();
    builder
        .add("plain.txt", b"abcdef".to_vec(), false)
        .add("packed.txt", pattern(500), true);
    builder.save(&path).unwrap();
    res.register_package(PkgArchive::new("pkg/", &path)).unwrap();

    let mgr = res.create_manager(4).unwrap();
    let id = res.open_file(mgr, "notes.txt").unwrap();
    assert_eq!(res.get_file_size(mgr, id), Some(10));
    assert_eq!(res.get_file_position(mgr, id), Some(0));

    let mut buf = [0; 4];
    assert_eq!(res.read_file(mgr, id, &mut buf).unwrap(), 4);
    assert_eq!(&buf, b"0123");
    assert_eq!(res.get_file_position(mgr, id), Some(4));

    assert_eq!(res.read_file_at(mgr, id, &mut buf, 8).unwrap(), 2);
    assert_eq!(&buf[..2], b"89");
    assert_eq!(res.get_file_position(mgr, id), Some(4));

    res.set_file_position(mgr, id, 100).unwrap();
    assert_eq!(res.get_file_position(mgr, id), Some(10));
    assert_eq!(res.read_file(mgr, id, &mut buf).unwrap(), 0);

    let member = res.open_file(mgr, "pkg/plain.txt").unwrap();
    assert_eq!(res.get_file_size(mgr, member), Some(6));
    let mut all = [0; 16];
    assert_eq!(res.read_file(mgr, member, &mut all).unwrap(), 6);
    assert_eq!(&all[..6], b"abcdef");
    assert_eq!(res.get_file_handle(mgr, member).unwrap().size(), 6);

    match res.open_file(mgr, "pkg/packed.txt") {
        Err(Error::InvalidArgument(_)) => {}
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(res.get_data(mgr, id), None);
    assert!(res.read_file(mgr, ResourceId::new(9).unwrap(), &mut buf).is_err());
}

#[test]
fn sounds_from_files() {
    let Testbed { dir, mut res, stats } = testbed();
    write(dir.path(), "music.ogg", &pattern(256));

    let files = res.create_manager(4).unwrap();
    let sounds = res.create_manager(4).unwrap();

    let streamed = res.open_sound(sounds, "music.ogg").unwrap();
    assert!(res.get_sound(sounds, streamed).is_some());

    let file = res.open_file(files, "music.ogg").unwrap();
    let from_file = res.open_sound_from_file(sounds, files, file).unwrap();
    assert!(res.get_sound(sounds, from_file).is_some());
    assert!(res.slot(files, file).is_none());
    assert_eq!(stats.live(), 2);

    assert!(res.open_sound_from_file(sounds, files, file).is_err());

    let texture = res.new_texture(sounds, 16, 16).unwrap();
    assert!(res.get_texture(sounds, texture).is_some());
    let display = res.new_texture_from_display(sounds).unwrap();
    assert!(res.get_texture(sounds, display).is_some());
    assert_eq!(stats.live(), 4);

    res.destroy_manager(sounds).unwrap();
    res.destroy_manager(files).unwrap();
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.bad_destroys(), 0);
}

#[test]
fn taken_handles() {
    let Testbed { mut res, .. } = testbed();
    let mut other = HeadlessFactory::new();
    let texture = other.create_texture(4, 4).unwrap();
    let sound = other.create_sound(vec![1, 2, 3]).unwrap();

    let mgr = res.create_manager(4).unwrap();
    let t = res.take_texture(mgr, texture).unwrap();
    let s = res.take_sound(mgr, sound).unwrap();

    assert_eq!(res.get_texture(mgr, t), Some(texture));
    assert_eq!(res.get_sound(mgr, s), Some(sound));
    assert_eq!(res.slot(mgr, s).unwrap().kind(), SlotKind::Sound);
}

#[test]
fn declared_managers() {
    let Testbed { mut res, .. } = testbed();
    let mgr = res.declare_manager(16);

    assert!(!res.manager(mgr).unwrap().is_initialized());
    assert_eq!(res.get_data(mgr, ResourceId::new(1).unwrap()), None);
    assert!(res.manager(mgr).unwrap().slots().is_empty());
    assert!(!res.manager(mgr).unwrap().is_initialized());

    let id = res.strdup(mgr, "lazy").unwrap();
    assert!(res.manager(mgr).unwrap().is_initialized());
    assert!(res.manager(mgr).unwrap().capacity() >= 16);
    assert_eq!(res.get_data(mgr, id), Some(&b"lazy\0"[..]));
}

#[test]
fn background_toggle() {
    let Testbed { mut res, .. } = testbed();
    assert!(res.set_background_decompression(true, 0, 0, 2).is_err());
    assert!(!res.params().background.enabled);

    res.set_background_decompression(true, 512, 128, 1).unwrap();
    assert!(res.params().background.enabled);
    assert_eq!(res.params().background.threshold, 512);

    res.set_background_decompression(false, 512, 128, 1).unwrap();
    assert!(!res.params().background.enabled);
}
