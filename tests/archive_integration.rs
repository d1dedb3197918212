//! Archive and virtual file system integration tests.
//!
//! Packs are built with `PackBuilder` into a temporary directory, then
//! mounted through `VirtualFileSystem` or `ResourceManager`.
//!
//! ```sh
//! cargo test --test archive_integration
//! ```

use std::fs;
use std::path::Path;

use stgres::archive::builder::PackBuilder;
use stgres::archive::zip::CompressionMethod;
use stgres::archive::{normalize_path, ArchivePack};
use stgres::error::ResourceError;
use stgres::resources::resourcemgr::ResourceManager;
use stgres::resources::vfs::VirtualFileSystem;

// =============================================================================
// Helpers
// =============================================================================

fn build_pack(dir: &Path, file: &str, password: Option<&str>, files: &[(&str, &[u8])]) -> String {
    let mut builder = PackBuilder::new();
    if let Some(password) = password {
        builder = builder.password(password);
    }
    for (i, (name, data)) in files.iter().enumerate() {
        let method = if i % 2 == 0 {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        builder = builder.add_file(*name, data.to_vec(), method);
    }
    let path = dir.join(file);
    builder.write_to_file(&path).unwrap();
    path.to_string_lossy().into_owned()
}

// =============================================================================
// Path normalization
// =============================================================================

#[test]
fn normalize_unifies_separators_and_case() {
    assert_eq!(normalize_path("Images/Foo.PNG"), "images\\foo.png");
    assert_eq!(normalize_path("images\\foo.png"), "images\\foo.png");
    assert_eq!(normalize_path("a/b\0ignored"), "a\\b");
    assert_eq!(normalize_path(""), "");
}

#[test]
fn pack_lookup_ignores_case_and_separator() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_pack(
        dir.path(),
        "data.zip",
        None,
        &[("Images/Boss.png", b"boss"), ("readme.txt", b"hi")],
    );
    let mut pack = ArchivePack::open(&path, None).unwrap();
    assert_eq!(pack.len(), 2);
    assert!(pack.contains("images\\boss.PNG"));
    assert_eq!(pack.load_file("IMAGES/BOSS.PNG").unwrap(), b"boss");
    assert!(pack.load_file("missing.txt").unwrap_err().is_not_found());
}

// =============================================================================
// Protected packs
// =============================================================================

#[test]
fn protected_pack_reads_with_right_password() {
    let dir = tempfile::tempdir().unwrap();
    let payload = vec![7u8; 4096];
    let path = build_pack(
        dir.path(),
        "secret.zip",
        Some("hunter2"),
        &[("stage/enemy.psi", &payload), ("stage/notes.txt", b"stored entry")],
    );
    let mut pack = ArchivePack::open(&path, Some("hunter2")).unwrap();
    assert!(pack.has_password());
    assert_eq!(pack.load_file("stage/enemy.psi").unwrap(), payload);
    assert_eq!(pack.load_file("stage/notes.txt").unwrap(), b"stored entry");
}

#[test]
fn wrong_password_is_extract_failure_not_panic() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_pack(dir.path(), "secret.zip", Some("right"), &[("a.txt", b"payload")]);

    let mut wrong = ArchivePack::open(&path, Some("wrong")).unwrap();
    assert!(matches!(
        wrong.load_file("a.txt"),
        Err(ResourceError::ExtractFailed { .. })
    ));

    let mut missing = ArchivePack::open(&path, None).unwrap();
    assert!(matches!(
        missing.load_file("a.txt"),
        Err(ResourceError::ExtractFailed { .. })
    ));
}

#[test]
fn opening_non_archive_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not_a_pack.zip");
    fs::write(&path, b"definitely not a zip file").unwrap();
    let err = ArchivePack::open(&path.to_string_lossy(), None).unwrap_err();
    assert!(matches!(err, ResourceError::ArchiveOpen { .. }));
    assert!(err.is_archive_error());
}

// =============================================================================
// Virtual file system
// =============================================================================

#[test]
fn latest_mounted_pack_wins() {
    let dir = tempfile::tempdir().unwrap();
    let base = build_pack(dir.path(), "base.zip", None, &[("shared.txt", b"base")]);
    let patch = build_pack(dir.path(), "patch.zip", None, &[("shared.txt", b"patch")]);

    let mut vfs = VirtualFileSystem::new();
    vfs.load_pack(&base, None).unwrap();
    vfs.load_pack(&patch, None).unwrap();
    assert_eq!(vfs.load_file("shared.txt").unwrap(), b"patch");

    vfs.unload_pack(&patch);
    assert_eq!(vfs.load_file("shared.txt").unwrap(), b"base");
}

#[test]
fn mounting_twice_keeps_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_pack(dir.path(), "data.zip", None, &[("a.txt", b"a")]);

    let mut vfs = VirtualFileSystem::new();
    vfs.load_pack(&path, None).unwrap();
    vfs.load_pack(&path, None).unwrap();
    // Same normalized path, recognized without reopening
    vfs.load_pack(&path.to_uppercase(), None).unwrap();
    assert_eq!(vfs.pack_count(), 1);
    assert!(vfs.is_pack_mounted(&path.replace('/', "\\")));

    vfs.unload_pack("never/mounted.zip");
    assert_eq!(vfs.pack_count(), 1);
    vfs.unload_all_packs();
    assert_eq!(vfs.pack_count(), 0);
}

#[test]
fn falls_back_to_native_files() {
    let dir = tempfile::tempdir().unwrap();
    let loose = dir.path().join("loose.txt");
    fs::write(&loose, b"from disk").unwrap();

    let mut vfs = VirtualFileSystem::new();
    assert_eq!(vfs.load_file(&loose.to_string_lossy()).unwrap(), b"from disk");
    assert!(vfs.load_file("/no/such/file.txt").unwrap_err().is_not_found());
}

#[test]
fn failed_pack_extraction_surfaces_when_nothing_else_has_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_pack(dir.path(), "locked.zip", Some("right"), &[("only_here.txt", b"x")]);

    let mut vfs = VirtualFileSystem::new();
    vfs.load_pack(&path, Some("wrong")).unwrap();
    assert!(matches!(
        vfs.load_file("only_here.txt"),
        Err(ResourceError::ExtractFailed { .. })
    ));
}

#[test]
fn missing_pack_is_not_mounted() {
    let mut vfs = VirtualFileSystem::new();
    assert!(vfs.load_pack("/no/such/pack.zip", None).is_err());
    assert_eq!(vfs.pack_count(), 0);
}

// =============================================================================
// Extraction through the manager
// =============================================================================

#[test]
fn extract_resource_copies_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let payload: Vec<u8> = (0..=255).cycle().take(10_000).collect();
    let path = build_pack(
        dir.path(),
        "data.zip",
        Some("pw"),
        &[("music/bgm.ogg", &payload), ("empty.bin", b"")],
    );

    let mut manager = ResourceManager::new();
    manager.load_pack(&path, Some("pw")).unwrap();

    let target = dir.path().join("bgm.ogg");
    manager
        .extract_resource("music\\BGM.ogg", &target.to_string_lossy())
        .unwrap();
    assert_eq!(fs::read(&target).unwrap(), payload);
    assert_eq!(
        manager.load_file(&target.to_string_lossy()).unwrap(),
        manager.load_file("music/bgm.ogg").unwrap()
    );

    let empty_target = dir.path().join("empty.bin");
    fs::write(&empty_target, b"stale contents").unwrap();
    manager
        .extract_resource("empty.bin", &empty_target.to_string_lossy())
        .unwrap();
    assert!(fs::read(&empty_target).unwrap().is_empty());
}

#[test]
fn extract_missing_source_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.bin");
    let mut manager = ResourceManager::new();
    assert!(manager
        .extract_resource("no/such/entry.bin", &target.to_string_lossy())
        .unwrap_err()
        .is_not_found());
    assert!(!target.exists());
}

#[test]
fn builder_packs_a_directory_tree() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("assets");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("top.txt"), b"top").unwrap();
    fs::write(src.join("sub").join("deep.txt"), b"deep").unwrap();

    let out = dir.path().join("assets.zip");
    let builder = PackBuilder::new()
        .add_dir(&src, CompressionMethod::Deflated)
        .unwrap();
    assert_eq!(builder.len(), 2);
    builder.write_to_file(&out).unwrap();

    let mut pack = ArchivePack::open(&out.to_string_lossy(), None).unwrap();
    assert_eq!(pack.load_file("sub\\deep.txt").unwrap(), b"deep");
    assert_eq!(pack.load_file("top.txt").unwrap(), b"top");
}
