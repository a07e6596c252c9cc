use std::fs;
use std::path::PathBuf;

use archivizm_scan::{ScanConfig, ScanError, TreeWalker, WalkItem, WarningKind};
use tempfile::TempDir;

fn file_paths(root: &std::path::Path) -> Vec<PathBuf> {
    TreeWalker::new(ScanConfig::new(root))
        .walk()
        .unwrap()
        .filter_map(|item| match item {
            WalkItem::File(record) => Some(record.path),
            _ => None,
        })
        .collect()
}

#[test]
fn test_walk_order_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("b/inner")).unwrap();
    fs::create_dir(root.join("a")).unwrap();
    fs::write(root.join("z.txt"), "z").unwrap();
    fs::write(root.join("a/one.txt"), "1").unwrap();
    fs::write(root.join("b/inner/two.txt"), "2").unwrap();
    fs::write(root.join("b/three.txt"), "3").unwrap();

    let first = file_paths(root);
    let second = file_paths(root);
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[test]
fn test_missing_root_is_fatal() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");

    let result = TreeWalker::new(ScanConfig::new(&missing)).walk();
    assert!(matches!(result, Err(ScanError::NotFound { .. })));
}

#[test]
fn test_file_root_is_not_a_directory() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain.txt");
    fs::write(&file, "data").unwrap();

    let result = TreeWalker::new(ScanConfig::new(&file)).walk();
    assert!(matches!(result, Err(ScanError::NotADirectory { .. })));
}

#[test]
fn test_empty_directory_yields_nothing() {
    let temp = TempDir::new().unwrap();
    let items: Vec<WalkItem> = TreeWalker::new(ScanConfig::new(temp.path()))
        .walk()
        .unwrap()
        .collect();
    assert!(items.is_empty());
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_recorded_not_followed() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir(root.join("real")).unwrap();
    fs::write(root.join("real/data.bin"), "payload").unwrap();
    fs::write(outside.path().join("elsewhere.bin"), "x").unwrap();

    // A link back to an ancestor must not cause a cycle.
    symlink(root, root.join("real/loop")).unwrap();
    symlink(outside.path(), root.join("out")).unwrap();
    symlink(root.join("missing"), root.join("dangling")).unwrap();

    let items: Vec<WalkItem> = TreeWalker::new(ScanConfig::new(root))
        .walk()
        .unwrap()
        .collect();

    let files: Vec<_> = items
        .iter()
        .filter_map(|i| match i {
            WalkItem::File(r) => Some(r.name()),
            _ => None,
        })
        .collect();
    assert_eq!(files, vec!["data.bin".to_string()]);

    let links: Vec<_> = items
        .iter()
        .filter_map(|i| match i {
            WalkItem::Symlink(l) => Some(l.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(links.len(), 3);

    let out = links.iter().find(|l| l.path.ends_with("out")).unwrap();
    assert!(out.outside_root);
    assert!(!out.broken);

    let looped = links.iter().find(|l| l.path.ends_with("loop")).unwrap();
    assert!(!looped.outside_root);

    let dangling = links.iter().find(|l| l.path.ends_with("dangling")).unwrap();
    assert!(dangling.broken);

    let broken_warnings = items
        .iter()
        .filter(|i| matches!(i, WalkItem::Skipped(w) if w.kind == WarningKind::BrokenSymlink))
        .count();
    assert_eq!(broken_warnings, 1);
}

/// Build a directory chain under `root` whose deepest levels exceed the
/// platform path limit, so listing them fails for every user, root included.
/// Each step renames a short top-level path, keeping every call under the limit.
#[cfg(unix)]
fn unlistable_chain(root: &std::path::Path) -> String {
    let name = |level: usize| format!("{level:02}{}", "d".repeat(200));
    fs::create_dir(root.join(name(0))).unwrap();
    for level in 1..24 {
        fs::create_dir(root.join(name(level))).unwrap();
        fs::rename(root.join(name(level - 1)), root.join(name(level)).join(name(level - 1))).unwrap();
    }
    name(23)
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_is_skipped() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let top = unlistable_chain(root);
    fs::write(root.join("visible.txt"), "v").unwrap();

    let items: Vec<WalkItem> = TreeWalker::new(ScanConfig::new(root))
        .walk()
        .unwrap()
        .collect();

    let files: Vec<_> = items
        .iter()
        .filter_map(|i| match i {
            WalkItem::File(r) => Some(r.name()),
            _ => None,
        })
        .collect();
    assert_eq!(files, vec!["visible.txt".to_string()]);

    let skipped: Vec<_> = items
        .iter()
        .filter_map(|i| match i {
            WalkItem::Skipped(w) if w.kind == WarningKind::UnreadableEntry => Some(w),
            _ => None,
        })
        .collect();
    assert!(!skipped.is_empty(), "unlistable directory was dropped silently");
    let top = root.canonicalize().unwrap().join(&top);
    assert!(skipped.iter().all(|w| w.path.starts_with(&top)));
}

#[cfg(unix)]
#[test]
fn test_permission_denied_subdirectory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("locked")).unwrap();
    fs::write(root.join("locked/secret.txt"), "s").unwrap();
    fs::write(root.join("visible.txt"), "v").unwrap();
    fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();
    let enforced = fs::read_dir(root.join("locked")).is_err();

    let items: Vec<WalkItem> = TreeWalker::new(ScanConfig::new(root))
        .walk()
        .unwrap()
        .collect();
    fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

    let secret_listed = items
        .iter()
        .any(|i| matches!(i, WalkItem::File(r) if r.name() == "secret.txt"));
    let locked_skipped = items.iter().any(|i| {
        matches!(i, WalkItem::Skipped(w)
            if w.kind == WarningKind::UnreadableEntry && w.path.ends_with("locked"))
    });

    // Root bypasses permission bits and lists the directory normally.
    assert_eq!(secret_listed, !enforced);
    assert_eq!(locked_skipped, enforced);
}
