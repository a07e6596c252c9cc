use archivizm_core::{
    ContentDigest, DuplicateGroup, FileRecord, FormatMethod, FormatResult, ScanConfig, ScanScope,
    ScanSession, ScanWarning, Settings, Timestamps, ToolStatus, WarningKind,
};
use std::path::PathBuf;
use std::time::SystemTime;

fn record(path: &str, size: u64) -> FileRecord {
    FileRecord::new(path, size, Timestamps::with_modified(SystemTime::now()))
}

#[test]
fn test_content_digest_equality_and_hex() {
    let digest = ContentDigest::new([0x5d; 16]);
    let same = ContentDigest::new([0x5d; 16]);
    let other = ContentDigest::new([0x00; 16]);

    assert_eq!(digest, same);
    assert_ne!(digest, other);

    let hex = digest.to_hex();
    assert_eq!(hex.len(), 32);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_timestamps() {
    let now = SystemTime::now();
    let timestamps = Timestamps::with_modified(now);

    assert_eq!(timestamps.modified, now);
    assert!(timestamps.accessed.is_none());
    assert!(timestamps.created.is_none());

    let created = now - std::time::Duration::from_secs(7200);
    let full = Timestamps::new(now, None, Some(created));
    assert_eq!(full.created, Some(created));
}

#[test]
fn test_format_results() {
    let tool = FormatResult::from_tool(
        "JPEG File Interchange Format",
        Some("fmt/43".into()),
        Some("image/jpeg".into()),
        Some("1.01".into()),
        "{\"files\":[]}".to_string(),
    );
    assert_eq!(tool.method, FormatMethod::ExternalTool);
    assert!(tool.raw_output.is_some());
    assert!(tool.is_recognized());

    let heuristic = FormatResult::heuristic("JPEG", Some("image/jpeg"));
    assert_eq!(heuristic.method, FormatMethod::Heuristic);
    assert!(heuristic.raw_output.is_none());
    assert!(heuristic.puid.is_none());

    let unknown = FormatResult::unrecognized();
    assert!(!unknown.is_recognized());
}

#[test]
fn test_record_enrichment() {
    let mut file = record("/media/cd/IMG_0001.JPG", 2048);
    assert_eq!(file.format_method(), FormatMethod::Unrecognized);

    file.format = Some(FormatResult::heuristic("JPEG", Some("image/jpeg")));
    file.digest = Some(ContentDigest::new([1; 16]));

    assert_eq!(file.format_label(), "JPEG");
    assert_eq!(file.format_method(), FormatMethod::Heuristic);
    assert_eq!(file.extension().as_deref(), Some("jpg"));
}

#[test]
fn test_format_result_serializes_method_names() {
    let result = FormatResult::heuristic("PNG", None);
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"method\":\"heuristic\""));
    assert!(!json.contains("raw_output"));
}

#[test]
fn test_duplicate_group_paths() {
    let group = DuplicateGroup {
        digest: ContentDigest::new([2; 16]),
        size: 5,
        members: vec![record("/r/a.txt", 5), record("/r/b.txt", 5)],
    };
    let paths: Vec<PathBuf> = group.paths().map(|p| p.to_path_buf()).collect();
    assert_eq!(paths, vec![PathBuf::from("/r/a.txt"), PathBuf::from("/r/b.txt")]);
    assert_eq!(group.reclaimable_bytes(), 5);
}

#[test]
fn test_session_error_log() {
    let mut session = ScanSession::new(
        "/media/floppy",
        ScanScope::Flat,
        ToolStatus::Available {
            executable: PathBuf::from("/usr/bin/sf"),
            signature_file: PathBuf::from("/home/a/siegfried/default.sig"),
        },
    );
    assert!(!session.is_degraded());

    session
        .errors
        .push(ScanWarning::hash_failure("/media/floppy/bad.bin", "short read"));
    assert!(session.has_errors());
    assert_eq!(
        session.errors.iter().next().map(|w| w.kind),
        Some(WarningKind::HashFailure)
    );
}

#[test]
fn test_scan_config_roundtrip_through_serde() {
    let config = ScanConfig::builder()
        .root("/media/zip")
        .scope(ScanScope::Flat)
        .ignore_patterns(vec!["*.tmp".to_string()])
        .build()
        .unwrap();

    let json = serde_json::to_string(&config).unwrap();
    let back: ScanConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.root, config.root);
    assert_eq!(back.scope, ScanScope::Flat);
    assert_eq!(back.ignore_patterns, vec!["*.tmp".to_string()]);
}

#[test]
fn test_settings_defaults() {
    let settings = Settings::default();
    assert!(!settings.exclude_empty_duplicates);
    assert!(settings.export_path.is_none());
    assert!(!settings.fields().is_empty());
}
