//! Writing scan results to files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook};
use thiserror::Error;

use archivizm_analyze::{DuplicateRow, project_rows};
use archivizm_core::{DisplayedField, FileRecord, ScanSession};

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export path has no extension: {path}")]
    NoExtension { path: PathBuf },

    #[error("unsupported export format `.{extension}` (use .csv, .xlsx or .json)")]
    Unsupported { extension: String },

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Output format chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
}

impl ExportFormat {
    /// Pick the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let extension = archivizm_core::extension_of(path).ok_or_else(|| ExportError::NoExtension {
            path: path.to_path_buf(),
        })?;
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(ExportError::Unsupported { extension }),
        }
    }
}

/// Export a session to `path`: one row per record for `.csv` and `.xlsx`,
/// or the whole session as JSON.
pub fn export_session(
    session: &ScanSession,
    fields: &[DisplayedField],
    path: &Path,
) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    match format {
        ExportFormat::Csv => write_records_csv(create(path)?, &session.records, fields)?,
        ExportFormat::Json => write_session_json(create(path)?, session)?,
        ExportFormat::Xlsx => write_records_xlsx(path, &session.records, fields)?,
    }

    tracing::info!(path = %path.display(), ?format, records = session.records.len(), "exported");
    Ok(format)
}

/// Export duplicate listing rows to `path`.
pub fn export_duplicates(rows: &[DuplicateRow], path: &Path) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    match format {
        ExportFormat::Csv => write_duplicates_csv(create(path)?, rows)?,
        ExportFormat::Json => {
            let mut writer = create(path)?;
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush().map_err(|source| ExportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        ExportFormat::Xlsx => write_duplicates_xlsx(path, rows)?,
    }
    Ok(format)
}

fn create(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Records as CSV, headed by the field headers.
pub fn write_records_csv<W: Write>(
    writer: W,
    records: &[FileRecord],
    fields: &[DisplayedField],
) -> Result<(), ExportError> {
    let table = project_rows(records, fields);
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(table.headers())?;
    for row in &table.rows {
        csv.write_record(row)?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Duplicate rows as CSV: digest, size, count, joined paths.
pub fn write_duplicates_csv<W: Write>(writer: W, rows: &[DuplicateRow]) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["MD5", "Size", "Count", "Paths"])?;
    for row in rows {
        csv.write_record([
            row.digest.to_hex(),
            row.size.to_string(),
            row.paths.len().to_string(),
            row.joined_paths("; "),
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Records as a single-sheet workbook, headed by the field headers.
/// The size column is written as numbers, everything else as text.
pub fn write_records_xlsx(
    path: &Path,
    records: &[FileRecord],
    fields: &[DisplayedField],
) -> Result<(), ExportError> {
    let table = project_rows(records, fields);
    let numeric: Vec<bool> = fields.iter().map(|f| *f == DisplayedField::Size).collect();
    write_xlsx(path, "Files", &table.headers(), &table.rows, &numeric)
}

/// Duplicate rows as a workbook with the same columns as the CSV listing.
pub fn write_duplicates_xlsx(path: &Path, rows: &[DuplicateRow]) -> Result<(), ExportError> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.digest.to_hex(),
                row.size.to_string(),
                row.paths.len().to_string(),
                row.joined_paths("; "),
            ]
        })
        .collect();
    write_xlsx(
        path,
        "Duplicates",
        &["MD5", "Size", "Count", "Paths"],
        &cells,
        &[false, true, true, false],
    )
}

fn write_xlsx(
    path: &Path,
    sheet: &str,
    headers: &[&str],
    rows: &[Vec<String>],
    numeric: &[bool],
) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell.parse::<u64>() {
                Ok(n) if numeric.get(col).copied().unwrap_or(false) => {
                    worksheet.write_number(r, c, n as f64)?;
                }
                _ => {
                    worksheet.write_string(r, c, cell)?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// The whole session as pretty JSON.
pub fn write_session_json<W: Write>(mut writer: W, session: &ScanSession) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, session)?;
    writer.flush().map_err(serde_json::Error::io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivizm_analyze::{DuplicateView, duplicate_rows};
    use archivizm_core::{ContentDigest, DuplicateGroup, FormatResult, ScanScope, Timestamps, ToolStatus};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn session() -> ScanSession {
        let mut session = ScanSession::new(
            "/media/cd",
            ScanScope::Recursive,
            ToolStatus::Unavailable {
                reason: "not installed".to_string(),
            },
        );
        let mut a = FileRecord::new(
            "/media/cd/a.jpg",
            5,
            Timestamps::with_modified(UNIX_EPOCH + Duration::from_secs(60)),
        );
        a.format = Some(FormatResult::heuristic("JPEG", Some("image/jpeg")));
        a.digest = Some(ContentDigest::new([0xaa; 16]));
        let mut b = a.clone();
        b.path = PathBuf::from("/media/cd/b.jpg");
        session.duplicates = Some(vec![DuplicateGroup {
            digest: ContentDigest::new([0xaa; 16]),
            size: 5,
            members: vec![a.clone(), b.clone()],
        }]);
        session.records = vec![a, b];
        session
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")).unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out.json")).unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("out.xlsx")).unwrap(), ExportFormat::Xlsx);
        assert!(matches!(
            ExportFormat::from_path(Path::new("out.pdf")),
            Err(ExportError::Unsupported { .. })
        ));
        assert!(matches!(
            ExportFormat::from_path(Path::new("out")),
            Err(ExportError::NoExtension { .. })
        ));
    }

    #[test]
    fn test_csv_uses_field_headers() {
        let mut buf = Vec::new();
        write_records_csv(
            &mut buf,
            &session().records,
            &[DisplayedField::Path, DisplayedField::Format, DisplayedField::Method],
        )
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Path,Format,Identification Method"));
        assert_eq!(lines.next(), Some("/media/cd/a.jpg,JPEG,heuristic"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_export_session_files() {
        let temp = TempDir::new().unwrap();
        let session = session();

        let json_path = temp.path().join("report.json");
        assert_eq!(
            export_session(&session, &[DisplayedField::Path], &json_path).unwrap(),
            ExportFormat::Json
        );
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["records"].as_array().unwrap().len(), 2);
        assert_eq!(value["tool_status"]["status"], "unavailable");

        let pdf = temp.path().join("report.pdf");
        assert!(matches!(
            export_session(&session, &[DisplayedField::Path], &pdf),
            Err(ExportError::Unsupported { .. })
        ));
        assert!(!pdf.exists());
    }

    fn workbook_part(path: &Path, name: &str) -> String {
        let file = File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut content = String::new();
        std::io::Read::read_to_string(&mut part, &mut content).unwrap();
        content
    }

    #[test]
    fn test_export_session_xlsx() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.xlsx");
        let fields = [DisplayedField::Path, DisplayedField::Size, DisplayedField::Format];

        assert_eq!(
            export_session(&session(), &fields, &path).unwrap(),
            ExportFormat::Xlsx
        );

        let strings = workbook_part(&path, "xl/sharedStrings.xml");
        for expected in ["Path", "Size", "Format", "/media/cd/a.jpg", "/media/cd/b.jpg", "JPEG"] {
            assert!(strings.contains(expected), "missing {expected}");
        }

        let sheet = workbook_part(&path, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.matches("<row ").count(), 3);
        assert!(sheet.contains("<v>5</v>"));

        let workbook = workbook_part(&path, "xl/workbook.xml");
        assert!(workbook.contains("name=\"Files\""));
    }

    #[test]
    fn test_export_duplicates_xlsx() {
        let temp = TempDir::new().unwrap();
        let session = session();
        let rows = duplicate_rows(&session.records, session.duplicate_groups(), DuplicateView::DuplicatesOnly);
        let path = temp.path().join("dupes.xlsx");

        assert_eq!(export_duplicates(&rows, &path).unwrap(), ExportFormat::Xlsx);

        let strings = workbook_part(&path, "xl/sharedStrings.xml");
        assert!(strings.contains("/media/cd/a.jpg; /media/cd/b.jpg"));
        assert!(strings.contains(&"aa".repeat(16)));
        let sheet = workbook_part(&path, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.matches("<row ").count(), 2);
    }

    #[test]
    fn test_duplicates_csv() {
        let session = session();
        let rows = duplicate_rows(&session.records, session.duplicate_groups(), DuplicateView::DuplicatesOnly);
        let mut buf = Vec::new();
        write_duplicates_csv(&mut buf, &rows).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("MD5,Size,Count,Paths\n"));
        assert!(text.contains("/media/cd/a.jpg; /media/cd/b.jpg"));
    }
}
