//! Per-unit report artifacts.

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use device_reporter_db::Device;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Renders one artifact for a group of devices sharing a unit.
///
/// Called from the blocking pool, so implementations may do plain file I/O.
pub trait ArtifactGenerator: Send + Sync {
    /// File extension of produced artifacts, without the dot.
    fn extension(&self) -> &str;

    fn generate(
        &self,
        output_path: &Path,
        group_key: &str,
        source_file: &str,
        devices: &[Device],
    ) -> Result<()>;
}

/// Where the artifact for `group_key` lands inside `reports_dir`.
///
/// Distinct keys always map to distinct paths.
pub fn artifact_path(reports_dir: &Path, group_key: &str, extension: &str) -> PathBuf {
    reports_dir.join(format!("{}.{}", encode_file_stem(group_key), extension))
}

/// Percent-encode every byte outside `[A-Za-z0-9_-]`.
///
/// `%` itself is encoded, so the mapping is reversible and the result is
/// always a single path component.
fn encode_file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

/// Plain-text report: a short header followed by a device table.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReportGenerator;

impl TextReportGenerator {
    pub fn render(group_key: &str, source_file: &str, devices: &[Device]) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(vec!["N", "MSG ID", "TEXT", "CLASS", "LEVEL", "AREA", "ADDR"]);

        for device in devices {
            table.add_row(vec![
                device.n.to_string(),
                device.msg_id.clone(),
                device.text.clone(),
                device.class.clone(),
                device.level.to_string(),
                device.area.clone(),
                device.addr.clone(),
            ]);
        }

        format!(
            "Device report\n\
             Unit:        {}\n\
             Source file: {}\n\
             Devices:     {}\n\
             Generated:   {}\n\n\
             {}\n",
            group_key,
            source_file,
            devices.len(),
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            table
        )
    }
}

impl ArtifactGenerator for TextReportGenerator {
    fn extension(&self) -> &str {
        "txt"
    }

    fn generate(
        &self,
        output_path: &Path,
        group_key: &str,
        source_file: &str,
        devices: &[Device],
    ) -> Result<()> {
        let dir = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // Write next to the target and rename so readers never see a partial report
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(Self::render(group_key, source_file, devices).as_bytes())
            .context("Failed to write report")?;
        tmp.persist(output_path)
            .with_context(|| format!("Failed to move report into {}", output_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn device(n: i64) -> Device {
        Device {
            n,
            unit_guid: "U1".to_string(),
            msg_id: format!("msg_{n}"),
            text: "Defrost".to_string(),
            class: "waiting".to_string(),
            level: 100,
            area: "LOCAL".to_string(),
            addr: "cold7_status.Defrost_status".to_string(),
            ..Device::default()
        }
    }

    #[test]
    fn test_artifact_path_encodes_group_key() {
        let dir = Path::new("/reports");
        assert_eq!(
            artifact_path(dir, "01749246-95f6-57db", "txt"),
            PathBuf::from("/reports/01749246-95f6-57db.txt")
        );
        assert_eq!(
            artifact_path(dir, "../escape", "txt"),
            PathBuf::from("/reports/%2E%2E%2Fescape.txt")
        );
        assert_eq!(
            artifact_path(dir, "unit 7/ü", "txt"),
            PathBuf::from("/reports/unit%207%2F%C3%BC.txt")
        );
    }

    #[test]
    fn test_artifact_path_keeps_similar_keys_apart() {
        let dir = Path::new("/reports");
        let keys = ["plant.1", "plant_1", "plant%2E1", "plant%5F1"];
        let paths: std::collections::HashSet<PathBuf> =
            keys.iter().map(|k| artifact_path(dir, k, "txt")).collect();
        assert_eq!(paths.len(), keys.len());
        for path in &paths {
            assert_eq!(path.parent(), Some(dir));
        }
    }

    #[test]
    fn test_text_report_lists_every_device() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("U1.txt");

        TextReportGenerator
            .generate(&path, "U1", "a.tsv", &[device(1), device(2)])
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Unit:        U1"));
        assert!(content.contains("Source file: a.tsv"));
        assert!(content.contains("Devices:     2"));
        assert!(content.contains("msg_1"));
        assert!(content.contains("msg_2"));
    }

    #[test]
    fn test_text_report_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("U1.txt");
        std::fs::write(&path, "stale").unwrap();

        TextReportGenerator.generate(&path, "U1", "b.tsv", &[device(7)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
        assert!(content.contains("msg_7"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_reports_dir_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone").join("U1.txt");
        assert!(TextReportGenerator.generate(&path, "U1", "a.tsv", &[device(1)]).is_err());
    }
}
