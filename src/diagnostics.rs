//! Read-only reporting on resolved units and their releases.
//!
//! Nothing here influences scheduling: the release listing only decorates the
//! verbose table and the upgrade narration.

use std::collections::HashMap;

use crate::domain::release::ReleaseInfo;
use crate::domain::unit::Unit;

/// Index listed releases by name
pub fn release_index(releases: Vec<ReleaseInfo>) -> HashMap<String, ReleaseInfo> {
    releases.into_iter().map(|r| (r.name.clone(), r)).collect()
}

/// `Upgrading release "x": revision 3 (status deployed) -> 4`
pub fn upgrade_message(unit: &Unit, current: Option<&ReleaseInfo>) -> String {
    let mut message = format!("Upgrading release \"{}\"", unit.release_name);
    match current {
        Some(release) => message.push_str(&format!(
            ": revision {} (status {}) -> {}",
            release.revision,
            release.status,
            release.revision.saturating_add(1)
        )),
        None => message.push_str(": deploying first revision"),
    }
    if let Some(version) = &unit.app_version {
        message.push_str(&format!(" (appVersion {})", version));
    }
    message
}

const HEADERS: [&str; 7] = ["subchart", "is alias of", "targeted", "weight", "release", "revision", "status"];

/// Table of units with their current release, as printed in verbose mode
pub fn unit_table(units: &[Unit], releases: &HashMap<String, ReleaseInfo>) -> String {
    let rows: Vec<[String; 7]> = units
        .iter()
        .map(|unit| {
            let release = releases.get(&unit.release_name);
            [
                unit.used_name.clone(),
                if unit.alias.is_some() { unit.name.clone() } else { "-".to_string() },
                unit.targeting_label(),
                unit.weight.to_string(),
                unit.release_name.clone(),
                release.map_or("None".to_string(), |r| r.revision.to_string()),
                release.map_or("-".to_string(), |r| r.status.clone()),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut lines = vec![render(&header[..]), render(&separator[..])];
    lines.extend(rows.iter().map(|row| render(&row[..])));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::unit;

    fn release(name: &str, revision: u32, status: &str) -> ReleaseInfo {
        ReleaseInfo {
            name: name.to_string(),
            namespace: "ns".to_string(),
            revision,
            updated: String::new(),
            status: status.to_string(),
            chart: String::new(),
            app_version: String::new(),
        }
    }

    #[test]
    fn test_upgrade_message_with_existing_release() {
        let mut db = unit("db", 0);
        db.app_version = Some("15.2".to_string());
        let existing = release("db", 3, "deployed");
        assert_eq!(
            upgrade_message(&db, Some(&existing)),
            "Upgrading release \"db\": revision 3 (status deployed) -> 4 (appVersion 15.2)"
        );
    }

    #[test]
    fn test_upgrade_message_first_revision() {
        assert_eq!(
            upgrade_message(&unit("api", 1), None),
            "Upgrading release \"api\": deploying first revision"
        );
    }

    #[test]
    fn test_unit_table() {
        let mut db = unit("db", 0);
        db.name = "postgres".to_string();
        db.alias = Some("db".to_string());
        let mut web = unit("web", 2);
        web.targeted = false;
        let releases = release_index(vec![release("db", 7, "deployed")]);

        let table = unit_table(&[db, unit("api", 1), web], &releases);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("subchart | is alias of | targeted"));
        assert_eq!(lines[2], "db       | postgres    | true     | 0      | db      | 7        | deployed");
        assert!(lines[3].contains("| None     | -"));
        assert!(lines[4].contains("| false    |"));
    }
}
