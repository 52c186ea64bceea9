//! Challenge directory scanner.
//!
//! Every subdirectory of the scanned root that has an `info.json` becomes a
//! catalog challenge. Entries are matched by title, so re-seeding updates a
//! challenge in place and keeps its id.

use std::{
    fs,
    path::{Path, PathBuf},
};

use ctfvm_model::Challenge;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{error::CatalogError, store::CatalogData};

const INFO_FILE: &str = "info.json";
const DOCKERFILE: &str = "Dockerfile";
const MAKEFILE: &str = "Makefile";

/// Contents of a challenge's `info.json`.
#[derive(Debug, Clone, Deserialize)]
struct ChallengeInfo {
    title: String,
    #[serde(default)]
    description: String,
    category: String,
    #[serde(default)]
    points: u32,
    #[serde(default)]
    flag: String,
}

/// A challenge found on disk, not yet assigned an id.
#[derive(Debug, Clone)]
pub struct ScannedChallenge {
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub category: String,
    pub points: u32,
    pub flag: String,
    pub requires_vm: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Read every `<dir>/*/info.json`. Unreadable entries are logged and counted as skipped.
pub fn scan_challenges(dir: &Path) -> Result<(Vec<ScannedChallenge>, usize), CatalogError> {
    let entries = fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::io(dir, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut found = Vec::with_capacity(paths.len());
    let mut skipped = 0;
    for path in paths {
        match read_challenge(&path) {
            Ok(ch) => {
                debug!(
                    title = %ch.title,
                    category = %ch.category,
                    points = ch.points,
                    requires_vm = ch.requires_vm,
                    "challenge scanned"
                );
                found.push(ch);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping challenge");
                skipped += 1;
            }
        }
    }
    Ok((found, skipped))
}

fn read_challenge(path: &Path) -> Result<ScannedChallenge, CatalogError> {
    let info_path = path.join(INFO_FILE);
    let raw = fs::read(&info_path).map_err(|e| CatalogError::io(&info_path, e))?;
    let info: ChallengeInfo =
        serde_json::from_slice(&raw).map_err(|source| CatalogError::Parse {
            path: info_path.clone(),
            source,
        })?;

    let requires_vm = path.join(DOCKERFILE).is_file();
    if !requires_vm && !path.join(MAKEFILE).is_file() {
        warn!(title = %info.title, "challenge has neither {DOCKERFILE} nor {MAKEFILE}");
    }

    Ok(ScannedChallenge {
        path: path.to_path_buf(),
        title: info.title,
        description: info.description,
        category: info.category,
        points: info.points,
        flag: info.flag,
        requires_vm,
    })
}

/// Merge `scanned` into `data` keyed by title. New challenges get `max(id) + 1`.
pub fn upsert(data: &mut CatalogData, scanned: Vec<ScannedChallenge>) -> SeedReport {
    let mut report = SeedReport::default();
    let mut next_id = data.challenges.iter().map(|c| c.id).max().unwrap_or(0) + 1;

    for s in scanned {
        match data.challenges.iter_mut().find(|c| c.title == s.title) {
            Some(existing) => {
                existing.description = s.description;
                existing.category = s.category;
                existing.points = s.points;
                existing.flag = s.flag;
                existing.requires_vm = s.requires_vm;
                report.updated += 1;
            }
            None => {
                data.challenges.push(Challenge {
                    id: next_id,
                    title: s.title,
                    description: s.description,
                    category: s.category,
                    points: s.points,
                    flag: s.flag,
                    requires_vm: s.requires_vm,
                });
                next_id += 1;
                report.added += 1;
            }
        }
    }
    report
}

/// Scan `source` and write the merged result to `catalog_path`.
pub fn seed(source: &Path, catalog_path: &Path) -> Result<SeedReport, CatalogError> {
    info!(source = %source.display(), catalog = %catalog_path.display(), "seeding catalog");

    let (scanned, skipped) = scan_challenges(source)?;
    let mut data = CatalogData::read_or_default(catalog_path)?;
    let mut report = upsert(&mut data, scanned);
    report.skipped = skipped;
    data.write_pretty(catalog_path)?;

    info!(
        added = report.added,
        updated = report.updated,
        skipped = report.skipped,
        "catalog seeded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge_dir(root: &Path, name: &str, info: &str, files: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(INFO_FILE), info).unwrap();
        for f in files {
            fs::write(dir.join(f), "").unwrap();
        }
    }

    #[test]
    fn scan_detects_vm_challenges_and_skips_broken() {
        let root = tempfile::tempdir().unwrap();
        challenge_dir(
            root.path(),
            "web-cookie-thief",
            r#"{"title":"Cookie Thief","category":"Web","points":200,"flag":"CTF{a}"}"#,
            &[DOCKERFILE],
        );
        challenge_dir(
            root.path(),
            "rev-license",
            r#"{"title":"Patched License","category":"Reverse Engineering","points":300}"#,
            &[MAKEFILE],
        );
        challenge_dir(root.path(), "broken", "{", &[]);
        fs::write(root.path().join("README.md"), "not a challenge").unwrap();

        let (found, skipped) = scan_challenges(root.path()).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(found.len(), 2);

        let web = found.iter().find(|c| c.title == "Cookie Thief").unwrap();
        assert!(web.requires_vm);
        let rev = found.iter().find(|c| c.title == "Patched License").unwrap();
        assert!(!rev.requires_vm);
        assert_eq!(rev.flag, "");
    }

    #[test]
    fn upsert_keeps_ids_stable() {
        let mut data = CatalogData {
            teams: vec![],
            challenges: vec![Challenge {
                id: 4,
                title: "Cookie Thief".into(),
                description: "old".into(),
                category: "Web".into(),
                points: 100,
                flag: "CTF{old}".into(),
                requires_vm: false,
            }],
        };
        let scanned = vec![
            ScannedChallenge {
                path: PathBuf::from("x"),
                title: "Cookie Thief".into(),
                description: "new".into(),
                category: "Web".into(),
                points: 250,
                flag: "CTF{new}".into(),
                requires_vm: true,
            },
            ScannedChallenge {
                path: PathBuf::from("y"),
                title: "Caesar Shift".into(),
                description: String::new(),
                category: "Cryptography".into(),
                points: 50,
                flag: "CTF{c}".into(),
                requires_vm: false,
            },
        ];

        let report = upsert(&mut data, scanned);
        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);

        let cookie = data.challenge(4).unwrap();
        assert_eq!(cookie.points, 250);
        assert!(cookie.requires_vm);
        assert_eq!(data.challenge(5).unwrap().title, "Caesar Shift");
    }

    #[test]
    fn seed_twice_is_stable() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("ctfs");
        challenge_dir(
            &source,
            "web-a",
            r#"{"title":"A","category":"Web","points":10}"#,
            &[DOCKERFILE],
        );
        let catalog = root.path().join("catalog.json");

        let first = seed(&source, &catalog).unwrap();
        assert_eq!(first.added, 1);
        let second = seed(&source, &catalog).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 1);

        let data = CatalogData::read(&catalog).unwrap();
        assert_eq!(data.challenges.len(), 1);
        assert_eq!(data.challenges[0].id, 1);
    }
}
