//! `.env` discovery and parsing
//!
//! Only `KEY=VALUE` lines are understood. Inline comments, variable
//! expansion and multi-line values are not supported.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name looked up in every candidate directory
pub const DOTENV_FILE: &str = ".env";

/// Parse `.env` contents into ordered key/value pairs.
///
/// Blank lines, `#` comments and lines without `=` are skipped. The line is
/// split on the first `=`, key and value are trimmed, and one matching pair
/// of surrounding double or single quotes is stripped from the value. A
/// leading byte order mark is ignored.
pub fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .strip_prefix('\u{feff}')
        .unwrap_or(contents)
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }

            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }

            Some((key.to_string(), strip_quotes(value.trim()).to_string()))
        })
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Ordered list of places a `.env` file may live
#[derive(Debug, Clone)]
pub struct DotenvCandidates {
    paths: Vec<PathBuf>,
}

impl DotenvCandidates {
    /// Current working directory first, then the project root.
    ///
    /// The project root is the workspace directory two levels above this
    /// crate's manifest.
    pub fn standard() -> Self {
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(DOTENV_FILE));
        }

        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let project_root = manifest_dir
            .parent()
            .and_then(Path::parent)
            .unwrap_or(manifest_dir);
        let root_candidate = project_root.join(DOTENV_FILE);
        if !paths.contains(&root_candidate) {
            paths.push(root_candidate);
        }

        Self { paths }
    }

    /// Explicit candidate list, tried in order
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Candidate paths in lookup order
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// First candidate that exists on disk
    pub fn locate(&self) -> Option<&Path> {
        self.paths.iter().map(PathBuf::as_path).find(|p| p.exists())
    }

    /// Locate and parse the first existing candidate.
    ///
    /// Returns `Ok(None)` when no candidate exists; a candidate that exists
    /// but cannot be read is a configuration error.
    pub fn load(&self) -> Result<Option<DotenvFile>> {
        let Some(path) = self.locate() else {
            tracing::debug!(
                "No .env file found (checked {})",
                self.paths()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(None);
        };

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let entries = parse_dotenv(&contents);
        tracing::info!("Loaded {} entries from {}", entries.len(), path.display());

        Ok(Some(DotenvFile {
            path: path.to_path_buf(),
            entries,
        }))
    }
}

impl Default for DotenvCandidates {
    fn default() -> Self {
        Self::standard()
    }
}

/// A parsed `.env` file
#[derive(Debug, Clone)]
pub struct DotenvFile {
    /// Where the file was found
    pub path: PathBuf,
    /// Entries in file order
    pub entries: Vec<(String, String)>,
}

impl DotenvFile {
    /// Fill unset keys of `vars`; existing values win. A blank existing value
    /// counts as unset. Returns the keys applied.
    pub fn merge_into(&self, vars: &mut HashMap<String, String>) -> Vec<String> {
        let mut applied = Vec::new();
        for (key, value) in &self.entries {
            let unset = vars.get(key).map_or(true, |v| v.trim().is_empty());
            if unset {
                vars.insert(key.clone(), value.clone());
                applied.push(key.clone());
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_pairs() {
        let entries = parse_dotenv("DEEPSEEK_API_KEY=sk-123\nMODEL = deepseek-chat \n");
        assert_eq!(
            entries,
            vec![
                ("DEEPSEEK_API_KEY".to_string(), "sk-123".to_string()),
                ("MODEL".to_string(), "deepseek-chat".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_skips_blank_comment_and_bare_lines() {
        let contents = "\n   \n# a comment\n  # indented comment\nNOT_A_PAIR\nKEY=value\n";
        let entries = parse_dotenv(contents);
        assert_eq!(entries, vec![("KEY".to_string(), "value".to_string())]);
    }

    #[test]
    fn test_parse_strips_one_pair_of_matching_quotes() {
        let entries = parse_dotenv(
            "A=\"double\"\nB='single'\nC=\"mismatched'\nD=\"\"nested\"\"\nE=\"\nF=''",
        );
        let map: HashMap<_, _> = entries.into_iter().collect();
        assert_eq!(map["A"], "double");
        assert_eq!(map["B"], "single");
        assert_eq!(map["C"], "\"mismatched'");
        assert_eq!(map["D"], "\"nested\"");
        assert_eq!(map["E"], "\"");
        assert_eq!(map["F"], "");
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let entries = parse_dotenv("URL=https://host/path?a=b&c=d");
        assert_eq!(entries[0].1, "https://host/path?a=b&c=d");
    }

    #[test]
    fn test_parse_trims_inside_quotes_only_outside() {
        let entries = parse_dotenv("KEY = \"  padded  \"  ");
        assert_eq!(entries[0].1, "  padded  ");
    }

    #[test]
    fn test_parse_skips_empty_key() {
        assert!(parse_dotenv("=value").is_empty());
    }

    #[test]
    fn test_locate_uses_first_existing_candidate() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join(DOTENV_FILE), "KEY=second").unwrap();

        let candidates = DotenvCandidates::from_paths(vec![
            first.path().join(DOTENV_FILE),
            second.path().join(DOTENV_FILE),
        ]);
        let loaded = candidates.load().unwrap().unwrap();
        assert_eq!(loaded.path, second.path().join(DOTENV_FILE));
        assert_eq!(loaded.entries, vec![("KEY".to_string(), "second".to_string())]);

        std::fs::write(first.path().join(DOTENV_FILE), "KEY=first").unwrap();
        let loaded = candidates.load().unwrap().unwrap();
        assert_eq!(loaded.entries[0].1, "first");
    }

    #[test]
    fn test_load_none_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = DotenvCandidates::from_paths(vec![dir.path().join(DOTENV_FILE)]);
        assert!(candidates.load().unwrap().is_none());
    }

    #[test]
    fn test_unreadable_candidate_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory named `.env` exists but cannot be read as a file
        std::fs::create_dir(dir.path().join(DOTENV_FILE)).unwrap();
        let candidates = DotenvCandidates::from_paths(vec![dir.path().join(DOTENV_FILE)]);
        let err = candidates.load().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_merge_does_not_overwrite() {
        let file = DotenvFile {
            path: PathBuf::from(".env"),
            entries: vec![
                ("MODEL".to_string(), "from-file".to_string()),
                ("TOP_K".to_string(), "5".to_string()),
            ],
        };
        let mut vars = HashMap::from([("MODEL".to_string(), "from-env".to_string())]);
        let applied = file.merge_into(&mut vars);

        assert_eq!(applied, vec!["TOP_K".to_string()]);
        assert_eq!(vars["MODEL"], "from-env");
        assert_eq!(vars["TOP_K"], "5");
    }

    #[test]
    fn test_merge_fills_blank_existing_values() {
        let file = DotenvFile {
            path: PathBuf::from(".env"),
            entries: vec![("DEEPSEEK_API_KEY".to_string(), "sk-from-file".to_string())],
        };
        let mut vars = HashMap::from([("DEEPSEEK_API_KEY".to_string(), "  ".to_string())]);
        let applied = file.merge_into(&mut vars);

        assert_eq!(applied, vec!["DEEPSEEK_API_KEY".to_string()]);
        assert_eq!(vars["DEEPSEEK_API_KEY"], "sk-from-file");
    }

    #[test]
    fn test_parse_ignores_byte_order_mark() {
        let entries = parse_dotenv("\u{feff}DEEPSEEK_API_KEY=sk-123\r\nMODEL=deepseek-chat\r\n");
        assert_eq!(entries[0], ("DEEPSEEK_API_KEY".to_string(), "sk-123".to_string()));
        assert_eq!(entries[1].1, "deepseek-chat");
    }

    #[test]
    fn test_standard_candidates_start_with_cwd() {
        let candidates = DotenvCandidates::standard();
        let cwd = std::env::current_dir().unwrap().join(DOTENV_FILE);
        assert_eq!(candidates.paths().first(), Some(&cwd));
        assert!(candidates.paths().len() <= 2);
    }
}
