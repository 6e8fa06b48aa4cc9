use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{InkToolError, TestCase, TESTCASE_SCHEMA_V1};

const STORY_SUFFIX: &str = ".ink.json";
const TESTCASE_FILE: &str = "testcase.json";

/// Reads the single compiled story under `example_dir`.
pub fn read_story_json_from_dir(example_dir: &Path) -> Result<String, InkToolError> {
    let mut stories = Vec::new();
    for entry in WalkDir::new(example_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.file_type().is_file() && entry.path().to_string_lossy().ends_with(STORY_SUFFIX) {
            stories.push(entry.into_path());
        }
    }

    match stories.as_slice() {
        [] => Err(InkToolError::SourceEmpty {
            path: example_dir.to_path_buf(),
        }),
        [path] => fs::read_to_string(path).map_err(|source| InkToolError::ReadFile {
            path: path.clone(),
            source,
        }),
        _ => Err(InkToolError::SourceAmbiguous {
            path: example_dir.to_path_buf(),
            found: stories
                .iter()
                .map(|path| {
                    path.strip_prefix(example_dir)
                        .unwrap_or(path)
                        .to_string_lossy()
                        .replace('\\', "/")
                })
                .collect(),
        }),
    }
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, InkToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| InkToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase =
        serde_json::from_str(&raw).map_err(|source| InkToolError::ParseCase {
            path: case_path.to_path_buf(),
            source,
        })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(InkToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

/// Directories under `root` holding a `testcase.json`, sorted by path.
pub fn discover_case_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == TESTCASE_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect::<Vec<_>>();
    dirs.sort();
    dirs
}
