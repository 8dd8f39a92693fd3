//! Read-only file tools offered to the model by `rai ask --tools`
use regex::Regex;
use rai::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const DEFAULT_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CatInput {
    /// The path of the file to read
    pub path: String,
    /// Optional line number to start reading from (0-based)
    #[serde(default)]
    pub offset: Option<i64>,
    /// Optional maximum number of lines to read
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FilesInput {
    /// The directory path to list files from
    pub path: String,
    /// Whether to list files recursively (including subdirectories)
    #[serde(default)]
    pub recursive: bool,
    /// Optional glob pattern to filter files (e.g., *.rs, *.md)
    #[serde(default)]
    pub pattern: Option<String>,
}

pub fn builtin() -> Vec<Tool> {
    vec![
        Tool::new(
            "cat",
            "Read a text file and return its lines with line numbers",
            cat,
        ),
        Tool::new(
            "files",
            "List the files in a directory, optionally recursively and filtered by a glob pattern",
            files,
        ),
    ]
}

/// Print part of a file with right-aligned line numbers
pub fn cat(input: CatInput) -> String {
    if input.path.is_empty() {
        return "Error: Path is required".to_string();
    }

    let path = Path::new(&input.path);
    match fs::metadata(path) {
        Err(e) => return format!("Error: {}", e),
        Ok(meta) if meta.is_dir() => {
            return format!("Error: {} is a directory, not a file", input.path)
        }
        Ok(_) => {}
    }

    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => return format!("Error opening file: {}", e),
    };

    let offset = input.offset.unwrap_or(0).max(0) as usize;
    let limit = match input.limit {
        Some(limit) if limit > 0 => limit as usize,
        _ => DEFAULT_LIMIT,
    };

    let mut skipped = 0;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => return format!("Error reading file: {}", e),
        };
        if skipped < offset {
            skipped += 1;
            continue;
        }
        if lines.len() == limit {
            break;
        }
        lines.push(line);
    }

    if skipped < offset {
        return format!(
            "Error: File has only {} lines, offset {} is out of range",
            skipped, offset
        );
    }
    if lines.is_empty() {
        return if offset > 0 {
            format!("No lines to read after offset {}", offset)
        } else {
            "File is empty".to_string()
        };
    }

    let mut result = format!(
        "File: {} (lines {} to {})\n\n",
        input.path,
        offset + 1,
        offset + lines.len()
    );
    for (i, line) in lines.iter().enumerate() {
        result.push_str(&format!("{:>5} | {}\n", offset + i + 1, line));
    }
    result
}

/// List files below a directory
pub fn files(input: FilesInput) -> String {
    if input.path.is_empty() {
        return "Error: Path is required".to_string();
    }

    let root = PathBuf::from(&input.path);
    match fs::metadata(&root) {
        Err(e) => return format!("Error: {}", e),
        Ok(meta) if !meta.is_dir() => return format!("Error: {} is not a directory", input.path),
        Ok(_) => {}
    }

    let pattern = match input.pattern.as_deref().filter(|p| !p.is_empty()) {
        Some(pattern) => match glob_to_regex(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => return format!("Error with pattern matching: {}", e),
        },
        None => None,
    };

    let mut found = Vec::new();
    if let Err(e) = collect_files(&root, input.recursive, pattern.as_ref(), &mut found) {
        return format!("Error reading directory: {}", e);
    }
    found.sort();

    if found.is_empty() {
        return "No files found matching the criteria".to_string();
    }

    let mut result = format!("Found {} files:\n", found.len());
    for file in found {
        result.push_str(&format!("- {}\n", file.display()));
    }
    result
}

fn collect_files(
    dir: &Path,
    recursive: bool,
    pattern: Option<&Regex>,
    found: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if recursive {
                collect_files(&path, recursive, pattern, found)?;
            }
            continue;
        }

        let name = entry.file_name();
        let matches = pattern.map_or(true, |p| p.is_match(&name.to_string_lossy()));
        if matches {
            found.push(path);
        }
    }
    Ok(())
}

/// Translate a shell glob (`*`, `?`, `[...]`) matched against a file name into an anchored regex
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    let mut chars = glob.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => pattern.push_str("[^/]*"),
            '?' => pattern.push_str("[^/]"),
            '[' => {
                pattern.push('[');
                if chars.as_str().starts_with('!') {
                    chars.next();
                    pattern.push('^');
                }
                for c in chars.by_ref() {
                    match c {
                        ']' => break,
                        '\\' => pattern.push_str("\\\\"),
                        c => pattern.push(c),
                    }
                }
                pattern.push(']');
            }
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}
