#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use glob::glob;
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::{
    config,
    constants::{AUTOGENERATED_NOTICE, WORKER_FIXTURE_COUNT},
    error::HarnessError,
    retry,
};

/// Strips the common leading-whitespace margin from a multi-line body.
///
/// Fixture bodies are written as indented template strings in test source;
/// this drops one leading blank line (the one right after the opening quote)
/// and removes the minimum indent over non-blank lines, so the written file
/// is not polluted by the test's own indentation.
pub fn dedent(text: &str) -> String {
    let text = text.strip_prefix('\n').unwrap_or(text);

    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| line.get(margin..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
        + if text.ends_with('\n') { "\n" } else { "" }
}

/// Resolves a `/`-joined relative path against `root` and creates every
/// intermediate directory.
fn prepare_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    for part in relative.split('/') {
        resolved.push(part);
    }
    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(resolved)
}

/// Materializes a flat path-to-content mapping as a nested tree under
/// `root`, dedenting each body.
///
/// No rollback on partial failure: if entry N fails, entries 1..N stay on
/// disk. Tests run [`retry::cleanup`] in their setup/teardown hooks
/// regardless of outcome, so partial writes self-heal on the next run.
pub fn write_files<I, K, V>(root: &Path, files: I) -> Result<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    std::fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;
    for (relative, body) in files {
        let path = prepare_path(root, relative.as_ref())?;
        std::fs::write(&path, dedent(body.as_ref()))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Creates one directory symlink, junction-style on Windows so no elevated
/// privileges are needed.
fn symlink_dir(original: &Path, link: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(original, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_dir(original, link)
    }
}

/// Creates symlinks under `root` from a mapping of existing relative path to
/// link relative path. The target is not verified to exist.
pub fn write_symlinks<I, K, V>(root: &Path, links: I) -> Result<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    std::fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;
    for (existing, link) in links {
        let target = root.join(existing.as_ref().split('/').collect::<PathBuf>());
        let link_path = prepare_path(root, link.as_ref())?;
        symlink_dir(&target, &link_path).with_context(|| {
            format!(
                "failed to link {} -> {}",
                link_path.display(),
                target.display()
            )
        })?;
    }
    Ok(())
}

/// Synthesizes a minimal valid `package.json` at `directory`.
///
/// The body defaults to `{"jest": {"testEnvironment": "node"}}`; either way
/// a fixed `description` marks the file as autogenerated so stray fixtures
/// are recognizable in a working tree.
pub fn create_empty_package(directory: &Path, package_json: Option<Value>) -> Result<()> {
    let mut body = package_json.unwrap_or_else(|| json!({"jest": {"testEnvironment": "node"}}));
    if let Some(map) = body.as_object_mut() {
        map.insert("description".to_string(), json!(AUTOGENERATED_NOTICE));
    }

    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create {}", directory.display()))?;
    let manifest = directory.join("package.json");
    std::fs::write(
        &manifest,
        serde_json::to_string_pretty(&body).context("failed to serialize package.json")?,
    )
    .with_context(|| format!("failed to write {}", manifest.display()))
}

/// Recursively copies `src` into `dest`, creating directories as needed and
/// overwriting existing files.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        std::fs::create_dir_all(dest)
            .with_context(|| format!("failed to create {}", dest.display()))?;
        for entry in std::fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
            let entry = entry.context("failed to read directory entry")?;
            copy_dir(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        std::fs::copy(src, dest).with_context(|| {
            format!("failed to copy {} to {}", src.display(), dest.display())
        })?;
    }
    Ok(())
}

/// Compiled pattern for `$1`-style numbered placeholders.
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$(\d+)").expect("placeholder pattern is valid"))
}

/// A fixture body with `$1`-style numbered placeholders, for stamping
/// variants of one test file.
#[derive(Debug, Clone)]
pub struct Template {
    /// The body with placeholders still in place.
    text: String,
}

impl Template {
    /// Wraps a body containing `$1`-style placeholders.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Substitutes `values[n - 1]` for every `$n`. A placeholder with no
    /// corresponding value is an error, not silent garbage.
    pub fn fill(&self, values: &[&str]) -> Result<String, HarnessError> {
        let mut filled = String::with_capacity(self.text.len());
        let mut tail = 0;
        for found in placeholder_pattern().find_iter(&self.text) {
            let index: usize = self.text[found.start() + 1..found.end()]
                .parse()
                .with_context(|| format!("placeholder {} overflows", found.as_str()))?;
            if index == 0 || index > values.len() {
                return Err(HarnessError::TemplateIndex {
                    index,
                    available: values.len(),
                });
            }
            filled.push_str(&self.text[tail..found.start()]);
            filled.push_str(values[index - 1]);
            tail = found.end();
        }
        filled.push_str(&self.text[tail..]);
        Ok(filled)
    }
}

/// Symlinks `<packages_dir>/<name>` into `<cwd>/node_modules/<name>`,
/// removing any previous entry first.
pub fn link_package(package_name: &str, cwd: &Path) -> Result<()> {
    let package_path = config::packages_dir().join(package_name);
    let destination = cwd.join("node_modules").join(package_name);

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if destination.exists() {
        retry::cleanup(&destination)?;
    }
    symlink_dir(&package_path, &destination).with_context(|| {
        format!(
            "failed to link {} -> {}",
            destination.display(),
            package_path.display()
        )
    })
}

/// Generates enough one-todo test files to push the runner into its
/// multi-worker path. Slow and noisy in the output; use sparingly.
pub fn worker_fixture_tree() -> Vec<(String, String)> {
    (0..=WORKER_FIXTURE_COUNT)
        .map(|i| {
            (
                format!("__tests__/test{i}.test.js"),
                format!("\ntest.todo('test {i}');\n"),
            )
        })
        .collect()
}

/// A uniquely-named scratch directory under the OS temp root, removed
/// best-effort on drop.
///
/// Replaces the original convention of hand-named temp dirs plus paired
/// cleanup hooks; the unique suffix means concurrently running test binaries
/// cannot collide on a directory name.
#[derive(Debug)]
pub struct Sandbox {
    /// The created scratch directory.
    root: PathBuf,
}

impl Sandbox {
    /// Creates a fresh scratch directory named after the given stem.
    pub fn new(stem: &str) -> Result<Self> {
        let root = std::env::temp_dir().join(format!("{stem}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        debug!("created sandbox at {}", root.display());
        Ok(Self { root })
    }

    /// The scratch directory's path.
    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let _ = retry::cleanup(&self.root);
    }
}

/// Collects the files matching a glob `pattern` under `root`, for gathering
/// multi-run reporter logs.
pub fn find_files(pattern: &str, root: &Path) -> Result<Vec<PathBuf>> {
    let full = root.join(pattern);
    let full = full
        .to_str()
        .context("glob pattern is not valid UTF-8")?
        .to_string();

    Ok(glob(&full)
        .context("could not create glob")?
        .filter_map(Result::ok)
        .collect())
}
