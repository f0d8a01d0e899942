//! # external-tools
//!
//! Locate the helper executables md2pdf drives out-of-process:
//!
//! * [`MMDC`]: the Mermaid CLI (`@mermaid-js/mermaid-cli`), which turns a
//!   diagram source file into an SVG.
//! * [`CHROMIUM`]: a headless Chromium / Chrome build used to print the
//!   assembled HTML to PDF.
//!
//! ## Resolution order
//!
//! For every tool the first match wins:
//!
//! 1. The tool's environment variable (`MD2PDF_MMDC`, `MD2PDF_CHROMIUM`) when
//!    it points at an existing file.
//! 2. A bundled copy under `<root>/node_modules/.bin/` (only for tools that
//!    ship through npm). On Windows the `.cmd` shim is preferred.
//! 3. Well-known absolute install locations (macOS app bundles, `/usr/bin`).
//! 4. A lookup of each candidate executable name on `PATH`.
//!
//! Resolution is meant to run once at process start-up; [`mmdc_path`] and
//! [`chromium_path`] cache the answer in a [`OnceLock`] so concurrent
//! conversions share an immutable result instead of re-probing the disk.
//!
//! ```rust,no_run
//! let mmdc = external_tools::mmdc_path(None).expect("mmdc not installed");
//! let chrome = external_tools::chromium_path().expect("chromium not installed");
//! println!("{} / {}", mmdc.display(), chrome.display());
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned while locating an external tool.
#[derive(Error, Debug)]
pub enum LocateError {
    /// None of the candidate locations held the executable.
    #[error(
        "Could not find {tool}.\n\
Looked for {candidates:?} in ${env_var}, node_modules/.bin and PATH.\n\
{hint}"
    )]
    NotFound {
        tool: &'static str,
        env_var: &'static str,
        candidates: Vec<&'static str>,
        hint: &'static str,
    },
}

// ── Tool descriptions ────────────────────────────────────────────────────────

/// Where and under which names to look for one executable.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    /// Human-readable tool name used in error messages.
    pub name: &'static str,
    /// Environment variable holding an explicit path.
    pub env_var: &'static str,
    /// Executable names, most preferred first.
    pub executables: &'static [&'static str],
    /// Whether the tool is installed through npm into `node_modules/.bin`.
    pub npm_bundled: bool,
    /// Absolute paths checked before falling back to `PATH`.
    pub well_known: &'static [&'static str],
    /// Installation hint appended to [`LocateError::NotFound`].
    pub hint: &'static str,
}

/// The Mermaid CLI.
pub const MMDC: ToolSpec = ToolSpec {
    name: "mmdc (Mermaid CLI)",
    env_var: "MD2PDF_MMDC",
    executables: &["mmdc"],
    npm_bundled: true,
    well_known: &[],
    hint: "Install it with: npm install @mermaid-js/mermaid-cli",
};

/// A headless-capable Chromium or Chrome build.
pub const CHROMIUM: ToolSpec = ToolSpec {
    name: "Chromium",
    env_var: "MD2PDF_CHROMIUM",
    executables: &[
        "chromium",
        "chromium-browser",
        "google-chrome",
        "google-chrome-stable",
        "chrome",
        "msedge",
    ],
    npm_bundled: false,
    well_known: &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/snap/bin/chromium",
    ],
    hint: "Install Chromium or Google Chrome, or set MD2PDF_CHROMIUM=/path/to/chrome",
};

/// Puppeteer configuration file name looked up next to `node_modules`.
///
/// When present it is passed to mmdc with `-p`; running as root inside a
/// container needs `--no-sandbox`, which can only be set this way.
pub const PUPPETEER_CONFIG_FILE: &str = "puppeteer-config.json";

// ── Process-wide cache ───────────────────────────────────────────────────────

static MMDC_PATH: OnceLock<PathBuf> = OnceLock::new();
static CHROMIUM_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve `spec` without caching.
///
/// `bundled_root` is the directory that may contain `node_modules/.bin`;
/// `None` uses the current working directory.
pub fn locate(spec: &ToolSpec, bundled_root: Option<&Path>) -> Result<PathBuf, LocateError> {
    // 1. Environment variable override.
    if let Some(env_path) = std::env::var_os(spec.env_var) {
        let p = PathBuf::from(env_path);
        if is_executable(&p) {
            return Ok(p);
        }
        // Fall through: env var set but file missing → keep searching.
        eprintln!(
            "external-tools: {} '{}' not found; searching other locations …",
            spec.env_var,
            p.display()
        );
    }

    // 2. Bundled npm install.
    if spec.npm_bundled {
        let root = match bundled_root {
            Some(r) => r.to_path_buf(),
            None => std::env::current_dir().unwrap_or_default(),
        };
        if let Some(p) = find_bundled(&root, spec.executables) {
            return Ok(p);
        }
    }

    // 3. Well-known install locations.
    if let Some(p) = spec
        .well_known
        .iter()
        .map(PathBuf::from)
        .find(|p| is_executable(p))
    {
        return Ok(p);
    }

    // 4. PATH lookup.
    if let Some(path_var) = std::env::var_os("PATH") {
        if let Some(p) = find_on_path(spec.executables, &path_var) {
            return Ok(p);
        }
    }

    Err(LocateError::NotFound {
        tool: spec.name,
        env_var: spec.env_var,
        candidates: spec.executables.to_vec(),
        hint: spec.hint,
    })
}

/// Returns `true` when `spec` can currently be resolved.
pub fn is_available(spec: &ToolSpec, bundled_root: Option<&Path>) -> bool {
    locate(spec, bundled_root).is_ok()
}

/// Resolve the Mermaid CLI once per process.
///
/// Later calls return the first successful answer regardless of
/// `bundled_root`; failures are not cached so a retry after installing the
/// tool succeeds.
pub fn mmdc_path(bundled_root: Option<&Path>) -> Result<PathBuf, LocateError> {
    if let Some(path) = MMDC_PATH.get() {
        return Ok(path.clone());
    }
    let path = locate(&MMDC, bundled_root)?;
    // Best-effort cache in the OnceLock (ignore race; both agree).
    let _ = MMDC_PATH.set(path.clone());
    Ok(path)
}

/// Resolve the Chromium executable once per process.
pub fn chromium_path() -> Result<PathBuf, LocateError> {
    if let Some(path) = CHROMIUM_PATH.get() {
        return Ok(path.clone());
    }
    let path = locate(&CHROMIUM, None)?;
    let _ = CHROMIUM_PATH.set(path.clone());
    Ok(path)
}

/// Path of the Puppeteer config file under `root`, when it exists.
pub fn puppeteer_config(root: &Path) -> Option<PathBuf> {
    let p = root.join(PUPPETEER_CONFIG_FILE);
    p.is_file().then_some(p)
}

/// Search `path_var` (a `PATH`-style list) for the first matching executable.
///
/// Names are tried in order, each across every directory, so preference
/// order in `names` wins over directory order.
pub fn find_on_path(names: &[&str], path_var: &OsStr) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::split_paths(path_var).collect();
    names.iter().find_map(|name| {
        dirs.iter().find_map(|dir| {
            executable_variants(name)
                .into_iter()
                .map(|file| dir.join(file))
                .find(|candidate| is_executable(candidate))
        })
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn find_bundled(root: &Path, names: &[&str]) -> Option<PathBuf> {
    let bin_dir = root.join("node_modules").join(".bin");
    names.iter().find_map(|name| {
        executable_variants(name)
            .into_iter()
            .map(|file| bin_dir.join(file))
            .find(|candidate| is_executable(candidate))
    })
}

/// File names to look for `name` on this platform.
fn executable_variants(name: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![
            format!("{name}.cmd"),
            format!("{name}.exe"),
            name.to_string(),
        ]
    } else {
        vec![name.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn touch_executable(dir: &Path, name: &str) -> PathBuf {
        let file = executable_variants(name).remove(0);
        let p = dir.join(file);
        std::fs::write(&p, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        p
    }

    #[test]
    fn find_on_path_respects_name_preference() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        touch_executable(a.path(), "chrome");
        let preferred = touch_executable(b.path(), "chromium");

        let path_var = std::env::join_paths([a.path(), b.path()]).unwrap();
        let found = find_on_path(&["chromium", "chrome"], &path_var).unwrap();
        assert_eq!(found, preferred);
    }

    #[test]
    fn find_on_path_misses_cleanly() {
        let a = tempfile::tempdir().unwrap();
        let path_var = OsString::from(a.path());
        assert!(find_on_path(&["definitely-not-a-tool"], &path_var).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_files_are_skipped() {
        let a = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("mmdc"), "plain text").unwrap();
        let path_var = OsString::from(a.path());
        assert!(find_on_path(&["mmdc"], &path_var).is_none());
    }

    #[test]
    fn bundled_node_modules_is_found() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("node_modules").join(".bin");
        std::fs::create_dir_all(&bin).unwrap();
        let expected = touch_executable(&bin, "mmdc");

        assert_eq!(find_bundled(root.path(), &["mmdc"]), Some(expected));
    }

    #[test]
    fn puppeteer_config_only_when_present() {
        let root = tempfile::tempdir().unwrap();
        assert!(puppeteer_config(root.path()).is_none());
        std::fs::write(root.path().join(PUPPETEER_CONFIG_FILE), "{}").unwrap();
        assert!(puppeteer_config(root.path()).is_some());
    }

    #[test]
    fn not_found_message_names_the_tool() {
        let spec = ToolSpec {
            name: "frobnicator",
            env_var: "EXTERNAL_TOOLS_TEST_UNSET_VAR",
            executables: &["frobnicator-does-not-exist"],
            npm_bundled: false,
            well_known: &[],
            hint: "install frobnicator",
        };
        let err = locate(&spec, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("frobnicator"), "got: {msg}");
        assert!(msg.contains("install frobnicator"), "got: {msg}");
    }
}
