//! # Requirements Manifest Rewriter
//!
//! Rewrites a pip `requirements.txt` into a "flexible" variant for Linux
//! deployment: pinned `pkg==X.Y.Z` entries are loosened to `pkg<X+1.0.0`,
//! and packages that only exist on Windows (or in development) are dropped.
//!
//! The transform is pure text: lines in, lines out, classified one at a time
//! as comment/blank, ignored package, pinned version, or already flexible.
//! No package-index semantics beyond the textual substitution.

/// Packages excluded from the rewritten manifest.
///
/// Windows-only (or development-only) distributions that must not reach a
/// Linux production environment.
const IGNORED_PACKAGES: &[&str] = &[
    "pywin32",
    "pypiwin32",
    "pywintypes",
    "win32-setctime",
    "pywinpty",
];

/// Line-by-line rewriter for pip requirements manifests.
pub struct ManifestRewriter {
    ignored: Vec<String>,
}

impl Default for ManifestRewriter {
    fn default() -> Self {
        Self {
            ignored: IGNORED_PACKAGES.iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl ManifestRewriter {
    /// Rewrite a whole manifest. Lines are processed independently and
    /// rejoined with LF endings; dropped packages leave no trace.
    pub fn rewrite(&self, input: &str) -> String {
        let lines: Vec<String> = input
            .lines()
            .filter_map(|line| self.rewrite_line(line))
            .collect();
        lines.join("\n")
    }

    /// Classify and rewrite one line. Returns `None` for dropped packages.
    fn rewrite_line(&self, raw: &str) -> Option<String> {
        // Invisible control characters sneak in from Windows-edited files.
        let line: String = raw.trim().chars().filter(|c| !c.is_control()).collect();

        if line.is_empty() || line.starts_with('#') {
            return Some(line);
        }

        if self.is_ignored(&line) {
            tracing::debug!(package = %package_name(&line), "Dropping platform-specific package");
            return None;
        }

        if !line.contains("==") {
            // Already flexible (>=, ~=, bare name): keep as-is.
            return Some(line);
        }

        // Direct references are pinned by URL, not version; leave them alone.
        if line.starts_with("git+") || line.starts_with("http") {
            return Some(line);
        }

        let (pkg, ver) = match line.split_once("==") {
            Some((pkg, ver)) => (pkg.trim(), ver.trim()),
            None => return Some(line),
        };

        match parse_major_version(ver) {
            Some(major) => Some(format!("{}<{}.0.0", pkg, major + 1)),
            // Non-numeric version (hash, epoch, oddity): keep the pin.
            None => Some(line),
        }
    }

    fn is_ignored(&self, line: &str) -> bool {
        let name = package_name(line).to_lowercase();
        self.ignored.iter().any(|p| *p == name)
    }
}

/// Extract the package name: everything before the first version operator.
fn package_name(line: &str) -> &str {
    line.split(['<', '>', '=', '!', '~'])
        .next()
        .unwrap_or(line)
        .trim()
}

/// Parse the leading major version of `X.Y...`-shaped version strings.
fn parse_major_version(ver: &str) -> Option<u64> {
    let (major, _) = ver.split_once('.')?;
    major.parse().ok()
}

/// Derive the output filename: `requirements.txt` → `requirements_flexible.txt`,
/// extensionless names just get the suffix appended.
pub fn flexible_output_name(input: &str) -> String {
    match input.rsplit_once('.') {
        Some((base, ext)) => format!("{}_flexible.{}", base, ext),
        None => format!("{}_flexible", input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_version_is_loosened() {
        let rewriter = ManifestRewriter::default();
        assert_eq!(rewriter.rewrite("fastapi==0.110.2"), "fastapi<1.0.0");
        assert_eq!(rewriter.rewrite("numpy==1.26.4"), "numpy<2.0.0");
        assert_eq!(rewriter.rewrite("torch==12.1.0"), "torch<13.0.0");
    }

    #[test]
    fn test_comments_and_blank_lines_pass_through() {
        let rewriter = ManifestRewriter::default();
        let input = "# production deps\n\nrequests==2.31.0";
        assert_eq!(rewriter.rewrite(input), "# production deps\n\nrequests<3.0.0");
    }

    #[test]
    fn test_windows_packages_are_dropped() {
        let rewriter = ManifestRewriter::default();
        let input = "pywin32==306\nPyWinPty==2.0.13\nuvicorn==0.29.0";
        assert_eq!(rewriter.rewrite(input), "uvicorn<1.0.0");
    }

    #[test]
    fn test_flexible_constraints_kept_verbatim() {
        let rewriter = ManifestRewriter::default();
        assert_eq!(rewriter.rewrite("scipy>=1.10"), "scipy>=1.10");
        assert_eq!(rewriter.rewrite("pandas~=2.1.0"), "pandas~=2.1.0");
        assert_eq!(rewriter.rewrite("wheel"), "wheel");
    }

    #[test]
    fn test_url_references_kept_verbatim() {
        let rewriter = ManifestRewriter::default();
        let git_line = "git+https://github.com/example/lib.git@main#egg=lib==1.0";
        assert_eq!(rewriter.rewrite(git_line), git_line);
    }

    #[test]
    fn test_unparseable_version_keeps_pin() {
        let rewriter = ManifestRewriter::default();
        assert_eq!(rewriter.rewrite("weird==abcdef.1"), "weird==abcdef.1");
        // No dot after the major component: keep the original line.
        assert_eq!(rewriter.rewrite("weird==3"), "weird==3");
    }

    #[test]
    fn test_control_characters_are_stripped() {
        let rewriter = ManifestRewriter::default();
        assert_eq!(rewriter.rewrite("requests\u{0001}==2.31.0"), "requests<3.0.0");
    }

    #[test]
    fn test_output_name_derivation() {
        assert_eq!(flexible_output_name("requirements.txt"), "requirements_flexible.txt");
        assert_eq!(flexible_output_name("deps.prod.txt"), "deps.prod_flexible.txt");
        assert_eq!(flexible_output_name("requirements"), "requirements_flexible");
    }
}
