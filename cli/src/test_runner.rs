use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use expander::{ArraySyntax, Expander, Options};

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected exact output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected error: the short `LINE:COL: message` form must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Default counter range seeded into the root scope.
    #[serde(default)]
    pub default_range: Option<(i64, i64)>,

    /// Array syntax seeded into the root scope.
    #[serde(default)]
    pub array_syntax: Option<ArraySyntax>,
}

impl TestConfig {
    fn options(&self) -> Options {
        Options {
            default_range: self.default_range,
            array_syntax: self.array_syntax,
        }
    }
}

/// Split a `.test.grx` file into its TOML config and grx source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    let Some(after_open) = content.strip_prefix("---") else {
        return Err("missing opening --- frontmatter delimiter".into());
    };

    // search from the newline that ends the opening delimiter, so an empty
    // frontmatter block closes immediately
    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim();
    let rest = &after_open[close_pos + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;
    config.options().validate().map_err(|e| format!("default_range: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

/// Compare one expansion result against the frontmatter expectations.
fn check(config: &TestConfig, source: &str) -> TestOutcome {
    let result = Expander::new(config.options()).expand(source);

    let failure = match (&config.expect_error, &config.expect_output, result) {
        (Some(expected_err), _, Err(err)) => {
            let message = err.short_message();
            if message.contains(expected_err.as_str()) {
                None
            } else {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected_err, message
                ))
            }
        }
        (Some(expected_err), _, Ok(output)) => Some(format!(
            "expected error containing \"{}\", but expansion succeeded with: {}",
            expected_err,
            output.trim()
        )),
        (None, Some(expected_output), Ok(output)) => {
            let actual = output.trim();
            let expected = expected_output.trim();
            if actual == expected {
                None
            } else {
                Some(format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected, actual
                ))
            }
        }
        (None, _, Err(err)) => Some(format!("unexpected error: {}", err.short_message())),
        (None, None, Ok(_)) => None,
    };

    match failure {
        Some(reason) => TestOutcome::Fail(reason),
        None => TestOutcome::Pass,
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    TestResult {
        path: path.to_path_buf(),
        description: config.description.clone(),
        outcome: check(&config, source),
    }
}

const EXTENSION: &str = ".test.grx";

/// Discover `.test.grx` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(EXTENSION))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// Keep the requested categories and their subcategories. Empty means all.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }

    let mut selected = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let prefix = format!("{}/", req);
        let before = selected.len();
        for (cat, files) in all {
            if cat == req || cat.starts_with(&prefix) {
                selected.insert(cat.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", EXTENSION, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(cat), files.len());
    }
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

fn label(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(EXTENSION))
            .unwrap_or("?")
    })
}

/// Run all `.test.grx` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let all = if path.is_file() {
        // single file mode ignores categories
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };
    if all.is_empty() {
        eprintln!("no {} files found in {}", EXTENSION, path.display());
        return 1;
    }

    let selected = if path.is_file() {
        select(&all, &[])
    } else {
        select(&all, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", style.bold(category_label(cat)));
        }

        for file in *files {
            let result = run_single_test(file);
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), label(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), label(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn outcome_of(content: &str) -> TestOutcome {
        let (config, source) = parse_test_file(content).unwrap();
        check(&config, source)
    }

    #[test]
    fn frontmatter_is_split_from_the_source() {
        let (config, source) = parse_test_file(
            "---\ndescription = \"d\"\ndefault_range = [0, 2]\narray_syntax = \"fortran\"\n---\nu[[#]]\n",
        )
        .unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.default_range, Some((0, 2)));
        assert_eq!(config.array_syntax, Some(ArraySyntax::Fortran));
        assert_eq!(source, "u[[#]]\n");
    }

    #[test]
    fn missing_frontmatter_is_reported() {
        assert!(parse_test_file("u[[#]]").is_err());
        assert!(parse_test_file("---\ndescription = \"x\"\n").is_err());
        assert!(parse_test_file("---\ndefault_range = [-1, 2]\n---\nx").is_err());
    }

    #[test]
    fn expectations_are_checked() {
        let pass = "---\ndefault_range = [0, 1]\nexpect_output = \"u[0][1]\"\n---\nu[[#]]\n";
        assert!(matches!(outcome_of(pass), TestOutcome::Pass));

        let mismatch = "---\nexpect_output = \"y\"\n---\nx\n";
        assert!(matches!(outcome_of(mismatch), TestOutcome::Fail(r) if r.contains("output mismatch")));

        let error = "---\nexpect_error = \"1:1: unexpected @end\"\n---\n@end";
        assert!(matches!(outcome_of(error), TestOutcome::Pass));

        let no_error = "---\nexpect_error = \"unknown tag\"\n---\nfine";
        assert!(matches!(outcome_of(no_error), TestOutcome::Fail(r) if r.contains("succeeded")));
    }

    #[test]
    fn discovery_groups_tests_by_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("derivative/second")).unwrap();
        fs::write(dir.path().join("top.test.grx"), "---\n---\nx").unwrap();
        fs::write(dir.path().join("derivative/a.test.grx"), "---\n---\nx").unwrap();
        fs::write(dir.path().join("derivative/second/b.test.grx"), "---\n---\nx").unwrap();
        fs::write(dir.path().join("derivative/notes.md"), "ignored").unwrap();

        let all = discover_categorized(dir.path());
        assert_eq!(
            all.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["", "derivative", "derivative/second"]
        );

        let selected = select(&all, &["derivative".to_string()]);
        assert_eq!(selected.len(), 2);
        assert!(!selected.contains_key(""));
    }

    #[test]
    fn run_tests_reports_failures_in_the_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.test.grx");
        fs::write(&good, "---\nexpect_output = \"x\"\n---\nx").unwrap();
        assert_eq!(run_tests(dir.path(), true, &[]), 0);
        assert_eq!(run_tests(&good, true, &[]), 0);

        fs::write(dir.path().join("bad.test.grx"), "---\nexpect_output = \"y\"\n---\nx").unwrap();
        assert_eq!(run_tests(dir.path(), true, &[]), 1);
        assert_eq!(run_tests(dir.path(), true, &["missing".to_string()]), 1);
    }

    #[test]
    fn bundled_conformance_suite_passes() {
        let suite = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/conformance");
        assert_eq!(run_tests(&suite, true, &[]), 0);
    }
}
