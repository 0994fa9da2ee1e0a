use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use cif::{Document, Notation};
use cif_engine::{ChangeLog, DictionarySet, DictionarySource, Warning};

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning must refer to this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Parse,
    Convert,
    Resolve,
    Rules,
    Validate,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub operation: Operation,

    /// Target notation for `convert`.
    #[serde(default)]
    pub to: Option<String>,

    /// Dictionary files, relative to the test file, in precedence order.
    #[serde(default)]
    pub dictionaries: Vec<String>,

    /// Rule source for `rules`.
    #[serde(default)]
    pub rules: Option<String>,

    /// Expected output (trimmed comparison). For document operations this is
    /// the rewritten text; for `validate`, one issue per line.
    #[serde(default)]
    pub expect_output: Option<String>,

    /// The operation must fail with an error whose text contains this.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

/// Split a `.test.cif` file into its TOML config and CIF input.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4;
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

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

/// What an operation produced, before expectations are checked.
struct Produced {
    output: String,
    warnings: Vec<Warning>,
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    let parse_result = cif::Parser::new(source.to_string(), 0).parse();

    if config.expect_parse_error {
        return TestResult {
            path: path.to_path_buf(),
            description,
            outcome: match parse_result {
                Err(error) => match &config.expect_error {
                    Some(expected) if !error.message.contains(expected.as_str()) => {
                        TestOutcome::Fail(format!(
                            "expected parse error containing \"{}\", got: {}",
                            expected, error.message
                        ))
                    }
                    _ => TestOutcome::Pass,
                },
                Ok(_) => TestOutcome::Fail("expected parse error, but parsing succeeded".into()),
            },
        };
    }

    let document = match parse_result {
        Ok(d) => d,
        Err(error) => return fail(description, format!("unexpected parse error: {}", error)),
    };

    if document.serialize() != source {
        return fail(description, "serializing the parsed input changed its text".into());
    }

    let base_dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    let produced = run_operation(&config, &document, &base_dir);

    let outcome = match (&config.expect_error, &config.expect_output, &produced) {
        (Some(expected), _, Err(error)) => {
            if error.contains(expected.as_str()) {
                None
            } else {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, error
                ))
            }
        }
        (Some(expected), _, Ok(_)) => Some(format!(
            "expected error containing \"{}\", but the operation succeeded",
            expected
        )),
        (None, _, Err(error)) => Some(format!("unexpected error: {}", error)),
        (None, Some(expected_output), Ok(produced)) => {
            let actual = produced.output.trim();
            let expected = expected_output.trim();
            if actual == expected {
                None
            } else {
                Some(format!(
                    "output mismatch\n  expected:\n{}\n  actual:\n{}",
                    indent(expected),
                    indent(actual)
                ))
            }
        }
        (None, None, Ok(_)) => None,
    };

    if let Some(reason) = outcome {
        return fail(description, reason);
    }

    if let (Some(expected_warnings), Ok(produced)) = (&config.expect_warnings, &produced) {
        if let Some(reason) = check_warnings(&produced.warnings, expected_warnings) {
            return fail(description, reason);
        }
    }

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Pass,
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

fn load_dictionaries(config: &TestConfig, base_dir: &Path) -> Result<DictionarySet, String> {
    if config.dictionaries.is_empty() {
        return Err("operation needs at least one entry in `dictionaries`".into());
    }
    let sources: Vec<DictionarySource> = config
        .dictionaries
        .iter()
        .map(|d| DictionarySource::Path(base_dir.join(d)))
        .collect();
    cif_engine::load_dictionaries(&sources).map_err(|e| e.to_string())
}

fn edited(document: Document, log: ChangeLog) -> Produced {
    Produced {
        output: document.serialize(),
        warnings: log.warnings,
    }
}

fn run_operation(config: &TestConfig, document: &Document, base_dir: &Path) -> Result<Produced, String> {
    match config.operation {
        Operation::Parse => Ok(Produced {
            output: document.serialize(),
            warnings: Vec::new(),
        }),
        Operation::Convert => {
            let target: Notation = config
                .to
                .as_deref()
                .ok_or("convert needs `to`")?
                .parse()?;
            let dictionary = load_dictionaries(config, base_dir)?;
            let (converted, log) =
                cif_engine::convert(document, &dictionary, target).map_err(|e| e.to_string())?;
            Ok(edited(converted, log))
        }
        Operation::Resolve => {
            let dictionary = load_dictionaries(config, base_dir)?;
            let (resolved, log) =
                cif_engine::resolve_aliases(document, &dictionary).map_err(|e| e.to_string())?;
            Ok(edited(resolved, log))
        }
        Operation::Rules => {
            let source = config.rules.as_deref().ok_or("rules needs `rules`")?;
            let rules = cif::rules::parse_rules(source, 1).map_err(|e| e.to_string())?;
            let dictionary = if config.dictionaries.is_empty() {
                None
            } else {
                Some(load_dictionaries(config, base_dir)?)
            };
            let run = cif_engine::apply_rules(document, &rules, dictionary.as_ref());
            if let Some(failure) = run.failure {
                return Err(failure.to_string());
            }
            Ok(edited(run.document, run.change_log))
        }
        Operation::Validate => {
            let dictionary = load_dictionaries(config, base_dir)?;
            let report = cif_engine::validate(document, &dictionary);
            let lines: Vec<String> = report.issues.iter().map(|i| i.to_string()).collect();
            Ok(Produced {
                output: lines.join("\n"),
                warnings: Vec::new(),
            })
        }
    }
}

/// Check that actual warnings match expectations. Returns `Some(reason)` on mismatch.
fn check_warnings(actual: &[Warning], expected: &[ExpectedWarning]) -> Option<String> {
    if actual.len() != expected.len() {
        let actual_msgs: Vec<String> = actual.iter().map(|w| format!("  - {}", w)).collect();
        return Some(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            actual.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual.iter().zip(expected.iter()).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, actual.message
            ));
        }

        if let Some(expected_line) = expected.line {
            match actual.line {
                Some(line) if line == expected_line => {}
                Some(line) => {
                    return Some(format!(
                        "warning[{}]: expected on line {}, but it is on line {}",
                        i, expected_line, line
                    ));
                }
                None => {
                    return Some(format!(
                        "warning[{}]: expected on line {}, but warning has no line",
                        i, expected_line
                    ));
                }
            }
        }
    }

    None
}

/// Discover `.test.cif` files grouped by category (subfolder relative to root).
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
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".test.cif") {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.cif files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label_for<'a>(result: &'a TestResult) -> &'a str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(".test.cif"))
            .unwrap_or("?")
    })
}

fn print_failures(failures: &[TestResult]) {
    eprintln!();
    eprintln!("failures:");
    for f in failures {
        eprintln!();
        eprintln!("  --- {} ---", f.path.display());
        if let TestOutcome::Fail(reason) = &f.outcome {
            for line in reason.lines() {
                eprintln!("  {}", line);
            }
        }
    }
}

fn print_summary(passed: usize, failed: usize, no_color: bool) -> i32 {
    eprintln!();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let bad = if no_color {
            "FAILED"
        } else {
            "\x1b[31mFAILED\x1b[0m"
        };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            bad,
            passed,
            failed,
            passed + failed
        );
        1
    }
}

/// Run all `.test.cif` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    if path.is_file() {
        let result = run_single_test(path);
        return match &result.outcome {
            TestOutcome::Pass => {
                eprintln!("  {}  {}", pass_label(no_color), label_for(&result));
                print_summary(1, 0, no_color)
            }
            TestOutcome::Fail(_) => {
                eprintln!("  {}  {}", fail_label(no_color), label_for(&result));
                print_failures(std::slice::from_ref(&result));
                print_summary(0, 1, no_color)
            }
        };
    }

    let all_categories = discover_categorized(path);

    if all_categories.is_empty() {
        eprintln!("no .test.cif files found in {}", path.display());
        return 1;
    }

    let run_categories: BTreeMap<&str, &Vec<PathBuf>> = if categories.is_empty() {
        all_categories.iter().map(|(k, v)| (k.as_str(), v)).collect()
    } else {
        let mut filtered = BTreeMap::new();
        for requested in categories {
            let req = requested.trim_matches('/');
            let mut found = false;
            for (cat, files) in &all_categories {
                if cat == req || cat.starts_with(&format!("{}/", req)) {
                    filtered.insert(cat.as_str(), files);
                    found = true;
                }
            }
            if !found {
                eprintln!(
                    "warning: category '{}' not found (available: {})",
                    req,
                    all_categories
                        .keys()
                        .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        filtered
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        let header = if cat.is_empty() { "(root)" } else { cat };
        eprintln!();
        eprintln!("{}", bold(header, no_color));

        for file in *files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label_for(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), label_for(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        print_failures(&failures);
    }
    print_summary(passed, failures.len(), no_color)
}
