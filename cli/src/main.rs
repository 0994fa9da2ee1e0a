mod fetch;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cif::{Document, Notation, ParseError};
use cif_engine::{ChangeLog, DictionarySet, DictionarySource, Fetch, Warning};

use crate::fetch::{HttpFetch, is_url};

const SUBCOMMANDS: &[&str] = &[
    "parse", "convert", "resolve", "rules", "validate", "dict", "test", "help",
];

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "cifed", version, about = "Lossless CIF editor")]
struct Cli {
    /// Disable colored diagnostics
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a CIF file and report its structure
    Parse(ParseArgs),

    /// Rewrite field names into legacy or modern notation
    Convert(ConvertArgs),

    /// Merge fields that spell the same canonical field
    Resolve(EditArgs),

    /// Apply a field-rule file
    Rules(RulesArgs),

    /// Report unknown, deprecated, duplicated or mis-notated fields
    Validate(ValidateArgs),

    /// Inspect loaded dictionaries
    Dict(DictArgs),

    /// Run .test.cif golden files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ParseArgs {
    /// CIF file to parse
    file: String,

    /// List every block, save frame and field name
    #[arg(long)]
    names: bool,

    /// Print the parsed document model
    #[arg(long)]
    ast: bool,
}

#[derive(clap::Args)]
struct EditArgs {
    /// CIF file to transform
    file: String,

    /// Dictionary file or http(s) URL, in precedence order (later wins). Repeatable.
    #[arg(short, long = "dict", required = true)]
    dict: Vec<String>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON report on stdout
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Target notation: legacy or modern
    #[arg(short, long)]
    to: Notation,

    #[command(flatten)]
    edit: EditArgs,
}

#[derive(clap::Args)]
struct RulesArgs {
    /// CIF file to transform
    file: String,

    /// Rule file
    #[arg(short, long)]
    rules: PathBuf,

    /// Dictionaries used to match rule fields written in another spelling
    #[arg(short, long = "dict")]
    dict: Vec<String>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ValidateArgs {
    file: String,

    #[arg(short, long = "dict", required = true)]
    dict: Vec<String>,

    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct DictArgs {
    #[arg(short, long = "dict", required = true)]
    dict: Vec<String>,

    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    action: DictAction,
}

#[derive(Subcommand)]
enum DictAction {
    /// List loaded sources, merge conflicts and failures
    Info,

    /// Show the definition behind a field name
    Lookup { name: String },
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.cif file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `cifed file.cif` is shorthand for `cifed parse file.cif`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')) {
        let pos = pos + 1;
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "parse".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_tracing(cli.verbose, cli.no_color);
    let mut out = Output::new(cli.no_color);

    let code = match cli.command {
        Command::Parse(args) => do_parse(args, &mut out),
        Command::Convert(args) => do_convert(args, &mut out),
        Command::Resolve(args) => do_resolve(args, &mut out),
        Command::Rules(args) => do_rules(args, &mut out),
        Command::Validate(args) => do_validate(args, &mut out),
        Command::Dict(args) => do_dict(args),
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                0
            } else {
                test_runner::run_tests(path, cli.no_color, &args.category)
            }
        }
    };
    process::exit(code);
}

fn init_tracing(verbose: u8, no_color: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .init();
}

/// Source files and the stderr stream diagnostics are rendered to.
struct Output {
    writer: StandardStream,
    config: term::Config,
    files: SimpleFiles<String, String>,
}

impl Output {
    fn new(no_color: bool) -> Self {
        let color_choice = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Output {
            writer: StandardStream::stderr(color_choice),
            config: term::Config::default(),
            files: SimpleFiles::new(),
        }
    }

    fn add(&mut self, name: &str, source: &str) -> usize {
        self.files.add(name.to_string(), source.to_string())
    }

    fn emit(&self, diagnostic: &Diagnostic<usize>) {
        let _ = term::emit_to_write_style(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            diagnostic,
        );
    }

    fn emit_parse_error(&self, error: &ParseError) {
        self.emit(&error.to_diagnostic());
    }

    /// Warnings carry 1-based lines of the input file; label the whole line.
    fn emit_warning(&self, file_id: usize, warning: &Warning) {
        let range = warning
            .line
            .and_then(|line| self.files.line_range(file_id, line.saturating_sub(1)).ok());
        match range {
            Some(range) => {
                let diagnostic = Diagnostic::warning()
                    .with_message(&warning.message)
                    .with_labels(vec![Label::primary(file_id, range)]);
                self.emit(&diagnostic);
            }
            None => eprintln!("warning: {}", warning.message),
        }
    }

    fn emit_log(&self, file_id: usize, log: &ChangeLog) {
        for change in &log.changes {
            eprintln!("  {}", change);
        }
        for warning in &log.warnings {
            self.emit_warning(file_id, warning);
        }
    }
}

/// Read and parse `path`, rendering a diagnostic on failure.
fn read_document(path: &str, out: &mut Output) -> Option<(Document, usize)> {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path, e);
            return None;
        }
    };
    let file_id = out.add(path, &source);
    match cif::Parser::new(source, file_id).parse() {
        Ok(document) => Some((document, file_id)),
        Err(error) => {
            out.emit_parse_error(&error);
            None
        }
    }
}

/// Resolve `--dict` arguments in order. URLs are fetched first; a source that
/// cannot be fetched or loaded is reported and skipped.
fn load_dictionaries(args: &[String]) -> Option<DictionarySet> {
    let mut sources = Vec::new();
    let mut fetch_failures = 0;
    for arg in args {
        if is_url(arg) {
            let text = HttpFetch
                .fetch(arg, FETCH_TIMEOUT)
                .map_err(|e| e.message)
                .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()));
            match text {
                Ok(text) => sources.push(DictionarySource::Text {
                    name: arg.clone(),
                    text,
                }),
                Err(message) => {
                    eprintln!("warning: cannot fetch {}: {}", arg, message);
                    fetch_failures += 1;
                }
            }
        } else {
            sources.push(DictionarySource::Path(PathBuf::from(arg)));
        }
    }
    if sources.is_empty() {
        eprintln!("error: no dictionary could be loaded ({} source(s) failed)", fetch_failures);
        return None;
    }

    match cif_engine::load_dictionaries(&sources) {
        Ok(set) => {
            for failure in set.failures() {
                eprintln!("warning: {}: {}", failure.source, failure.message);
            }
            Some(set)
        }
        Err(error) => {
            eprintln!("error: {}", error);
            None
        }
    }
}

fn write_document(document: &Document, output: &Option<PathBuf>) -> Result<(), String> {
    match output {
        Some(path) => std::fs::write(path, document.serialize())
            .map_err(|e| format!("cannot write '{}': {}", path.display(), e)),
        None => {
            print!("{}", document.serialize());
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("error: cannot encode report: {}", e);
            1
        }
    }
}

#[derive(Serialize)]
struct EditReport<'a> {
    document: String,
    change_log: &'a ChangeLog,
}

/// Print the outcome of a document transformation.
fn finish_edit(
    document: &Document,
    log: &ChangeLog,
    file_id: usize,
    output: &Option<PathBuf>,
    json: bool,
    out: &Output,
) -> i32 {
    if json {
        if let Some(path) = output {
            if let Err(e) = std::fs::write(path, document.serialize()) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                return 1;
            }
        }
        return print_json(&EditReport {
            document: document.serialize(),
            change_log: log,
        });
    }
    if let Err(message) = write_document(document, output) {
        eprintln!("error: {}", message);
        return 1;
    }
    out.emit_log(file_id, log);
    0
}

fn do_parse(args: ParseArgs, out: &mut Output) -> i32 {
    let Some((document, _)) = read_document(&args.file, out) else {
        return 1;
    };

    if args.ast {
        println!("{:#?}", document);
        return 0;
    }

    if args.names {
        for scope in document.scopes() {
            println!("{} ({:?})", scope.name, scope.kind);
            for name in scope.names() {
                let marker = if name.looped { " [loop]" } else { "" };
                println!("  {}{}", name.name, marker);
            }
        }
        return 0;
    }

    let version = document
        .version()
        .map_or("none".to_string(), |v| v.marker().to_string());
    eprintln!(
        "ok: {} parsed ({} block(s), format {:?}, marker {})",
        args.file,
        document.blocks.len(),
        document.detected_format(),
        version
    );
    0
}

fn do_convert(args: ConvertArgs, out: &mut Output) -> i32 {
    let edit = args.edit;
    let Some((document, file_id)) = read_document(&edit.file, out) else {
        return 1;
    };
    let Some(dictionary) = load_dictionaries(&edit.dict) else {
        return 1;
    };
    match cif_engine::convert(&document, &dictionary, args.to) {
        Ok((converted, log)) => finish_edit(&converted, &log, file_id, &edit.output, edit.json, out),
        Err(error) => {
            eprintln!("error: {}", error);
            1
        }
    }
}

fn do_resolve(args: EditArgs, out: &mut Output) -> i32 {
    let Some((document, file_id)) = read_document(&args.file, out) else {
        return 1;
    };
    let Some(dictionary) = load_dictionaries(&args.dict) else {
        return 1;
    };
    match cif_engine::resolve_aliases(&document, &dictionary) {
        Ok((resolved, log)) => finish_edit(&resolved, &log, file_id, &args.output, args.json, out),
        Err(error) => {
            eprintln!("error: {}", error);
            1
        }
    }
}

#[derive(Serialize)]
struct RulesReport<'a> {
    document: String,
    change_log: &'a ChangeLog,
    outcomes: &'a [cif_engine::RuleOutcome],
    failure: Option<&'a cif_engine::RuleFailure>,
}

fn do_rules(args: RulesArgs, out: &mut Output) -> i32 {
    let Some((document, file_id)) = read_document(&args.file, out) else {
        return 1;
    };

    let rule_path = args.rules.display().to_string();
    let rule_source = match std::fs::read_to_string(&args.rules) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", rule_path, e);
            return 1;
        }
    };
    let rules_id = out.add(&rule_path, &rule_source);
    let rules = match cif::rules::parse_rules(&rule_source, rules_id) {
        Ok(rules) => rules,
        Err(error) => {
            out.emit_parse_error(&error);
            return 1;
        }
    };

    let dictionary = if args.dict.is_empty() {
        None
    } else {
        match load_dictionaries(&args.dict) {
            Some(set) => Some(set),
            None => return 1,
        }
    };

    let run = cif_engine::apply_rules(&document, &rules, dictionary.as_ref());

    if args.json {
        let code = print_json(&RulesReport {
            document: run.document.serialize(),
            change_log: &run.change_log,
            outcomes: &run.outcomes,
            failure: run.failure.as_ref(),
        });
        return if run.succeeded() { code } else { 1 };
    }

    for outcome in &run.outcomes {
        eprintln!("  line {}: {} -> {:?}", outcome.line, outcome.rule, outcome.status);
    }
    if let Some(failure) = &run.failure {
        eprintln!("error: {}", failure);
        eprintln!("note: no output written; rules before line {} were not kept", failure.line);
        return 1;
    }
    if let Err(message) = write_document(&run.document, &args.output) {
        eprintln!("error: {}", message);
        return 1;
    }
    out.emit_log(file_id, &run.change_log);
    0
}

fn do_validate(args: ValidateArgs, out: &mut Output) -> i32 {
    let Some((document, _)) = read_document(&args.file, out) else {
        return 1;
    };
    let Some(dictionary) = load_dictionaries(&args.dict) else {
        return 1;
    };

    let report = cif_engine::validate(&document, &dictionary);
    if args.json {
        let code = print_json(&report);
        return if report.is_clean() { code } else { 1 };
    }
    for issue in &report.issues {
        println!("{}", issue);
    }
    if report.is_clean() {
        eprintln!("ok: {} has no field-name issues", args.file);
        0
    } else {
        eprintln!("{} issue(s) found", report.problems().count());
        1
    }
}

fn do_dict(args: DictArgs) -> i32 {
    let Some(dictionary) = load_dictionaries(&args.dict) else {
        return 1;
    };

    match args.action {
        DictAction::Info => {
            if args.json {
                return print_json(&serde_json::json!({
                    "sources": dictionary.info(),
                    "fields": dictionary.len(),
                    "conflicts": dictionary.conflicts(),
                    "failures": dictionary.failures(),
                }));
            }
            for source in dictionary.info() {
                println!(
                    "{} [{}] {} {} ({} fields)",
                    source.name,
                    source.format,
                    source.title.as_deref().unwrap_or("-"),
                    source.version.as_deref().unwrap_or("-"),
                    source.field_count
                );
            }
            println!("{} canonical field(s)", dictionary.len());
            for conflict in dictionary.conflicts() {
                println!("  conflict: {}", conflict);
            }
            0
        }
        DictAction::Lookup { name } => {
            let Some(field) = dictionary.lookup(&name) else {
                eprintln!("error: {} is not defined in the loaded dictionaries", name);
                return 1;
            };
            if args.json {
                return print_json(field);
            }
            println!("{}", field.canonical_id);
            println!("  legacy:  {}", field.spelling_for(Notation::Legacy));
            println!("  modern:  {}", field.spelling_for(Notation::Modern));
            if !field.aliases.is_empty() {
                let aliases: Vec<&str> = field.aliases.iter().map(String::as_str).collect();
                println!("  aliases: {}", aliases.join(", "));
            }
            println!("  type:    {:?}", field.value_kind);
            if let Some(default) = &field.default_value {
                println!("  default: {}", default);
            }
            let chain = dictionary.deprecation_chain(&field.canonical_id);
            if chain.len() > 1 {
                println!("  superseded: {}", chain.join(" -> "));
            } else if field.retired {
                println!("  retired");
            }
            println!("  source:  {}", field.source);
            0
        }
    }
}
