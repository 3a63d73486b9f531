use std::fmt;
use std::io::{self, Write};
use std::process;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use kennitala::{EntityKind, Kennitala, KennitalaError, KennitalaGen, is_valid};

#[derive(Debug, Parser)]
#[command(name = "kennitala", version)]
#[command(about = "Icelandic national identification number generator and validator")]
struct Cli {
    #[arg(long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate random valid kennitölur.
    Generate(GenerateOpts),
    /// Print `true` if the input is a valid kennitala, `false` otherwise.
    Validate(InputOpts),
    /// Decode a kennitala into its fields.
    Parse(ParseOpts),
    /// Generate and re-validate one value of each kind.
    Healthcheck {
        #[arg(long)]
        json: bool,
    },
    /// Measure generation and validation throughput.
    Bench(BenchOpts),
}

#[derive(Debug, Args)]
struct InputOpts {
    /// Kennitala text; separate words are joined with a space.
    #[arg(required = true, num_args = 1..)]
    input: Vec<String>,
}

impl InputOpts {
    fn text(&self) -> String {
        self.input.join(" ")
    }
}

#[derive(Debug, Args)]
struct GenerateOpts {
    #[arg(long, help = "Generate company kennitölur instead of personal ones")]
    company: bool,

    #[arg(long, default_value_t = 1)]
    count: usize,

    #[arg(long, help = "Insert the separator between the date and sequence parts")]
    pretty: bool,

    #[arg(long, env = "KENNITALA_SEPARATOR", default_value = " ")]
    separator: String,
}

#[derive(Debug, Args)]
struct ParseOpts {
    #[command(flatten)]
    input: InputOpts,

    #[arg(long)]
    json: bool,

    #[arg(long, env = "KENNITALA_SEPARATOR", default_value = " ")]
    separator: String,
}

#[derive(Debug, Args)]
struct BenchOpts {
    #[arg(long)]
    company: bool,

    #[arg(long, default_value_t = 100_000)]
    count: usize,
}

fn kind_for(company: bool) -> EntityKind {
    if company {
        EntityKind::Company
    } else {
        EntityKind::Person
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "kennitala=debug"
    } else {
        "kennitala=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn run_generate(opts: &GenerateOpts) -> Result<()> {
    let kind = kind_for(opts.company);
    let mut out = io::stdout().lock();

    for kt in KennitalaGen::new(kind).take(opts.count) {
        debug!(kennitala = %kt, kind = kind.as_str(), "generated");
        if opts.pretty {
            writeln!(out, "{}", kt.pretty(&opts.separator))?;
        } else {
            writeln!(out, "{kt}")?;
        }
    }

    out.flush()?;
    Ok(())
}

fn run_validate(opts: &InputOpts) -> Result<()> {
    let ok = is_valid(&opts.text());
    println!("{ok}");
    if ok {
        Ok(())
    } else {
        bail!("invalid kennitala")
    }
}

/// Fields of an accepted kennitala, each decoded independently.
#[derive(Debug)]
struct ParseReport {
    kennitala: Kennitala,
    pretty: String,
    kind: Result<EntityKind, KennitalaError>,
    date: Result<NaiveDate, KennitalaError>,
    age: Result<i32, KennitalaError>,
}

impl ParseReport {
    fn new(kennitala: Kennitala, separator: &str) -> Self {
        Self {
            kennitala,
            pretty: kennitala.pretty(separator),
            kind: kennitala.entity_kind(),
            date: kennitala.to_date(),
            age: kennitala.age(),
        }
    }

    fn first_error(&self) -> Option<KennitalaError> {
        self.kind.err().or(self.date.err()).or(self.age.err())
    }

    fn lines(&self) -> Vec<String> {
        vec![
            format!("kennitala={}", self.kennitala),
            format!("pretty={}", self.pretty),
            format!("kind={}", show(&self.kind)),
            format!("date={}", show(&self.date)),
            format!("age={}", show(&self.age)),
        ]
    }

    fn to_json(&self) -> Value {
        let mut errors = Map::new();
        let kind = json_field("kind", &self.kind, &mut errors);
        let date = json_field("date", &self.date, &mut errors);
        let age = json_field("age", &self.age, &mut errors);

        let mut payload = json!({
            "kennitala": self.kennitala,
            "pretty": self.pretty,
            "kind": kind,
            "date": date,
            "age": age,
        });
        if !errors.is_empty() {
            payload["errors"] = Value::Object(errors);
        }
        payload
    }
}

fn show<T: fmt::Display>(field: &Result<T, KennitalaError>) -> String {
    match field {
        Ok(value) => value.to_string(),
        Err(err) => format!("error: {err}"),
    }
}

fn json_field<T: Serialize>(
    name: &str,
    field: &Result<T, KennitalaError>,
    errors: &mut Map<String, Value>,
) -> Value {
    match field {
        Ok(value) => json!(value),
        Err(err) => {
            errors.insert(name.to_string(), json!(err.to_string()));
            Value::Null
        }
    }
}

fn rejection_json(err: &KennitalaError) -> Value {
    let reason = match err {
        KennitalaError::InvalidFormat(reason) => Some(reason.as_str()),
        _ => None,
    };
    json!({
        "valid": false,
        "error": err.to_string(),
        "reason": reason,
    })
}

fn run_parse(opts: &ParseOpts) -> Result<()> {
    let text = opts.input.text();
    let kt = match Kennitala::parse(&text) {
        Ok(kt) => kt,
        Err(err) => {
            if opts.json {
                println!("{}", serde_json::to_string(&rejection_json(&err))?);
            }
            return Err(err).with_context(|| format!("cannot parse {text:?}"));
        }
    };

    let report = ParseReport::new(kt, &opts.separator);
    if opts.json {
        println!("{}", serde_json::to_string(&report.to_json())?);
    } else {
        for line in report.lines() {
            println!("{line}");
        }
    }

    match report.first_error() {
        Some(err) => Err(err).with_context(|| format!("cannot decode every field of {kt}")),
        None => Ok(()),
    }
}

fn run_healthcheck(json_mode: bool) -> Result<()> {
    let person = Kennitala::generate(EntityKind::Person);
    let company = Kennitala::generate(EntityKind::Company);
    let ok = is_valid(person.as_str())
        && is_valid(company.as_str())
        && person.is_person()
        && company.is_company();

    if json_mode {
        let payload = json!({
            "ok": ok,
            "sample_person": person,
            "sample_company": company,
        });
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!("ok={ok} person={person} company={company}");
    }

    if ok {
        Ok(())
    } else {
        bail!("healthcheck failed")
    }
}

fn run_bench(opts: &BenchOpts) -> Result<()> {
    let kind = kind_for(opts.company);
    let mut generator = KennitalaGen::new(kind);
    let start = Instant::now();

    let mut valid = 0usize;
    for _ in 0..opts.count {
        let kt = generator.next_kennitala();
        if is_valid(kt.as_str()) {
            valid += 1;
        }
    }

    let secs = start.elapsed().as_secs_f64().max(1e-9);
    let payload = json!({
        "kind": kind,
        "n": opts.count,
        "valid": valid,
        "seconds": secs,
        "ids_per_sec": opts.count as f64 / secs,
    });
    println!("{}", serde_json::to_string(&payload)?);
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Generate(opts) => run_generate(opts),
        Command::Validate(opts) => run_validate(opts),
        Command::Parse(opts) => run_parse(opts),
        Command::Healthcheck { json } => run_healthcheck(*json),
        Command::Bench(opts) => run_bench(opts),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kennitala").chain(args.iter().copied()))
            .expect("valid command line")
    }

    #[test]
    fn test_generate_flags() {
        let Command::Generate(opts) = cli(&[
            "generate",
            "--company",
            "--count",
            "3",
            "--pretty",
            "--separator",
            "-",
        ])
        .command
        else {
            panic!("expected generate");
        };
        assert!(opts.company);
        assert_eq!(opts.count, 3);
        assert!(opts.pretty);
        assert_eq!(opts.separator, "-");
        assert_eq!(kind_for(opts.company), EntityKind::Company);
        assert_eq!(kind_for(false), EntityKind::Person);
    }

    #[test]
    fn test_separator_falls_back_to_env_then_space() {
        let separator = |args: &[&str]| match cli(args).command {
            Command::Generate(opts) => opts.separator,
            Command::Parse(opts) => opts.separator,
            other => panic!("unexpected command {other:?}"),
        };

        // SAFETY: the only test in this binary that touches the environment.
        unsafe { std::env::remove_var("KENNITALA_SEPARATOR") };
        assert_eq!(separator(&["generate"]), " ");
        assert_eq!(separator(&["parse", "0101302989"]), " ");

        unsafe { std::env::set_var("KENNITALA_SEPARATOR", "🐈") };
        assert_eq!(separator(&["generate"]), "🐈");
        assert_eq!(separator(&["parse", "0101302989"]), "🐈");
        assert_eq!(separator(&["generate", "--separator", "/"]), "/");

        unsafe { std::env::remove_var("KENNITALA_SEPARATOR") };
    }

    #[test]
    fn test_generate_defaults() {
        let Command::Generate(opts) = cli(&["generate", "--separator", " "]).command else {
            panic!("expected generate");
        };
        assert!(!opts.company);
        assert_eq!(opts.count, 1);
        assert!(!opts.pretty);
    }

    #[test]
    fn test_validate_joins_split_words() {
        let Command::Validate(opts) = cli(&["validate", "010130", "2989"]).command else {
            panic!("expected validate");
        };
        assert_eq!(opts.text(), "010130 2989");
        assert!(run_validate(&opts).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_checksum() {
        let Command::Validate(opts) = cli(&["validate", "0101302979"]).command else {
            panic!("expected validate");
        };
        let err = run_validate(&opts).unwrap_err();
        assert_eq!(err.to_string(), "invalid kennitala");
    }

    #[test]
    fn test_validate_requires_input() {
        assert!(Cli::try_parse_from(["kennitala", "validate"]).is_err());
    }

    #[test]
    fn test_parse_flags() {
        let Command::Parse(opts) = cli(&["parse", "461202", "3220", "--json", "--separator", "-"])
            .command
        else {
            panic!("expected parse");
        };
        assert!(opts.json);
        assert_eq!(opts.separator, "-");
        assert_eq!(opts.input.text(), "461202 3220");
        assert!(run_parse(&opts).is_ok());
    }

    #[test]
    fn test_report_for_decodable_kennitala() {
        let report = ParseReport::new(Kennitala::parse("0101302989").unwrap(), "-");
        assert_eq!(report.first_error(), None);

        let lines = report.lines();
        assert_eq!(lines[0], "kennitala=0101302989");
        assert_eq!(lines[1], "pretty=010130-2989");
        assert_eq!(lines[2], "kind=person");
        assert_eq!(lines[3], "date=1930-01-01");

        let payload = report.to_json();
        assert_eq!(payload["kind"], "person");
        assert_eq!(payload["date"], "1930-01-01");
        assert!(payload.get("errors").is_none());
    }

    #[test]
    fn test_report_keeps_accepted_forms_when_century_is_unknown() {
        let report = ParseReport::new(Kennitala::parse("0101302981").unwrap(), " ");
        assert_eq!(report.first_error(), Some(KennitalaError::InvalidCentury(1)));

        let lines = report.lines();
        assert_eq!(lines[0], "kennitala=0101302981");
        assert_eq!(lines[1], "pretty=010130 2981");
        assert_eq!(lines[2], "kind=person");
        assert_eq!(lines[3], "date=error: Invalid century indicator: 1");
        assert_eq!(lines[4], "age=error: Invalid century indicator: 1");

        let payload = report.to_json();
        assert_eq!(payload["kennitala"], "0101302981");
        assert_eq!(payload["kind"], "person");
        assert_eq!(payload["date"], Value::Null);
        assert_eq!(payload["errors"]["date"], "Invalid century indicator: 1");
    }

    #[test]
    fn test_report_for_undecodable_entity_field() {
        let report = ParseReport::new(Kennitala::parse("0001300019").unwrap(), " ");
        assert_eq!(
            report.first_error(),
            Some(KennitalaError::InvalidEntityField(0))
        );
        assert_eq!(report.lines()[1], "pretty=000130 0019");
        assert_eq!(report.to_json()["kind"], Value::Null);
    }

    #[test]
    fn test_parse_command_fails_after_reporting_decode_errors() {
        let Command::Parse(opts) = cli(&["parse", "0101302981", "--separator", " "]).command
        else {
            panic!("expected parse");
        };
        assert!(run_parse(&opts).is_err());
    }

    #[test]
    fn test_rejection_json_names_the_reason() {
        let err = Kennitala::parse("0101302979").unwrap_err();
        let payload = rejection_json(&err);
        assert_eq!(payload["valid"], false);
        assert_eq!(payload["error"], "Kennitala is invalid");
        assert_eq!(payload["reason"], "checksum");

        let short = Kennitala::parse("123").unwrap_err();
        assert_eq!(rejection_json(&short)["reason"], "length");
        assert_eq!(
            rejection_json(&KennitalaError::InvalidArgumentType)["reason"],
            Value::Null
        );
    }
}
