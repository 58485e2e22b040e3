use serde::Serialize;
use std::io::Read;
use wikidown::{ConvertOptions, DiagramKind, convert_snapshot, detect_kind, parse_document, recover};

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Convert(wikidown::ConvertError),
    Document(wikidown_core::Error),
    Json(serde_json::Error),
    NoDiagram,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Convert(err) => write!(f, "{err}"),
            CliError::Document(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::NoDiagram => write!(f, "No supported diagram detected"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<wikidown::ConvertError> for CliError {
    fn from(value: wikidown::ConvertError) -> Self {
        Self::Convert(value)
    }
}

impl From<wikidown_core::Error> for CliError {
    fn from(value: wikidown_core::Error) -> Self {
        Self::Document(value)
    }
}

impl From<wikidown_diagram::Error> for CliError {
    fn from(value: wikidown_diagram::Error) -> Self {
        Self::Convert(value.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Convert,
    Detect,
    Diagram,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    json: bool,
    pretty: bool,
    verbose: bool,
    config: Option<String>,
    base_url: Option<String>,
    no_markers: bool,
}

#[derive(Serialize)]
struct DiagramOut<'a> {
    kind: DiagramKind,
    text: &'a str,
}

fn usage() -> &'static str {
    "wikidown\n\
\n\
USAGE:\n\
  wikidown [convert] [--json] [--pretty] [--config <file>] [--base-url <url>] [--no-markers] [--verbose] [<path>|-]\n\
  wikidown detect [--verbose] [<path>|-]\n\
  wikidown diagram [--json] [--pretty] [--config <file>] [--verbose] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - Input is a well-formed XHTML/SVG snapshot of a rendered page (or of one diagram <svg>).\n\
  - convert prints Markdown; --json prints {\"title\": ..., \"markdown\": ...} instead.\n\
  - diagram prints the Mermaid source recovered from a single diagram <svg>.\n\
  - --config reads conversion options from a JSON file (camelCase keys).\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "convert" => args.command = Command::Convert,
            "detect" => args.command = Command::Detect,
            "diagram" => args.command = Command::Diagram,
            "--json" => args.json = true,
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--no-markers" => args.no_markers = true,
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--base-url" => {
                let Some(url) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                if !url.trim().is_empty() {
                    args.base_url = Some(url.trim().to_string());
                }
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn load_options(args: &Args) -> Result<ConvertOptions, CliError> {
    let mut options = match args.config.as_deref() {
        Some(path) => ConvertOptions::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ConvertOptions::default(),
    };
    if args.base_url.is_some() {
        options = options.with_base_url(args.base_url.clone());
    }
    if args.no_markers {
        options = options.with_error_markers(false);
    }
    Ok(options)
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    let options = load_options(&args)?;
    let text = read_input(args.input.as_deref())?;

    match args.command {
        Command::Convert => {
            let page = convert_snapshot(&text, &options)?;
            if args.json {
                write_json(&page, args.pretty)?;
            } else {
                print!("{}", page.markdown);
            }
            Ok(())
        }
        Command::Detect => {
            let svg = parse_document(&text)?;
            let Some(kind) = detect_kind(&svg) else {
                return Err(CliError::NoDiagram);
            };
            println!("{kind}");
            Ok(())
        }
        Command::Diagram => {
            let svg = parse_document(&text)?;
            let Some(recovered) = recover(&svg, &options.recovery)? else {
                return Err(CliError::NoDiagram);
            };
            if args.json {
                write_json(
                    &DiagramOut {
                        kind: recovered.kind,
                        text: &recovered.text,
                    },
                    args.pretty,
                )?;
            } else {
                print!("{}", recovered.text);
            }
            Ok(())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => {}
        Err(CliError::NoDiagram) => {
            eprintln!("{}", CliError::NoDiagram);
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("wikidown")
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn flags_and_input_are_parsed() {
        let args = parse_args(&argv(&["--json", "--base-url", "https://x.dev/", "page.xhtml"]))
            .expect("valid args");
        assert!(args.json);
        assert_eq!(args.base_url.as_deref(), Some("https://x.dev/"));
        assert_eq!(args.input.as_deref(), Some("page.xhtml"));

        let args = parse_args(&argv(&["diagram", "-"])).expect("valid args");
        assert!(matches!(args.command, Command::Diagram));
        assert_eq!(args.input.as_deref(), Some("-"));
    }

    #[test]
    fn bad_arguments_are_usage_errors() {
        assert!(matches!(parse_args(&argv(&["--bogus"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_args(&argv(&["a", "b"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_args(&argv(&["--config"])), Err(CliError::Usage(_))));
    }
}
