use anyhow::{bail, Result};

/// Parsed command-line options. Flags override stored config values.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub template: Option<String>,
    pub out: Option<String>,
    pub help: bool,
}

/// Parse CLI args into [`Options`].
///
/// Supported forms:
///   backlog-wrapped
///   backlog-wrapped --url https://your-space.backlog.com --api-key KEY
///   backlog-wrapped -o card.png -t assets/template.png
pub fn parse_args(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-u" | "--url" => opts.url = Some(take_value(args, &mut i, "--url")?),
            "-k" | "--api-key" => opts.api_key = Some(take_value(args, &mut i, "--api-key")?),
            "-t" | "--template" => opts.template = Some(take_value(args, &mut i, "--template")?),
            "-o" | "--out" => opts.out = Some(take_value(args, &mut i, "--out")?),
            "-h" | "--help" => opts.help = true,
            other => bail!("Unknown argument: {other}\n\nRun with --help for usage."),
        }
        i += 1;
    }

    Ok(opts)
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    if *i < args.len() {
        Ok(args[*i].clone())
    } else {
        bail!("Missing value for {flag} flag");
    }
}

pub fn print_help() {
    println!("backlog-wrapped — Backlog year-in-review card generator\n");
    println!("USAGE:");
    println!("  backlog-wrapped [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -u, --url <URL>        Backlog space URL (e.g. https://your-space.backlog.com)");
    println!("  -k, --api-key <KEY>    Backlog API key");
    println!("  -t, --template <PATH>  Template image (default: template.png)");
    println!("  -o, --out <PATH>       Output PNG path (default: backlog-<year>.png)");
    println!("  -h, --help             Show this help");
    println!();
    println!("Credentials are remembered in ~/.backlog-wrapped/config.toml after the");
    println!("first run, so later runs need no flags.");
}
