mod api;
mod card;
mod cli;
mod config;
mod error;
mod model;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;

use api::client::BacklogClient;
use error::ReportError;
use report::{Credentials, ReportRunner};

/// Shown when either credential field is empty.
const VALIDATION_MESSAGE: &str = "Backlog URLとAPIキーを入力してください。";
/// Shown when any fetch or image load fails. Details go to the log only.
const FETCH_ERROR_MESSAGE: &str =
    "データの取得中にエラーが発生しました。入力情報またはAPIキーの権限をご確認ください。";

enum RunFailure {
    Validation,
    Fetch(anyhow::Error),
    Other(anyhow::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match cli::parse_args(&args) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if opts.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    match run(opts).await {
        Ok(out) => {
            println!("画像を保存しました: {}", out.display());
            ExitCode::SUCCESS
        }
        Err(RunFailure::Validation) => {
            eprintln!("{VALIDATION_MESSAGE}");
            ExitCode::FAILURE
        }
        Err(RunFailure::Fetch(err)) => {
            log::error!("report run failed: {err:?}");
            eprintln!("{FETCH_ERROR_MESSAGE}");
            ExitCode::FAILURE
        }
        Err(RunFailure::Other(err)) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: cli::Options) -> Result<PathBuf, RunFailure> {
    let mut cfg = config::load_config().map_err(RunFailure::Other)?;

    let credentials = Credentials {
        backlog_url: opts
            .url
            .or_else(|| cfg.backlog_url.clone())
            .unwrap_or_default(),
        api_key: opts
            .api_key
            .or_else(|| cfg.api_key.clone())
            .unwrap_or_default(),
    };

    // Persist whatever was submitted before fetching, like the form this
    // replaces wrote localStorage on every submit.
    cfg.backlog_url = Some(credentials.backlog_url.clone());
    cfg.api_key = Some(credentials.api_key.clone());
    if let Err(err) = config::save_config(&cfg) {
        log::warn!("could not persist credentials: {err:#}");
    }

    let year = cfg.year();
    let template = PathBuf::from(opts.template.unwrap_or_else(|| "template.png".to_string()));
    let out = PathBuf::from(opts.out.unwrap_or_else(|| format!("backlog-{year}.png")));

    let client = BacklogClient::new(&credentials.backlog_url, credentials.api_key.clone(), year);
    let mut runner = ReportRunner::new();
    let report = runner
        .run(&client, &credentials, &template)
        .await
        .map_err(|err| match err {
            ReportError::Validation(_) => RunFailure::Validation,
            ReportError::Fetch(source) => RunFailure::Fetch(source),
        })?;

    report
        .card
        .save(&out)
        .with_context(|| format!("failed to write card to {}", out.display()))
        .map_err(RunFailure::Other)?;

    log::info!(
        "card for {} written to {} ({} stars, {} created, {} assigned)",
        report.user.name,
        out.display(),
        report.metrics.stars,
        report.metrics.created,
        report.metrics.assigned
    );
    Ok(out)
}
