use clap::Parser;
use env_logger::Env;
use image_scan_notify::api::HttpApi;
use image_scan_notify::args::{Args, SubCommand};
use image_scan_notify::config::{Config, Delivery};
use image_scan_notify::errors::*;
use image_scan_notify::mail;
use image_scan_notify::pipeline;
use image_scan_notify::render;
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match (args.quiet, args.verbose) {
        (0, 0) => "info",
        (0, _) => "debug",
        _ => "warn",
    };
    env_logger::init_from_env(Env::default().default_filter_or(log_level));

    match args.subcommand {
        SubCommand::Report(report) => {
            let config = Config::from_args(report)?;
            let api = config.source.open()?;
            let ctx = pipeline::run(api.as_ref(), &config).await?;

            match &config.delivery {
                Delivery::Stdout(format) => {
                    let out = render::render(&ctx, *format)?;
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(out.as_bytes())?;
                    stdout.flush()?;
                }
                Delivery::Email(settings) => mail::send(&ctx, settings).await?,
            }
        }
        SubCommand::Fetch(fetch) => {
            let token = fetch
                .api
                .sysdig_token
                .context("An API token is required to fetch scan results")?;
            let api = HttpApi::new(&fetch.api.sysdig_url, &token)?;
            let responses = pipeline::fetch(&api, &fetch.api.image_id).await?;
            responses.save(&fetch.output).await?;
        }
    }

    info!("All done");
    Ok(())
}
