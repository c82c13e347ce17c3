use crate::config::{Deliver, DEFAULT_ASSETS_BASE_URL};
use crate::mail;
use crate::render::Format;
use crate::vulns;
use clap::{builder::PossibleValuesParser, ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use strum::VariantNames;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Turn debugging information on
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
    /// Less verbose output
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub quiet: u8,
    #[command(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Summarize the latest scan results of an image
    Report(Report),
    /// Write the raw API responses of an image into a directory
    Fetch(Fetch),
}

#[derive(Debug, clap::Args)]
pub struct Api {
    /// Base url of the Sysdig Secure API
    #[arg(long = "url", env = "SYSDIG_URL", value_name = "URL")]
    pub sysdig_url: String,
    /// Sysdig Secure API token
    #[arg(long = "token", env = "SYSDIG_TOKEN", hide_env_values = true)]
    pub sysdig_token: Option<String>,
    /// Id of the scanned image
    #[arg(long = "image", value_name = "IMAGE_ID")]
    pub image_id: String,
}

#[derive(Debug, Parser)]
pub struct Report {
    #[command(flatten)]
    pub api: Api,
    /// Read responses saved with `fetch` instead of querying the API
    #[arg(long, value_name = "PATH")]
    pub from_dir: Option<PathBuf>,
    /// Where to deliver the report
    #[arg(
        long,
        default_value = "stdout",
        value_parser(PossibleValuesParser::new(Deliver::VARIANTS))
    )]
    pub deliver: String,
    /// Output format when delivering to stdout
    #[arg(
        short,
        long,
        default_value = "text",
        value_parser(PossibleValuesParser::new(Format::VARIANTS))
    )]
    pub format: String,
    /// Maximum number of vulnerabilities listed in the report
    #[arg(long, default_value_t = vulns::DEFAULT_CAP)]
    pub vuln_cap: usize,
    /// Base url for static assets referenced by the report
    #[arg(long, default_value = DEFAULT_ASSETS_BASE_URL)]
    pub assets_base_url: String,
    #[command(flatten)]
    pub smtp: Smtp,
}

#[derive(Debug, clap::Args)]
pub struct Smtp {
    /// Email recipient, may be given multiple times
    #[arg(long = "recipient", value_name = "ADDRESS")]
    pub recipients: Vec<String>,
    /// Sender address of the email
    #[arg(long, value_name = "ADDRESS", default_value = mail::DEFAULT_SENDER)]
    pub sender: String,
    /// SMTP server to send the email through
    #[arg(long, value_name = "HOST")]
    pub smtp_host: Option<String>,
    /// SMTP port, 465 uses implicit TLS
    #[arg(long, value_name = "PORT", default_value_t = mail::DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,
    #[arg(long, value_name = "USER")]
    pub smtp_user: Option<String>,
    #[arg(long, env = "SMTP_PASS", hide_env_values = true)]
    pub smtp_pass: Option<String>,
}

#[derive(Debug, Parser)]
pub struct Fetch {
    #[command(flatten)]
    pub api: Api,
    /// Directory to write image.json, check.json and vulns.json into
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,
}
