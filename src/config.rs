use crate::api::{HttpApi, SavedResponses, ScanApi};
use crate::args;
use crate::errors::*;
use crate::mail::MailConfig;
use crate::render::Format;
use crate::report::Presentation;
use std::path::PathBuf;
use strum::{EnumString, EnumVariantNames};

pub const DEFAULT_ASSETS_BASE_URL: &str = "https://download.sysdig.com/assets/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Api { url: String, token: String },
    Directory(PathBuf),
}

impl Source {
    pub fn open(&self) -> Result<Box<dyn ScanApi>> {
        Ok(match self {
            Source::Api { url, token } => Box::new(HttpApi::new(url, token)?),
            Source::Directory(dir) => Box::new(SavedResponses::new(dir.clone())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumVariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum Deliver {
    Stdout,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Stdout(Format),
    Email(MailConfig),
}

impl Delivery {
    fn email(smtp: args::Smtp) -> Result<MailConfig> {
        if smtp.recipients.is_empty() {
            bail!("At least one --recipient is required for email delivery");
        }
        let smtp_host = smtp
            .smtp_host
            .context("--smtp-host is required for email delivery")?;
        let credentials = match (smtp.smtp_user, smtp.smtp_pass) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => None,
            _ => bail!("--smtp-user and --smtp-pass must be used together"),
        };
        Ok(MailConfig {
            recipients: smtp.recipients,
            sender: smtp.sender,
            smtp_host,
            smtp_port: smtp.smtp_port,
            credentials,
        })
    }
}

/// Settings for a single report run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: Source,
    pub image_id: String,
    pub vuln_cap: usize,
    pub delivery: Delivery,
    pub presentation: Presentation,
}

impl Config {
    pub fn from_args(args: args::Report) -> Result<Self> {
        let source = if let Some(dir) = args.from_dir {
            Source::Directory(dir)
        } else if let Some(token) = args.api.sysdig_token {
            Source::Api {
                url: args.api.sysdig_url.clone(),
                token,
            }
        } else {
            bail!("An API token is required unless --from-dir is used");
        };

        let deliver = args
            .deliver
            .parse::<Deliver>()
            .map_err(|_| anyhow!("Unsupported delivery: {:?}", args.deliver))?;
        let delivery = match deliver {
            Deliver::Stdout => {
                let format = args
                    .format
                    .parse()
                    .map_err(|_| anyhow!("Unsupported output format: {:?}", args.format))?;
                Delivery::Stdout(format)
            }
            Deliver::Email => Delivery::Email(Delivery::email(args.smtp)?),
        };

        Ok(Config {
            source,
            image_id: args.api.image_id,
            vuln_cap: args.vuln_cap,
            delivery,
            presentation: Presentation {
                sysdig_url: args.api.sysdig_url,
                assets_base_url: args.assets_base_url,
            },
        })
    }
}
