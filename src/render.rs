use crate::errors::*;
use crate::policy::{GateRow, PolicyStatus};
use crate::report::ReportContext;
use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt;
use strum::{Display, EnumString, EnumVariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumVariantNames, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    Json,
    Text,
    Html,
}

pub fn render(ctx: &ReportContext, format: Format) -> Result<String> {
    match format {
        Format::Json => {
            let mut out = serde_json::to_string_pretty(ctx)?;
            out.push('\n');
            Ok(out)
        }
        Format::Text => Ok(format!("{}\n\n{}", subject(ctx), TextReport(ctx))),
        Format::Html => Ok(HtmlReport(ctx).to_string()),
    }
}

pub fn subject(ctx: &ReportContext) -> String {
    let outcome = match &ctx.scan_result.status {
        PolicyStatus::Pass => "passed",
        PolicyStatus::Fail => "failed",
        PolicyStatus::Other(status) => status.as_str(),
    };
    format!("Image scan {} for {}", outcome, ctx.image.full_tag)
}

/// Render RFC 3339 timestamps like `January 10 2019, 2:14:30 pm UTC`, anything else verbatim
fn timestamp(value: &str) -> String {
    match DateTime::parse_from_rfc3339(value) {
        Ok(t) => t
            .with_timezone(&Utc)
            .format("%B %-d %Y, %-I:%M:%S %P UTC")
            .to_string(),
        Err(_) => value.to_string(),
    }
}

fn size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn gates(f: &mut fmt::Formatter<'_>, title: &str, rows: &[&GateRow]) -> fmt::Result {
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(f)?;
    writeln!(f, "{} ({}):", title, rows.len())?;
    for row in rows {
        writeln!(f, "  - {}/{}: {}", row.gate, row.trigger, row.output)?;
    }
    Ok(())
}

/// Plain text body of a notification
pub struct TextReport<'a>(pub &'a ReportContext);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.0;
        let image = &ctx.image;
        let eval = &ctx.scan_result;
        let vulns = &ctx.vulnerabilities;

        writeln!(f, "Image:      {}", image.full_tag)?;
        writeln!(f, "Repository: {}", image.repo)?;
        writeln!(f, "Image ID:   {}", image.id)?;
        writeln!(f, "Created:    {}", timestamp(&image.created_at))?;
        writeln!(f, "OS:         {} {}", image.os, image.os_version)?;
        writeln!(f, "Size:       {}", size(image.size))?;

        writeln!(f)?;
        writeln!(
            f,
            "Policy {:?} evaluated {}: {}",
            eval.policy.name,
            timestamp(&eval.evaluated_at),
            eval.status
        )?;
        gates(f, "Stop", &eval.stop_rows())?;
        gates(f, "Warn", &eval.warn_rows())?;

        writeln!(f)?;
        writeln!(
            f,
            "Vulnerabilities: {} total, {} fixable with high or medium severity",
            vulns.count, vulns.actionable
        )?;
        for v in &vulns.list {
            writeln!(
                f,
                "  - {} [{}] {} {} -> {}",
                v.cve,
                v.severity,
                v.package_name,
                v.package_version,
                v.fix_version.as_deref().unwrap_or("-"),
            )?;
            writeln!(f, "    {}", v.cve_link)?;
        }
        if vulns.has_more {
            writeln!(f, "  ... and {} more", vulns.actionable - vulns.list.len())?;
        }

        writeln!(f)?;
        writeln!(f, "Sysdig Secure: {}", ctx.sysdig_url)
    }
}

fn html_gates(f: &mut fmt::Formatter<'_>, title: &str, rows: &[&GateRow]) -> fmt::Result {
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(f, "<h3>{} ({})</h3>", title, rows.len())?;
    writeln!(f, "<ul>")?;
    for row in rows {
        writeln!(
            f,
            "<li><b>{}/{}</b>: {}</li>",
            text(&row.gate),
            text(&row.trigger),
            text(&row.output)
        )?;
    }
    writeln!(f, "</ul>")
}

/// Html body of a notification
pub struct HtmlReport<'a>(pub &'a ReportContext);

impl fmt::Display for HtmlReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.0;
        let image = &ctx.image;
        let eval = &ctx.scan_result;
        let vulns = &ctx.vulnerabilities;
        let subject = subject(ctx);

        writeln!(f, "<!DOCTYPE html>")?;
        writeln!(f, "<html>")?;
        writeln!(f, "<head><meta charset=\"utf-8\"><title>{}</title></head>", text(&subject))?;
        writeln!(f, "<body>")?;
        writeln!(f, "<h1>{}</h1>", text(&subject))?;

        writeln!(f, "<table>")?;
        for (name, value) in [
            ("Image", image.full_tag.clone()),
            ("Repository", image.repo.clone()),
            ("Image ID", image.id.clone()),
            ("Created", timestamp(&image.created_at)),
            ("OS", format!("{} {}", image.os, image.os_version)),
            ("Size", size(image.size)),
        ] {
            writeln!(f, "<tr><th>{}</th><td>{}</td></tr>", name, text(&value))?;
        }
        writeln!(f, "</table>")?;

        writeln!(
            f,
            "<h2>Policy {}: {}</h2>",
            text(&eval.policy.name),
            text(&eval.status.to_string())
        )?;
        writeln!(f, "<p>Evaluated {}</p>", text(&timestamp(&eval.evaluated_at)))?;
        html_gates(f, "Stop", &eval.stop_rows())?;
        html_gates(f, "Warn", &eval.warn_rows())?;

        writeln!(f, "<h2>Vulnerabilities</h2>")?;
        writeln!(
            f,
            "<p>{} total, {} fixable with high or medium severity</p>",
            vulns.count, vulns.actionable
        )?;
        if !vulns.list.is_empty() {
            writeln!(f, "<table>")?;
            writeln!(
                f,
                "<tr><th>CVE</th><th>Severity</th><th>Package</th><th>Version</th><th>Fix</th></tr>"
            )?;
            for v in &vulns.list {
                writeln!(
                    f,
                    "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    attr(&v.cve_link),
                    text(&v.cve),
                    v.severity,
                    text(&v.package_name),
                    text(&v.package_version),
                    text(v.fix_version.as_deref().unwrap_or("-")),
                )?;
            }
            writeln!(f, "</table>")?;
        }
        if vulns.has_more {
            writeln!(f, "<p>... and {} more</p>", vulns.actionable - vulns.list.len())?;
        }

        writeln!(
            f,
            "<p><a href=\"{}\">Sysdig Secure</a></p>",
            attr(&ctx.sysdig_url)
        )?;
        writeln!(f, "</body>")?;
        writeln!(f, "</html>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageRecord;
    use crate::policy::{GateAction, Policy, PolicyEvaluation};
    use crate::report::{assemble, Presentation};
    use crate::vulns::{rank, Severity, VulnerabilityRecord};

    fn row(gate: &str, action: GateAction) -> GateRow {
        GateRow {
            gate: gate.to_string(),
            trigger: "package".to_string(),
            action,
            output: format!("{} triggered", gate),
        }
    }

    fn context(status: PolicyStatus) -> ReportContext {
        let vulns = (1..=7)
            .map(|i| VulnerabilityRecord {
                cve: format!("CVE-2019-{:04}", i),
                severity: Severity::High,
                package_name: "openssl".to_string(),
                package_version: "1.1.0j".to_string(),
                fix_version: Some("1.1.0k".to_string()),
                cve_link: format!("https://example.com/CVE-2019-{:04}", i),
            })
            .collect();

        assemble(
            Presentation {
                sysdig_url: "https://secure.sysdig.com".to_string(),
                assets_base_url: "https://download.sysdig.com/assets/".to_string(),
            },
            ImageRecord {
                id: "8f1c3b".to_string(),
                full_tag: "docker.io/library/nginx:1.15".to_string(),
                repo: "library/nginx".to_string(),
                created_at: "2019-01-10T14:14:30Z".to_string(),
                os: "debian".to_string(),
                os_version: "9".to_string(),
                size: 109058406,
            },
            PolicyEvaluation {
                status,
                evaluated_at: "yesterday".to_string(),
                policy: Policy {
                    id: "default".to_string(),
                    name: "Default audit policy".to_string(),
                },
                rows: vec![
                    row("vulnerabilities", GateAction::Stop),
                    row("dockerfile", GateAction::Warn),
                ],
            },
            rank(vulns, 5),
        )
    }

    #[test]
    fn test_subject() {
        assert_eq!(
            subject(&context(PolicyStatus::Fail)),
            "Image scan failed for docker.io/library/nginx:1.15"
        );
        assert_eq!(
            subject(&context(PolicyStatus::Pass)),
            "Image scan passed for docker.io/library/nginx:1.15"
        );
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(
            timestamp("2019-01-10T14:14:30Z"),
            "January 10 2019, 2:14:30 pm UTC"
        );
        assert_eq!(timestamp("not a date"), "not a date");
    }

    #[test]
    fn test_size() {
        assert_eq!(size(512), "512 B");
        assert_eq!(size(109058406), "104.0 MiB");
    }

    #[test]
    fn test_render_text() -> Result<()> {
        let text = render(&context(PolicyStatus::Fail), Format::Text)?;
        assert!(text.starts_with("Image scan failed for docker.io/library/nginx:1.15\n\n"));
        assert!(text.contains("Created:    January 10 2019, 2:14:30 pm UTC\n"));
        assert!(text.contains("Policy \"Default audit policy\" evaluated yesterday: fail\n"));
        assert!(text.contains("Stop (1):\n  - vulnerabilities/package: vulnerabilities triggered\n"));
        assert!(text.contains("Warn (1):\n  - dockerfile/package: dockerfile triggered\n"));
        assert!(text.contains("  - CVE-2019-0001 [High] openssl 1.1.0j -> 1.1.0k\n"));
        assert!(!text.contains("CVE-2019-0006"));
        assert!(text.contains("  ... and 2 more\n"));
        Ok(())
    }

    #[test]
    fn test_render_html() -> Result<()> {
        let mut ctx = context(PolicyStatus::Fail);
        ctx.scan_result.rows[0].output = "<script>alert(1)</script>".to_string();

        let html = render(&ctx, Format::Html)?;
        assert!(html.contains("<title>Image scan failed for docker.io/library/nginx:1.15</title>"));
        assert!(html.contains("<h2>Policy Default audit policy: fail</h2>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains(
            "<tr><td><a href=\"https://example.com/CVE-2019-0001\">CVE-2019-0001</a></td><td>High</td>"
        ));
        assert!(html.contains("<p>... and 2 more</p>"));
        Ok(())
    }

    #[test]
    fn test_render_json() -> Result<()> {
        let json = render(&context(PolicyStatus::Pass), Format::Json)?;
        let value: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(value["scanResult"]["isPass"], true);
        assert_eq!(value["vulnerabilities"]["list"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["vulnerabilities"]["hasMore"], true);
        Ok(())
    }

    #[test]
    fn test_format_names() {
        use strum::VariantNames;
        assert_eq!(Format::VARIANTS, &["json", "text", "html"]);
        assert_eq!("json".parse::<Format>().ok(), Some(Format::Json));
    }
}
