use crate::errors::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use strum::{Display, EnumString};

/// Value of the upstream `fix` field when no fixed version exists
pub const NO_FIX: &str = "None";
pub const DEFAULT_CAP: usize = 5;

#[derive(Debug, Deserialize)]
struct RawVulnerabilities {
    vulnerabilities: Vec<RawVulnerability>,
}

#[derive(Debug, Deserialize)]
struct RawVulnerability {
    vuln: String,
    severity: String,
    package_name: String,
    package_version: String,
    fix: Option<String>,
    url: String,
}

/// Declaration order is the ranking order, most severe first
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    EnumString,
    Display,
)]
pub enum Severity {
    High,
    Medium,
    Low,
    Negligible,
    Unknown,
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or(Severity::Unknown)
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, Severity::High | Severity::Medium)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityRecord {
    pub cve: String,
    pub severity: Severity,
    pub package_name: String,
    pub package_version: String,
    /// Upstream `fix` verbatim, `None` when it is null or absent
    pub fix_version: Option<String>,
    pub cve_link: String,
}

impl VulnerabilityRecord {
    /// Only the exact `"None"` sentinel marks a vulnerability without a fix
    pub fn is_unfixed(&self) -> bool {
        self.fix_version.as_deref() == Some(NO_FIX)
    }
}

impl From<RawVulnerability> for VulnerabilityRecord {
    fn from(raw: RawVulnerability) -> Self {
        VulnerabilityRecord {
            cve: raw.vuln,
            severity: Severity::parse(&raw.severity),
            package_name: raw.package_name,
            package_version: raw.package_version,
            fix_version: raw.fix,
            cve_link: raw.url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityReport {
    /// Number of vulnerabilities reported upstream
    pub count: usize,
    /// Number of high/medium vulnerabilities not marked unfixed, before truncation
    pub actionable: usize,
    pub list: Vec<VulnerabilityRecord>,
    pub has_more: bool,
}

/// Parse the response of `GET /api/scanning/v1/anchore/images/{imageId}/vuln/os`.
pub fn parse_vulnerabilities(data: &Value) -> Result<Vec<VulnerabilityRecord>, ParseError> {
    let raw = RawVulnerabilities::deserialize(data)
        .map_err(|err| ParseError::malformed("vulnerabilities", err.to_string()))?;
    Ok(raw
        .vulnerabilities
        .into_iter()
        .map(VulnerabilityRecord::from)
        .collect())
}

/// Order ids case-insensitively, lowercase before uppercase when they only differ in case
pub fn collate(a: &str, b: &str) -> Ordering {
    let folded = a.bytes().map(|c| c.to_ascii_lowercase());
    folded
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
        .then_with(|| b.cmp(a))
}

/// Keep fixable high/medium vulnerabilities, most severe first, at most `cap` of them.
pub fn rank(vulnerabilities: Vec<VulnerabilityRecord>, cap: usize) -> VulnerabilityReport {
    let count = vulnerabilities.len();

    let mut list = vulnerabilities
        .into_iter()
        .filter(|v| !v.is_unfixed() && v.severity.is_actionable())
        .collect::<Vec<_>>();
    list.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| collate(&a.cve, &b.cve))
    });

    let actionable = list.len();
    list.truncate(cap);

    VulnerabilityReport {
        count,
        actionable,
        list,
        has_more: actionable > cap,
    }
}
