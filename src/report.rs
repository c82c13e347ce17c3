use crate::image::ImageRecord;
use crate::policy::PolicyEvaluation;
use crate::vulns::VulnerabilityReport;
use serde::Serialize;

/// Everything a notification about one scanned image is rendered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContext {
    pub sysdig_url: String,
    pub assets_base_url: String,
    pub image: ImageRecord,
    pub scan_result: PolicyEvaluation,
    pub vulnerabilities: VulnerabilityReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub sysdig_url: String,
    pub assets_base_url: String,
}

pub fn assemble(
    presentation: Presentation,
    image: ImageRecord,
    scan_result: PolicyEvaluation,
    vulnerabilities: VulnerabilityReport,
) -> ReportContext {
    ReportContext {
        sysdig_url: presentation.sysdig_url,
        assets_base_url: presentation.assets_base_url,
        image,
        scan_result,
        vulnerabilities,
    }
}
