use crate::api::{self, ScanApi};
use crate::config::Config;
use crate::errors::*;
use crate::image;
use crate::policy;
use crate::report::{self, ReportContext};
use crate::vulns;
use serde_json::Value;
use std::path::Path;

/// Raw bodies of the three scanning endpoints for one image
#[derive(Debug, Clone, PartialEq)]
pub struct Responses {
    pub image: Value,
    pub check: Value,
    pub vulns: Value,
}

impl Responses {
    pub async fn save(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| anyhow!("Failed to create directory {:?}", dir))?;
        api::save_response(dir, api::IMAGE_FILE, &self.image).await?;
        api::save_response(dir, api::CHECK_FILE, &self.check).await?;
        api::save_response(dir, api::VULNS_FILE, &self.vulns).await?;
        Ok(())
    }
}

/// Query the endpoints one after another, the policy check needs the tag of the image
pub async fn fetch(api: &dyn ScanApi, image_id: &str) -> Result<Responses> {
    info!("Fetching image details for {:?}", image_id);
    let image = api
        .image(image_id)
        .await
        .context("Failed to fetch image details")?;
    let tag = image::parse_image(&image)?.full_tag;

    info!("Fetching policy evaluation for {:?}", tag);
    let check = api
        .policy_check(image_id, &tag)
        .await
        .context("Failed to fetch policy evaluation")?;

    info!("Fetching vulnerabilities");
    let vulns = api
        .vulnerabilities(image_id)
        .await
        .context("Failed to fetch vulnerabilities")?;

    Ok(Responses {
        image,
        check,
        vulns,
    })
}

pub fn build(responses: &Responses, config: &Config) -> Result<ReportContext, ParseError> {
    let image = image::parse_image(&responses.image)?;
    let scan_result = policy::parse_policy_check(&responses.check)?;
    let list = vulns::parse_vulnerabilities(&responses.vulns)?;
    debug!("Ranking {} vulnerabilities (cap={})", list.len(), config.vuln_cap);
    let vulnerabilities = vulns::rank(list, config.vuln_cap);

    Ok(report::assemble(
        config.presentation.clone(),
        image,
        scan_result,
        vulnerabilities,
    ))
}

pub async fn run(api: &dyn ScanApi, config: &Config) -> Result<ReportContext> {
    let responses = fetch(api, &config.image_id).await?;
    let ctx = build(&responses, config).context("Failed to process scan results")?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SavedResponses;
    use crate::config::{Delivery, Source, DEFAULT_ASSETS_BASE_URL};
    use crate::render::Format;
    use crate::report::Presentation;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const IMAGE_ID: &str = "8f1c3b";
    const TAG: &str = "docker.io/library/nginx:1.15";

    fn image_json() -> Value {
        json!([{
            "image_detail": [{
                "imageId": IMAGE_ID,
                "fulltag": TAG,
                "repo": "library/nginx",
                "created_at": "2019-01-10T14:14:30Z",
            }],
            "image_content": {
                "metadata": {
                    "distro": "debian",
                    "distro_version": "9",
                    "image_size": 109058406,
                }
            }
        }])
    }

    fn check_json() -> Value {
        json!([{
            "sha256:0123": {
                TAG: [{
                    "status": "fail",
                    "last_evaluation": "2019-01-10T14:20:01Z",
                    "detail": {
                        "result": {
                            "result": {
                                IMAGE_ID: {
                                    "result": {
                                        "header": ["Gate", "Trigger", "Check_Output", "Gate_Action"],
                                        "rows": [
                                            ["vulnerabilities", "package", "HIGH Vulnerability found", "stop"],
                                            ["dockerfile", "instruction", "HEALTHCHECK not found", "warn"],
                                        ]
                                    }
                                }
                            },
                            "matched_mapping_rule": {"policy_id": "default"}
                        },
                        "policy": {
                            "policies": [{"id": "default", "name": "Default audit policy"}]
                        }
                    }
                }]
            }
        }])
    }

    fn vulns_json() -> Value {
        json!({
            "vulnerabilities": [
                {"vuln": "CVE-2020-002", "severity": "High", "package_name": "a", "package_version": "1", "fix": "2", "url": "https://example.com/2"},
                {"vuln": "CVE-2020-001", "severity": "High", "package_name": "b", "package_version": "1", "fix": "2", "url": "https://example.com/1"},
                {"vuln": "CVE-2019-999", "severity": "Medium", "package_name": "c", "package_version": "1", "fix": "None", "url": "https://example.com/999"},
                {"vuln": "CVE-2020-003", "severity": "Low", "package_name": "d", "package_version": "1", "fix": "2", "url": "https://example.com/3"},
            ]
        })
    }

    #[derive(Default)]
    struct StubApi {
        calls: Mutex<Vec<String>>,
        broken_vulns: bool,
    }

    #[async_trait]
    impl ScanApi for StubApi {
        async fn image(&self, image_id: &str) -> Result<Value> {
            self.calls.lock().unwrap().push(format!("image {}", image_id));
            Ok(image_json())
        }

        async fn policy_check(&self, image_id: &str, tag: &str) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("check {} {}", image_id, tag));
            Ok(check_json())
        }

        async fn vulnerabilities(&self, image_id: &str) -> Result<Value> {
            self.calls.lock().unwrap().push(format!("vulns {}", image_id));
            if self.broken_vulns {
                bail!("connection reset");
            }
            Ok(vulns_json())
        }
    }

    fn config(source: Source) -> Config {
        Config {
            source,
            image_id: IMAGE_ID.to_string(),
            vuln_cap: 5,
            delivery: Delivery::Stdout(Format::Json),
            presentation: Presentation {
                sysdig_url: "https://secure.sysdig.com".to_string(),
                assets_base_url: DEFAULT_ASSETS_BASE_URL.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_run() -> Result<()> {
        let api = StubApi::default();
        let ctx = run(&api, &config(Source::Directory("unused".into()))).await?;

        assert_eq!(
            *api.calls.lock().unwrap(),
            vec![
                format!("image {}", IMAGE_ID),
                format!("check {} {}", IMAGE_ID, TAG),
                format!("vulns {}", IMAGE_ID),
            ]
        );

        assert_eq!(ctx.sysdig_url, "https://secure.sysdig.com");
        assert_eq!(ctx.image.full_tag, TAG);
        assert!(ctx.scan_result.is_fail());
        assert_eq!(ctx.scan_result.policy.name, "Default audit policy");
        assert_eq!(ctx.scan_result.stop_rows().len(), 1);
        assert_eq!(ctx.scan_result.warn_rows().len(), 1);

        let cves = ctx
            .vulnerabilities
            .list
            .iter()
            .map(|v| v.cve.as_str())
            .collect::<Vec<_>>();
        assert_eq!(cves, vec!["CVE-2020-001", "CVE-2020-002"]);
        assert_eq!(ctx.vulnerabilities.count, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_aborts_on_transport_error() {
        let api = StubApi {
            broken_vulns: true,
            ..Default::default()
        };
        let err = run(&api, &config(Source::Directory("unused".into())))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("connection reset"));
    }

    #[test]
    fn test_build_aborts_on_parse_error() {
        let mut responses = Responses {
            image: image_json(),
            check: check_json(),
            vulns: vulns_json(),
        };
        responses.check[0]["sha256:0123"][TAG][0]["detail"]["result"]["matched_mapping_rule"]
            ["policy_id"] = json!("custom");

        let err = build(&responses, &config(Source::Directory("unused".into()))).unwrap_err();
        assert_eq!(
            err,
            ParseError::PolicyNotFound {
                policy_id: "custom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_save_and_replay() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("responses");

        let responses = fetch(&StubApi::default(), IMAGE_ID).await?;
        responses.save(&out).await?;

        let saved = SavedResponses::new(&out);
        assert_eq!(fetch(&saved, IMAGE_ID).await?, responses);

        let config = config(Source::Directory(out.clone()));
        let api = config.source.open()?;
        let ctx = run(api.as_ref(), &config).await?;
        assert_eq!(ctx, build(&responses, &config)?);
        Ok(())
    }
}
