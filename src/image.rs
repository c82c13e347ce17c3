use crate::errors::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawImage {
    image_detail: Vec<RawImageDetail>,
    image_content: RawImageContent,
}

#[derive(Debug, Deserialize)]
struct RawImageDetail {
    #[serde(rename = "imageId")]
    image_id: String,
    fulltag: String,
    repo: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct RawImageContent {
    metadata: RawImageMetadata,
}

#[derive(Debug, Deserialize)]
struct RawImageMetadata {
    distro: String,
    distro_version: String,
    image_size: u64,
}

/// The scanned image as reported by the image detail endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub full_tag: String,
    pub repo: String,
    pub created_at: String,
    pub os: String,
    pub os_version: String,
    pub size: u64,
}

/// Parse the response of `GET /api/scanning/v1/anchore/images/{imageId}`.
///
/// The endpoint wraps the image in a list; only the first entry and its
/// first `image_detail` are considered.
pub fn parse_image(data: &Value) -> Result<ImageRecord, ParseError> {
    let first = data
        .as_array()
        .ok_or_else(|| ParseError::malformed("image", "expected a list of images"))?
        .first()
        .ok_or_else(|| ParseError::malformed("image", "list of images is empty"))?;

    let raw = RawImage::deserialize(first)
        .map_err(|err| ParseError::malformed("image", err.to_string()))?;
    let detail = raw
        .image_detail
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::malformed("image", "image_detail is empty"))?;
    let metadata = raw.image_content.metadata;

    Ok(ImageRecord {
        id: detail.image_id,
        full_tag: detail.fulltag,
        repo: detail.repo,
        created_at: detail.created_at,
        os: metadata.distro,
        os_version: metadata.distro_version,
        size: metadata.image_size,
    })
}
