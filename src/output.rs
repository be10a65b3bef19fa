use crate::error::ErrorPayload;
use crate::metrics::CheckReport;
use crate::types::{HomographyResult, MatchResult, Region};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema version for output payloads.
pub const VRA_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum VraOutput {
    Compare(CompareOutput),
    Locate(LocateOutput),
    Features(FeaturesOutput),
    Boxes(BoxesOutput),
    Hash(HashOutput),
    Contrast(ContrastOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareOutput {
    pub version: String,
    pub actual: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    pub passed: bool,
    pub report: CheckReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<CompareArtifacts>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareArtifacts {
    pub directory: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocateOutput {
    pub version: String,
    pub haystack: String,
    pub needle: String,
    /// Whether the needle was shrunk to fit the haystack before matching
    pub fitted: bool,
    pub single_scale: bool,
    pub result: MatchResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesOutput {
    pub version: String,
    pub scene: String,
    pub object: String,
    pub result: HomographyResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxesOutput {
    pub version: String,
    pub image: String,
    pub boxes: Vec<Region>,
    /// Gaps between horizontally consecutive boxes, left to right
    pub gaps: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashOutput {
    pub version: String,
    pub image: String,
    /// 16 hex digits
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastOutput {
    pub version: String,
    pub fg: String,
    pub bg: String,
    pub ratio: f64,
    pub threshold: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}
