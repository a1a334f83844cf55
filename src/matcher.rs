use crate::types::DensityRecord;
use geojson::Feature;

pub const ZONE_CODE_PROPERTY: &str = "codzona";

/// Zone code of a feature. Numeric codes are read as their decimal text;
/// anything else counts as absent.
pub fn feature_zone_code(feature: &Feature) -> Option<String> {
    let value = feature.properties.as_ref()?.get(ZONE_CODE_PROPERTY)?;
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First record whose `zone_code` equals `code`, in input order.
pub fn match_zone<'a>(code: Option<&str>, records: &'a [DensityRecord]) -> Option<&'a DensityRecord> {
    let code = code?;
    records.iter().find(|r| r.zone_code == code)
}

pub struct ZoneMatcher<'a> {
    records: &'a [DensityRecord],
}

impl<'a> ZoneMatcher<'a> {
    pub fn new(records: &'a [DensityRecord]) -> Self {
        Self { records }
    }

    pub fn match_feature(&self, feature: &Feature) -> Option<&'a DensityRecord> {
        match_zone(feature_zone_code(feature).as_deref(), self.records)
    }
}
