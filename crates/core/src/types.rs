use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SpendError, SpendResult};

/// One ad impression, left-joined to its click and that click's conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub impression_id: String,
    pub channel: String,
    pub user_id: String,
    pub impression_at: DateTime<Utc>,
    #[serde(default)]
    pub click_id: Option<String>,
    #[serde(default)]
    pub click_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conversion_id: Option<String>,
    #[serde(default)]
    pub conversion_at: Option<DateTime<Utc>>,
    /// Positive when present.
    #[serde(default)]
    pub conversion_value: Option<f64>,
    pub cost: f64,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub audience_segment: Option<String>,
    #[serde(default)]
    pub creative_type: Option<CreativeType>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CreativeType {
    Image,
    Video,
    Text,
}

impl Touchpoint {
    /// A bare impression with no click or conversion attached.
    pub fn impression(
        impression_id: impl Into<String>,
        channel: impl Into<String>,
        user_id: impl Into<String>,
        impression_at: DateTime<Utc>,
        cost: f64,
    ) -> Self {
        Self {
            impression_id: impression_id.into(),
            channel: channel.into(),
            user_id: user_id.into(),
            impression_at,
            click_id: None,
            click_at: None,
            conversion_id: None,
            conversion_at: None,
            conversion_value: None,
            cost,
            device_type: None,
            audience_segment: None,
            creative_type: None,
        }
    }

    pub fn with_click(mut self, click_id: impl Into<String>, click_at: DateTime<Utc>) -> Self {
        self.click_id = Some(click_id.into());
        self.click_at = Some(click_at);
        self
    }

    pub fn with_conversion(
        mut self,
        conversion_id: impl Into<String>,
        conversion_at: DateTime<Utc>,
        value: f64,
    ) -> Self {
        self.conversion_id = Some(conversion_id.into());
        self.conversion_at = Some(conversion_at);
        self.conversion_value = Some(value);
        self
    }

    pub fn converted(&self) -> bool {
        self.conversion_id.is_some()
    }

    pub fn clicked(&self) -> bool {
        self.click_id.is_some()
    }

    /// Check the ordering and presence invariants the ingestion side promises.
    pub fn validate(&self) -> SpendResult<()> {
        let fail = |reason: &str| {
            Err(SpendError::InvalidJourney {
                impression_id: self.impression_id.clone(),
                reason: reason.to_string(),
            })
        };

        if !self.cost.is_finite() || self.cost < 0.0 {
            return fail("cost must be a non-negative number");
        }
        if self.click_id.is_some() != self.click_at.is_some() {
            return fail("click id and click timestamp must be set together");
        }
        if self.conversion_id.is_some() && self.click_id.is_none() {
            return fail("conversion without a click");
        }
        if let Some(click_at) = self.click_at {
            if click_at < self.impression_at {
                return fail("click precedes impression");
            }
            if let Some(conversion_at) = self.conversion_at {
                if conversion_at < click_at {
                    return fail("conversion precedes click");
                }
            }
        }
        if self.conversion_id.is_some() && self.conversion_at.is_none() {
            return fail("conversion without a timestamp");
        }
        if let Some(value) = self.conversion_value {
            if !value.is_finite() || value <= 0.0 {
                return fail("conversion value must be positive");
            }
        }
        Ok(())
    }
}

/// The cleaned user-journey table, one row per impression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyTable {
    rows: Vec<Touchpoint>,
}

impl JourneyTable {
    pub fn new(rows: Vec<Touchpoint>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Touchpoint] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Touchpoint> {
        self.rows.iter()
    }

    /// Validate every row, stopping at the first violation.
    pub fn validate(&self) -> SpendResult<()> {
        self.rows.iter().try_for_each(Touchpoint::validate)
    }

    pub fn from_json(raw: &str) -> SpendResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> SpendResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<Vec<Touchpoint>> for JourneyTable {
    fn from(rows: Vec<Touchpoint>) -> Self {
        Self::new(rows)
    }
}

impl FromIterator<Touchpoint> for JourneyTable {
    fn from_iter<I: IntoIterator<Item = Touchpoint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a JourneyTable {
    type Item = &'a Touchpoint;
    type IntoIter = std::slice::Iter<'a, Touchpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_converted_touchpoint() {
        let tp = Touchpoint::impression("imp-1", "Facebook", "u1", t0(), 0.1)
            .with_click("c-1", t0() + Duration::seconds(30))
            .with_conversion("cv-1", t0() + Duration::hours(2), 45.0);
        assert!(tp.validate().is_ok());
        assert!(tp.converted());
        assert!(tp.clicked());
    }

    #[test]
    fn test_conversion_without_click_rejected() {
        let mut tp = Touchpoint::impression("imp-2", "TikTok", "u2", t0(), 0.05);
        tp.conversion_id = Some("cv-2".into());
        tp.conversion_at = Some(t0());
        tp.conversion_value = Some(10.0);
        assert!(matches!(
            tp.validate(),
            Err(SpendError::InvalidJourney { .. })
        ));
    }

    #[test]
    fn test_out_of_order_timestamps_rejected() {
        let tp = Touchpoint::impression("imp-3", "YouTube", "u3", t0(), 0.12)
            .with_click("c-3", t0() - Duration::seconds(1));
        assert!(tp.validate().is_err());

        let tp = Touchpoint::impression("imp-4", "YouTube", "u3", t0(), 0.12)
            .with_click("c-4", t0() + Duration::seconds(10))
            .with_conversion("cv-4", t0() + Duration::seconds(5), 20.0);
        assert!(tp.validate().is_err());
    }

    #[test]
    fn test_negative_cost_rejected() {
        let tp = Touchpoint::impression("imp-5", "Campus TV", "u5", t0(), -1.0);
        assert!(tp.validate().is_err());
    }

    #[test]
    fn test_journey_json_roundtrip_keeps_optional_fields() {
        let table = JourneyTable::new(vec![
            Touchpoint::impression("imp-1", "Facebook", "u1", t0(), 0.1),
            Touchpoint::impression("imp-2", "Instagram", "u1", t0(), 0.2)
                .with_click("c-2", t0() + Duration::seconds(3)),
        ]);
        let raw = table.to_json().unwrap();
        let parsed = JourneyTable::from_json(&raw).unwrap();
        assert_eq!(parsed, table);
        assert!(parsed.rows()[0].click_id.is_none());
    }
}
