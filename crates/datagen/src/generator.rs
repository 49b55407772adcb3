use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use spend_core::types::{CreativeType, DeviceType};
use spend_core::{JourneyTable, SpendError, SpendResult, Touchpoint};
use tracing::info;

/// Baseline behaviour of one advertising channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub name: String,
    /// Relative share of impressions served on this channel.
    pub traffic_share: f64,
    pub ctr: f64,
    pub cost_per_impression: f64,
    pub conversion_rate: f64,
}

impl ChannelProfile {
    fn new(name: &str, traffic_share: f64, ctr: f64, cpi: f64, cvr: f64) -> Self {
        Self {
            name: name.to_string(),
            traffic_share,
            ctr,
            cost_per_impression: cpi,
            conversion_rate: cvr,
        }
    }

    /// The eight campus-marketing channels the sample datasets use.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Google Search", 0.25, 0.03, 0.15, 0.08),
            Self::new("Facebook", 0.20, 0.02, 0.08, 0.04),
            Self::new("Instagram", 0.15, 0.025, 0.09, 0.035),
            Self::new("TikTok", 0.12, 0.035, 0.06, 0.03),
            Self::new("YouTube", 0.10, 0.015, 0.12, 0.05),
            Self::new("Display Network", 0.08, 0.008, 0.04, 0.015),
            Self::new("Campus Radio", 0.05, 0.01, 0.05, 0.02),
            Self::new("Campus TV", 0.05, 0.012, 0.18, 0.055),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub impressions: usize,
    pub users: u32,
    pub start: DateTime<Utc>,
    pub days: u32,
    pub channels: Vec<ChannelProfile>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            impressions: 10_000,
            users: 5_000,
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            days: 365,
            channels: ChannelProfile::defaults(),
        }
    }
}

const AUDIENCES: [&str; 4] = ["students", "faculty", "staff", "alumni"];
const AUDIENCE_WEIGHTS: [f64; 4] = [0.5, 0.2, 0.2, 0.1];
const DEVICES: [DeviceType; 3] = [DeviceType::Mobile, DeviceType::Desktop, DeviceType::Tablet];
const DEVICE_WEIGHTS: [f64; 3] = [0.6, 0.3, 0.1];
const CREATIVES: [CreativeType; 3] = [CreativeType::Image, CreativeType::Video, CreativeType::Text];
const CREATIVE_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

pub struct JourneyGenerator {
    config: GeneratorConfig,
    channel_index: WeightedIndex<f64>,
    audience_index: WeightedIndex<f64>,
    device_index: WeightedIndex<f64>,
    creative_index: WeightedIndex<f64>,
}

impl JourneyGenerator {
    pub fn new(config: GeneratorConfig) -> SpendResult<Self> {
        if config.users == 0 || config.days == 0 {
            return Err(SpendError::Configuration(
                "generator needs at least one user and one day".to_string(),
            ));
        }
        let channel_index = weighted(config.channels.iter().map(|c| c.traffic_share))?;
        Ok(Self {
            config,
            channel_index,
            audience_index: weighted(AUDIENCE_WEIGHTS)?,
            device_index: weighted(DEVICE_WEIGHTS)?,
            creative_index: weighted(CREATIVE_WEIGHTS)?,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Draw a full journey table from `rng`.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> JourneyTable {
        let mut rows = Vec::with_capacity(self.config.impressions);
        let (mut clicks, mut conversions) = (0usize, 0usize);

        for i in 0..self.config.impressions {
            let profile = &self.config.channels[self.channel_index.sample(rng)];
            let device = DEVICES[self.device_index.sample(rng)];
            let audience = AUDIENCES[self.audience_index.sample(rng)];
            let creative = CREATIVES[self.creative_index.sample(rng)];

            let impression_at = self.config.start
                + Duration::days(rng.gen_range(0..self.config.days) as i64)
                + Duration::hours(rng.gen_range(0..24));
            let cost = profile.cost_per_impression * rng.gen_range(0.8..1.2);
            let user_id = format!("user_{:06}", rng.gen_range(1..=self.config.users));

            let mut tp = Touchpoint::impression(
                format!("imp_{i:08}"),
                profile.name.as_str(),
                user_id,
                impression_at,
                cost,
            );
            tp.device_type = Some(device);
            tp.audience_segment = Some(audience.to_string());
            tp.creative_type = Some(creative);

            let mut ctr = profile.ctr;
            if device == DeviceType::Mobile {
                ctr *= 1.2;
            }
            if audience == "students" {
                ctr *= 1.1;
            }

            if rng.gen::<f64>() < ctr {
                let click_at = impression_at + Duration::seconds(rng.gen_range(1..300));
                tp = tp.with_click(format!("click_{clicks:08}"), click_at);
                clicks += 1;

                let cvr = match audience {
                    "students" => profile.conversion_rate * 1.3,
                    "alumni" => profile.conversion_rate * 0.8,
                    _ => profile.conversion_rate,
                };
                if rng.gen::<f64>() < cvr {
                    let delay = Duration::minutes(rng.gen_range(1..60))
                        + Duration::hours(rng.gen_range(0..24))
                        + Duration::days(rng.gen_range(0..7));
                    let value = rng.gen_range(20.0..500.0);
                    tp = tp.with_conversion(format!("conv_{conversions:08}"), click_at + delay, value);
                    conversions += 1;
                }
            }

            rows.push(tp);
        }

        info!(
            impressions = rows.len(),
            clicks,
            conversions,
            "Generated synthetic journey"
        );
        JourneyTable::new(rows)
    }
}

fn weighted<I>(weights: I) -> SpendResult<WeightedIndex<f64>>
where
    I: IntoIterator<Item = f64>,
{
    WeightedIndex::new(weights)
        .map_err(|e| SpendError::Configuration(format!("invalid sampling weights: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config() -> GeneratorConfig {
        GeneratorConfig {
            impressions: 2_000,
            users: 300,
            days: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_same_journey() {
        let generator = JourneyGenerator::new(small_config()).unwrap();
        let a = generator.generate(&mut StdRng::seed_from_u64(42));
        let b = generator.generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let generator = JourneyGenerator::new(small_config()).unwrap();
        let a = generator.generate(&mut StdRng::seed_from_u64(1));
        let b = generator.generate(&mut StdRng::seed_from_u64(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_rows_are_valid() {
        let generator = JourneyGenerator::new(small_config()).unwrap();
        let journey = generator.generate(&mut StdRng::seed_from_u64(7));

        assert_eq!(journey.len(), 2_000);
        assert!(journey.validate().is_ok());

        let names: Vec<String> = ChannelProfile::defaults().into_iter().map(|c| c.name).collect();
        assert!(journey.iter().all(|tp| names.contains(&tp.channel)));
        assert!(journey.iter().any(|tp| tp.clicked()));
    }

    #[test]
    fn test_zero_users_rejected() {
        let config = GeneratorConfig {
            users: 0,
            ..Default::default()
        };
        assert!(JourneyGenerator::new(config).is_err());
    }

    #[test]
    fn test_empty_channel_list_rejected() {
        let config = GeneratorConfig {
            channels: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            JourneyGenerator::new(config),
            Err(SpendError::Configuration(_))
        ));
    }
}
