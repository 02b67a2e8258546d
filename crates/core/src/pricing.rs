//! Cost estimation for video generation (Veo 3.1 pricing).
//!
//! Prices are looked up by `(resolution, duration)`, extras are added per
//! video, and a quantity-tiered discount is applied once to the aggregate.

use std::collections::HashMap;

use serde::Serialize;

use crate::generation::{ClipDuration, Resolution};
use crate::money::Money;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Rate used when the table has no entry for a `(resolution, duration)` pair.
pub const FALLBACK_RATE: Money = Money::from_cents(50);

/// Surcharge per reference image.
pub const REFERENCE_IMAGE_SURCHARGE: Money = Money::from_cents(5);

/// Surcharge for audio generation.
pub const AUDIO_SURCHARGE: Money = Money::from_cents(10);

/// Quantity discount tiers as `(minimum quantity, percent off)`, highest first.
pub const DISCOUNT_TIERS: [(u32, u32); 3] = [(50, 15), (10, 10), (5, 5)];

/// Fixed queueing/upload overhead added to every processing-time estimate.
const PROCESSING_OVERHEAD_SECS: u32 = 20;

// ---------------------------------------------------------------------------
// Pricing table
// ---------------------------------------------------------------------------

/// Per-video base prices keyed by `(resolution, duration)`.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<(Resolution, ClipDuration), Money>,
    fallback: Money,
}

impl Default for PricingTable {
    fn default() -> Self {
        use ClipDuration::*;
        use Resolution::*;
        Self::new(
            [
                ((Hd720, Four), Money::from_cents(15)),
                ((Hd720, Six), Money::from_cents(25)),
                ((Hd720, Eight), Money::from_cents(35)),
                ((Hd1080, Four), Money::from_cents(25)),
                ((Hd1080, Six), Money::from_cents(50)),
                ((Hd1080, Eight), Money::from_cents(75)),
            ],
            FALLBACK_RATE,
        )
    }
}

impl PricingTable {
    pub fn new(
        rates: impl IntoIterator<Item = ((Resolution, ClipDuration), Money)>,
        fallback: Money,
    ) -> Self {
        Self {
            rates: rates.into_iter().collect(),
            fallback,
        }
    }

    /// Base price for one video. Unknown pairs use the fallback rate.
    pub fn base_rate(&self, resolution: Resolution, duration: ClipDuration) -> Money {
        match self.rates.get(&(resolution, duration)) {
            Some(rate) => *rate,
            None => {
                tracing::warn!(
                    resolution = resolution.as_str(),
                    duration = duration.seconds(),
                    fallback = %self.fallback,
                    "No price for resolution/duration, using fallback rate",
                );
                self.fallback
            }
        }
    }

    /// Estimate the cost of `quantity` videos with the given extras.
    pub fn estimate(
        &self,
        resolution: Resolution,
        duration: ClipDuration,
        extras: Extras,
        quantity: u32,
    ) -> CostBreakdown {
        let base_per_video = self.base_rate(resolution, duration);
        let reference_images = REFERENCE_IMAGE_SURCHARGE.times(extras.reference_images);
        let audio = if extras.audio {
            AUDIO_SURCHARGE
        } else {
            Money::ZERO
        };
        let per_video_total = base_per_video + reference_images + audio;
        let subtotal = per_video_total.times(quantity);

        let discount_percent = discount_percent(quantity);
        let discount = subtotal.percent(discount_percent);

        CostBreakdown {
            base_per_video,
            reference_images,
            audio,
            per_video_total,
            quantity,
            subtotal,
            discount_percent,
            discount,
            total: subtotal - discount,
        }
    }

    /// Full price list for display.
    pub fn sheet(&self) -> PricingSheet {
        let mut rates = Vec::new();
        for resolution in Resolution::ALL {
            for duration in ClipDuration::ALL {
                rates.push(RateEntry {
                    resolution,
                    duration_seconds: duration.seconds(),
                    price: self.rates.get(&(resolution, duration)).copied(),
                });
            }
        }
        PricingSheet {
            provider: "Google Veo 3.1",
            rates,
            fallback_rate: self.fallback,
            reference_image: REFERENCE_IMAGE_SURCHARGE,
            audio_generation: AUDIO_SURCHARGE,
            bulk_discounts: DISCOUNT_TIERS
                .iter()
                .map(|&(min_quantity, percent)| DiscountTier {
                    min_quantity,
                    percent,
                })
                .collect(),
        }
    }
}

/// Percent discount for a batch of `quantity` videos.
pub fn discount_percent(quantity: u32) -> u32 {
    DISCOUNT_TIERS
        .iter()
        .find(|(min, _)| quantity >= *min)
        .map(|(_, pct)| *pct)
        .unwrap_or(0)
}

/// Expected wall-clock seconds from admission to a stored artifact.
///
/// Veo renders roughly ten seconds per output second at 720p and half again
/// as long at 1080p.
pub fn estimated_processing_secs(resolution: Resolution, duration: ClipDuration) -> u32 {
    let render = u32::from(duration.seconds()) * 10;
    let render = match resolution {
        Resolution::Hd720 => render,
        Resolution::Hd1080 => render * 3 / 2,
    };
    render + PROCESSING_OVERHEAD_SECS
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-video surcharges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extras {
    pub reference_images: u32,
    pub audio: bool,
}

/// Itemized estimate returned by [`PricingTable::estimate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub base_per_video: Money,
    pub reference_images: Money,
    pub audio: Money,
    pub per_video_total: Money,
    pub quantity: u32,
    pub subtotal: Money,
    pub discount_percent: u32,
    pub discount: Money,
    pub total: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateEntry {
    pub resolution: Resolution,
    pub duration_seconds: u8,
    /// `None` when the pair is priced at the fallback rate.
    pub price: Option<Money>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscountTier {
    pub min_quantity: u32,
    pub percent: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingSheet {
    pub provider: &'static str,
    pub rates: Vec<RateEntry>,
    pub fallback_rate: Money,
    pub reference_image: Money,
    pub audio_generation: Money,
    pub bulk_discounts: Vec<DiscountTier>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn single_rate_table() -> PricingTable {
        PricingTable::new(
            [((Resolution::Hd1080, ClipDuration::Six), Money::from_cents(50))],
            FALLBACK_RATE,
        )
    }

    #[test]
    fn single_1080p_six_second_video() {
        let est = single_rate_table().estimate(
            Resolution::Hd1080,
            ClipDuration::Six,
            Extras::default(),
            1,
        );
        assert_eq!(est.total, Money::from_cents(50));
        assert_eq!(est.discount_percent, 0);
    }

    #[test]
    fn ten_videos_get_ten_percent_off_the_aggregate() {
        let est = single_rate_table().estimate(
            Resolution::Hd1080,
            ClipDuration::Six,
            Extras::default(),
            10,
        );
        assert_eq!(est.subtotal, Money::from_cents(500));
        assert_eq!(est.discount_percent, 10);
        assert_eq!(est.total, Money::from_cents(450));
    }

    #[test]
    fn discount_tiers_apply_once() {
        assert_eq!(discount_percent(1), 0);
        assert_eq!(discount_percent(4), 0);
        assert_eq!(discount_percent(5), 5);
        assert_eq!(discount_percent(9), 5);
        assert_eq!(discount_percent(10), 10);
        assert_eq!(discount_percent(49), 10);
        assert_eq!(discount_percent(50), 15);
        assert_eq!(discount_percent(500), 15);

        // 50 x 0.75 = 37.50, 15% off once = 31.875 -> 31.88 (not 0.75 * 0.85^n).
        let est = PricingTable::default().estimate(
            Resolution::Hd1080,
            ClipDuration::Eight,
            Extras::default(),
            50,
        );
        assert_eq!(est.total, Money::from_cents(3188));
    }

    #[test]
    fn extras_are_added_per_video() {
        let est = PricingTable::default().estimate(
            Resolution::Hd720,
            ClipDuration::Four,
            Extras {
                reference_images: 3,
                audio: true,
            },
            2,
        );
        assert_eq!(est.reference_images, Money::from_cents(15));
        assert_eq!(est.audio, Money::from_cents(10));
        assert_eq!(est.per_video_total, Money::from_cents(40));
        assert_eq!(est.total, Money::from_cents(80));
    }

    #[test]
    fn unknown_pair_uses_fallback_rate() {
        let table = single_rate_table();
        let est = table.estimate(Resolution::Hd720, ClipDuration::Four, Extras::default(), 1);
        assert_eq!(est.base_per_video, FALLBACK_RATE);
        assert_eq!(est.total, Money::from_cents(50));
    }

    #[test]
    fn estimate_is_monotonic_in_duration_and_resolution() {
        let table = PricingTable::default();
        for quantity in [1, 5, 10, 50] {
            for resolution in Resolution::ALL {
                let totals: Vec<Money> = ClipDuration::ALL
                    .iter()
                    .map(|d| table.estimate(resolution, *d, Extras::default(), quantity).total)
                    .collect();
                assert!(totals.windows(2).all(|w| w[0] <= w[1]), "{totals:?}");
            }
            for duration in ClipDuration::ALL {
                let low = table.estimate(Resolution::Hd720, duration, Extras::default(), quantity);
                let high = table.estimate(Resolution::Hd1080, duration, Extras::default(), quantity);
                assert!(low.total <= high.total);
            }
        }
    }

    #[test]
    fn sheet_lists_every_pair() {
        let sheet = PricingTable::default().sheet();
        assert_eq!(sheet.rates.len(), 6);
        assert!(sheet.rates.iter().all(|r| r.price.is_some()));
        assert_eq!(sheet.bulk_discounts.len(), 3);
    }

    #[test]
    fn processing_time_grows_with_duration_and_resolution() {
        let short = estimated_processing_secs(Resolution::Hd720, ClipDuration::Four);
        let long = estimated_processing_secs(Resolution::Hd720, ClipDuration::Eight);
        let hd = estimated_processing_secs(Resolution::Hd1080, ClipDuration::Eight);
        assert!(short < long && long < hd);
    }
}
