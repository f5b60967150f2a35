//! Derived statistics for the reporting read surface.

use serde::Serialize;
use std::sync::Arc;

use split_core::limits::MIN_SAMPLE_SIZE;
use split_core::{significance, Result, SignificanceResult, Variant};

use crate::stats::{ComponentStats, PageStats};
use crate::store::StatsStore;

/// Page counters plus derived rates and the daily breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStatsView {
    #[serde(flatten)]
    pub stats: PageStats,
    /// Conversions per view, in percent.
    pub conversion_rate: f64,
    /// Single-page-view sessions per session, in percent.
    pub bounce_rate: f64,
}

/// Component counters plus derived rates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatsView {
    #[serde(flatten)]
    pub stats: ComponentStats,
    /// Clicks per view, in percent.
    pub click_through_rate: f64,
    /// Conversions per view, in percent.
    pub conversion_rate: f64,
}

/// Significance verdict plus a plain-language recommendation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificanceReport {
    pub page_id: String,
    pub component_id: String,
    pub sample_size_a: u64,
    pub conversions_a: u64,
    pub sample_size_b: u64,
    pub conversions_b: u64,
    #[serde(flatten)]
    pub result: SignificanceResult,
    /// True when the sample-size guard fired; renders distinctly from a
    /// computed "no difference found".
    pub insufficient_data: bool,
    pub recommendation: String,
}

fn rate_pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

/// Page stats with derived conversion and bounce rates.
pub async fn page_stats_view(
    store: &Arc<dyn StatsStore>,
    page_id: &str,
) -> Result<Option<PageStatsView>> {
    let Some(stats) = store.page_stats(page_id).await? else {
        return Ok(None);
    };

    let sessions = store.sessions_for_page(page_id).await?;
    let bounced = sessions.iter().filter(|s| s.page_views <= 1).count() as u64;

    Ok(Some(PageStatsView {
        conversion_rate: rate_pct(stats.conversions, stats.views),
        bounce_rate: rate_pct(bounced, sessions.len() as u64),
        stats,
    }))
}

/// Component stats rows with derived rates, optionally narrowed to one
/// component.
pub async fn component_stats_view(
    store: &Arc<dyn StatsStore>,
    page_id: &str,
    component_id: Option<&str>,
) -> Result<Vec<ComponentStatsView>> {
    let rows = store.component_stats(page_id, component_id).await?;

    Ok(rows
        .into_iter()
        .map(|stats| ComponentStatsView {
            click_through_rate: rate_pct(stats.clicks, stats.views),
            conversion_rate: rate_pct(stats.conversions, stats.views),
            stats,
        })
        .collect())
}

/// Run the significance test over a component's variant tallies.
pub async fn significance_report(
    store: &Arc<dyn StatsStore>,
    page_id: &str,
    component_id: &str,
    confidence_level: f64,
) -> Result<SignificanceReport> {
    let rows = store.component_stats(page_id, Some(component_id)).await?;

    let tally = |variant: Variant| -> (u64, u64) {
        rows.iter()
            .find(|r| r.variant == variant)
            .map(|r| (r.views, r.conversions))
            .unwrap_or((0, 0))
    };
    let (sample_size_a, conversions_a) = tally(Variant::A);
    let (sample_size_b, conversions_b) = tally(Variant::B);

    let result = significance::test(
        sample_size_a,
        conversions_a,
        sample_size_b,
        conversions_b,
        confidence_level,
    );

    let insufficient_data = sample_size_a < MIN_SAMPLE_SIZE || sample_size_b < MIN_SAMPLE_SIZE;
    let recommendation = recommend(&result, insufficient_data);

    Ok(SignificanceReport {
        page_id: page_id.to_string(),
        component_id: component_id.to_string(),
        sample_size_a,
        conversions_a,
        sample_size_b,
        conversions_b,
        result,
        insufficient_data,
        recommendation,
    })
}

/// Plain-language wording. Insufficient data must read distinctly from a
/// computed non-significant result.
fn recommend(result: &SignificanceResult, insufficient_data: bool) -> String {
    if insufficient_data {
        return format!(
            "Insufficient data: each variant needs at least {} views before this test can be read.",
            MIN_SAMPLE_SIZE
        );
    }

    match result.winning_variant {
        Some(winner) => format!(
            "Variant {} is outperforming variant {} with {:.1}% confidence (+{:.1}% conversion rate). Consider rolling it out.",
            winner.as_str(),
            winner.other().as_str(),
            result.confidence * 100.0,
            result.improvement_rate
        ),
        None => "No significant difference between variants found yet. Keep the test running.".to_string(),
    }
}
