//! The five sales statistics computed for the target year.

use super::aggregate::{all_max, first_max, group_by};
use super::{RuleError, RuleOutput, RuleResult};
use crate::dataset::{FilteredDataset, Region};

/// Title with the highest summed sales in `region`. Ties keep the first title.
pub fn top_title(dataset: &FilteredDataset, region: Region) -> RuleResult {
    let groups = group_by(dataset.rows(), |r| r.title.as_deref(), |r| region.sales(r));

    first_max(groups.iter().map(|(title, stats)| (*title, stats.sum)))
        .map(|(title, _)| RuleOutput::Title(title.to_string()))
        .ok_or_else(|| RuleError::no_data(dataset.year(), "no titles to rank"))
}

/// Every genre tied for the highest summed sales in `region`.
pub fn top_genres(dataset: &FilteredDataset, region: Region) -> RuleResult {
    let groups = group_by(dataset.rows(), |r| r.genre.as_deref(), |r| region.sales(r));

    names_or_no_data(
        all_max(groups.iter().map(|(genre, stats)| (*genre, stats.sum))),
        dataset.year(),
        "no genres to rank",
    )
}

/// Every platform tied for the most releases selling more than
/// `threshold` million units in `region`.
pub fn top_platforms_by_sellers(
    dataset: &FilteredDataset,
    region: Region,
    threshold: f64,
) -> RuleResult {
    let sellers = dataset
        .rows()
        .iter()
        .filter(|r| region.sales(r) > threshold);
    let groups = group_by(sellers, |r| r.platform.as_deref(), |_| 1.0);

    names_or_no_data(
        all_max(groups.iter().map(|(platform, stats)| (*platform, stats.count))),
        dataset.year(),
        "no releases above the sales threshold",
    )
}

/// Every publisher tied for the highest mean sales in `region`.
pub fn top_publishers_by_mean(dataset: &FilteredDataset, region: Region) -> RuleResult {
    let groups = group_by(
        dataset.rows(),
        |r| r.publisher.as_deref(),
        |r| region.sales(r),
    );

    names_or_no_data(
        all_max(groups.iter().map(|(publisher, stats)| (*publisher, stats.mean()))),
        dataset.year(),
        "no publishers to rank",
    )
}

/// Number of releases that sold strictly more in `ahead` than in `behind`.
pub fn count_outselling(dataset: &FilteredDataset, ahead: Region, behind: Region) -> RuleResult {
    let count = dataset
        .rows()
        .iter()
        .filter(|r| ahead.sales(r) > behind.sales(r))
        .count();
    Ok(RuleOutput::Count(count))
}

fn names_or_no_data(names: Vec<&str>, year: i32, detail: &str) -> RuleResult {
    if names.is_empty() {
        return Err(RuleError::no_data(year, detail));
    }
    Ok(RuleOutput::Names(
        names.into_iter().map(str::to_string).collect(),
    ))
}
