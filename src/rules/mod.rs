//! Aggregation rules over one year's sales.
//!
//! Each rule is a pure function of the [`FilteredDataset`]. Rules never
//! depend on each other, so they can be evaluated in any order or all at
//! once; [`evaluate_all_parallel`] runs them on the blocking pool against
//! the same shared snapshot.

pub mod aggregate;
pub mod sales;

use crate::dataset::{FilteredDataset, Region};
use crate::error::Result;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Releases selling more than this many million units in North America
/// count as million-sellers.
pub const MILLION_SELLER_THRESHOLD: f64 = 1.0;

/// Separator used when a rule reports several tied names.
pub const NAME_SEPARATOR: &str = ",";

/// The statistics reported for each year, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    TopTitleWorldwide,
    TopGenresEurope,
    TopPlatformsNorthAmerica,
    TopPublishersJapan,
    EuropeOverJapanCount,
}

impl Rule {
    pub const ALL: [Rule; 5] = [
        Rule::TopTitleWorldwide,
        Rule::TopGenresEurope,
        Rule::TopPlatformsNorthAmerica,
        Rule::TopPublishersJapan,
        Rule::EuropeOverJapanCount,
    ];

    /// Stable identifier, used as the task name.
    pub fn id(self) -> &'static str {
        match self {
            Rule::TopTitleWorldwide => "top_title_worldwide",
            Rule::TopGenresEurope => "top_genres_europe",
            Rule::TopPlatformsNorthAmerica => "top_platforms_north_america",
            Rule::TopPublishersJapan => "top_publishers_japan",
            Rule::EuropeOverJapanCount => "europe_over_japan_count",
        }
    }

    /// Report line label for `year`.
    pub fn description(self, year: i32) -> String {
        match self {
            Rule::TopTitleWorldwide => {
                format!("Best-selling game worldwide in {year}")
            }
            Rule::TopGenresEurope => {
                format!("Best-selling genres in Europe in {year}")
            }
            Rule::TopPlatformsNorthAmerica => format!(
                "Platforms with the most million-selling games in North America in {year}"
            ),
            Rule::TopPublishersJapan => {
                format!("Publishers with the highest average sales in Japan in {year}")
            }
            Rule::EuropeOverJapanCount => {
                format!("Games that sold better in Europe than in Japan in {year}")
            }
        }
    }

    pub fn evaluate(self, dataset: &FilteredDataset) -> RuleResult {
        match self {
            Rule::TopTitleWorldwide => sales::top_title(dataset, Region::Global),
            Rule::TopGenresEurope => sales::top_genres(dataset, Region::Europe),
            Rule::TopPlatformsNorthAmerica => sales::top_platforms_by_sellers(
                dataset,
                Region::NorthAmerica,
                MILLION_SELLER_THRESHOLD,
            ),
            Rule::TopPublishersJapan => sales::top_publishers_by_mean(dataset, Region::Japan),
            Rule::EuropeOverJapanCount => {
                sales::count_outselling(dataset, Region::Europe, Region::Japan)
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Value produced by a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutput {
    /// A single winner
    Title(String),
    /// All names tied for first place, in group order
    Names(Vec<String>),
    Count(usize),
}

impl fmt::Display for RuleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutput::Title(title) => f.write_str(title),
            RuleOutput::Names(names) => f.write_str(&names.join(NAME_SEPARATOR)),
            RuleOutput::Count(count) => write!(f, "{count}"),
        }
    }
}

impl Serialize for RuleOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RuleOutput::Title(title) => serializer.serialize_str(title),
            RuleOutput::Names(names) => names.serialize(serializer),
            RuleOutput::Count(count) => serializer.serialize_u64(*count as u64),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    /// Nothing to aggregate, e.g. the target year is absent from the source
    #[error("no data for {year}: {detail}")]
    NoData { year: i32, detail: String },
}

impl RuleError {
    pub fn no_data(year: i32, detail: impl Into<String>) -> Self {
        Self::NoData {
            year,
            detail: detail.into(),
        }
    }
}

pub type RuleResult = std::result::Result<RuleOutput, RuleError>;

/// Outcome of every rule for one snapshot, in report order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResults {
    year: i32,
    results: Vec<(Rule, RuleResult)>,
}

impl RuleResults {
    /// Collect results, reordering them into report order.
    pub fn new(year: i32, mut results: Vec<(Rule, RuleResult)>) -> Self {
        results.sort_by_key(|(rule, _)| Rule::ALL.iter().position(|r| r == rule));
        Self { year, results }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn get(&self, rule: Rule) -> Option<&RuleResult> {
        self.results
            .iter()
            .find(|(r, _)| *r == rule)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rule, &RuleResult)> {
        self.results.iter().map(|(rule, result)| (*rule, result))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Evaluate every rule one after another.
pub fn evaluate_all(dataset: &FilteredDataset) -> RuleResults {
    let results = Rule::ALL
        .iter()
        .map(|rule| (*rule, rule.evaluate(dataset)))
        .collect();
    RuleResults::new(dataset.year(), results)
}

/// Evaluate every rule concurrently on the blocking pool and wait for all of them.
pub async fn evaluate_all_parallel(dataset: &FilteredDataset) -> Result<RuleResults> {
    let results = evaluate_parallel(dataset, &Rule::ALL).await?;
    Ok(RuleResults::new(dataset.year(), results))
}

/// Evaluate `rules` concurrently against one shared snapshot.
///
/// Returns once every rule has finished, in the order given.
pub async fn evaluate_parallel(
    dataset: &FilteredDataset,
    rules: &[Rule],
) -> Result<Vec<(Rule, RuleResult)>> {
    let handles = rules.iter().map(|rule| {
        let rule = *rule;
        let snapshot = dataset.clone();
        tokio::task::spawn_blocking(move || {
            debug!("Evaluating rule {}", rule);
            (rule, rule.evaluate(&snapshot))
        })
    });

    let results = futures::future::join_all(handles)
        .await
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(results)
}
