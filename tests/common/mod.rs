//! Common test utilities and helpers

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A small slice of the real sales table, covering two years.
pub const SAMPLE_CSV: &str = "\
Rank,Name,Platform,Year,Genre,Publisher,NA_Sales,EU_Sales,JP_Sales,Other_Sales,Global_Sales
1,Wii Sports,Wii,2006,Sports,Nintendo,41.49,29.02,3.77,8.46,82.74
7,New Super Mario Bros.,DS,2006,Platform,Nintendo,11.38,9.23,6.5,2.9,30.01
20,Pokemon Diamond,DS,2006,Role-Playing,Nintendo,6.42,4.52,6.04,1.37,18.36
115,Gears of War,X360,2006,Shooter,Microsoft Game Studios,3.54,1.9,0.07,0.55,6.06
121,Final Fantasy XII,PS2,2006,Role-Playing,Square Enix,1.88,0,2.33,1.74,5.95
57,Donkey Kong Country,SNES,1994,Platform,Nintendo,4.36,1.71,3,0.23,9.3
281,Super Metroid,SNES,1994,Platform,Nintendo,0.98,0.26,0.49,0.04,1.77
512,Doom II,PC,1994,Shooter,GT Interactive,0,0,0,0,2.1
";

/// Report expected from `SAMPLE_CSV` for 2006.
pub const REPORT_2006: [&str; 5] = [
    "Best-selling game worldwide in 2006: Wii Sports",
    "Best-selling genres in Europe in 2006: Sports",
    "Platforms with the most million-selling games in North America in 2006: DS",
    "Publishers with the highest average sales in Japan in 2006: Nintendo",
    "Games that sold better in Europe than in Japan in 2006: 3",
];

/// Temporary directory holding a dataset and a job configuration
pub struct TestContext {
    temp_dir: TempDir,
    csv_path: PathBuf,
    config_path: PathBuf,
}

impl TestContext {
    /// Context with `SAMPLE_CSV` and a config that never waits between retries.
    pub fn new() -> Result<Self> {
        Self::with_csv(SAMPLE_CSV)
    }

    pub fn with_csv(csv: &str) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let csv_path = temp_dir.path().join("sales.csv");
        fs::write(&csv_path, csv)?;

        let config_path = temp_dir.path().join("gamesales.toml");
        let config = format!(
            r#"[job]
source_url = "{}"

[retry.fetch]
attempts = 2
initial_delay = "10ms"
max_delay = "10ms"
"#,
            csv_path.display()
        );
        fs::write(&config_path, config)?;

        Ok(Self {
            temp_dir,
            csv_path,
            config_path,
        })
    }

    #[allow(dead_code)]
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    #[allow(dead_code)]
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
