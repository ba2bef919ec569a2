//! Retrieval request wire shape and archive storage keys.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::config::JobConfig;

/// Request body accepted by the retrieval endpoint. Month, day and year
/// selectors travel as zero-padded strings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrievalRequest {
    pub product_family: Vec<String>,
    pub variable: Vec<String>,
    pub crop_type: Vec<String>,
    pub year: String,
    pub month: Vec<String>,
    pub day: Vec<String>,
    pub growing_season: Vec<String>,
    pub harvest_year: String,
    pub data_format: String,
}

impl RetrievalRequest {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// One request per (variable, year) pair, as the job is configured.
    pub fn for_job(config: &JobConfig, variable: &str, year: u16) -> Result<Self> {
        Self::builder()
            .product_family(&config.product_family)
            .crop_type(&config.crop_type)
            .growing_season(&config.growing_season)
            .months(&config.months)
            .days(&config.days)
            .variable(variable)
            .year(year)
            .build()
    }
}

#[derive(Debug, Default)]
pub struct RequestBuilder {
    product_family: String,
    crop_type: String,
    growing_season: String,
    variable: Option<String>,
    year: Option<u16>,
    months: Vec<u8>,
    days: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        RequestBuilder {
            months: (1..=12).collect(),
            days: vec![10, 20, 28, 30, 31],
            ..Default::default()
        }
    }

    pub fn product_family(mut self, product_family: &str) -> Self {
        self.product_family = product_family.to_string();
        self
    }

    pub fn crop_type(mut self, crop_type: &str) -> Self {
        self.crop_type = crop_type.to_string();
        self
    }

    pub fn growing_season(mut self, growing_season: &str) -> Self {
        self.growing_season = growing_season.to_string();
        self
    }

    pub fn variable(mut self, variable: &str) -> Self {
        self.variable = Some(variable.to_string());
        self
    }

    pub fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn months(mut self, months: &[u8]) -> Self {
        self.months = months.to_vec();
        self
    }

    pub fn days(mut self, days: &[u8]) -> Self {
        self.days = days.to_vec();
        self
    }

    pub fn build(self) -> Result<RetrievalRequest> {
        let variable = self
            .variable
            .ok_or_else(|| anyhow!("request needs a variable"))?;
        let year = self.year.ok_or_else(|| anyhow!("request needs a year"))?;
        let year = format!("{:04}", year);

        Ok(RetrievalRequest {
            product_family: vec![self.product_family],
            variable: vec![variable],
            crop_type: vec![self.crop_type],
            harvest_year: year.clone(),
            year,
            month: self.months.iter().map(|m| format!("{:02}", m)).collect(),
            day: self.days.iter().map(|d| format!("{:02}", d)).collect(),
            growing_season: vec![self.growing_season],
            data_format: "zip".to_string(),
        })
    }
}

/// Storage key for a staged archive:
/// `<prefix>/<year>/<variable>_year_<year>.zip`. Also used as the relative
/// staging path on disk.
pub fn archive_key(prefix: &str, variable: &str, year: u16) -> String {
    format!("{}/{}/{}_year_{}.zip", prefix, year, variable, year)
}

// -- Tests -------------------------------------------------------------------
