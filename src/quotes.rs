//! Quote of the day.
//!
//! A static list of `{quoteText, quoteAuthor}` records loaded once at
//! startup. The quote for a date is `records[day_of_year % len]`, with
//! `day_of_year` counted from 1 as on the calendar.

use anyhow::{Context, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::Config;

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRecord {
    #[serde(rename = "quoteText", default)]
    pub text: Option<String>,
    #[serde(rename = "quoteAuthor", default)]
    pub author: Option<String>,
}

/// What `/quote` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub quote: String,
    pub author: String,
}

pub struct QuoteBook {
    records: Vec<QuoteRecord>,
}

impl QuoteBook {
    pub fn new(records: Vec<QuoteRecord>) -> Self {
        if records.is_empty() {
            return Self::fallback();
        }
        Self { records }
    }

    /// Load the quote file, falling back to a single built-in quote when it
    /// is missing, unreadable, or empty.
    pub fn load(path: &Path) -> Self {
        match read_records(path) {
            Ok(records) if !records.is_empty() => {
                tracing::info!(count = records.len(), path = %path.display(), "quotes loaded");
                Self { records }
            }
            Ok(_) => {
                tracing::warn!(path = %path.display(), "quote file is empty, using fallback");
                Self::fallback()
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "could not load quotes, using fallback");
                Self::fallback()
            }
        }
    }

    fn fallback() -> Self {
        Self {
            records: vec![QuoteRecord {
                text: Some("The best way to predict the future is to create it.".to_string()),
                author: Some("Peter Drucker".to_string()),
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_day(&self, day_of_year: u32) -> Quote {
        let record = &self.records[day_of_year as usize % self.records.len()];
        Quote {
            quote: record
                .text
                .clone()
                .unwrap_or_else(|| "Keep going!".to_string()),
            author: record
                .author
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Quote for the current local calendar day.
    pub fn today(&self) -> Quote {
        self.for_day(chrono::Local::now().ordinal())
    }
}

/// `taskmaster quote [--day N]`.
pub fn run_quote(config: &Config, day: Option<u32>) {
    let book = QuoteBook::load(&config.quotes.path);
    let quote = match day {
        Some(day) => book.for_day(day),
        None => book.today(),
    };
    println!("\"{}\" - {}", quote.quote, quote.author);
}

fn read_records(path: &Path) -> Result<Vec<QuoteRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read quote file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse quote file: {}", path.display()))
}
