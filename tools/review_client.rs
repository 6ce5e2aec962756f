//! Test Review Client
//!
//! Generates random product reviews and posts them to a running service.

use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use review_sentiment_service::ReviewRecord;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

const POSITIVE_TEXT: &[&str] = &[
    "Works exactly as described and arrived early.",
    "Great sound quality for the price, very happy with it.",
    "My kids love it, we use it every day.",
    "Sturdy, well made and easy to set up.",
];

const NEGATIVE_TEXT: &[&str] = &[
    "Stopped working after two weeks.",
    "Cheap plastic, broke the first time I used it.",
    "Not as pictured and the seller never answered.",
    "Battery barely lasts an hour.",
];

const POSITIVE_SUMMARY: &[&str] = &["Five Stars", "Love it", "Great value", "Highly recommend"];
const NEGATIVE_SUMMARY: &[&str] = &["One Star", "Disappointed", "Waste of money", "Returned it"];

/// Review generator for testing
struct ReviewGenerator {
    rng: rand::rngs::ThreadRng,
    review_counter: u64,
}

impl ReviewGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            review_counter: 0,
        }
    }

    /// Generate a random positive review
    fn generate_positive(&mut self) -> ReviewRecord {
        let text = self.random_choice(POSITIVE_TEXT);
        let summary = self.random_choice(POSITIVE_SUMMARY);
        let overall = self.rng.gen_range(4..=5) as f64;
        self.generate(text, summary, overall)
    }

    /// Generate a random negative review
    fn generate_negative(&mut self) -> ReviewRecord {
        let text = self.random_choice(NEGATIVE_TEXT);
        let summary = self.random_choice(NEGATIVE_SUMMARY);
        let overall = self.rng.gen_range(1..=2) as f64;
        self.generate(text, summary, overall)
    }

    fn generate(&mut self, text: &str, summary: &str, overall: f64) -> ReviewRecord {
        self.review_counter += 1;

        let mut review = ReviewRecord::new(
            format!("A{:012X}", self.rng.gen::<u64>() & 0xFFFF_FFFF_FFFF),
            format!("B{:09}", self.rng.gen_range(0..1_000_000_000u64)),
            text,
            summary,
            overall,
            self.rng.gen_bool(0.8),
        );
        review.review_id = self.review_counter as i64;

        // Mostly dataset-style dates, sometimes missing or garbage
        let roll: f64 = self.rng.gen();
        if roll < 0.8 {
            let reviewed = Utc::now() - ChronoDuration::days(self.rng.gen_range(1..3000));
            review = review.with_review_time(reviewed.format("%m %d, %Y").to_string());
        } else if roll < 0.9 {
            review = review.with_review_time("not-a-date");
        }

        review
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("review_client=info".parse()?),
        )
        .init();

    info!("Starting Test Review Client");

    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("http://localhost:8000");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let negative_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.3);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        base_url = %base_url,
        count = count,
        negative_rate = negative_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::new();
    match client.get(base_url).send().await {
        Ok(resp) => info!(status = %resp.status(), "Service reachable"),
        Err(e) => {
            warn!(error = %e, "Service unreachable. Running in dry-run mode.");
            return run_dry_mode(count, negative_rate, delay_ms).await;
        }
    }

    let predict_url = format!("{}/predict", base_url.trim_end_matches('/'));
    let mut generator = ReviewGenerator::new();
    let mut rng = rand::thread_rng();

    let mut agreed = 0u64;
    let mut failed = 0u64;

    for i in 0..count {
        let negative = rng.gen_bool(negative_rate);
        let review = if negative {
            generator.generate_negative()
        } else {
            generator.generate_positive()
        };

        let response: Value = client
            .post(&predict_url)
            .json(&review)
            .send()
            .await?
            .json()
            .await?;

        match response.get("prediction").and_then(Value::as_i64) {
            Some(label) => {
                if (label == 1) != negative {
                    agreed += 1;
                }
            }
            None => {
                failed += 1;
                warn!(review_id = review.review_id, response = %response, "Prediction failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} reviews ({} matched the generated sentiment, {} failed)",
                i + 1,
                count,
                agreed,
                failed
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} reviews ({} matched, {} failed)",
        count, agreed, failed
    );

    Ok(())
}

async fn run_dry_mode(count: u64, negative_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no service connection)");

    let mut generator = ReviewGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let review = if rng.gen_bool(negative_rate) {
            generator.generate_negative()
        } else {
            generator.generate_positive()
        };

        let json = serde_json::to_string_pretty(&review)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample review {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
