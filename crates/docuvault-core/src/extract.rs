//! Filename-based metadata extraction.
//!
//! Not OCR. The lowercased file name is matched against a fixed keyword
//! table and the first hit supplies type, provider, premium, a random policy
//! number and a due date a fixed number of days out.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::models::InsuranceType;

/// Metadata guessed from a file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedInfo {
    #[serde(rename = "type")]
    pub doc_type: InsuranceType,
    pub provider: String,
    pub premium: String,
    pub policy_number: String,
    pub due_date: NaiveDate,
}

struct Rule {
    keyword: Option<&'static str>,
    doc_type: InsuranceType,
    provider: &'static str,
    premium: &'static str,
    policy_prefix: &'static str,
    due_in_days: i64,
}

/// Checked in order; the last rule matches everything.
const RULES: &[Rule] = &[
    Rule {
        keyword: Some("health"),
        doc_type: InsuranceType::Health,
        provider: "BlueCross BlueShield",
        premium: "$250/month",
        policy_prefix: "H-",
        due_in_days: 30,
    },
    Rule {
        keyword: Some("auto"),
        doc_type: InsuranceType::Auto,
        provider: "Geico",
        premium: "$125/month",
        policy_prefix: "A-",
        due_in_days: 45,
    },
    Rule {
        keyword: Some("life"),
        doc_type: InsuranceType::Life,
        provider: "MetLife",
        premium: "$75/month",
        policy_prefix: "L-",
        due_in_days: 60,
    },
    Rule {
        keyword: Some("home"),
        doc_type: InsuranceType::Home,
        provider: "State Farm",
        premium: "$150/month",
        policy_prefix: "H-",
        due_in_days: 90,
    },
    Rule {
        keyword: None,
        doc_type: InsuranceType::General,
        provider: "Unknown Provider",
        premium: "Unknown",
        policy_prefix: "G-",
        due_in_days: 30,
    },
];

/// Derive document metadata from `file_name` as of `now`.
#[must_use]
pub fn extract_document_info(file_name: &str, now: DateTime<Utc>) -> ExtractedInfo {
    let lower = file_name.to_lowercase();
    let rule = RULES
        .iter()
        .find(|r| r.keyword.is_none_or(|k| lower.contains(k)))
        .unwrap_or(&RULES[RULES.len() - 1]);

    ExtractedInfo {
        doc_type: rule.doc_type,
        provider: rule.provider.to_owned(),
        premium: rule.premium.to_owned(),
        policy_number: format!("{}{}", rule.policy_prefix, random_digits(8)),
        due_date: (now + Duration::days(rule.due_in_days)).date_naive(),
    }
}

fn random_digits(n: usize) -> String {
    let mut rng = OsRng;
    (0..n)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
