use std::time::Duration;

use anyhow::Context;

use crate::subjects::DEFAULT_NON_CREDIT;

const DEFAULT_TRANSCRIPT_URL: &str = "https://paravi.ruh.ac.lk/fosmis2019/Ajax/result_filt.php";
const DEFAULT_REFERER: &str = "https://paravi.ruh.ac.lk/fosmis/";
const DEFAULT_GPA_URL: &str = "http://127.0.0.1:3001/gparesults";

#[derive(Debug, Clone)]
pub struct Config {
    pub transcript_url: String,
    pub transcript_referer: String,
    pub gpa_url: String,
    pub gpa_token: Option<String>,
    pub rank_level: String,
    pub rank_concurrency: usize,
    pub rank_cache_ttl: Duration,
    pub request_timeout: Duration,
    pub non_credit_subjects: Vec<String>,
    pub blocked_stnums: Vec<String>,
    pub deceased_stnums: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let number = |key: &str, default: u64| -> anyhow::Result<u64> {
            match var(key) {
                Some(value) => value
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a non-negative integer, got `{value}`")),
                None => Ok(default),
            }
        };

        Ok(Self {
            transcript_url: var("TRANSCRIPT_URL").unwrap_or_else(|| DEFAULT_TRANSCRIPT_URL.into()),
            transcript_referer: var("TRANSCRIPT_REFERER").unwrap_or_else(|| DEFAULT_REFERER.into()),
            gpa_url: var("GPA_URL").unwrap_or_else(|| DEFAULT_GPA_URL.into()),
            gpa_token: var("GPA_TOKEN"),
            rank_level: var("RANK_LEVEL").unwrap_or_else(|| "4".into()),
            rank_concurrency: number("RANK_CONCURRENCY", 16)?.max(1) as usize,
            rank_cache_ttl: Duration::from_secs(number("RANK_CACHE_TTL_SECS", 600)?),
            request_timeout: Duration::from_secs(number("REQUEST_TIMEOUT_SECS", 20)?),
            non_credit_subjects: list_or(var("NON_CREDIT_SUBJECTS"), &DEFAULT_NON_CREDIT),
            blocked_stnums: list_or(var("BLOCKED_STNUMS"), &[]),
            deceased_stnums: list_or(var("DECEASED_STNUMS"), &["11845"]),
        })
    }
}

fn list_or(value: Option<String>, default: &[&str]) -> Vec<String> {
    match value {
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
        None => default.iter().map(|item| item.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.rank_concurrency, 16);
        assert_eq!(config.rank_cache_ttl, Duration::from_secs(600));
        assert_eq!(config.rank_level, "4");
        assert_eq!(config.deceased_stnums, ["11845"]);
        assert!(config.blocked_stnums.is_empty());
        assert!(config.non_credit_subjects.iter().any(|s| s == "MAT1142"));
        assert!(config.gpa_token.is_none());
    }

    #[test]
    fn lists_are_comma_separated() {
        let config = config(&[("BLOCKED_STNUMS", " 12001, ,12002 "), ("GPA_TOKEN", "svc")]).unwrap();
        assert_eq!(config.blocked_stnums, ["12001", "12002"]);
        assert_eq!(config.gpa_token.as_deref(), Some("svc"));
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = config(&[("RANK_CONCURRENCY", "many")]).unwrap_err();
        assert!(err.to_string().contains("RANK_CONCURRENCY"));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let config = config(&[("RANK_CONCURRENCY", "0")]).unwrap();
        assert_eq!(config.rank_concurrency, 1);
    }
}
