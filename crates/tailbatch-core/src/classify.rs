// Domain-based priority classification
//
// Substring matching against configured host lists. Immediate wins over
// deferrable; anything unmatched is `soon`. `bulk` is never inferred.

use crate::{host_of, Priority};

#[derive(Debug, Clone, Default)]
pub struct DomainClassifier {
    immediate: Vec<String>,
    deferrable: Vec<String>,
}

impl DomainClassifier {
    pub fn new<I, D>(immediate_domains: I, deferrable_domains: D) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            immediate: immediate_domains
                .into_iter()
                .map(|d| d.as_ref().to_ascii_lowercase())
                .collect(),
            deferrable: deferrable_domains
                .into_iter()
                .map(|d| d.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Classify a full URL; URLs without a parseable host fall back to
    /// `soon` (the façade rejects them before this matters).
    pub fn classify_url(&self, url: &str) -> Priority {
        match host_of(url) {
            Some(host) => self.classify_host(&host),
            None => Priority::Soon,
        }
    }

    pub fn classify_host(&self, host: &str) -> Priority {
        let host = host.to_ascii_lowercase();
        if self.immediate.iter().any(|d| host.contains(d.as_str())) {
            Priority::Immediate
        } else if self.deferrable.iter().any(|d| host.contains(d.as_str())) {
            Priority::Deferrable
        } else {
            Priority::Soon
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classifier() -> DomainClassifier {
        DomainClassifier::new(
            ["payments.example.com", "auth."],
            ["analytics", "telemetry.example.org"],
        )
    }

    #[test]
    fn test_immediate_match() {
        assert_eq!(
            classifier().classify_url("https://payments.example.com/charge"),
            Priority::Immediate
        );
        // Substring semantics: any host containing "auth." matches.
        assert_eq!(
            classifier().classify_host("auth.internal.example.com"),
            Priority::Immediate
        );
    }

    #[test]
    fn test_deferrable_match() {
        assert_eq!(
            classifier().classify_url("https://analytics.vendor.io/v1/track"),
            Priority::Deferrable
        );
    }

    #[test]
    fn test_unmatched_is_soon() {
        assert_eq!(
            classifier().classify_url("https://api.example.com/ping"),
            Priority::Soon
        );
        assert_eq!(classifier().classify_url("not a url"), Priority::Soon);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let classifier = DomainClassifier::new(["Analytics.EXAMPLE.com"], ["ignored"]);
        assert_eq!(
            classifier.classify_host("ANALYTICS.example.COM"),
            Priority::Immediate
        );
    }

    proptest! {
        // An immediate match wins no matter what the deferrable list holds.
        #[test]
        fn prop_immediate_wins_over_deferrable(
            host in "[a-z]{1,10}\\.[a-z]{2,5}",
            extra in proptest::collection::vec("[a-z]{1,8}", 0..4),
        ) {
            let mut deferrable = extra;
            // Poison the deferrable list with the exact host as well.
            deferrable.push(host.clone());
            let classifier = DomainClassifier::new([host.as_str()], deferrable);
            prop_assert_eq!(classifier.classify_host(&host), Priority::Immediate);
        }

        // Classification never yields bulk.
        #[test]
        fn prop_never_bulk(host in "[a-z.]{1,20}") {
            let classifier = classifier();
            prop_assert_ne!(classifier.classify_host(&host), Priority::Bulk);
        }
    }
}
