//! Layer 4 merger: deduplicate findings across audits.
//!
//! Findings merge when their messages are similar (Jaccard over tokens,
//! boosted by shared key phrases), their categories match, and they came
//! from different audits - one audit can never corroborate itself. The
//! merged finding keeps the most severe entry; provenance and confidence
//! ride alongside.

use std::collections::BTreeSet;

use crate::types::config::MergeConfig;
use crate::types::finding::{Confidence, Evidence, Finding, MergedFinding};

/// Wrap and merge raw findings into the deduplicated, ranked list.
pub fn merge_findings(findings: Vec<Finding>, config: &MergeConfig) -> Vec<MergedFinding> {
    let singletons = findings
        .into_iter()
        .map(|finding| {
            let sources = vec![finding.source];
            MergedFinding {
                finding,
                sources,
                confidence: Confidence::Low,
                priority_score: 2.0,
            }
        })
        .collect();

    merge_clusters(singletons, config)
}

/// Merge pass over already-wrapped findings. Idempotent:
/// `merge_clusters(merge_clusters(f)) == merge_clusters(f)`.
pub fn merge_clusters(
    findings: Vec<MergedFinding>,
    config: &MergeConfig,
) -> Vec<MergedFinding> {
    let mut clusters: Vec<MergedFinding> = Vec::new();

    for candidate in findings {
        let target = clusters.iter_mut().find(|cluster| {
            cluster.finding.category == candidate.finding.category
                && disjoint_sources(cluster, &candidate)
                && similarity(
                    &cluster.finding.message,
                    &candidate.finding.message,
                    config,
                ) >= config.similarity_threshold
        });

        match target {
            Some(cluster) => combine(cluster, candidate),
            None => clusters.push(candidate),
        }
    }

    for cluster in &mut clusters {
        finalize(cluster, config);
    }

    // Ranked output; message tiebreak keeps ordering deterministic
    clusters.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.finding.message.cmp(&b.finding.message))
    });

    clusters
}

fn disjoint_sources(cluster: &MergedFinding, candidate: &MergedFinding) -> bool {
    !candidate
        .sources
        .iter()
        .any(|source| cluster.sources.contains(source))
}

/// Fold the candidate into the cluster, keeping the most severe entry.
fn combine(cluster: &mut MergedFinding, candidate: MergedFinding) {
    // Priority derives Ord with Critical first
    if candidate.finding.priority < cluster.finding.priority {
        let mut sources = std::mem::take(&mut cluster.sources);
        for source in &candidate.sources {
            if !sources.contains(source) {
                sources.push(*source);
            }
        }
        let mut kept = candidate;
        kept.sources = sources;
        // Union the affected URLs from both entries
        let mut urls: Vec<String> = kept.finding.affected_urls.clone();
        for url in &cluster.finding.affected_urls {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        kept.finding.affected_urls = urls;
        *cluster = kept;
    } else {
        for source in candidate.sources {
            if !cluster.sources.contains(&source) {
                cluster.sources.push(source);
            }
        }
        for url in candidate.finding.affected_urls {
            if !cluster.finding.affected_urls.contains(&url) {
                cluster.finding.affected_urls.push(url);
            }
        }
        // Adopt the candidate's evidence when the kept entry has none
        if matches!(cluster.finding.evidence, Evidence::None)
            && !matches!(candidate.finding.evidence, Evidence::None)
        {
            cluster.finding.evidence = candidate.finding.evidence;
        }
    }
}

/// Recompute confidence and priority score from the cluster's final state.
fn finalize(cluster: &mut MergedFinding, config: &MergeConfig) {
    let multi_source = cluster.sources.len() >= 2;
    let strong_evidence =
        cluster.finding.evidence.char_len() >= config.substantive_evidence_chars;

    cluster.confidence = match (multi_source, strong_evidence) {
        (true, true) => Confidence::High,
        (true, false) | (false, true) => Confidence::Medium,
        (false, false) => Confidence::Low,
    };

    let mut score = cluster.finding.priority.base_score();
    if multi_source {
        score += 0.5;
    }
    if strong_evidence {
        score += 0.3;
    }
    cluster.priority_score = score.min(5.0);
}

/// Jaccard similarity over message tokens, with the key-phrase boost.
pub fn similarity(a: &str, b: &str, config: &MergeConfig) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count() as f64;
    let union = tokens_a.union(&tokens_b).count() as f64;
    let jaccard = intersection / union;

    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let shares_phrase = config
        .key_phrases
        .iter()
        .any(|phrase| a_lower.contains(phrase.as_str()) && b_lower.contains(phrase.as_str()));

    if shares_phrase {
        (jaccard + config.key_phrase_boost).min(1.0)
    } else {
        jaccard
    }
}

fn tokenize(message: &str) -> BTreeSet<String> {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 2)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::finding::{AuditSource, Category, FindingKind, Priority, Severity};

    fn finding(source: AuditSource, message: &str) -> Finding {
        Finding::new(FindingKind::TechMissingTitle, Severity::Warning, source, message)
            .with_evidence(Evidence::Urls {
                urls: vec!["https://example.com/a".into()],
            })
    }

    #[test]
    fn test_cross_audit_duplicates_merge() {
        let config = MergeConfig::default();
        let merged = merge_findings(
            vec![
                finding(AuditSource::TechnicalSeo, "Missing title tag"),
                finding(AuditSource::OnPageSeo, "Missing title tag"),
            ],
            &config,
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].sources.len(), 2);
        assert!(merged[0].sources.contains(&AuditSource::TechnicalSeo));
        assert!(merged[0].sources.contains(&AuditSource::OnPageSeo));
        assert_eq!(merged[0].confidence, Confidence::High);
        assert!(merged[0].priority_score >= Priority::High.base_score() + 0.5);
    }

    #[test]
    fn test_same_source_never_merges() {
        let config = MergeConfig::default();
        let merged = merge_findings(
            vec![
                finding(AuditSource::OnPageSeo, "Missing title tag"),
                finding(AuditSource::OnPageSeo, "Missing title tag"),
            ],
            &config,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_different_categories_never_merge() {
        let config = MergeConfig::default();
        let a = finding(AuditSource::TechnicalSeo, "Missing title tag");
        let mut b = finding(AuditSource::OnPageSeo, "Missing title tag");
        b.category = Category::Security;

        let merged = merge_findings(vec![a, b], &config);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_most_severe_entry_kept() {
        let config = MergeConfig::default();
        let mild = finding(AuditSource::OnPageSeo, "Missing title tag");
        let mut severe = finding(AuditSource::TechnicalSeo, "Missing title tag on key pages");
        severe.severity = Severity::Critical;
        severe.priority = Priority::Critical;

        let merged = merge_findings(vec![mild, severe], &config);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].finding.priority, Priority::Critical);
        assert!((merged[0].priority_score - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge_idempotent() {
        let config = MergeConfig::default();
        let once = merge_findings(
            vec![
                finding(AuditSource::TechnicalSeo, "Missing title tag"),
                finding(AuditSource::OnPageSeo, "Missing title tag"),
                finding(AuditSource::Crawl, "Broken internal links found"),
            ],
            &config,
        );

        let twice = merge_clusters(once.clone(), &config);

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.finding.id, b.finding.id);
            assert_eq!(a.sources, b.sources);
            assert_eq!(a.priority_score, b.priority_score);
        }
    }

    #[test]
    fn test_similarity_key_phrase_boost() {
        let config = MergeConfig::default();
        let base = similarity(
            "Missing canonical on product pages",
            "Product pages lack a canonical URL declaration",
            &config,
        );
        // Both mention "canonical": boost applies
        let mut no_phrases = config.clone();
        no_phrases.key_phrases.clear();
        let unboosted = similarity(
            "Missing canonical on product pages",
            "Product pages lack a canonical URL declaration",
            &no_phrases,
        );
        assert!(base > unboosted);
    }

    #[test]
    fn test_score_capped_at_five() {
        let config = MergeConfig::default();
        let mut a = finding(AuditSource::TechnicalSeo, "Missing title tag");
        a.priority = Priority::Critical;
        let mut b = finding(AuditSource::OnPageSeo, "Missing title tag");
        b.priority = Priority::Critical;

        let merged = merge_findings(vec![a, b], &config);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].priority_score <= 5.0);
    }
}
