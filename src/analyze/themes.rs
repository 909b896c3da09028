//! Per-source keyword themes: frequency-ranked long words plus any explicit
//! tags the source supplied.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::sources::types::{ContentItem, ItemDetails};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]{4,}\b").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "may", "might", "must", "can", "this", "that",
        "these", "those", "i", "you", "he", "she", "it", "we", "they", "what", "which", "who",
        "when", "where", "why", "how",
    ]
    .into_iter()
    .collect()
});

/// Keyword themes for one source's item set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeReport {
    /// Frequency-ranked words unioned with explicit tags, capped at 15.
    pub top_keywords: Vec<String>,
    /// The ten most frequent words with their counts, rank order.
    pub word_frequency: Vec<(String, usize)>,
    pub total_items_analyzed: usize,
}

const TOP_WORDS: usize = 10;
const KEYWORD_CAP: usize = 15;

/// Extract themes from the combined title/body text (replies included for
/// discussion items). Explicit tags join the union unranked.
pub fn extract<'a>(items: impl IntoIterator<Item = &'a ContentItem>) -> ThemeReport {
    let mut text = String::new();
    let mut explicit: Vec<String> = Vec::new();
    let mut total = 0usize;

    for item in items {
        total += 1;
        text.push_str(&item.title);
        text.push(' ');
        text.push_str(&item.body);
        text.push(' ');
        if let ItemDetails::Discussion(d) = &item.details {
            for reply in &d.top_replies {
                text.push_str(&reply.text);
                text.push(' ');
            }
        }
        explicit.extend(item.explicit_keywords().iter().cloned());
    }

    let text = text.to_lowercase();

    // Count in first-seen order so equal frequencies rank deterministically.
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for m in WORD_RE.find_iter(&text) {
        let word = m.as_str();
        if STOP_WORDS.contains(word) {
            continue;
        }
        let entry = counts.entry(word).or_insert(0);
        if *entry == 0 {
            order.push(word);
        }
        *entry += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .iter()
        .map(|w| (w.to_string(), counts[w]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_WORDS);

    let mut top_keywords: Vec<String> = ranked.iter().map(|(w, _)| w.clone()).collect();
    let mut seen: HashSet<String> = top_keywords.iter().cloned().collect();
    for keyword in explicit {
        if top_keywords.len() >= KEYWORD_CAP {
            break;
        }
        if seen.insert(keyword.clone()) {
            top_keywords.push(keyword);
        }
    }
    top_keywords.truncate(KEYWORD_CAP);

    ThemeReport {
        top_keywords,
        word_frequency: ranked,
        total_items_analyzed: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::types::{ArticleFields, DiscussionFields, Reply};

    fn discussion(title: &str, body: &str, replies: &[&str]) -> ContentItem {
        ContentItem {
            title: title.into(),
            body: body.into(),
            url: String::new(),
            author: "user".into(),
            age_hours: Some(1.0),
            published_at: None,
            details: ItemDetails::Discussion(DiscussionFields {
                top_replies: replies
                    .iter()
                    .map(|t| Reply {
                        text: (*t).into(),
                        score: 1,
                        author: "r".into(),
                    })
                    .collect(),
                ..DiscussionFields::default()
            }),
        }
    }

    #[test]
    fn frequency_ranks_and_drops_stop_words() {
        let items = vec![
            discussion(
                "quantum computing breakthrough",
                "quantum error correction results that should matter",
                &["quantum hardware is improving"],
            ),
            discussion("quantum startups", "funding for computing", &[]),
        ];
        let report = extract(&items);
        assert_eq!(report.top_keywords[0], "quantum");
        assert!(report.top_keywords.contains(&"computing".to_string()));
        assert!(!report.top_keywords.contains(&"that".to_string()));
        assert!(!report.top_keywords.contains(&"should".to_string()));
        assert_eq!(report.total_items_analyzed, 2);
    }

    #[test]
    fn explicit_keywords_join_union_without_duplicates() {
        let item = ContentItem {
            title: "election results".into(),
            body: "election coverage".into(),
            url: String::new(),
            author: "outlet".into(),
            age_hours: Some(2.0),
            published_at: None,
            details: ItemDetails::Article(ArticleFields {
                keywords: vec!["election".into(), "politics".into()],
                is_major_outlet: false,
                credibility: None,
            }),
        };
        let report = extract(&[item]);
        assert!(report.top_keywords.contains(&"politics".to_string()));
        let elections = report
            .top_keywords
            .iter()
            .filter(|k| k.as_str() == "election")
            .count();
        assert_eq!(elections, 1);
    }

    #[test]
    fn keyword_cap_is_fifteen() {
        let many_tags: Vec<String> = (0..30).map(|i| format!("tag{i:02}")).collect();
        let item = ContentItem {
            title: "alpha beta gamma delta".into(),
            body: "epsilon zeta theta kappa lambda omicron sigma upsilon".into(),
            url: String::new(),
            author: "outlet".into(),
            age_hours: None,
            published_at: None,
            details: ItemDetails::Article(ArticleFields {
                keywords: many_tags,
                is_major_outlet: false,
                credibility: None,
            }),
        };
        let report = extract(&[item]);
        assert_eq!(report.top_keywords.len(), 15);
    }
}
