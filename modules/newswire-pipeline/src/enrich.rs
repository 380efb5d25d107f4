use std::collections::HashMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

use ai_client::{Claude, ChatProvider, OpenAi};
use newswire_common::{BiasSignal, Category, Config, Enrichment};

/// Provider-specific character budgets per sub-task.
const SUMMARY_CONTENT_BUDGET: usize = 2000;
const CATEGORY_CONTENT_BUDGET: usize = 1500;
const SENTIMENT_CONTENT_BUDGET: usize = 1500;
const TAGS_CONTENT_BUDGET: usize = 1500;
const BIAS_CONTENT_BUDGET: usize = 2000;

const FALLBACK_SUMMARY_SENTENCES: usize = 3;
const FALLBACK_TAG_COUNT: usize = 6;
const MAX_TAGS: usize = 8;

const ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";
const OPENAI_MODEL: &str = "gpt-4o-mini";

const SUMMARY_SYSTEM: &str = "You are a news editor. Summarize the article in 2-3 clear, \
informative sentences. Reply with the summary only.";

const CATEGORY_SYSTEM: &str = "Classify the article into exactly one of these categories: \
politics, economy, sports, regional_affairs, international, technology, health, culture, \
general. Reply with the category label only.";

const SENTIMENT_SYSTEM: &str = "Rate the overall sentiment of the article on a scale from \
-1 (very negative) through 0 (neutral) to 1 (very positive). Reply with a single number only.";

const TAGS_SYSTEM: &str = "Produce 5-8 keyword tags for the article. Reply with the tags \
only, separated by commas.";

const BIAS_SYSTEM: &str = "You review news articles for editorial slant. Judge whether the \
article shows political or editorial bias, explain your reasoning briefly, and give a \
confidence between 0 and 1.";

/// Structured output for the bias sub-task.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct BiasJudgement {
    /// Whether the article shows a detectable political or editorial slant.
    detected: bool,
    /// Short free-text rationale for the judgement.
    analysis: String,
    /// Confidence in the judgement, between 0 and 1.
    confidence: f32,
}

/// Produces summary, category, sentiment, tags, and a bias signal for one
/// article.
///
/// The provider chain is selected once at construction. Each sub-task tries
/// the chain in order and degrades alone to its local fallback when every
/// provider fails. With no providers configured the engine is a pure
/// deterministic function of (title, content).
pub struct EnrichmentEngine {
    providers: Vec<Arc<dyn ChatProvider>>,
}

impl EnrichmentEngine {
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        Self { providers }
    }

    /// Local-fallback-only engine. A first-class mode, not error recovery.
    pub fn local_only() -> Self {
        Self::new(Vec::new())
    }

    /// Build the provider chain from configuration: Anthropic first, then
    /// OpenAI, then local fallbacks.
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Arc<dyn ChatProvider>> = Vec::new();
        if let Some(key) = &config.anthropic_api_key {
            providers.push(Arc::new(Claude::new(key, ANTHROPIC_MODEL)));
        }
        if let Some(key) = &config.openai_api_key {
            providers.push(Arc::new(OpenAi::new(key, OPENAI_MODEL)));
        }
        if providers.is_empty() {
            info!("No AI provider configured, enrichment runs on local fallbacks");
        } else {
            info!(
                providers = providers.len(),
                first = providers[0].name(),
                "AI enrichment chain configured"
            );
        }
        Self::new(providers)
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    pub async fn enrich(&self, title: &str, content: &str) -> Enrichment {
        if self.providers.is_empty() {
            return self.enrich_local(title, content);
        }

        let mut ai_processed = false;

        let summary = match self.provider_summary(title, content).await {
            Some(s) => {
                ai_processed = true;
                s
            }
            None => fallback_summary(content),
        };

        let category = match self.provider_category(title, content).await {
            Some(c) => {
                ai_processed = true;
                c
            }
            None => lexicon_category(&format!("{title} {content}")),
        };

        let sentiment = match self.provider_sentiment(title, content).await {
            Some(v) => {
                ai_processed = true;
                v
            }
            None => fallback_sentiment(&format!("{title} {content}")),
        }
        .clamp(-1.0, 1.0);

        let tags = match self.provider_tags(title, content).await {
            Some(t) => {
                ai_processed = true;
                t
            }
            None => fallback_tags(&format!("{title} {content}")),
        };

        let bias = match self.provider_bias(title, content).await {
            Some(b) => {
                ai_processed = true;
                b
            }
            None => BiasSignal::default(),
        };

        Enrichment {
            summary,
            category,
            sentiment,
            tags,
            bias,
            ai_processed,
        }
    }

    /// Deterministic enrichment from local heuristics only. Also used when
    /// AI processing is disabled in settings.
    pub fn enrich_local(&self, title: &str, content: &str) -> Enrichment {
        let text = format!("{title} {content}");
        Enrichment {
            summary: fallback_summary(content),
            category: lexicon_category(&text),
            sentiment: fallback_sentiment(&text).clamp(-1.0, 1.0),
            tags: fallback_tags(&text),
            bias: BiasSignal::default(),
            ai_processed: false,
        }
    }

    // --- Provider sub-tasks ---

    async fn first_success(&self, task: &str, system: &str, user: &str) -> Option<String> {
        for provider in &self.providers {
            match provider.complete(system, user).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(provider = provider.name(), task, "Provider sub-task complete");
                    return Some(text);
                }
                Ok(_) => {
                    warn!(provider = provider.name(), task, "Empty provider response");
                }
                Err(e) => {
                    warn!(provider = provider.name(), task, error = %e, "Provider call failed");
                }
            }
        }
        None
    }

    async fn provider_summary(&self, title: &str, content: &str) -> Option<String> {
        let user = task_input(title, content, SUMMARY_CONTENT_BUDGET);
        self.first_success("summary", SUMMARY_SYSTEM, &user)
            .await
            .map(|s| s.trim().to_string())
    }

    async fn provider_category(&self, title: &str, content: &str) -> Option<Category> {
        let user = task_input(title, content, CATEGORY_CONTENT_BUDGET);
        let reply = self.first_success("category", CATEGORY_SYSTEM, &user).await?;
        // An unparseable reply is a sub-task failure, not "general".
        parse_category_reply(&reply)
    }

    async fn provider_sentiment(&self, title: &str, content: &str) -> Option<f32> {
        let user = task_input(title, content, SENTIMENT_CONTENT_BUDGET);
        let reply = self
            .first_success("sentiment", SENTIMENT_SYSTEM, &user)
            .await?;
        parse_sentiment_reply(&reply)
    }

    async fn provider_tags(&self, title: &str, content: &str) -> Option<Vec<String>> {
        let user = task_input(title, content, TAGS_CONTENT_BUDGET);
        let reply = self.first_success("tags", TAGS_SYSTEM, &user).await?;
        let tags = parse_tags_reply(&reply);
        (!tags.is_empty()).then_some(tags)
    }

    async fn provider_bias(&self, title: &str, content: &str) -> Option<BiasSignal> {
        let user = task_input(title, content, BIAS_CONTENT_BUDGET);
        for provider in &self.providers {
            match ai_client::extract::<BiasJudgement>(provider.as_ref(), BIAS_SYSTEM, &user).await {
                Ok(judgement) => {
                    return Some(BiasSignal {
                        detected: judgement.detected,
                        analysis: judgement.analysis,
                        confidence: judgement.confidence.clamp(0.0, 1.0),
                    });
                }
                Err(e) => {
                    warn!(provider = provider.name(), task = "bias", error = %e, "Provider call failed");
                }
            }
        }
        None
    }
}

fn task_input(title: &str, content: &str, budget: usize) -> String {
    format!(
        "Title: {title}\n\n{}",
        truncate_on_char_boundary(content, budget)
    )
}

fn truncate_on_char_boundary(content: &str, max: usize) -> &str {
    if content.len() <= max {
        return content;
    }
    let mut end = max;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

// --- Provider reply parsing ---

fn parse_category_reply(reply: &str) -> Option<Category> {
    let label = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?
        .trim_matches(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-' && c != '_');
    Category::parse_strict(label)
}

fn parse_sentiment_reply(reply: &str) -> Option<f32> {
    let token = reply
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_ascii_digit() && c != '-' && c != '+' && c != '.')
        .trim_end_matches('.');
    token.parse::<f32>().ok().map(|v| v.clamp(-1.0, 1.0))
}

fn parse_tags_reply(reply: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    reply
        .split(|c| c == ',' || c == '\n')
        .map(|t| t.trim().trim_start_matches('-').trim().to_string())
        .filter(|t| t.len() > 2)
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(MAX_TAGS)
        .collect()
}

// --- Local fallbacks ---

/// First meaningful sentences of the content, or a plain truncation when no
/// sentence clears the length bar.
pub(crate) fn fallback_summary(content: &str) -> String {
    let mut sentences = Vec::new();
    for raw in content.split(|c| matches!(c, '.' | '!' | '?')) {
        let sentence = raw.trim();
        if sentence.len() >= 20 {
            sentences.push(sentence);
        }
        if sentences.len() == FALLBACK_SUMMARY_SENTENCES {
            break;
        }
    }

    if sentences.is_empty() {
        return truncate_on_char_boundary(content, 200).trim().to_string();
    }

    let mut summary = sentences.join(". ");
    summary.push('.');
    summary
}

/// Fixed category→keyword table. First match in table order wins.
const CATEGORY_LEXICON: &[(Category, &[&str])] = &[
    (
        Category::Politics,
        &[
            "election", "parliament", "government", "minister", "president", "senate",
            "legislation", "diplomacy", "coalition",
        ],
    ),
    (
        Category::Economy,
        &[
            "economy", "inflation", "market", "stocks", "trade", "investment", "currency",
            "exports", "budget",
        ],
    ),
    (
        Category::RegionalAffairs,
        &["municipal", "mayor", "governor", "province", "regional", "council"],
    ),
    (
        Category::Sports,
        &[
            "match", "championship", "tournament", "league", "olympic", "coach", "goalkeeper",
            "season",
        ],
    ),
    (
        Category::Health,
        &[
            "health", "hospital", "vaccine", "disease", "treatment", "doctor", "medicine",
            "epidemic",
        ],
    ),
    (
        Category::Technology,
        &[
            "technology", "software", "artificial intelligence", "internet", "smartphone",
            "startup", "cybersecurity",
        ],
    ),
    (
        Category::International,
        &[
            "united nations", "foreign ministry", "embassy", "treaty", "summit", "sanctions",
        ],
    ),
    (
        Category::Culture,
        &[
            "festival", "museum", "theater", "exhibition", "heritage", "cinema", "literature",
        ],
    ),
];

/// Keyword-lexicon categorization. Deterministic; `General` when nothing
/// matches.
pub(crate) fn lexicon_category(text: &str) -> Category {
    let text_lower = text.to_lowercase();
    for (category, keywords) in CATEGORY_LEXICON {
        for keyword in *keywords {
            if text_lower.contains(keyword) {
                return *category;
            }
        }
    }
    Category::General
}

const POSITIVE_WORDS: &[&str] = &[
    "win", "wins", "won", "growth", "success", "successful", "improve", "improved",
    "agreement", "peace", "recovery", "boost", "progress", "breakthrough", "celebrate",
];

const NEGATIVE_WORDS: &[&str] = &[
    "crisis", "war", "death", "decline", "loss", "attack", "fail", "failure", "conflict",
    "disaster", "fear", "collapse", "crash", "shortage",
];

/// Signed ratio of positive vs. negative lexicon hits over word tokens.
/// Zero matches yields 0.0.
pub(crate) fn fallback_sentiment(text: &str) -> f32 {
    let mut positive = 0usize;
    let mut negative = 0usize;
    for word in tokenize(text) {
        if POSITIVE_WORDS.contains(&word.as_str()) {
            positive += 1;
        } else if NEGATIVE_WORDS.contains(&word.as_str()) {
            negative += 1;
        }
    }

    let total = positive + negative;
    if total == 0 {
        return 0.0;
    }
    (positive as f32 - negative as f32) / total as f32
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "from", "was", "were", "are", "has",
    "have", "had", "his", "her", "its", "their", "they", "them", "will", "would", "been",
    "being", "but", "not", "can", "could", "said", "says", "after", "before", "into",
    "over", "under", "about", "more", "most", "than", "then", "when", "where", "which",
    "while", "who", "whom", "also", "just", "out", "off", "all", "any", "each", "per",
];

/// Frequency-ranked non-stopword tokens, top 6. Ties break alphabetically
/// so the output is deterministic.
pub(crate) fn fallback_tags(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in tokenize(text) {
        if !STOPWORDS.contains(&word.as_str()) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(FALLBACK_TAG_COUNT)
        .map(|(word, _)| word)
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    let word_re = regex::Regex::new(r"\b\w{3,}\b").expect("valid regex");
    word_re
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}
