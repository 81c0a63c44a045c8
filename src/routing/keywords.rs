//! Keyword signatures for the capability domains.
//!
//! Used by the deterministic routing fallback and by the orchestrator's
//! domain-membership check. Signatures are word-boundary patterns compiled
//! once; matching is case-insensitive.

use std::sync::LazyLock;

use regex::Regex;

use crate::capability::Capability;

static RE_CURRICULUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(courses?|modules?|subjects?|curriculum|prerequisites?|syllabus)\b")
        .expect("curriculum signature")
});

static RE_JOB_MARKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jobs?|hiring|careers?|vacanc\w*|salar\w*|employers?)\b")
        .expect("job market signature")
});

static RE_SKILL_MAPPING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(skills?|gaps?|match(es|ing)?|competenc\w*)\b")
        .expect("skill mapping signature")
});

static RE_BOOKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(books?|textbooks?|references?|resources?)\b").expect("books signature")
});

static RE_PAPERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(papers?|arxiv|research|publications?|journals?)\b")
        .expect("papers signature")
});

/// Whether the query mentions a domain's keyword signature.
pub fn signature_matches(domain: Capability, query: &str) -> bool {
    match domain {
        Capability::Curriculum => RE_CURRICULUM.is_match(query),
        Capability::JobMarket => RE_JOB_MARKET.is_match(query),
        Capability::SkillMapping => RE_SKILL_MAPPING.is_match(query),
        Capability::Books => RE_BOOKS.is_match(query),
        Capability::Papers => RE_PAPERS.is_match(query),
        Capability::Orchestrator | Capability::Fallback | Capability::Error => false,
    }
}

/// All domains whose signature matches the query, in priority order.
pub fn matching_domains(query: &str) -> Vec<Capability> {
    Capability::DOMAINS
        .into_iter()
        .filter(|d| signature_matches(*d, query))
        .collect()
}

/// First matching domain in the fixed priority order
/// curriculum > job_market > skill_mapping > books > papers.
pub fn first_matching_domain(query: &str) -> Option<Capability> {
    Capability::DOMAINS
        .into_iter()
        .find(|d| signature_matches(*d, query))
}
