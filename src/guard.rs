use std::sync::OnceLock;

use regex::Regex;

/// Vocabulary that always keeps a prompt in scope, whatever else it says.
const DOMAIN_TERMS: &[&str] = &[
    "anatomy",
    "physiology",
    "muscle",
    "bone",
    "organ",
    "blood",
    "nerve",
    "cell",
    "tissue",
    "artery",
    "vein",
    "heart",
    "lung",
    "kidney",
    "liver",
    "brain",
    "spinal",
    "endocrine",
    "hormone",
    "immune",
    "lymph",
    "digestive",
    "respiratory",
    "skeletal",
    "muscular",
    "nervous",
    "chapter",
    "hoofdstuk",
    "textbook",
    "boek",
    "exam",
    "quiz",
    "test",
    "study",
    "explain",
    "what is",
    "describe",
    "function",
    "structure",
    "disease",
    "syndrome",
    "patient",
    "medical",
    "clinical",
    "diagnosis",
    "treatment",
    "body",
    "human",
    "skin",
    "joint",
    "tendon",
    "ligament",
    "cartilage",
    "neuron",
    "synapse",
    "metabolism",
    "digestion",
    "absorption",
    "excretion",
    "homeostasis",
    "reflex",
    "receptor",
    "gland",
    "enzyme",
    "protein",
    "dna",
    "rna",
    "chromosom",
    "mitosis",
    "meiosis",
    "embryo",
    "placenta",
    "pathology",
    "histology",
    "cytology",
    "biochemistry",
    "pharmacology",
];

/// Phrases that neutralize an otherwise off-topic word ("food" is fine
/// inside "food intake"). Removed from the prompt before pattern matching.
const EXEMPT_PHRASES: &[&str] = &[
    "food intake",
    "climate change physiology",
    "sports medicine",
    "app development",
];

const OFF_TOPIC_PATTERNS: &[&str] = &[
    r"\b(recipe|cook(?:ing)?|bak(?:ing|e)|restaurant|food|diet plan)\b",
    r"\b(weather|forecast|climate change)\b",
    r"\b(sport|football|soccer|basketball|tennis|cricket|baseball|hockey)\b",
    r"\b(movie|film|tv show|series|netflix|disney|youtube|tiktok|instagram|twitter|facebook)\b",
    r"\b(music|song|album|artist|concert|spotify|playlist)\b",
    r"\b(celebrity|actor|actress|singer|politician|president|election)\b",
    r"\b(stock market|crypto|bitcoin|ethereum|nft|investment|trading)\b",
    r"\b(javascript|html|css|sql|programming|software|debug|code|app)\b",
    r"\b(minecraft|fortnite|gta|valorant|gaming|video game)\b",
    r"\b(travel|hotel|flight|vacation|tourism|passport|visa)\b",
    r"\b(joke|meme|funny|humor|prank|riddle)\b",
];

fn compiled_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        OFF_TOPIC_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Returns true when a prompt is clearly unrelated to the book's domain.
/// Domain vocabulary overrides everything; messages of three words or
/// fewer are too ambiguous to reject.
pub fn is_off_topic(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    if DOMAIN_TERMS.iter().any(|kw| lower.contains(kw)) {
        return false;
    }
    if lower.split_whitespace().count() <= 3 {
        return false;
    }
    let mut scrubbed = lower;
    for phrase in EXEMPT_PHRASES {
        scrubbed = scrubbed.replace(phrase, " ");
    }
    compiled_patterns().iter().any(|pat| pat.is_match(&scrubbed))
}
