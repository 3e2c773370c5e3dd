use crate::models::ExtractedIdentity;
use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered extraction rule table. First match wins, so broader vintage
/// patterns sit at the bottom and never shadow the exact model rules.
struct Rule {
    family: &'static str,
    pattern: Regex,
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let rule = |family, pattern: &str| Rule {
        family,
        pattern: Regex::new(pattern).expect("invalid classifier pattern"),
    };
    vec![
        rule(
            "intel-core",
            r"\b(intel\s+(?:core\s+)?i\d[- ]*\d{3,5}[a-z0-9]*)\b",
        ),
        rule("amd-ryzen", r"\b((?:amd\s+)?ryzen\s+\d\s+\d{3,5}[a-z0-9]*)\b"),
        rule(
            "amd-athlon",
            r"\b(amd\s+athlon\s+(?:64\s+)?[a-z0-9-]*\d+[a-z0-9-]*)\b",
        ),
        rule(
            "intel-xeon-w",
            r"\b(intel\s+xeon\s+w[-\s]?\d{3,5}[a-z0-9-]*(?:\s+\d+-core)?)\b",
        ),
        rule(
            "intel-xeon-e",
            r"\b(intel\s+xeon\s+e\d[-\s]?\d{4}[a-z0-9]*(?:\s+v\d)?)\b",
        ),
        rule(
            "intel-core2-duo",
            r"\b(intel\s+core\s+2\s+duo\s+[a-z]\d{4,5})\b",
        ),
        rule(
            "amd-ryzen-pro",
            r"\b((?:amd\s+)?ryzen\s+pro\s+\d\s+\d{3,5}[a-z0-9]*)\b",
        ),
        rule(
            "vintage-lot",
            r"\b((?:lot\s+of\s+\d+\s+assorted\s+)?(?:intel\s+(?:pentium|celeron|core\s+2)|amd\s+athlon))\b",
        ),
    ]
});

static DECORATIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[®™©]").expect("regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("regex"));
static CLOCK_SPEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+)\s*ghz").expect("regex"));

/// Consumer-tier policy: only Intel Core i3/i5/i7/i9 and AMD Ryzen 3/5/7/9
/// pass. Xeon, Athlon, Core 2, Ryzen Pro and the vintage families always
/// fail; there is no allowlist exception.
static CONSUMER_TIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:intel\s+core\s+i[3579]|amd\s+ryzen\s+[3579])\b").expect("regex")
});

/// Extract a normalized model string from a raw listing title without
/// applying the consumer-grade policy. Pure and deterministic.
pub fn extract_model(title: &str) -> Option<String> {
    let cleaned = DECORATIONS.replace_all(title, "");
    let normalized = WHITESPACE
        .replace_all(&cleaned.to_lowercase(), " ")
        .trim()
        .to_string();

    let (family, mut extracted) = RULES.iter().find_map(|rule| {
        rule.pattern.captures(&normalized).map(|caps| {
            let text = caps
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_else(|| caps.get(0).map(|m| m.as_str()).unwrap_or_default());
            (rule.family, text.trim().to_string())
        })
    })?;

    if let Some(caps) = CLOCK_SPEED.captures(&normalized)
        && let Some(rate) = caps.get(1)
        && let Ok(parsed) = rate.as_str().parse::<f64>()
    {
        // "3.00" -> "3", "3.40" -> "3.4"
        let compact = format!("{parsed}");
        if !extracted.contains(&compact) {
            extracted = format!("{extracted} {compact}GHz");
        }
    }

    let model = title_case(&extracted).replace("Ghz", "GHz");
    tracing::debug!(
        target = "dealscout.classifier",
        family,
        model = %model,
        "model_extracted"
    );
    Some(model)
}

/// Classify a title into a normalized consumer-grade identity, or `None`
/// if no pattern matched or the model falls outside the consumer tier.
pub fn classify(title: &str) -> Option<ExtractedIdentity> {
    let model = extract_model(title)?;
    if !is_consumer_model(&model) {
        tracing::debug!(
            target = "dealscout.classifier",
            model = %model,
            "non_consumer_model_skipped"
        );
        return None;
    }
    Some(ExtractedIdentity {
        model,
        consumer_grade: true,
    })
}

pub fn is_consumer_model(model: &str) -> bool {
    CONSUMER_TIER.is_match(&model.to_lowercase())
}

/// Python-style title casing: a letter is uppercased whenever the previous
/// character was not a letter, so "i5-7500t" becomes "I5-7500T".
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_alpha = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
