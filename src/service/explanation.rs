//! Canonical explanation parsing
//!
//! Turns raw completion output into the fixed three-section form plus
//! extracted commands. One configurable strategy covers every provider:
//! ordered header matchers first, then a keyword sentence classifier for
//! conversational output, then a round-robin last resort.

use regex::Regex;

use crate::model::CanonicalExplanation;

/// Sentences shorter than this are noise, not content.
const MIN_SENTENCE_LEN: usize = 10;

/// A bucket keeps at most this many classified sentences.
const MAX_BUCKET_SENTENCES: usize = 2;

const SECURITY_KEYWORDS: &[&str] = &[
    "security",
    "threat",
    "vulnerab",
    "risk",
    "attack",
    "malicious",
    "compromis",
    "breach",
];

const NEXT_STEP_KEYWORDS: &[&str] = &[
    "should",
    "must",
    "recommend",
    "investigat",
    "check",
    "review",
    "verify",
    "examine",
];

const REMEDIATION_KEYWORDS: &[&str] = &[
    "fix",
    "remediat",
    "mitigat",
    "prevent",
    "patch",
    "restrict",
    "block",
    "disable",
];

#[derive(Debug, thiserror::Error)]
pub enum ExplanationError {
    #[error("explanation text is empty")]
    EmptyInput,
}

/// Parses raw provider output into a [`CanonicalExplanation`].
///
/// Pure and idempotent: identical input always yields identical output.
pub struct ExplanationParser {
    command_re: Regex,
    emphasis_re: Regex,
    sentence_split_re: Regex,
    section_res: [Regex; 3],
}

impl ExplanationParser {
    pub fn new() -> Self {
        Self {
            // "Command:" to end of line, wherever it starts; emphasis
            // markers around the prefix are tolerated
            command_re: Regex::new(r"(?im)\bcommand\s*:\s*([^\r\n]+)").expect("static regex"),
            emphasis_re: Regex::new(r"\*{1,2}|__|`").expect("static regex"),
            sentence_split_re: Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("static regex"),
            section_res: [
                Self::header_regex(r"security\s+impact"),
                Self::header_regex(r"next\s+steps"),
                Self::header_regex(r"remediation\s+steps"),
            ],
        }
    }

    /// Header forms: bold with the colon inside or outside the emphasis,
    /// or plain text; a separator is required either way.
    fn header_regex(name: &str) -> Regex {
        let pattern = format!(
            r"(?i)(?:\*\*\s*{n}\s*:\s*\*\*|\*\*\s*{n}\s*\*\*\s*:|{n}\s*[:\-])",
            n = name
        );
        Regex::new(&pattern).expect("static regex")
    }

    pub fn parse(
        &self,
        raw: &str,
        provider_name: &str,
    ) -> Result<CanonicalExplanation, ExplanationError> {
        if raw.trim().is_empty() {
            return Err(ExplanationError::EmptyInput);
        }

        let commands = self.extract_commands(raw);
        let mut sections = self.extract_sections(raw);

        // No recognizable headers: classify sentences by keyword buckets
        if sections.is_none() {
            sections = Some(self.classify_sentences(raw));
        }

        let [mut security_impact, mut next_steps, mut remediation_steps] =
            sections.unwrap_or_default();

        // Last resort: hand out the first few sentences round-robin
        if security_impact.is_empty() && next_steps.is_empty() && remediation_steps.is_empty() {
            let sentences = self.split_sentences(raw);
            let mut buckets = [&mut security_impact, &mut next_steps, &mut remediation_steps];
            for (i, sentence) in sentences.into_iter().take(3).enumerate() {
                *buckets[i] = sentence;
            }
        }

        Ok(CanonicalExplanation {
            security_impact,
            next_steps,
            remediation_steps,
            commands,
            provider_name: provider_name.to_string(),
        })
    }

    fn extract_commands(&self, raw: &str) -> Vec<String> {
        self.command_re
            .captures_iter(raw)
            .filter_map(|caps| {
                let cleaned = self.strip_emphasis(caps.get(1)?.as_str());
                (!cleaned.is_empty()).then_some(cleaned)
            })
            .collect()
    }

    /// Find the three section headers in fixed order, each searched after
    /// the previous match. Returns None when no header matched at all.
    fn extract_sections(&self, raw: &str) -> Option<[String; 3]> {
        let mut spans: [Option<(usize, usize)>; 3] = [None; 3];
        let mut cursor = 0usize;

        for (i, re) in self.section_res.iter().enumerate() {
            if let Some(m) = re.find(&raw[cursor..]) {
                spans[i] = Some((cursor + m.start(), cursor + m.end()));
                cursor = cursor + m.end();
            }
        }

        if spans.iter().all(Option::is_none) {
            return None;
        }

        let mut sections: [String; 3] = Default::default();
        for i in 0..3 {
            let Some((_, content_start)) = spans[i] else {
                continue;
            };
            let content_end = spans[i + 1..]
                .iter()
                .find_map(|span| span.map(|(start, _)| start))
                .unwrap_or(raw.len());

            let span = &raw[content_start..content_end];
            let without_commands = self.command_re.replace_all(span, "");
            sections[i] = self.strip_emphasis(&without_commands);
        }

        Some(sections)
    }

    fn classify_sentences(&self, raw: &str) -> [String; 3] {
        let sentences = self.split_sentences(raw);

        let bucket = |keywords: &[&str]| -> String {
            sentences
                .iter()
                .filter(|s| {
                    let lower = s.to_lowercase();
                    keywords.iter().any(|k| lower.contains(k))
                })
                .take(MAX_BUCKET_SENTENCES)
                .cloned()
                .collect::<Vec<_>>()
                .join(". ")
        };

        [
            bucket(SECURITY_KEYWORDS),
            bucket(NEXT_STEP_KEYWORDS),
            bucket(REMEDIATION_KEYWORDS),
        ]
    }

    fn split_sentences(&self, raw: &str) -> Vec<String> {
        self.sentence_split_re
            .split(raw)
            .map(|s| self.strip_emphasis(s))
            .filter(|s| s.len() >= MIN_SENTENCE_LEN)
            .collect()
    }

    fn strip_emphasis(&self, text: &str) -> String {
        self.emphasis_re.replace_all(text, "").trim().to_string()
    }
}

impl Default for ExplanationParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ExplanationParser {
        ExplanationParser::new()
    }

    #[test]
    fn parses_bold_headers_and_inline_command() {
        let raw = "**Security Impact:** X **Next Steps:** Y **Remediation Steps:** Z Command: kubectl get pods";
        let parsed = parser().parse(raw, "openai").unwrap();

        assert_eq!(parsed.security_impact, "X");
        assert_eq!(parsed.next_steps, "Y");
        assert_eq!(parsed.remediation_steps, "Z");
        assert_eq!(parsed.commands, vec!["kubectl get pods"]);
        assert_eq!(parsed.provider_name, "openai");
    }

    #[test]
    fn parses_plain_headers_on_separate_lines() {
        let raw = "Security Impact: attacker gained an interactive shell\n\
                   Next Steps: identify the user who opened it\n\
                   Remediation Steps: remove exec permissions\n\
                   Command: kubectl exec -it pod -- ps aux\n\
                   Command: kubectl logs pod";
        let parsed = parser().parse(raw, "local").unwrap();

        assert_eq!(
            parsed.security_impact,
            "attacker gained an interactive shell"
        );
        assert_eq!(parsed.next_steps, "identify the user who opened it");
        assert_eq!(parsed.remediation_steps, "remove exec permissions");
        assert_eq!(
            parsed.commands,
            vec!["kubectl exec -it pod -- ps aux", "kubectl logs pod"]
        );
    }

    #[test]
    fn emphasis_markers_are_stripped_from_commands() {
        let raw = "Remediation Steps: rotate the key\nCommand: `kubectl delete pod bad-pod`";
        let parsed = parser().parse(raw, "openai").unwrap();
        assert_eq!(parsed.commands, vec!["kubectl delete pod bad-pod"]);
    }

    #[test]
    fn headerless_output_falls_back_to_keyword_buckets() {
        let raw = "This is a serious security threat to the cluster. \
                   You should investigate the source container immediately. \
                   Apply a patch to fix the underlying vulnerability.";
        let parsed = parser().parse(raw, "gemini").unwrap();

        assert!(parsed.security_impact.contains("security threat"));
        assert!(parsed.next_steps.contains("investigate"));
        assert!(parsed.remediation_steps.contains("fix"));
    }

    #[test]
    fn keyword_buckets_cap_at_two_sentences() {
        let raw = "First security threat sentence here. \
                   Second security threat sentence here. \
                   Third security threat sentence here.";
        let parsed = parser().parse(raw, "gemini").unwrap();
        assert!(parsed.security_impact.contains("First"));
        assert!(parsed.security_impact.contains("Second"));
        assert!(!parsed.security_impact.contains("Third"));
    }

    #[test]
    fn unclassifiable_text_is_assigned_round_robin() {
        let raw = "The quick brown fox jumps over the dog. \
                   Somebody opened a terminal in production. \
                   Nothing else of note happened today.";
        let parsed = parser().parse(raw, "local").unwrap();

        assert!(parsed.security_impact.contains("quick brown fox"));
        assert!(parsed.next_steps.contains("terminal in production"));
        assert!(parsed.remediation_steps.contains("Nothing else"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            parser().parse("   ", "openai"),
            Err(ExplanationError::EmptyInput)
        ));
    }

    #[test]
    fn parsing_is_idempotent() {
        let raw = "**Security Impact:** container escape risk.\n\
                   Next Steps: audit recent exec calls.\n\
                   Command: kubectl get events";
        let p = parser();
        let first = p.parse(raw, "openai").unwrap();
        let second = p.parse(raw, "openai").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_sections_stay_empty_when_any_header_matched() {
        let raw = "**Security Impact:** only this section exists";
        let parsed = parser().parse(raw, "openai").unwrap();
        assert_eq!(parsed.security_impact, "only this section exists");
        assert!(parsed.next_steps.is_empty());
        assert!(parsed.remediation_steps.is_empty());
    }
}
