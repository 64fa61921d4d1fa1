//! Prompt assembly and the answer word ceiling.

use std::fmt::Write as _;

use colloquy_types::chat::{ChatEntry, EntryType, SourceCitation};
use colloquy_types::upstream::{GenerationRequest, HistoryTurn, TurnRole};

/// Build the single generation request for one turn.
pub fn build_request(
    message: &str,
    language: &str,
    sources: &[SourceCitation],
    history: &[ChatEntry],
    max_words: usize,
) -> GenerationRequest {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a knowledge assistant. Answer the user's question using only the \
         reference passages below. Cite article numbers where they apply. If the \
         passages do not contain the answer, say so plainly.\n\n",
    );

    if sources.is_empty() {
        prompt.push_str("Reference passages: none were found.\n");
    } else {
        prompt.push_str("Reference passages:\n");
        for (i, source) in sources.iter().enumerate() {
            let _ = write!(prompt, "[{}] {}", i + 1, source.source);
            if !source.article_number.is_empty() {
                let _ = write!(prompt, ", article {}", source.article_number);
            }
            let _ = writeln!(prompt, "\n{}", source.content.trim());
        }
    }

    let _ = write!(
        prompt,
        "\nRespond in the language with ISO code '{language}' using at most {max_words} words.\n\n\
         Question: {message}"
    );

    GenerationRequest {
        prompt,
        history: history_turns(history),
        max_words: Some(max_words),
    }
}

/// Map stored entries to generation history. Only generated responses
/// are model turns; everything else is replayed as user input.
pub fn history_turns(entries: &[ChatEntry]) -> Vec<HistoryTurn> {
    entries
        .iter()
        .map(|entry| HistoryTurn {
            role: match entry.entry_type {
                EntryType::GeneratedResponse => TurnRole::Model,
                EntryType::UserQuery | EntryType::Summary => TurnRole::User,
            },
            content: entry.content.clone(),
        })
        .collect()
}

/// Prompt for follow-up question suggestions.
pub fn suggestions_prompt(message: &str, answer: &str, language: &str, count: usize) -> String {
    format!(
        "A user asked: {message}\n\nThey were told: {answer}\n\n\
         Suggest {count} short follow-up questions the user might ask next, in the \
         language with ISO code '{language}'. Write one question per line with no \
         numbering or extra text."
    )
}

/// Split a suggestions reply into at most `count` questions.
pub fn parse_suggestions(reply: &str, count: usize) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')' | '•')
                })
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(count)
        .map(str::to_string)
        .collect()
}

/// Running count of words forwarded to the caller.
///
/// A word is a maximal run of non-whitespace characters, counted across
/// fragment boundaries.
#[derive(Debug)]
pub struct WordBudget {
    max_words: usize,
    words: usize,
    in_word: bool,
}

impl WordBudget {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words,
            words: 0,
            in_word: false,
        }
    }

    pub fn words(&self) -> usize {
        self.words
    }

    /// Accept as much of `fragment` as fits.
    ///
    /// Returns the accepted prefix and whether the ceiling was hit, in which
    /// case the rest of the stream should be dropped.
    pub fn take<'a>(&mut self, fragment: &'a str) -> (&'a str, bool) {
        for (idx, ch) in fragment.char_indices() {
            if ch.is_whitespace() {
                self.in_word = false;
                continue;
            }
            if !self.in_word {
                if self.words == self.max_words {
                    return (&fragment[..idx], true);
                }
                self.words += 1;
                self.in_word = true;
            }
        }
        (fragment, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn citation(article: &str) -> SourceCitation {
        SourceCitation {
            content: format!("Text of article {article}."),
            source: "constitution".to_string(),
            article_number: article.to_string(),
            topics: Vec::new(),
        }
    }

    #[test]
    fn test_budget_counts_across_fragments() {
        let mut budget = WordBudget::new(3);
        assert_eq!(budget.take("Arti"), ("Arti", false));
        assert_eq!(budget.take("cle 5 "), ("cle 5 ", false));
        assert_eq!(budget.take("says everyone"), ("says ", true));
        assert_eq!(budget.words(), 3);
    }

    #[test]
    fn test_budget_stops_before_next_word() {
        let mut budget = WordBudget::new(2);
        assert_eq!(budget.take("one two"), ("one two", false));
        assert_eq!(budget.take(" three"), (" ", true));
    }

    #[test]
    fn test_budget_zero_accepts_whitespace_only() {
        let mut budget = WordBudget::new(0);
        assert_eq!(budget.take("  word"), ("  ", true));
    }

    #[test]
    fn test_build_request_includes_context_and_limits() {
        let session_id = Uuid::now_v7();
        let history = vec![
            ChatEntry::new(session_id, EntryType::UserQuery, "earlier q", Vec::new(), Utc::now()),
            ChatEntry::new(
                session_id,
                EntryType::GeneratedResponse,
                "earlier a",
                Vec::new(),
                Utc::now(),
            ),
        ];
        let request = build_request(
            "What is Article 5?",
            "am",
            &[citation("5"), citation("6")],
            &history,
            150,
        );

        assert!(request.prompt.contains("[1] constitution, article 5"));
        assert!(request.prompt.contains("[2] constitution, article 6"));
        assert!(request.prompt.contains("'am'"));
        assert!(request.prompt.contains("at most 150 words"));
        assert!(request.prompt.ends_with("Question: What is Article 5?"));
        assert_eq!(request.max_words, Some(150));
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[0].role, TurnRole::User);
        assert_eq!(request.history[1].role, TurnRole::Model);
    }

    #[test]
    fn test_history_turns_only_responses_are_model() {
        let session_id = Uuid::now_v7();
        let entries: Vec<_> = [
            EntryType::Summary,
            EntryType::UserQuery,
            EntryType::GeneratedResponse,
        ]
        .into_iter()
        .map(|t| ChatEntry::new(session_id, t, "text", Vec::new(), Utc::now()))
        .collect();

        let roles: Vec<_> = history_turns(&entries).into_iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::User, TurnRole::Model]);
    }

    #[test]
    fn test_build_request_without_sources() {
        let request = build_request("hi", "en", &[], &[], 80);
        assert!(request.prompt.contains("none were found"));
        assert!(request.history.is_empty());
    }

    #[test]
    fn test_parse_suggestions_strips_numbering_and_caps() {
        let reply = "1. What does Article 6 cover?\n\n- Who enforces it?\n* Is it amended?\n";
        let parsed = parse_suggestions(reply, 2);
        assert_eq!(
            parsed,
            vec![
                "What does Article 6 cover?".to_string(),
                "Who enforces it?".to_string()
            ]
        );
    }
}
