//! Rule-based sentence boundary detection for scientific English.

use super::split_paragraphs;

const TERMINATORS: [char; 4] = ['.', '!', '?', '…'];

const CLOSERS: [char; 5] = ['"', '\u{201d}', '\'', '\u{2019}', '.'];

// Lowercased tokens that end in a period without ending a sentence.
const ABBREVIATIONS: [&str; 27] = [
    "e.g.", "i.e.", "etc.", "vs.", "cf.", "al.", "fig.", "figs.", "eq.", "eqs.", "ref.", "refs.",
    "no.", "nos.", "approx.", "ca.", "resp.", "sp.", "spp.", "dr.", "prof.", "mr.", "mrs.",
    "ms.", "inc.", "ltd.", "suppl.",
];

/// Split text into sentences.
///
/// Paragraph boundaries are always sentence boundaries. Inside a paragraph a
/// sentence ends at `.`, `!`, `?` or `…` followed by whitespace, unless the
/// terminator sits inside parentheses or double quotes, closes a known
/// abbreviation or a single-letter initial, or the next word starts in
/// lowercase. Sentences are trimmed; no length filtering happens here.
pub fn split_sentences(text: &str) -> Vec<String> {
    split_paragraphs(text)
        .iter()
        .flat_map(|paragraph| split_paragraph(paragraph))
        .collect()
}

fn split_paragraph(paragraph: &str) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    let n = chars.len();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut paren_depth = 0i32;
    let mut in_quote = false;
    let mut i = 0usize;

    while i < n {
        let ch = chars[i];
        match ch {
            '(' | '[' => paren_depth += 1,
            ')' | ']' => paren_depth = (paren_depth - 1).max(0),
            '"' => in_quote = !in_quote,
            '\u{201c}' => in_quote = true,
            '\u{201d}' => in_quote = false,
            _ => {}
        }

        if !TERMINATORS.contains(&ch) {
            i += 1;
            continue;
        }

        // Absorb closing quotes and repeated terminators ("?!", ".'", "...")
        let mut end = i + 1;
        while end < n && (CLOSERS.contains(&chars[end]) || TERMINATORS.contains(&chars[end])) {
            match chars[end] {
                '"' => in_quote = !in_quote,
                '\u{201d}' => in_quote = false,
                _ => {}
            }
            end += 1;
        }

        let followed_by_space = end == n || chars[end].is_whitespace();
        if !followed_by_space || paren_depth > 0 || in_quote {
            i = end;
            continue;
        }

        if ch == '.' && ends_with_abbreviation(&chars[start..=i]) {
            i = end;
            continue;
        }

        let mut next = end;
        while next < n && chars[next].is_whitespace() {
            next += 1;
        }
        if next < n && chars[next].is_lowercase() {
            i = end;
            continue;
        }

        push_trimmed(&mut sentences, &chars[start..end]);
        start = next;
        i = next;
    }

    if start < n {
        push_trimmed(&mut sentences, &chars[start..]);
    }
    sentences
}

fn push_trimmed(out: &mut Vec<String>, chars: &[char]) {
    let sentence: String = chars.iter().collect();
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// `chars` is the sentence so far, ending with the period under test.
fn ends_with_abbreviation(chars: &[char]) -> bool {
    let word_start = chars
        .iter()
        .rposition(|c| c.is_whitespace())
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let word: String = chars[word_start..]
        .iter()
        .skip_while(|c| matches!(c, '(' | '[' | '"' | '\'' | '\u{201c}' | '\u{2018}'))
        .collect();

    // Single capital initial, as in "J. Smith"
    let mut letters = word.chars();
    if let (Some(first), Some('.'), None) = (letters.next(), letters.next(), letters.next()) {
        if first.is_uppercase() {
            return true;
        }
    }

    let lower = word.to_lowercase();
    ABBREVIATIONS.iter().any(|abbr| lower == *abbr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_review_sentences() {
        let text = "1. A general concern on the main conclusion of the work 'the identification of unique cell type-specific functions for these enhancers'. This is in my opinion only partially addressed by the study, as the conclusions are limited due to the absence of genetic experiments: such as deleting the enhancers in their native genomic context (either in human organoids or the homologous sequence in animal models), or at least assessing the effect of mutating their sequence in transgenesis assays in zebrafish. I understand that these functional assays may be out of the scope of the current work, but then the text should be toned down (the word 'function' is extensively used) to make clear that the authors mean just expression. I would suggest substituting the word by 'activity' in many instances.";

        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 5);
        assert_eq!(sentences[0], "1.");
        assert!(sentences[1].starts_with("A general concern"));
        assert!(sentences[1].ends_with("enhancers'."));
        assert!(sentences[2].ends_with("assays in zebrafish."));
        assert!(sentences[3].starts_with("I understand"));
        assert_eq!(sentences[4], "I would suggest substituting the word by 'activity' in many instances.");
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let text = "Markers of the niche (e.g. rx1, vsx2) were used. See Fig. 5 and Jusuf et al. for details. Results were shown by J. Smith.";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec![
                "Markers of the niche (e.g. rx1, vsx2) were used.",
                "See Fig. 5 and Jusuf et al. for details.",
                "Results were shown by J. Smith.",
            ]
        );
    }

    #[test]
    fn test_decimals_and_lowercase_continuations() {
        let text = "The effect was 3.5 fold higher. the sentence above does not end at the decimal point.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_quoted_terminators_stay_inside() {
        let text = "The reviewer wrote \"Is this robust? I doubt it.\" Then the authors replied.";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec![
                "The reviewer wrote \"Is this robust? I doubt it.\"",
                "Then the authors replied.",
            ]
        );
    }

    #[test]
    fn test_curly_closing_quote_after_terminator() {
        let text = "The reviewer wrote \u{201c}Is this robust?\u{201d} Then the authors replied. The editor agreed with them.";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec![
                "The reviewer wrote \u{201c}Is this robust?\u{201d}",
                "Then the authors replied.",
                "The editor agreed with them.",
            ]
        );
    }

    #[test]
    fn test_paragraph_boundaries_are_sentence_boundaries() {
        let text = "Major comments\nThe first point concerns statistics.";
        assert_eq!(
            split_sentences(text),
            vec!["Major comments", "The first point concerns statistics."]
        );
    }

    #[test]
    fn test_trailing_text_without_terminator() {
        assert_eq!(split_sentences("First one. And a fragment"), vec!["First one.", "And a fragment"]);
    }
}
