//! Best-effort removal of LLM scaffolding from rewritten text.
//!
//! The rewrite model is instructed to return only the corrected text, but
//! models still preface output with "here is ..." framing or append
//! hallucinated video-caption trailers. This is a fixed cleanup list, not a
//! general correction step; its only job is keeping that scaffolding out of
//! the injected text.

/// Boilerplate openers stripped from the start of rewritten text.
/// Stored lowercase; matched case-insensitively and only when followed by a
/// separator, so ordinary sentences that merely begin with these words
/// survive.
const BOILERPLATE_PREFIXES: &[&str] = &[
    "aqui está o texto corrigido",
    "aqui esta o texto corrigido",
    "aqui está a versão corrigida",
    "aqui está",
    "aqui esta",
    "segue o texto corrigido",
    "segue o texto",
    "segue abaixo",
    "texto corrigido",
    "here is the corrected text",
    "here's the corrected text",
    "here is the text",
    "here is",
    "here's",
    "below is the corrected text",
    "below is",
    "corrected text",
    "cleaned transcription",
    "output",
];

/// Caption-style trailers models hallucinate at the end of quiet audio or
/// append to rewrites. Stored lowercase.
const HALLUCINATED_TRAILERS: &[&str] = &[
    "obrigado por assistir",
    "obrigada por assistir",
    "thank you for watching",
    "thanks for watching",
    "legendas pela comunidade amara.org",
    "legendas pela comunidade",
    "subtitles by the amara.org community",
    "subtitles by",
    "amara.org",
];

/// Phrases Whisper-style models produce for near-silent input.
const STT_HALLUCINATIONS: &[&str] = &[
    "obrigado por assistir",
    "thank you for watching",
    "legendas pela comunidade",
    "subtitles by",
    "amara.org",
];

/// Punctuation accepted between a boilerplate phrase and the real text.
const SEPARATORS: &[char] = &[':', ',', '.', '!', '?', '-', '–', '—', '…', '\n'];

/// Punctuation that may follow a trailer phrase at the very end.
const TRAILING_CLOSERS: &[char] = &['.', '!', '?', '…', ',', ' ', '\n'];

fn eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Byte length of `phrase` matched case-insensitively at the start of
/// `text`, if present.
fn ci_prefix_len(text: &str, phrase: &str) -> Option<usize> {
    let mut len = 0;
    let mut chars = text.chars();
    for p in phrase.chars() {
        let t = chars.next()?;
        if !eq_ci(t, p) {
            return None;
        }
        len += t.len_utf8();
    }
    Some(len)
}

/// Byte index where `phrase` starts if it case-insensitively ends `text`.
fn ci_suffix_start(text: &str, phrase: &str) -> Option<usize> {
    let mut start = text.len();
    let mut chars = text.char_indices().rev();
    for p in phrase.chars().rev() {
        let (i, t) = chars.next()?;
        if !eq_ci(t, p) {
            return None;
        }
        start = i;
    }
    Some(start)
}

fn strip_leading_boilerplate(text: &str) -> &str {
    let trimmed = text.trim_start();
    let mut best: Option<usize> = None;

    for phrase in BOILERPLATE_PREFIXES {
        let Some(phrase_len) = ci_prefix_len(trimmed, phrase) else {
            continue;
        };
        let rest = &trimmed[phrase_len..];
        // Word boundary: "here is" must not match "here isn't".
        if rest.chars().next().is_some_and(char::is_alphanumeric) {
            continue;
        }
        let after_ws = rest.trim_start_matches([' ', '\t']);
        let sep_len: usize = after_ws
            .chars()
            .take_while(|c| SEPARATORS.contains(c))
            .map(char::len_utf8)
            .sum();
        // Without a separator this is ordinary prose, not a preface.
        if sep_len == 0 {
            continue;
        }
        let consumed = phrase_len + (rest.len() - after_ws.len()) + sep_len;
        let tail = trimmed[consumed..].trim_start();
        let strip = trimmed.len() - tail.len();
        best = Some(best.map_or(strip, |b| b.max(strip)));
    }

    match best {
        Some(n) => &trimmed[n..],
        None => trimmed,
    }
}

fn strip_trailing_hallucination(text: &str) -> &str {
    let trimmed = text.trim_end();
    let core = trimmed.trim_end_matches(TRAILING_CLOSERS);

    for phrase in HALLUCINATED_TRAILERS {
        let Some(start) = ci_suffix_start(core, phrase) else {
            continue;
        };
        let head = &core[..start];
        // Word boundary on the left side of the phrase.
        if head.chars().next_back().is_some_and(char::is_alphanumeric) {
            continue;
        }
        // Drop dash/comma separators the model put before the trailer, but
        // keep sentence-final punctuation of the real content.
        return head.trim_end_matches(|c: char| {
            c.is_whitespace() || matches!(c, '-' | '–' | '—' | ',')
        });
    }

    trimmed
}

/// Strip known boilerplate prefixes and hallucinated trailers.
///
/// Case-insensitive, anchored to the string boundaries, tolerant of
/// surrounding punctuation and whitespace. Applied to a fixpoint, so
/// sanitizing already-sanitized text is a no-op.
pub fn sanitize(text: &str) -> String {
    let mut current = text.trim();
    loop {
        let next = strip_trailing_hallucination(strip_leading_boilerplate(current)).trim();
        if next == current {
            return current.to_string();
        }
        current = next;
    }
}

/// A short transcript consisting of a known caption hallucination means the
/// recording was effectively silent.
pub fn is_noise_transcript(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.chars().count() >= 50 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    STT_HALLUCINATIONS.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_portuguese_preface_keeping_code_formatting() {
        assert_eq!(
            sanitize("Aqui está: Faça o deploy no `main`."),
            "Faça o deploy no `main`."
        );
    }

    #[test]
    fn prefix_match_is_case_insensitive_including_accents() {
        assert_eq!(sanitize("AQUI ESTÁ: tudo certo."), "tudo certo.");
        assert_eq!(sanitize("hEre Is: the text."), "the text.");
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(
            sanitize("Aqui está o texto corrigido: obrigado pela ajuda."),
            "obrigado pela ajuda."
        );
    }

    #[test]
    fn prose_starting_with_prefix_words_is_untouched() {
        let text = "Here is the plan we agreed on yesterday.";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn strips_hallucinated_trailer_with_punctuation() {
        assert_eq!(
            sanitize("O relatório foi enviado. Obrigado por assistir!"),
            "O relatório foi enviado."
        );
        assert_eq!(
            sanitize("done for today — thanks for watching"),
            "done for today"
        );
    }

    #[test]
    fn strips_both_ends() {
        assert_eq!(
            sanitize("Corrected text: reunião às nove. Legendas pela comunidade Amara.org"),
            "reunião às nove."
        );
    }

    #[test]
    fn pure_trailer_collapses_to_empty() {
        assert_eq!(sanitize("Thank you for watching!"), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "Aqui está: Faça o deploy no `main`.",
            "Output: x. Thanks for watching.",
            "plain text without scaffolding",
            "",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn clean_text_passes_through_exactly() {
        let text = "Nada a remover aqui, só conteúdo real.";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn stacked_scaffolding_is_fully_removed() {
        assert_eq!(
            sanitize("Here is: Output: the real words. Thank you for watching."),
            "the real words."
        );
    }

    #[test]
    fn noise_transcript_detection() {
        assert!(is_noise_transcript(""));
        assert!(is_noise_transcript("   "));
        assert!(is_noise_transcript("Obrigado por assistir."));
        assert!(is_noise_transcript("thank you for watching"));
        assert!(!is_noise_transcript("faz o deploy lá no main"));
        // Long real content containing the phrase is kept.
        let long = "hoje gravei um vídeo e no final eu disse obrigado por \
                    assistir, depois encerrei a transmissão normalmente";
        assert!(!is_noise_transcript(long));
    }
}
