//! Splits inline reasoning markup out of content deltas.
//!
//! Some models stream their reasoning inside the ordinary content channel.
//! Two markups are recognised: `<think>...</think>` and the channel block
//! `<|channel|>analysis<|message|>...<|end|>`, whose channel name is
//! dropped. The splitter routes the enclosed text to the reasoning channel.
//! Tags may arrive split across delta boundaries, so a trailing fragment
//! that could still become a tag is held back until the next push.

/// An inline reasoning markup.
struct Markup {
    open: &'static str,
    /// Ends a header between `open` and the reasoning text
    header_end: Option<&'static str>,
    close: &'static str,
}

const MARKUPS: &[Markup] = &[
    Markup { open: "<think>", header_end: None, close: "</think>" },
    Markup { open: "<|channel|>", header_end: Some("<|message|>"), close: "<|end|>" },
];

/// One piece of classified text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Content(String),
    Reasoning(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Mode {
    #[default]
    Content,
    /// Inside the header of `MARKUPS[i]`
    Header(usize),
    /// Inside the reasoning text of `MARKUPS[i]`
    Block(usize),
}

#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    mode: Mode,
    pending: String,
}

impl ThinkTagSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the splitter is currently inside a reasoning block.
    pub fn in_reasoning(&self) -> bool {
        matches!(self.mode, Mode::Block(_))
    }

    /// Feed a delta; returns the text that can be classified so far.
    pub fn push(&mut self, text: &str) -> Vec<Segment> {
        self.pending.push_str(text);
        let mut out = Vec::new();

        loop {
            match self.mode {
                Mode::Content => {
                    let first = MARKUPS
                        .iter()
                        .enumerate()
                        .filter_map(|(i, m)| self.pending.find(m.open).map(|pos| (pos, i)))
                        .min();
                    if let Some((pos, i)) = first {
                        let before: String = self.pending.drain(..pos).collect();
                        self.pending.drain(..MARKUPS[i].open.len());
                        self.emit(&mut out, before);
                        self.mode = match MARKUPS[i].header_end {
                            Some(_) => Mode::Header(i),
                            None => Mode::Block(i),
                        };
                    } else {
                        let keep = MARKUPS
                            .iter()
                            .map(|m| partial_tag_suffix(&self.pending, m.open))
                            .max()
                            .unwrap_or(0);
                        self.release(&mut out, keep);
                        break;
                    }
                }
                Mode::Header(i) => {
                    let Some(end) = MARKUPS[i].header_end else {
                        self.mode = Mode::Block(i);
                        continue;
                    };
                    // The header is short; hold it whole until its end tag shows up
                    let Some(pos) = self.pending.find(end) else { break };
                    self.pending.drain(..pos + end.len());
                    self.mode = Mode::Block(i);
                }
                Mode::Block(i) => {
                    let close = MARKUPS[i].close;
                    if let Some(pos) = self.pending.find(close) {
                        let inner: String = self.pending.drain(..pos).collect();
                        self.pending.drain(..close.len());
                        self.emit(&mut out, inner);
                        self.mode = Mode::Content;
                    } else {
                        let keep = partial_tag_suffix(&self.pending, close);
                        self.release(&mut out, keep);
                        break;
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is held back at end of stream.
    pub fn finish(&mut self) -> Vec<Segment> {
        let mut rest = std::mem::take(&mut self.pending);
        let mut out = Vec::new();
        if let Mode::Header(i) = self.mode {
            // A header that never completed was ordinary text after all
            rest.insert_str(0, MARKUPS[i].open);
            self.mode = Mode::Content;
        }
        self.emit(&mut out, rest);
        out
    }

    /// Emit everything but the last `keep` bytes of the pending buffer.
    fn release(&mut self, out: &mut Vec<Segment>, keep: usize) {
        let ready_len = self.pending.len() - keep;
        let ready: String = self.pending.drain(..ready_len).collect();
        self.emit(out, ready);
    }

    fn emit(&self, out: &mut Vec<Segment>, text: String) {
        if text.is_empty() {
            return;
        }
        out.push(match self.mode {
            Mode::Block(_) => Segment::Reasoning(text),
            Mode::Content | Mode::Header(_) => Segment::Content(text),
        });
    }
}

/// Length of the longest suffix of `s` that is a proper prefix of `tag`.
fn partial_tag_suffix(s: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&k| {
            s.len() >= k && s.is_char_boundary(s.len() - k) && tag.starts_with(&s[s.len() - k..])
        })
        .unwrap_or(0)
}

/// Split a complete text in one go: `(content, reasoning)`.
pub fn split_complete(text: &str) -> (String, String) {
    let mut splitter = ThinkTagSplitter::new();
    let mut content = String::new();
    let mut reasoning = String::new();
    for segment in splitter.push(text).into_iter().chain(splitter.finish()) {
        match segment {
            Segment::Content(t) => content.push_str(&t),
            Segment::Reasoning(t) => reasoning.push_str(&t),
        }
    }
    (content, reasoning)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(splitter: &mut ThinkTagSplitter, parts: &[&str]) -> (String, String) {
        let mut content = String::new();
        let mut reasoning = String::new();
        let mut segments = Vec::new();
        for p in parts {
            segments.extend(splitter.push(p));
        }
        segments.extend(splitter.finish());
        for s in segments {
            match s {
                Segment::Content(t) => content.push_str(&t),
                Segment::Reasoning(t) => reasoning.push_str(&t),
            }
        }
        (content, reasoning)
    }

    #[test]
    fn plain_text_passes_through() {
        let mut s = ThinkTagSplitter::new();
        assert_eq!(s.push("hello"), vec![Segment::Content("hello".into())]);
    }

    #[test]
    fn think_block_in_one_delta() {
        let (content, reasoning) = split_complete("<think>check sources</think>The answer.");
        assert_eq!(reasoning, "check sources");
        assert_eq!(content, "The answer.");
    }

    #[test]
    fn tags_split_across_deltas() {
        let mut s = ThinkTagSplitter::new();
        let (content, reasoning) =
            collect(&mut s, &["<thi", "nk>step one", " step two</th", "ink>Result", "!"]);
        assert_eq!(reasoning, "step one step two");
        assert_eq!(content, "Result!");
    }

    #[test]
    fn held_back_fragment_is_released_when_not_a_tag() {
        let mut s = ThinkTagSplitter::new();
        assert_eq!(s.push("a <"), vec![Segment::Content("a ".into())]);
        assert_eq!(s.push("b"), vec![Segment::Content("<b".into())]);
    }

    #[test]
    fn unterminated_think_is_flushed_as_reasoning() {
        let mut s = ThinkTagSplitter::new();
        let (content, reasoning) = collect(&mut s, &["<think>still going</"]);
        assert_eq!(content, "");
        assert_eq!(reasoning, "still going</");
        assert!(s.in_reasoning());
    }

    #[test]
    fn multibyte_text_near_tag_boundary() {
        let (content, reasoning) = split_complete("ünï<think>é</think>ß");
        assert_eq!(content, "ünïß");
        assert_eq!(reasoning, "é");
    }

    #[test]
    fn channel_block_in_one_delta() {
        let (content, reasoning) = split_complete("<|channel|>analysis<|message|>check sources<|end|>Final answer");
        assert_eq!(reasoning, "check sources");
        assert_eq!(content, "Final answer");
    }

    #[test]
    fn channel_tags_split_across_deltas() {
        let mut s = ThinkTagSplitter::new();
        let (content, reasoning) = collect(
            &mut s,
            &["Intro <|chan", "nel|>analy", "sis<|mess", "age|>weigh ", "options<|e", "nd|>Done."],
        );
        assert_eq!(content, "Intro Done.");
        assert_eq!(reasoning, "weigh options");
        assert!(!s.in_reasoning());
    }

    #[test]
    fn both_markups_in_one_stream() {
        let (content, reasoning) =
            split_complete("<think>a</think>x<|channel|>analysis<|message|>b<|end|>y");
        assert_eq!(reasoning, "ab");
        assert_eq!(content, "xy");
    }

    #[test]
    fn incomplete_channel_header_is_content() {
        let mut s = ThinkTagSplitter::new();
        let (content, reasoning) = collect(&mut s, &["see <|channel|>", "final"]);
        assert_eq!(content, "see <|channel|>final");
        assert_eq!(reasoning, "");
    }
}
