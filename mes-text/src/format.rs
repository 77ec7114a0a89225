use anyhow::Result;
use mes_nls::CodePage;

const LINE_BREAK: &str = "\n";
const TALKING_LINE_BREAK: &str = "\n　";

/// Prefix that turns wrapping off for one text and keeps its `\n` escapes as breaks.
pub const MANUAL_BREAK_MARKER: &str = "@::";

const DISALLOWED_START: &str = "。、？’”，！～】；：）」』… 　";
const DISALLOWED_END: &str = "（(「『【‘“";
const TALKING_QUOTES: [(char, char); 3] = [('「', '」'), ('『', '』'), ('“', '”')];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterConfig {
    /// Code page the formatted text is encoded to.
    pub code_page: CodePage,
    /// `-1` disables wrapping.
    pub text_min_length: i32,
    /// `-1` disables wrapping.
    pub text_max_length: i32,
    pub before_replaces: Vec<(String, String)>,
    pub after_replaces: Vec<(String, String)>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            code_page: CodePage::Gbk,
            text_min_length: 22,
            text_max_length: 24,
            before_replaces: Vec::new(),
            after_replaces: Vec::new(),
        }
    }
}

impl FormatterConfig {
    pub fn wraps(&self) -> bool {
        self.text_min_length != -1
            && self.text_max_length != -1
            && self.text_max_length >= self.text_min_length
    }
}

/// Prepares translated text for reimport: replacement tables, escaping of
/// characters the engine treats as markup, and reflow into lines.
#[derive(Debug, Clone, Default)]
pub struct LineWrapFormatter {
    config: FormatterConfig,
}

impl LineWrapFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Same rules, different output code page.
    pub fn with_code_page(&self, code_page: CodePage) -> Self {
        Self::new(FormatterConfig {
            code_page,
            ..self.config.clone()
        })
    }

    pub fn format(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = apply_replaces(text, &self.config.before_replaces)
            .replace('/', "／")
            .replace('{', "｛")
            .replace('}', "｝");

        let text = if let Some(rest) = text.strip_prefix(MANUAL_BREAK_MARKER) {
            rest.replace("\\n", "\n")
        } else if self.config.wraps() {
            reflow(
                &text,
                self.config.text_min_length,
                self.config.text_max_length,
            )
        } else {
            text
        };

        apply_replaces(&text, &self.config.after_replaces)
    }

    /// [`format`](Self::format), then encode with the configured code page.
    ///
    /// Fails when the code page has no mapping for part of the text.
    pub fn format_encoded(&self, text: &str) -> Result<Vec<u8>> {
        self.config.code_page.encode_strict(&self.format(text))
    }
}

fn apply_replaces(text: &str, replaces: &[(String, String)]) -> String {
    replaces
        .iter()
        .filter(|(from, _)| !from.is_empty())
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}

#[inline]
fn is_half_width(c: char) -> bool {
    c.is_ascii()
}

#[inline]
fn is_disallowed_start(c: char) -> bool {
    DISALLOWED_START.contains(c)
}

#[inline]
fn is_disallowed_end(c: char) -> bool {
    DISALLOWED_END.contains(c)
}

fn is_talking(chars: &[char]) -> bool {
    match (chars.first(), chars.last()) {
        (Some(&first), Some(&last)) if chars.len() >= 2 => TALKING_QUOTES
            .iter()
            .any(|&(open, close)| first == open && last == close),
        _ => false,
    }
}

/// Display width in full-width cells; ASCII counts half.
pub fn text_width(chars: impl IntoIterator<Item = char>) -> f32 {
    chars
        .into_iter()
        .map(|c| if is_half_width(c) { 0.5 } else { 1.0 })
        .sum()
}

/// `｛base／ruby｝`: positions of `／` and the closing `｝`, relative to `chars`.
fn placeholder(chars: &[char]) -> Option<(usize, usize)> {
    let split = chars.iter().position(|&c| c == '／')?;
    let end = split + chars[split..].iter().position(|&c| c == '｝')?;
    Some((split, end))
}

fn reflow(text: &str, min: i32, max: i32) -> String {
    let text = text.replace("\\n　", "").replace("\\n", "");
    let chars: Vec<char> = text.chars().collect();
    if chars.len() as i64 <= i64::from(min) {
        return text;
    }

    let talking = is_talking(&chars);
    let line_break = if talking { TALKING_LINE_BREAK } else { LINE_BREAK };
    let (min, max) = (min as f32, max as f32);

    let mut out = String::with_capacity(text.len() + 16);
    let mut width = 0.0f32;
    // a line holding nothing yet is never broken again
    let mut line_used = false;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];

        if width >= min && !is_disallowed_start(c) {
            out.push_str(line_break);
            width = if talking { 1.0 } else { 0.0 };
            line_used = false;
        }

        if c == '｛' {
            if let Some((split, end)) = placeholder(&chars[i..]) {
                let ruby = text_width(chars[i + split + 1..i + end].iter().copied());
                width += ruby;
                if width >= max && line_used {
                    out.push_str(line_break);
                    width = ruby;
                }
                out.extend(&chars[i..=i + end]);
                line_used = true;
                i += end + 1;
                continue;
            }
        }

        if !is_half_width(c) {
            width += 1.0;
        } else if c == ' ' || i == chars.len() - 1 {
            width += 0.5;
        } else {
            let run = chars[i..]
                .iter()
                .take_while(|&&ch| is_half_width(ch) && ch != ' ')
                .count();
            let word = &chars[i..i + run];
            // `@` runs are engine commands and take no space
            if word[0] != '@' {
                let word_width = run as f32 / 2.0;
                width += word_width;
                if width >= max && line_used {
                    out.push_str(line_break);
                    width = word_width;
                }
            }
            out.extend(word);
            line_used = true;
            i += run;
            continue;
        }

        if width >= min && is_disallowed_end(c) {
            out.push_str(line_break);
            width = if talking { 2.0 } else { 1.0 };
        }

        out.push(c);
        line_used = true;
        i += 1;
    }

    out
}
