//! 排版规范化
//!
//! 只改写 HTML 片段中的可见文本，标签原样保留。片段被切分为交替的标签段和文本段，
//! 规则仅作用于文本段，随后按原顺序拼回。
//!
//! 规则顺序:
//! 1. 智能引号
//! 2. 破折号
//! 3. 省略号
//! 4. 合并连续空格
//! 5. 标点前后空格
//! 6. 连续 3 个以上 `<br>` 收缩为 2 个（作用于整个片段）
//!
//! 整条流水线是幂等的: 对输出再次规范化不会产生任何变化。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::book::{Book, Chapter, ChapterId};

/// 流水线最多重复的轮数
///
/// 单轮之间存在少量级联（例如 `". . ."` 去掉标点前空格后才形成省略号），
/// 重复直到不动点即可覆盖
const MAX_PASSES: usize = 6;

/// 需要处理前后空格的标点
const SPACED_PUNCTUATION: [char; 6] = [',', '.', '?', '!', ';', ':'];

static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static RE_BR_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>(?:\s*<br\s*/?>){2,}").unwrap());
static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// 块级标签: 引号上下文在这些标签处重置
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol",
    "blockquote", "section", "article", "header", "footer", "table", "tr", "td", "th",
    "pre", "figure", "figcaption",
];

// ============================================================================
// Options & Issues
// ============================================================================

/// 规则开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypographyOptions {
    pub smart_quotes: bool,
    pub dashes: bool,
    pub ellipsis: bool,
    pub collapse_whitespace: bool,
    pub punctuation_spacing: bool,
    pub line_breaks: bool,
}

impl Default for TypographyOptions {
    fn default() -> Self {
        Self {
            smart_quotes: true,
            dashes: true,
            ellipsis: true,
            collapse_whitespace: true,
            punctuation_spacing: true,
            line_breaks: true,
        }
    }
}

/// 可修复的问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypographyIssue {
    StraightQuotes,
    Dashes,
    Ellipsis,
    RepeatedSpaces,
    PunctuationSpacing,
    ExcessLineBreaks,
}

impl TypographyIssue {
    pub fn description(&self) -> &'static str {
        match self {
            TypographyIssue::StraightQuotes => "Straight quotes converted to smart quotes",
            TypographyIssue::Dashes => "Double hyphens converted to em dashes",
            TypographyIssue::Ellipsis => "Three periods converted to an ellipsis",
            TypographyIssue::RepeatedSpaces => "Multiple spaces collapsed",
            TypographyIssue::PunctuationSpacing => "Spacing around punctuation fixed",
            TypographyIssue::ExcessLineBreaks => "Excess line breaks removed",
        }
    }
}

impl std::fmt::Display for TypographyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// 每条规则的替换次数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub quotes: usize,
    pub dashes: usize,
    pub ellipses: usize,
    pub spaces: usize,
    pub punctuation: usize,
    pub line_breaks: usize,
}

impl IssueCounts {
    pub fn total(&self) -> usize {
        self.quotes + self.dashes + self.ellipses + self.spaces + self.punctuation + self.line_breaks
    }

    /// 出现过的类别，按流水线顺序
    pub fn issues(&self) -> Vec<TypographyIssue> {
        [
            (self.quotes, TypographyIssue::StraightQuotes),
            (self.dashes, TypographyIssue::Dashes),
            (self.ellipses, TypographyIssue::Ellipsis),
            (self.spaces, TypographyIssue::RepeatedSpaces),
            (self.punctuation, TypographyIssue::PunctuationSpacing),
            (self.line_breaks, TypographyIssue::ExcessLineBreaks),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(_, issue)| issue)
        .collect()
    }

    fn add(&mut self, other: &IssueCounts) {
        self.quotes += other.quotes;
        self.dashes += other.dashes;
        self.ellipses += other.ellipses;
        self.spaces += other.spaces;
        self.punctuation += other.punctuation;
        self.line_breaks += other.line_breaks;
    }
}

/// 单个片段的规范化结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub content: String,
    pub counts: IssueCounts,
}

impl Normalized {
    pub fn changed(&self) -> bool {
        self.counts.total() > 0
    }
}

/// 批量修复中单个章节的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterFix {
    pub chapter_id: ChapterId,
    pub title: String,
    #[serde(skip)]
    pub content: String,
    pub issues: Vec<TypographyIssue>,
    pub changes: usize,
}

/// 批量修复结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub chapters: Vec<ChapterFix>,
    pub total_changes: usize,
}

impl BatchReport {
    /// 有改动的章节
    pub fn changed(&self) -> impl Iterator<Item = &ChapterFix> {
        self.chapters.iter().filter(|fix| fix.changes > 0)
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// 排版规范化器
#[derive(Debug, Clone, Default)]
pub struct TypographyNormalizer {
    options: TypographyOptions,
}

impl TypographyNormalizer {
    pub fn new(options: TypographyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TypographyOptions {
        &self.options
    }

    /// 规范化一个 HTML 片段（重复执行直到不动点）
    pub fn normalize(&self, html: &str) -> Normalized {
        let mut counts = IssueCounts::default();
        let mut current = html.to_string();

        for _ in 0..MAX_PASSES {
            let (next, pass_counts) = self.run_pass(&current);
            if next == current {
                break;
            }
            counts.add(&pass_counts);
            current = next;
        }

        Normalized {
            content: current,
            counts,
        }
    }

    /// 诊断: 返回会被修复的问题类别，不修改内容
    pub fn check(&self, html: &str) -> Vec<TypographyIssue> {
        self.normalize(html).counts.issues()
    }

    /// 按章节顺序批量修复
    pub fn fix_chapters(&self, chapters: &[Chapter]) -> BatchReport {
        let mut report = BatchReport::default();
        for chapter in chapters {
            let normalized = self.normalize(chapter.content());
            let changes = normalized.counts.total();
            report.total_changes += changes;
            report.chapters.push(ChapterFix {
                chapter_id: chapter.id().clone(),
                title: chapter.title().to_string(),
                issues: normalized.counts.issues(),
                content: normalized.content,
                changes,
            });
        }
        report
    }

    /// 生成所有章节都已规范化的副本（锁定状态不影响负载），附带修复报告
    pub fn normalize_book(&self, book: &Book) -> (Book, BatchReport) {
        let report = self.fix_chapters(book.chapters());
        let mut payload = book.clone();
        let mut fixes = report.chapters.iter();
        payload.rewrite_chapter_contents(|_| {
            fixes
                .next()
                .filter(|fix| fix.changes > 0)
                .map(|fix| fix.content.clone())
        });
        (payload, report)
    }

    fn run_pass(&self, html: &str) -> (String, IssueCounts) {
        let mut counts = IssueCounts::default();
        let mut out = String::with_capacity(html.len());
        let mut before: Option<char> = None;

        for segment in split_segments(html) {
            match segment {
                Segment::Tag(tag) => {
                    out.push_str(tag);
                    if is_block_tag(tag) {
                        before = None;
                    }
                }
                Segment::Text(text) => {
                    let fixed = self.fix_text(text, before, &mut counts);
                    if let Some(last) = fixed.chars().last() {
                        before = Some(last);
                    }
                    out.push_str(&fixed);
                }
            }
        }

        if self.options.line_breaks {
            let (collapsed, n) = collapse_line_breaks(&out);
            counts.line_breaks += n;
            out = collapsed;
        }

        (out, counts)
    }

    fn fix_text(&self, text: &str, before: Option<char>, counts: &mut IssueCounts) -> String {
        let mut text = text.to_string();
        let opts = &self.options;

        if opts.smart_quotes {
            let (fixed, n) = smart_quotes(&text, before);
            counts.quotes += n;
            text = fixed;
        }
        if opts.dashes {
            let (fixed, n) = em_dashes(&text);
            counts.dashes += n;
            text = fixed;
        }
        if opts.ellipsis {
            let n = text.matches("...").count();
            if n > 0 {
                counts.ellipses += n;
                text = text.replace("...", "\u{2026}");
            }
        }
        if opts.collapse_whitespace {
            let n = RE_MULTI_SPACE.find_iter(&text).count();
            if n > 0 {
                counts.spaces += n;
                text = RE_MULTI_SPACE.replace_all(&text, " ").into_owned();
            }
        }
        if opts.punctuation_spacing {
            let (fixed, n) = punctuation_spacing(&text);
            counts.punctuation += n;
            text = fixed;
        }
        text
    }
}

/// 使用默认规则规范化
pub fn normalize(html: &str) -> String {
    TypographyNormalizer::default().normalize(html).content
}

/// 使用默认规则诊断
pub fn check_typography(html: &str) -> Vec<TypographyIssue> {
    TypographyNormalizer::default().check(html)
}

/// 使用默认规则批量修复
pub fn fix_chapters(chapters: &[Chapter]) -> BatchReport {
    TypographyNormalizer::default().fix_chapters(chapters)
}

// ============================================================================
// Segmentation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Tag(&'a str),
    Text(&'a str),
}

/// 切分标签段与文本段
///
/// 只有 `<` 后紧跟字母、`/`、`!` 或 `?` 时才视为标签开始；
/// 未闭合的标签或注释连同其后全部内容作为标签段原样保留
fn split_segments(html: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while let Some(offset) = html[i..].find('<') {
        let start = i + offset;
        if !starts_tag(&html[start..]) {
            i = start + 1;
            continue;
        }

        let end = if html[start..].starts_with("<!--") {
            html[start + 4..].find("-->").map(|p| start + 4 + p + 3)
        } else {
            html[start + 1..].find('>').map(|p| start + 1 + p + 1)
        }
        .unwrap_or(html.len());

        if text_start < start {
            segments.push(Segment::Text(&html[text_start..start]));
        }
        segments.push(Segment::Tag(&html[start..end]));
        text_start = end;
        i = end;
    }

    if text_start < html.len() {
        segments.push(Segment::Text(&html[text_start..]));
    }
    segments
}

fn starts_tag(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
}

fn is_block_tag(tag: &str) -> bool {
    let name: String = tag
        .trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    BLOCK_TAGS.contains(&name.as_str())
}

/// 若以 HTML 实体开头（`&amp;`、`&#8217;` 等），返回实体长度（字符数）
fn entity_len(chars: &[char]) -> Option<usize> {
    if chars.first() != Some(&'&') {
        return None;
    }
    let body = chars[1..]
        .iter()
        .take(10)
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '#')
        .count();
    (body > 0 && chars.get(body + 1) == Some(&';')).then_some(body + 2)
}

/// 实体在引号判断中等价的字符
fn entity_context(entity: &[char]) -> char {
    let name: String = entity.iter().collect();
    match name.as_str() {
        "&nbsp;" | "&#160;" => ' ',
        "&mdash;" | "&ndash;" | "&#8212;" | "&#8211;" => '\u{2014}',
        "&ldquo;" | "&lsquo;" | "&#8220;" | "&#8216;" => '\u{201C}',
        _ => 'a',
    }
}

// ============================================================================
// Rules
// ============================================================================

fn opens_quote(before: Option<char>) -> bool {
    match before {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(
                    c,
                    '(' | '[' | '{' | '-' | '/' | '\u{2014}' | '\u{2013}' | '\u{201C}' | '\u{2018}'
                )
        }
    }
}

/// 横线后的引号：后面是结尾、空白或标点时按闭引号处理
fn closes_after_dash(before: Option<char>, after: Option<char>) -> bool {
    if !matches!(before, Some('-' | '\u{2014}' | '\u{2013}')) {
        return false;
    }
    match after {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(
                    c,
                    ',' | '.' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '"' | '\''
                        | '\u{201D}' | '\u{2019}' | '\u{2026}'
                )
        }
    }
}

/// 直引号 → 弯引号；词内撇号 → 右单引号
fn smart_quotes(text: &str, before: Option<char>) -> (String, usize) {
    if !text.contains(['"', '\'']) {
        return (text.to_string(), 0);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev = before;
    let mut count = 0;
    let mut i = 0;

    while i < chars.len() {
        if let Some(len) = entity_len(&chars[i..]) {
            out.extend(&chars[i..i + len]);
            prev = Some(entity_context(&chars[i..i + len]));
            i += len;
            continue;
        }

        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let curly = match c {
            '"' if closes_after_dash(prev, next) => Some('\u{201D}'),
            '"' if opens_quote(prev) => Some('\u{201C}'),
            '"' => Some('\u{201D}'),
            '\'' if prev.is_some_and(char::is_alphanumeric) && next.is_some_and(char::is_alphanumeric) => {
                Some('\u{2019}')
            }
            '\'' if closes_after_dash(prev, next) => Some('\u{2019}'),
            '\'' if opens_quote(prev) => Some('\u{2018}'),
            '\'' => Some('\u{2019}'),
            _ => None,
        };

        let emitted = match curly {
            Some(q) => {
                count += 1;
                q
            }
            None => c,
        };
        out.push(emitted);
        prev = Some(emitted);
        i += 1;
    }

    (out, count)
}

/// 2-3 个连字符 → 破折号；` - ` → ` — `
fn em_dashes(text: &str) -> (String, usize) {
    if !text.contains('-') {
        return (text.to_string(), 0);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '-' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|c| **c == '-').count();
        let spaced = run == 1 && i > 0 && chars[i - 1] == ' ' && chars.get(i + 1) == Some(&' ');
        if run == 2 || run == 3 || spaced {
            out.push('\u{2014}');
            count += 1;
        } else {
            out.extend(&chars[i..i + run]);
        }
        i += run;
    }

    (out, count)
}

/// 去掉标点前的空格；标点后紧跟字母时补一个空格
fn punctuation_spacing(text: &str) -> (String, usize) {
    let chars: Vec<char> = text.chars().collect();
    let mut out: Vec<char> = Vec::with_capacity(chars.len() + 4);
    let mut count = 0;
    let mut i = 0;

    // 第一步: 删除标点前的空格
    while i < chars.len() {
        if chars[i] == ' ' {
            let run = chars[i..].iter().take_while(|c| **c == ' ').count();
            let after = chars.get(i + run).copied();
            let decimal = after == Some('.')
                && chars.get(i + run + 1).is_some_and(char::is_ascii_digit);
            if after.is_some_and(|c| SPACED_PUNCTUATION.contains(&c)) && !decimal {
                count += 1;
            } else {
                out.extend(&chars[i..i + run]);
            }
            i += run;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }

    // 第二步: 标点后补空格
    let chars = out;
    let mut out = String::with_capacity(chars.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        if let Some(len) = entity_len(&chars[i..]) {
            out.extend(&chars[i..i + len]);
            i += len;
            continue;
        }

        let c = chars[i];
        out.push(c);
        if SPACED_PUNCTUATION.contains(&c) && needs_space_after(&chars, i) {
            out.push(' ');
            count += 1;
        }
        i += 1;
    }

    (out, count)
}

fn needs_space_after(chars: &[char], i: usize) -> bool {
    let Some(next) = chars.get(i + 1).copied() else {
        return false;
    };
    if !next.is_alphabetic() {
        return false;
    }
    if chars[i] != '.' {
        return true;
    }

    // 句点: 只在大写字母前补空格（跳过 example.com、file.txt），
    // 并跳过单字母缩写（e.g.、U.S.）
    if !next.is_uppercase() {
        return false;
    }
    let single_letter = i >= 1
        && chars[i - 1].is_alphabetic()
        && (i == 1 || matches!(chars[i - 2], ' ' | '.'));
    !single_letter
}

/// 连续 3 个以上 `<br>` 收缩为 2 个（保留第一个的写法）
fn collapse_line_breaks(html: &str) -> (String, usize) {
    let mut count = 0;
    let collapsed = RE_BR_RUN.replace_all(html, |caps: &regex::Captures| {
        count += 1;
        let first = RE_BR.find(&caps[0]).map(|m| m.as_str()).unwrap_or("<br>");
        format!("{first}{first}")
    });
    (collapsed.into_owned(), count)
}
