use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::html::escape;

use crate::gateway::Difficulty;
use crate::panels::quiz::QuizPhase;
use crate::panels::{ChatPanel, PanelKind, QuizPanel, SummarizePanel};
use crate::quiz::quotes::motivational_quote;
use crate::quiz::{OptionMark, Quiz};

pub const MENU_BUTTON: &str = "🏠 Menu";
pub const GENERATE_BUTTON: &str = "✨ Generate Quiz";
pub const NEXT_BUTTON: &str = "Next Question";
pub const FINISH_BUTTON: &str = "Finish Quiz";
pub const RESTART_BUTTON: &str = "Create Another Quiz";
const QUESTION_COUNT_PREFIX: &str = "Questions: ";
const QUESTION_COUNT_CHOICES: [u8; 3] = [3, 5, 10];

/// Telegram rejects messages longer than this many UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;

/// A message to send, optionally with a keyboard to show alongside it.
#[derive(Debug, Clone)]
pub struct Screen {
    pub text: String,
    pub keyboard: Option<KeyboardMarkup>,
    pub html: bool,
}

impl Screen {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            html: false,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            html: true,
            ..Self::plain(text)
        }
    }

    pub fn with_keyboard(mut self, keyboard: KeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Message-sized chunks and whether they are still HTML. An HTML screen
    /// whose cuts would break a tag or entity is sent as plain text instead.
    pub fn chunks(&self) -> (Vec<String>, bool) {
        let chunks = split_message(&self.text);
        if !self.html || chunks.iter().all(|c| html_intact(c)) {
            return (chunks, self.html);
        }
        (split_message(&strip_html(&self.text)), false)
    }
}

/// Every tag opened in `html` is closed in it and no entity is cut off.
fn html_intact(html: &str) -> bool {
    let mut open = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            return false;
        };
        let tag = &rest[start + 1..start + len];
        match tag.strip_prefix('/') {
            Some(name) => {
                if open.pop() != Some(name) {
                    return false;
                }
            }
            None => open.push(tag.split_whitespace().next().unwrap_or("")),
        }
        rest = &rest[start + len + 1..];
    }
    let entity_cut = html.rfind('&').is_some_and(|i| !html[i..].contains(';'));
    open.is_empty() && !entity_cut
}

fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn button(text: impl Into<String>) -> KeyboardButton {
    KeyboardButton::new(text)
}

fn menu_row() -> Vec<KeyboardButton> {
    vec![button(MENU_BUTTON)]
}

pub fn dashboard_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(
        PanelKind::ALL
            .iter()
            .map(|p| vec![button(p.label())])
            .collect::<Vec<_>>(),
    )
}

pub fn dashboard() -> Screen {
    Screen::plain("What would you like to do?").with_keyboard(dashboard_keyboard())
}

pub fn chat_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![menu_row()])
}

pub fn chat_opened(panel: &ChatPanel) -> Screen {
    let greeting = panel
        .last_message()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    Screen::plain(greeting).with_keyboard(chat_keyboard())
}

pub fn summarize_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        Difficulty::ALL.iter().map(|d| button(d.label())).collect(),
        menu_row(),
    ])
}

pub fn summarize_opened(panel: &SummarizePanel) -> Screen {
    Screen::plain(format!(
        "Paste your notes here and I will summarize them.\nLevel: {}. Tap a level to change it.",
        panel.difficulty().label()
    ))
    .with_keyboard(summarize_keyboard())
}

pub fn summarize_result(panel: &SummarizePanel) -> Screen {
    let text = match (panel.summary(), panel.error()) {
        (_, Some(error)) => error.to_string(),
        (Some(summary), None) => summary.to_string(),
        (None, None) => "Your summary will appear here.".to_string(),
    };
    Screen::plain(text).with_keyboard(summarize_keyboard())
}

pub fn question_count_button(count: u8) -> String {
    format!("{QUESTION_COUNT_PREFIX}{count}")
}

pub fn parse_question_count_button(text: &str) -> Option<i64> {
    text.trim()
        .strip_prefix(QUESTION_COUNT_PREFIX)
        .and_then(|n| n.trim().parse().ok())
}

fn quiz_config_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        QUESTION_COUNT_CHOICES
            .iter()
            .map(|n| button(question_count_button(*n)))
            .collect(),
        vec![button(GENERATE_BUTTON)],
        menu_row(),
    ])
}

pub fn option_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// Maps a pressed "A".."D" key back to an option index.
pub fn parse_option_letter(text: &str) -> Option<usize> {
    let mut chars = text.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !letter.is_ascii_uppercase() {
        return None;
    }
    Some((letter as u8 - b'A') as usize)
}

/// Renders whatever the quiz panel currently shows.
pub fn quiz(panel: &QuizPanel) -> Screen {
    match panel.phase() {
        QuizPhase::Config => quiz_config(panel),
        QuizPhase::Loading { .. } => Screen::plain(
            "Generating Your Quiz...\nThe AI is hard at work. This might take a moment.",
        ),
        QuizPhase::Active(quiz) => quiz_question(quiz),
        QuizPhase::Results { quiz, score } => quiz_results(quiz, *score),
    }
}

fn quiz_config(panel: &QuizPanel) -> Screen {
    let mut text = String::new();
    if let Some(error) = panel.error() {
        text.push_str(&format!("⚠️ {}\n\n", escape(error)));
    }
    text.push_str("<b>Paste your notes to generate a quiz</b>\n");
    if panel.source().trim().is_empty() {
        text.push_str("No notes yet.\n");
    } else {
        text.push_str(&format!("Notes received ({} characters).\n", panel.source().chars().count()));
    }
    text.push_str(&format!(
        "Questions: {} (use /questions N to pick 1-10)",
        panel.question_count()
    ));
    Screen::html(text).with_keyboard(quiz_config_keyboard())
}

fn quiz_question(quiz: &Quiz) -> Screen {
    let Some(question) = quiz.current() else {
        return Screen::plain("This quiz has no questions.");
    };
    let selected = quiz.current_answer();

    let mut text = format!(
        "Question {} of {}\n\n<b>{}</b>\n",
        quiz.current_index() + 1,
        quiz.questions().len(),
        escape(&question.question)
    );
    for (i, option) in question.options.iter().enumerate() {
        let marker = if selected == Some(i) { "👉 " } else { "" };
        text.push_str(&format!("\n{}{}) {}", marker, option_letter(i), escape(option)));
    }

    let letters = (0..question.options.len())
        .map(|i| button(option_letter(i).to_string()))
        .collect();
    let advance = if quiz.is_last() { FINISH_BUTTON } else { NEXT_BUTTON };
    let keyboard = KeyboardMarkup::new(vec![letters, vec![button(advance)], menu_row()]);

    Screen::html(text).with_keyboard(keyboard)
}

fn mark_symbol(mark: OptionMark) -> &'static str {
    match mark {
        OptionMark::Correct => "✅",
        OptionMark::UserIncorrect => "❌",
        OptionMark::Neutral => "▫️",
    }
}

pub fn quiz_review(quiz: &Quiz) -> String {
    let mut text = String::from("<b>Review Your Answers</b>\n");
    for (n, (question, answer)) in quiz.questions().iter().zip(quiz.answers()).enumerate() {
        text.push_str(&format!("\n<b>{}. {}</b>\n", n + 1, escape(&question.question)));
        for (i, option) in question.options.iter().enumerate() {
            let mark = question.mark(i, *answer);
            text.push_str(&format!("{} {}\n", mark_symbol(mark), escape(option)));
        }
    }
    text
}

fn quiz_results(quiz: &Quiz, score: usize) -> Screen {
    let total = quiz.questions().len();
    let quote = motivational_quote(score, total);
    let text = format!(
        "<b>Quiz Complete!</b>\nYour Score: <b>{} / {}</b>\n\n<i>\"{}\"</i>\n- {}\n\n{}",
        score,
        total,
        escape(quote.text),
        escape(quote.author),
        quiz_review(quiz)
    );
    let keyboard = KeyboardMarkup::new(vec![vec![button(RESTART_BUTTON)], menu_row()]);
    Screen::html(text).with_keyboard(keyboard)
}

/// Splits text into chunks Telegram accepts, preferring line breaks.
pub fn split_message(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.encode_utf16().count();
        if current_len + line_len > MESSAGE_LIMIT && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= MESSAGE_LIMIT {
            current.push_str(line);
            current_len += line_len;
            continue;
        }
        // A single line longer than the limit is cut at character boundaries.
        for c in line.chars() {
            if current_len + c.len_utf16() > MESSAGE_LIMIT {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(c);
            current_len += c.len_utf16();
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
