//! Free-text budget instruction interpreter
//!
//! Extraction and resolution are separate pure stages: [`CommandInterpreter::extract`]
//! turns text into [`ParsedCommand`]s using a small rule table, and
//! [`CommandInterpreter::resolve`] maps each category phrase onto an existing
//! category, dropping the ones that match nothing.

use std::sync::LazyLock;

use regex::Regex;

use crate::category::CategoryResolver;
use crate::model::{BudgetSnapshot, CommandKind, ParsedCommand, ResolvedCommand};

/// Example instructions returned when nothing could be understood.
pub const SUGGESTIONS: [&str; 5] = [
    "Try: \"Increase Electronics by 5000\"",
    "Try: \"Set Food budget to 8000\"",
    "Try: \"Allocate 3000 for Books\"",
    "Try: \"Reduce Travel by 2000\"",
    "Try: \"Set total budget to 25000\"",
];

const INCREASE_VERBS: [&str; 4] = ["increase", "add", "boost", "raise"];
const DECREASE_VERBS: [&str; 4] = ["decrease", "reduce", "cut", "lower"];
const SET_VERBS: [&str; 3] = ["set", "make", "change"];
const ALLOCATE_VERBS: [&str; 3] = ["allocate", "assign", "give"];
const UPDATE_KEYWORDS: [&str; 3] = ["update", "budget", "modify"];
const CONJUNCTIONS: [&str; 3] = ["and", "then", "also"];

/// Optional currency marker followed by a bare digit run.
const AMOUNT: &str = r"(?:rupees?\s+|₹\s*)?(\d+)";

/// "the total budget", "my overall budget" and similar.
const TOTAL: &str = r"(?:(?:the|my)\s+)?(?:total|overall)\s+budget";

const CONNECTOR: &str = r"(?:should\s+be|to|is)";

/// Lazy category phrase: letters, spaces and `&`.
const PHRASE: &str = r"([a-z&][a-z\s&]*?)";

/// One pattern family of the rule table.
struct Rule {
    kind: CommandKind,
    pattern: Regex,
    amount_group: usize,
    phrase_group: Option<usize>,
}

/// The rule table, compiled on first use and shared by every interpreter.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule {
            kind: CommandKind::SetTotal,
            // Needs a set verb in front or a connector before the amount,
            // so "reduce total budget 2000" is not a SetTotal.
            pattern: compile(&format!(
                r"\b(?:(?:{set})\s+{TOTAL}\s+(?:{CONNECTOR}\s+)?|{TOTAL}\s+{CONNECTOR}\s+){AMOUNT}",
                set = SET_VERBS.join("|"),
            )),
            amount_group: 1,
            phrase_group: None,
        },
        Rule {
            kind: CommandKind::Increase,
            pattern: compile(&format!(
                r"\b(?:{verbs})\s+(?:the\s+)?{PHRASE}(?:\s+(?:by|with))?\s+(?:by\s+)?{AMOUNT}",
                verbs = INCREASE_VERBS.join("|"),
            )),
            amount_group: 2,
            phrase_group: Some(1),
        },
        Rule {
            kind: CommandKind::Decrease,
            pattern: compile(&format!(
                r"\b(?:{verbs})\s+(?:the\s+)?{PHRASE}(?:\s+budget)?\s+(?:by\s+)?{AMOUNT}",
                verbs = DECREASE_VERBS.join("|"),
            )),
            amount_group: 2,
            phrase_group: Some(1),
        },
        Rule {
            kind: CommandKind::Set,
            pattern: compile(&format!(
                r"\b(?:{verbs})\s+(?:the\s+)?{PHRASE}\s+(?:budget\s+)?to\s+{AMOUNT}",
                verbs = SET_VERBS.join("|"),
            )),
            amount_group: 2,
            phrase_group: Some(1),
        },
        Rule {
            kind: CommandKind::Allocate,
            pattern: compile(&format!(
                r"\b(?:{verbs})\s+{AMOUNT}\s+(?:for|to)\s+([a-z&][a-z\s&]*)",
                verbs = ALLOCATE_VERBS.join("|"),
            )),
            amount_group: 1,
            phrase_group: Some(2),
        },
    ]
});

/// Turns instructions like "increase Food by 500" into typed commands.
pub struct CommandInterpreter {
    resolver: CategoryResolver,
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self {
            resolver: CategoryResolver::new(),
        }
    }

    /// Cheap keyword check for "does this look like a budget change at all".
    pub fn is_update_request(text: &str) -> bool {
        let lower = text.to_lowercase();
        UPDATE_KEYWORDS
            .iter()
            .chain(INCREASE_VERBS.iter())
            .chain(DECREASE_VERBS.iter())
            .chain(SET_VERBS.iter())
            .chain(ALLOCATE_VERBS.iter())
            .any(|keyword| lower.contains(keyword))
    }

    /// Extract every command in `text`, ordered by where it starts.
    ///
    /// Families are matched independently, so one span can yield commands
    /// from more than one family.
    pub fn extract(&self, text: &str) -> Vec<ParsedCommand> {
        let mut found: Vec<(usize, usize, ParsedCommand)> = Vec::new();

        for (rank, rule) in RULES.iter().enumerate() {
            for captures in rule.pattern.captures_iter(text) {
                let Some(whole) = captures.get(0) else {
                    continue;
                };
                let Some(amount) = captures
                    .get(rule.amount_group)
                    .and_then(|m| m.as_str().parse::<u64>().ok())
                else {
                    tracing::debug!("Skipping {:?} with unreadable amount", rule.kind);
                    continue;
                };

                let category_phrase = match rule.phrase_group {
                    None => None,
                    Some(group) => {
                        let raw = captures.get(group).map(|m| m.as_str()).unwrap_or_default();
                        match clean_phrase(raw) {
                            Some(phrase) => Some(phrase),
                            None => continue,
                        }
                    }
                };

                if rule.kind == CommandKind::Set
                    && category_phrase.as_deref().is_some_and(names_total)
                {
                    continue;
                }

                found.push((
                    whole.start(),
                    rank,
                    ParsedCommand {
                        kind: rule.kind,
                        category_phrase,
                        amount,
                    },
                ));
            }
        }

        found.sort_by_key(|(start, rank, _)| (*start, *rank));
        found.into_iter().map(|(_, _, command)| command).collect()
    }

    /// Resolve category phrases against `snapshot`, dropping unresolved commands.
    pub fn resolve(&self, commands: &[ParsedCommand], snapshot: &BudgetSnapshot) -> Vec<ResolvedCommand> {
        commands
            .iter()
            .filter_map(|command| match (&command.kind, &command.category_phrase) {
                (CommandKind::SetTotal, _) => Some(ResolvedCommand::set_total(command.amount)),
                (kind, Some(phrase)) => {
                    match self.resolver.resolve(phrase, snapshot.category_names()) {
                        Some(category) => {
                            Some(ResolvedCommand::for_category(*kind, category, command.amount))
                        }
                        None => {
                            tracing::info!("No category matches {:?}; dropping {:?}", phrase, kind);
                            None
                        }
                    }
                }
                (kind, None) => {
                    tracing::warn!("{:?} command without a category phrase", kind);
                    None
                }
            })
            .collect()
    }

    /// Extract and resolve in one go.
    pub fn interpret(&self, text: &str, snapshot: &BudgetSnapshot) -> Vec<ResolvedCommand> {
        let parsed = self.extract(text);
        tracing::debug!("Extracted {} command(s) from {:?}", parsed.len(), text);
        self.resolve(&parsed, snapshot)
    }

    pub fn suggestions() -> Vec<String> {
        SUGGESTIONS.iter().map(|s| s.to_string()).collect()
    }
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    // Patterns are static; the interpreter tests compile every one of them.
    match Regex::new(&format!("(?i){pattern}")) {
        Ok(regex) => regex,
        Err(err) => panic!("invalid interpreter pattern {pattern:?}: {err}"),
    }
}

fn is_verb(word: &str) -> bool {
    INCREASE_VERBS
        .iter()
        .chain(DECREASE_VERBS.iter())
        .chain(SET_VERBS.iter())
        .chain(ALLOCATE_VERBS.iter())
        .any(|verb| verb.eq_ignore_ascii_case(word))
}

fn names_total(phrase: &str) -> bool {
    phrase
        .split_whitespace()
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case("total") || first.eq_ignore_ascii_case("overall"))
}

/// Trim a captured phrase down to the category it names.
///
/// Cuts at a conjunction that starts another instruction ("books and increase ..."),
/// then drops a leading article and a trailing "budget"/"category".
fn clean_phrase(raw: &str) -> Option<String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();

    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let is_conjunction = CONJUNCTIONS.iter().any(|c| c.eq_ignore_ascii_case(token));
        if is_conjunction && tokens.get(i + 1).is_some_and(|next| is_verb(next)) {
            break;
        }
        kept.push(*token);
    }

    while kept
        .first()
        .is_some_and(|t| t.eq_ignore_ascii_case("the") || t.eq_ignore_ascii_case("my"))
    {
        kept.remove(0);
    }
    while kept.last().is_some_and(|t| {
        t.eq_ignore_ascii_case("budget")
            || t.eq_ignore_ascii_case("category")
            || t.eq_ignore_ascii_case("by")
            || t.eq_ignore_ascii_case("with")
    }) {
        kept.pop();
    }

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}
