// src/dsl/parser.rs

//! Recursive-descent parser for the pipeline language.
//!
//! ```text
//! _BUILD { maxDuration: 12:00 }     // whole-build settings
//! _ALL { agent: [linux] }           // baseline for nodes referenced from here on
//! compile -> test -> package        // edge chain
//! test, package { weight: 2 }       // settings for several nodes
//! docs                              // bare declaration
//! ```
//!
//! Statements are separated by `;` or newlines. Parsing stops at the first
//! error. A node's settings are created the first time the node is
//! referenced, as a copy of the `_ALL` baseline active at that point; later
//! `_ALL` blocks never touch nodes that already exist.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::dag::settings::{
    BuildAgent, BuildSettings, SchedulerSettings, SettingValue, Throttle, UnknownSetting,
};
use crate::time::{DEFAULT_MAX_BUILD_TIME, INFINITE_DURATION, parse_duration, parse_time_of_day};
use crate::types::Edition;

use super::error::ParseError;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use super::verifier::{SettingsVerifier, Verifier};

/// Baseline settings block.
pub const ALL_NODES: &str = "_ALL";
/// Whole-build settings block.
pub const BUILD_SETTINGS: &str = "_BUILD";

const NODE_FIELDS: [&str; 4] = ["agent", "maxDuration", "onParentFailure", "weight"];
const MAX_SUGGESTIONS: usize = 10;

type ParseResult<T> = Result<T, ParseError>;

/// A node as written in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBuildJob {
    pub id: String,
    pub children: BTreeSet<String>,
    pub settings: BuildSettings,
}

impl ParsedBuildJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            children: BTreeSet::new(),
            settings: BuildSettings::default(),
        }
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

/// Parser output: jobs in first-reference order plus whole-build settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedBuild {
    pub scheduler_settings: SchedulerSettings,
    pub jobs: Vec<ParsedBuildJob>,
}

impl ParsedBuild {
    pub fn job(&self, id: &str) -> Option<&ParsedBuildJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.id.as_str())
    }
}

/// Parse `input`, resolving names through `verifier`.
pub fn parse_build(input: &str, verifier: &dyn Verifier) -> ParseResult<ParsedBuild> {
    Parser::new(input, verifier).parse()
}

/// Parse without checking node or agent names (non-strict).
pub fn parse_build_no_verify(input: &str) -> ParseResult<ParsedBuild> {
    let verifier = SettingsVerifier::permissive();
    Parser::new(input, &verifier).parse()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    verifier: &'a dyn Verifier,
    edition: Edition,
    jobs: Vec<ParsedBuildJob>,
    index: HashMap<String, usize>,
    baseline: Option<BuildSettings>,
    scheduler_settings: SchedulerSettings,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, verifier: &'a dyn Verifier) -> Self {
        Self {
            lexer: Lexer::new(input),
            verifier,
            edition: Edition::default(),
            jobs: Vec::new(),
            index: HashMap::new(),
            baseline: None,
            scheduler_settings: SchedulerSettings::default(),
        }
    }

    pub fn with_edition(mut self, edition: Edition) -> Self {
        self.edition = edition;
        self
    }

    pub fn parse(mut self) -> ParseResult<ParsedBuild> {
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Semicolon => continue,
                TokenKind::Identifier | TokenKind::String => self.statement(token)?,
                _ => {
                    return Err(self.error(
                        &token,
                        format!("expected build node identifier, got: '{}'", token.text),
                    ));
                }
            }
        }

        debug!(
            jobs = self.jobs.len(),
            edition = %self.edition,
            "parsed pipeline"
        );

        Ok(ParsedBuild {
            scheduler_settings: self.scheduler_settings,
            jobs: self.jobs,
        })
    }

    fn statement(&mut self, first: Token) -> ParseResult<()> {
        match first.text.as_str() {
            BUILD_SETTINGS => {
                self.expect(TokenKind::LeftBrace, "expected '{' after _BUILD")?;
                return self.scheduler_settings_block();
            }
            ALL_NODES => {
                self.expect(TokenKind::LeftBrace, "expected '{' after _ALL")?;
                let mut baseline = self.baseline.clone().unwrap_or_default();
                self.settings_block(ALL_NODES, &mut baseline)?;
                self.baseline = Some(baseline);
                return Ok(());
            }
            _ => {}
        }

        let mut current = self.reference(&first)?;
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Semicolon | TokenKind::Eof => return Ok(()),
                TokenKind::LeftBrace => return self.node_settings(current),
                TokenKind::Comma => return self.settings_list(current),
                TokenKind::RightArrow => {
                    let child = self.lexer.next_token();
                    if !is_name(&child) {
                        return Err(self.error(
                            &child,
                            format!("expected build node identifier, got: '{}'", child.text),
                        ));
                    }
                    let child_idx = self.reference(&child)?;
                    let child_id = self.jobs[child_idx].id.clone();
                    self.jobs[current].children.insert(child_id);
                    current = child_idx;
                }
                _ => {
                    return Err(self.error(&token, format!("expected '->', got: '{}'", token.text)));
                }
            }
        }
    }

    /// Resolve a node reference, creating the node on first sight.
    fn reference(&mut self, token: &Token) -> ParseResult<usize> {
        let id = token.text.as_str();
        if id == ALL_NODES || id == BUILD_SETTINGS {
            return Err(self.error(
                token,
                format!("'{id}' is reserved and can only be followed by a settings block"),
            ));
        }

        if !self.verifier.node_exists(id) {
            let known = self.verifier.known_nodes();
            let options: Vec<&str> = known.iter().take(MAX_SUGGESTIONS).map(String::as_str).collect();
            let more = if known.len() > MAX_SUGGESTIONS { ", etc..." } else { "" };
            return Err(self.error(
                token,
                format!(
                    "build node '{id}' does not exist, possible options [{}{more}]",
                    options.join(", ")
                ),
            ));
        }

        if let Some(&idx) = self.index.get(id) {
            return Ok(idx);
        }

        let mut job = ParsedBuildJob::new(id);
        job.settings = self.baseline.clone().unwrap_or_default();
        let idx = self.jobs.len();
        self.jobs.push(job);
        self.index.insert(id.to_string(), idx);
        Ok(idx)
    }

    fn node_settings(&mut self, idx: usize) -> ParseResult<()> {
        let owner = self.jobs[idx].id.clone();
        let mut settings = std::mem::take(&mut self.jobs[idx].settings);
        let result = self.settings_block(&owner, &mut settings);
        self.jobs[idx].settings = settings;
        result
    }

    /// `A, B, C { ... }`: the block is parsed again for every node so each
    /// one only changes the fields that are mentioned.
    fn settings_list(&mut self, first: usize) -> ParseResult<()> {
        let mut targets = vec![first];
        loop {
            let token = self.lexer.next_token();
            if !is_name(&token) {
                return Err(self.error(
                    &token,
                    format!("expected build node identifier, got: '{}'", token.text),
                ));
            }
            targets.push(self.reference(&token)?);

            let separator = self.lexer.next_token();
            match separator.kind {
                TokenKind::Comma => continue,
                TokenKind::LeftBrace => break,
                _ => {
                    return Err(self.error(
                        &separator,
                        format!("expected ',' or '{{', got: '{}'", separator.text),
                    ));
                }
            }
        }

        let block_start = self.lexer.checkpoint();
        let mut block_end = block_start;
        for idx in targets {
            self.lexer.rewind(block_start);
            self.node_settings(idx)?;
            block_end = self.lexer.checkpoint();
        }
        self.lexer.rewind(block_end);
        Ok(())
    }

    fn settings_block(&mut self, owner: &str, settings: &mut BuildSettings) -> ParseResult<()> {
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Semicolon => continue,
                TokenKind::RightBrace => return Ok(()),
                TokenKind::Eof => {
                    return Err(self.error(
                        &token,
                        format!("'{owner}' settings are missing a closing brace '}}'"),
                    ));
                }
                TokenKind::Identifier => {}
                _ => {
                    return Err(self.error(
                        &token,
                        format!("expected new settings field identifier, got: '{}'", token.text),
                    ));
                }
            }

            let field = token.text.as_str();
            if !NODE_FIELDS.contains(&field) && self.verifier.strict_mode() {
                return Err(self.error(
                    &token,
                    format!(
                        "unknown setting {field}, supported settings: [{}]",
                        NODE_FIELDS.join(", ")
                    ),
                ));
            }
            self.expect_colon(owner, &token)?;

            match field {
                "agent" => settings.agents = self.agents(owner)?,
                "onParentFailure" => {
                    let value = self.lexer.next_token();
                    if !value.is(TokenKind::Identifier) {
                        return Err(self.error(
                            &value,
                            format!("expected modes: [BUILD, ABORT], got: '{}'", value.text),
                        ));
                    }
                    settings.on_parent_failure = value.text.parse().map_err(|e| {
                        self.error(
                            &value,
                            format!("unknown onParentFailure mode for build node {owner}, {e}"),
                        )
                    })?;
                }
                "maxDuration" => settings.max_duration = self.duration("maxDuration")?,
                "weight" => settings.weight = self.weight()?,
                _ => {
                    let value = self.opaque_value(field)?;
                    settings.unknown.push(UnknownSetting {
                        field: field.to_string(),
                        value,
                        line: self.lexer.line(),
                    });
                }
            }
        }
    }

    fn scheduler_settings_block(&mut self) -> ParseResult<()> {
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Semicolon => continue,
                TokenKind::RightBrace => return Ok(()),
                TokenKind::Eof => {
                    return Err(self.error(
                        &token,
                        format!("'{BUILD_SETTINGS}' settings are missing a closing brace '}}'"),
                    ));
                }
                TokenKind::Identifier => {}
                _ => {
                    return Err(self.error(
                        &token,
                        format!("expected new settings field identifier, got: '{}'", token.text),
                    ));
                }
            }

            match token.text.as_str() {
                "maxDuration" => {
                    self.expect_colon(BUILD_SETTINGS, &token)?;
                    let duration = self.duration("maxDuration")?;
                    self.scheduler_settings.max_duration = if duration >= INFINITE_DURATION {
                        DEFAULT_MAX_BUILD_TIME
                    } else {
                        duration
                    };
                }
                "buildThrottle" => {
                    self.expect_colon(BUILD_SETTINGS, &token)?;
                    if self.edition.supports_throttling() {
                        let throttles = self.throttles()?;
                        self.scheduler_settings.add_throttles(throttles);
                    } else {
                        self.skip_array("buildThrottle")?;
                        warn!(
                            edition = %self.edition,
                            "buildThrottle is not available in this edition; ignoring it"
                        );
                    }
                }
                other => {
                    let supported = if self.edition.supports_throttling() {
                        "[maxDuration, buildThrottle]"
                    } else {
                        "[maxDuration]"
                    };
                    return Err(self.error(
                        &token,
                        format!("unknown setting field '{other}', supported settings: {supported}"),
                    ));
                }
            }
        }
    }

    fn agents(&mut self, owner: &str) -> ParseResult<Vec<BuildAgent>> {
        let (open, items) = self.array("agent")?;

        let mut valid: Vec<BuildAgent> = Vec::new();
        let mut unknown: Vec<String> = Vec::new();
        for item in &items {
            if self.verifier.agent_exists(&item.text) {
                let agent = BuildAgent::new(&item.text);
                if !valid.contains(&agent) {
                    valid.push(agent);
                }
            } else {
                unknown.push(item.text.clone());
            }
        }

        if valid.is_empty() {
            let found: Vec<&str> = items.iter().map(|t| t.text.as_str()).collect();
            return Err(self.error(
                &open,
                format!(
                    "no valid agent found, expected: [{}], found: [{}]",
                    self.verifier.known_agents().join(", "),
                    found.join(", ")
                ),
            ));
        }

        if !unknown.is_empty() {
            // agents come and go, so this is not fatal
            warn!(node = owner, ?unknown, "dropping unknown build agents");
        }
        Ok(valid)
    }

    /// `[a, "b", 3]`; commas and newlines between values are optional.
    fn array(&mut self, field: &str) -> ParseResult<(Token, Vec<Token>)> {
        let open = self.lexer.next_token();
        if !open.is(TokenKind::LeftBracket) {
            return Err(self.error(&open, format!("{field} value expected '[', got: '{}'", open.text)));
        }

        let mut items = Vec::new();
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::RightBracket => return Ok((open, items)),
                TokenKind::Comma | TokenKind::Semicolon => continue,
                TokenKind::Identifier | TokenKind::String | TokenKind::Number => items.push(token),
                TokenKind::Eof => {
                    return Err(self.error(
                        &token,
                        format!("{field} array is missing a closing bracket ']'"),
                    ));
                }
                _ => {
                    return Err(self.error(
                        &token,
                        format!("expected array value or ']', got: '{}'", token.text),
                    ));
                }
            }
        }
    }

    fn skip_array(&mut self, field: &str) -> ParseResult<()> {
        let open = self.lexer.next_token();
        if !open.is(TokenKind::LeftBracket) {
            return Err(self.error(&open, format!("{field} value expected '[', got: '{}'", open.text)));
        }
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::RightBracket => return Ok(()),
                TokenKind::Eof => {
                    return Err(self.error(
                        &token,
                        format!("{field} array is missing a closing bracket ']'"),
                    ));
                }
                _ => continue,
            }
        }
    }

    /// `[hh:mm|n, "hh:mm|n", ...]`
    fn throttles(&mut self) -> ParseResult<Vec<Throttle>> {
        let open = self.lexer.next_token();
        if !open.is(TokenKind::LeftBracket) {
            return Err(self.error(
                &open,
                format!("buildThrottle value expected '[', got: '{}'", open.text),
            ));
        }

        let mut throttles = Vec::new();
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::RightBracket => return Ok(throttles),
                TokenKind::Comma | TokenKind::Semicolon => continue,
                TokenKind::String => throttles.push(self.throttle(&token, &token.text)?),
                TokenKind::Number => {
                    let context = "buildThrottle value expected hh:mm|executors";
                    self.expect(TokenKind::Colon, context)?;
                    let minutes = self.expect(TokenKind::Number, context)?;
                    self.expect(TokenKind::Pipe, context)?;
                    let executors = self.expect(TokenKind::Number, context)?;
                    let literal = format!("{}:{}|{}", token.text, minutes.text, executors.text);
                    throttles.push(self.throttle(&token, &literal)?);
                }
                TokenKind::Eof => {
                    return Err(self.error(
                        &token,
                        "buildThrottle array is missing a closing bracket ']'",
                    ));
                }
                _ => {
                    return Err(self.error(
                        &token,
                        format!("expected buildThrottle value or ']', got: '{}'", token.text),
                    ));
                }
            }
        }
    }

    fn throttle(&self, token: &Token, literal: &str) -> ParseResult<Throttle> {
        let Some((time, executors)) = literal.split_once('|') else {
            return Err(self.error(
                token,
                format!("buildThrottle value expected hh:mm|executors, got: '{literal}'"),
            ));
        };

        let start = parse_time_of_day(time.trim())
            .map_err(|e| self.error(token, format!("invalid buildThrottle value, {e}")))?;
        let executors = match executors.trim().parse::<usize>() {
            Ok(n) if n >= 1 => n,
            _ => {
                return Err(self.error(
                    token,
                    format!("invalid buildThrottle value, expected executors >= 1, got: '{executors}'"),
                ));
            }
        };
        Ok(Throttle::new(start, executors))
    }

    /// `"hh:mm[:ss]"`, `hh:mm[:ss]` or `mm`.
    fn duration(&mut self, field: &str) -> ParseResult<std::time::Duration> {
        let first = self.lexer.next_token();
        match first.kind {
            TokenKind::String => parse_duration(&first.text)
                .map_err(|e| self.error(&first, format!("invalid {field} value, {e}"))),
            TokenKind::Number => {
                if !self.lexer.peek_token().is(TokenKind::Colon) {
                    return parse_duration(&first.text)
                        .map_err(|e| self.error(&first, format!("invalid {field} value, {e}")));
                }
                self.lexer.next_token();

                let minutes = self.lexer.next_token();
                if !minutes.is(TokenKind::Number) {
                    return Err(self.error(
                        &minutes,
                        format!(
                            "invalid {field} value expected mm or hh:mm, got: '{}:{}'",
                            first.text, minutes.text
                        ),
                    ));
                }
                let mut literal = format!("{}:{}", first.text, minutes.text);
                let mut last = minutes;

                if self.lexer.peek_token().is(TokenKind::Colon) {
                    self.lexer.next_token();
                    let seconds = self.lexer.next_token();
                    if !seconds.is(TokenKind::Number) {
                        return Err(self.error(
                            &seconds,
                            format!(
                                "invalid {field} value expected hh:mm:ss, got: '{literal}:{}'",
                                seconds.text
                            ),
                        ));
                    }
                    literal = format!("{literal}:{}", seconds.text);
                    last = seconds;
                }

                parse_duration(&literal)
                    .map_err(|e| self.error(&last, format!("invalid {field} value, {e}")))
            }
            _ => Err(self.error(
                &first,
                format!("invalid {field} value expected mm or hh:mm, got: '{}'", first.text),
            )),
        }
    }

    fn weight(&mut self) -> ParseResult<u32> {
        let token = self.lexer.next_token();
        if !token.is(TokenKind::Number) {
            return Err(self.error(
                &token,
                format!("invalid weight value expected number, got: '{}'", token.text),
            ));
        }
        token.text.parse().map_err(|_| {
            self.error(
                &token,
                format!("invalid weight value expected integer, got: '{}'", token.text),
            )
        })
    }

    fn opaque_value(&mut self, field: &str) -> ParseResult<SettingValue> {
        if self.lexer.peek_token().is(TokenKind::LeftBracket) {
            let (_, items) = self.array(field)?;
            return Ok(SettingValue::List(items.into_iter().map(|t| t.text).collect()));
        }

        let token = self.lexer.next_token();
        match token.kind {
            TokenKind::Identifier | TokenKind::String | TokenKind::Number => {
                Ok(SettingValue::Scalar(token.text))
            }
            _ => Err(self.error(
                &token,
                format!("expected {field} field value, got: '{}'", token.text),
            )),
        }
    }

    fn expect_colon(&mut self, owner: &str, field: &Token) -> ParseResult<()> {
        let token = self.lexer.next_token();
        if !token.is(TokenKind::Colon) {
            return Err(self.error(
                &token,
                format!(
                    "{owner} '{}' field is missing a value, expected ':', got '{}'",
                    field.text, token.text
                ),
            ));
        }
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> ParseResult<Token> {
        let token = self.lexer.next_token();
        if !token.is(kind) {
            return Err(self.error(&token, format!("{context}, got: '{}'", token.text)));
        }
        Ok(token)
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> ParseError {
        ParseError::at(self.lexer.input(), token, message)
    }
}

fn is_name(token: &Token) -> bool {
    matches!(token.kind, TokenKind::Identifier | TokenKind::String)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dag::settings::ParentFailureMode;
    use crate::time::DEFAULT_BUILD_DURATION;

    fn ids(build: &ParsedBuild) -> Vec<&str> {
        build.job_ids().collect()
    }

    fn children(build: &ParsedBuild, id: &str) -> Vec<String> {
        build.job(id).unwrap().children.iter().cloned().collect()
    }

    fn settings<'b>(build: &'b ParsedBuild, id: &str) -> &'b BuildSettings {
        &build.job(id).unwrap().settings
    }

    fn parse_err(input: &str) -> ParseError {
        parse_build_no_verify(input).unwrap_err()
    }

    fn strict_err(input: &str) -> ParseError {
        let verifier = SettingsVerifier::permissive().with_strict_mode(true);
        parse_build(input, &verifier).unwrap_err()
    }

    #[test]
    fn edge_statements_in_first_reference_order() {
        let build = parse_build_no_verify("A -> B; A -> C").unwrap();
        assert_eq!(ids(&build), vec!["A", "B", "C"]);
        assert_eq!(children(&build, "A"), vec!["B", "C"]);
        assert!(children(&build, "B").is_empty());
    }

    #[test]
    fn chains_fold_left() {
        let build = parse_build_no_verify("A -> B -> C\nC -> D").unwrap();
        assert_eq!(children(&build, "A"), vec!["B"]);
        assert_eq!(children(&build, "B"), vec!["C"]);
        assert_eq!(children(&build, "C"), vec!["D"]);
    }

    #[test]
    fn quoted_and_multiline_names() {
        let build = parse_build_no_verify("\"A\" -> \"B\"\n\n\"A\" -> C").unwrap();
        assert_eq!(ids(&build), vec!["A", "B", "C"]);
    }

    #[test]
    fn bare_identifier_declares_node() {
        let build = parse_build_no_verify("A\nB -> C").unwrap();
        assert_eq!(ids(&build), vec!["A", "B", "C"]);
        assert!(children(&build, "A").is_empty());
    }

    #[test]
    fn comments_are_ignored() {
        let build = parse_build_no_verify("///////// A -> B\nC -> D // E -> F").unwrap();
        assert_eq!(ids(&build), vec!["C", "D"]);

        let build = parse_build_no_verify("/* A -> B\nC -> D\n*/E -> F\n").unwrap();
        assert_eq!(ids(&build), vec!["E", "F"]);
    }

    #[test]
    fn self_edge_is_accepted_by_the_parser() {
        let build = parse_build_no_verify("A -> A").unwrap();
        assert_eq!(children(&build, "A"), vec!["A"]);
    }

    #[test]
    fn parses_node_settings() {
        let input = "A {\n\
                     agent: [any] \n\
                     weight: 2\n\
                     onParentFailure: BUILD\n\
                     }\n";
        let build = parse_build_no_verify(input).unwrap();
        let s = settings(&build, "A");
        assert_eq!(s.agent_names(), vec!["any"]);
        assert_eq!(s.on_parent_failure, ParentFailureMode::Build);
        assert_eq!(s.max_duration, DEFAULT_BUILD_DURATION);
        assert_eq!(s.weight, 2);
    }

    #[test]
    fn parses_arrays_and_quoted_durations() {
        let input = "A {\n\
                     agent: [\"build1\", build2] \n\
                     onParentFailure: ABORT\n\
                     maxDuration: \"00:15\"\n\
                     }";
        let build = parse_build_no_verify(input).unwrap();
        let s = settings(&build, "A");
        assert_eq!(s.agent_names(), vec!["build1", "build2"]);
        assert_eq!(s.max_duration, Duration::from_secs(15 * 60));
    }

    #[test]
    fn arrays_may_span_lines() {
        let input = "A {\nagent: [build-1,\nbuild_2\n,]\nmaxDuration: 1:20\n}";
        let build = parse_build_no_verify(input).unwrap();
        let s = settings(&build, "A");
        assert_eq!(s.agent_names(), vec!["build-1", "build_2"]);
        assert_eq!(s.max_duration, Duration::from_secs(80 * 60));
    }

    #[test]
    fn duplicate_agents_are_collapsed() {
        let build = parse_build_no_verify("A { agent: [x, y, x] }").unwrap();
        assert_eq!(settings(&build, "A").agent_names(), vec!["x", "y"]);
    }

    #[test]
    fn bare_number_duration_is_minutes() {
        let build = parse_build_no_verify("A { maxDuration: 90 }").unwrap();
        assert_eq!(settings(&build, "A").max_duration, Duration::from_secs(90 * 60));
    }

    #[test]
    fn later_blocks_override_only_mentioned_fields() {
        let input = "A {\nweight: 2\nagent: [agent1]\n}\n\nA {\nagent: [agent2]\n}\n\nA -> B";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(ids(&build), vec!["A", "B"]);
        let s = settings(&build, "A");
        assert_eq!(s.weight, 2);
        assert_eq!(s.agent_names(), vec!["agent2"]);
        assert_eq!(children(&build, "A"), vec!["B"]);
    }

    #[test]
    fn settings_list_applies_block_to_each_node() {
        let input = "A, B, C {\nweight: 2\nagent: [agent1]\n}\n\n B {\nagent: [agent2]\n}\n\nA -> B -> C";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(ids(&build), vec!["A", "B", "C"]);
        assert_eq!(settings(&build, "A").agent_names(), vec!["agent1"]);
        assert_eq!(settings(&build, "B").agent_names(), vec!["agent2"]);
        assert_eq!(settings(&build, "C").agent_names(), vec!["agent1"]);
        for id in ["A", "B", "C"] {
            assert_eq!(settings(&build, id).weight, 2, "weight of {id}");
        }
        assert_eq!(children(&build, "B"), vec!["C"]);
    }

    #[test]
    fn settings_list_merges_with_existing_settings() {
        let input = "B { onParentFailure: BUILD }\nA, B { weight: 4 }";
        let build = parse_build_no_verify(input).unwrap();
        let b = settings(&build, "B");
        assert_eq!(b.on_parent_failure, ParentFailureMode::Build);
        assert_eq!(b.weight, 4);
        assert_eq!(settings(&build, "A").on_parent_failure, ParentFailureMode::Abort);
    }

    #[test]
    fn all_block_sets_baseline() {
        let input = "_ALL {\nweight: 2\nagent: [agent1]\n}\nA {\nagent: [agent2]\n}\nA -> B";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(settings(&build, "A").weight, 2);
        assert_eq!(settings(&build, "A").agent_names(), vec!["agent2"]);
        assert_eq!(settings(&build, "B").weight, 2);
        assert_eq!(settings(&build, "B").agent_names(), vec!["agent1"]);
    }

    #[test]
    fn all_block_is_not_retroactive() {
        let input = "A {\nagent: [agent2]\n}\n_ALL {\nweight: 2\nagent: [agent1]\n}\nA -> B";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(settings(&build, "A").weight, 1);
        assert_eq!(settings(&build, "A").agent_names(), vec!["agent2"]);
        assert_eq!(settings(&build, "B").weight, 2);
        assert_eq!(settings(&build, "B").agent_names(), vec!["agent1"]);
    }

    #[test]
    fn all_block_after_chain_only_affects_new_nodes() {
        let input = "A {\nagent: [agent2]\n}\nA -> B -> C\n_ALL {\nweight: 2\nagent: [agent1]\n}\nC {\nagent: [agent3]\n}\nD";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(settings(&build, "B").weight, 1);
        assert_eq!(settings(&build, "C").weight, 1);
        assert_eq!(settings(&build, "C").agent_names(), vec!["agent3"]);
        assert_eq!(settings(&build, "D").weight, 2);
        assert_eq!(settings(&build, "D").agent_names(), vec!["agent1"]);
    }

    #[test]
    fn later_all_block_builds_on_previous_baseline() {
        let input = "_ALL{weight:2} A{agent:[x]} _ALL{weight:3} B{onParentFailure: BUILD}";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(settings(&build, "A").weight, 2);
        assert_eq!(settings(&build, "A").agent_names(), vec!["x"]);
        assert_eq!(settings(&build, "B").weight, 3);
        assert_eq!(settings(&build, "B").on_parent_failure, ParentFailureMode::Build);
    }

    #[test]
    fn build_block_sets_scheduler_settings() {
        let input = "_BUILD {\nmaxDuration: 12:15\nbuildThrottle: [12:00|5]\n}";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(
            build.scheduler_settings.max_duration,
            Duration::from_secs(12 * 3600 + 15 * 60)
        );
        assert!(build.scheduler_settings.throttles().is_empty());
        assert!(build.jobs.is_empty());
    }

    #[test]
    fn unlimited_build_duration_falls_back_to_default() {
        let build = parse_build_no_verify("_BUILD { maxDuration: \"\" }").unwrap();
        assert_eq!(build.scheduler_settings.max_duration, DEFAULT_MAX_BUILD_TIME);
    }

    #[test]
    fn pro_edition_parses_throttles() {
        let verifier = SettingsVerifier::permissive();
        let input = "_BUILD {\nbuildThrottle: [18:30|2, \"08:00|4\"]\n}";
        let build = Parser::new(input, &verifier)
            .with_edition(Edition::Pro)
            .parse()
            .unwrap();
        let throttles: Vec<_> = build
            .scheduler_settings
            .throttles()
            .iter()
            .map(|t| (t.start.format("%H:%M").to_string(), t.executors))
            .collect();
        assert_eq!(
            throttles,
            vec![("08:00".to_string(), 4), ("18:30".to_string(), 2)]
        );
    }

    #[test]
    fn pro_edition_rejects_bad_throttle() {
        let verifier = SettingsVerifier::permissive();
        let err = Parser::new("_BUILD { buildThrottle: [25:00|1] }", &verifier)
            .with_edition(Edition::Pro)
            .parse()
            .unwrap_err();
        assert!(err.message.contains("expected hours range"), "{err}");

        let err = Parser::new("_BUILD { buildThrottle: [\"10:00|0\"] }", &verifier)
            .with_edition(Edition::Pro)
            .parse()
            .unwrap_err();
        assert!(err.message.contains("executors >= 1"), "{err}");
    }

    #[test]
    fn full_pipeline_with_semicolons() {
        let input = "_BUILD {\nmaxDuration: 12:15}\n _ALL {agent: [any];weight: 3;maxDuration: 01:15;}\n\nA {agent: [agent1]maxDuration: 00:00:10}\n\nA -> B;";
        let build = parse_build_no_verify(input).unwrap();
        assert_eq!(
            build.scheduler_settings.max_duration,
            Duration::from_secs(12 * 3600 + 15 * 60)
        );
        let a = settings(&build, "A");
        assert_eq!(a.agent_names(), vec!["agent1"]);
        assert_eq!(a.max_duration, Duration::from_secs(10));
        assert_eq!(a.weight, 3);
        let b = settings(&build, "B");
        assert_eq!(b.agent_names(), vec!["any"]);
        assert_eq!(b.max_duration, Duration::from_secs(75 * 60));
    }

    #[test]
    fn unknown_settings_are_recorded_in_lenient_mode() {
        let input = "A {\nfirst: whatever\nsecond: \"whatever\"\nthird: 2.0 \nfourth: [\"a\",b]\n}";
        let build = parse_build_no_verify(input).unwrap();
        let unknown = &settings(&build, "A").unknown;
        assert_eq!(unknown.len(), 4);

        assert_eq!(unknown[0].field, "first");
        assert_eq!(unknown[0].value, SettingValue::Scalar("whatever".into()));
        assert_eq!(unknown[0].line, 2);

        assert_eq!(unknown[2].field, "third");
        assert_eq!(unknown[2].value, SettingValue::Scalar("2.0".into()));
        assert_eq!(unknown[2].line, 4);

        assert_eq!(unknown[3].field, "fourth");
        assert_eq!(
            unknown[3].value,
            SettingValue::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(unknown[3].line, 5);
    }

    #[test]
    fn unknown_settings_fail_in_strict_mode() {
        let err = strict_err("A {\nweight: 1\nagent: [any]\nunknownSetting: 2.0\n}");
        assert_eq!(err.line, 4);
        assert_eq!(
            err.message,
            "unknown setting unknownSetting, supported settings: [agent, maxDuration, onParentFailure, weight]"
        );
    }

    #[test]
    fn missing_brace_reads_next_line_as_field() {
        let err = strict_err("A {\nmaxDuration: 02:10\nA");
        assert_eq!(
            err.to_string(),
            "Line(3): unknown setting A, supported settings: [agent, maxDuration, onParentFailure, weight]"
        );
    }

    #[test]
    fn field_without_colon() {
        let err = parse_err("A {\nmaxDuration: 1:15\nweight");
        assert_eq!(
            err.to_string(),
            "Line(3): A 'weight' field is missing a value, expected ':', got ''"
        );
    }

    #[test]
    fn missing_closing_brace() {
        let err = parse_err("A {\nmaxDuration: 1:15\n");
        assert_eq!(err.to_string(), "Line(2): 'A' settings are missing a closing brace '}'");
    }

    #[test]
    fn value_on_next_line_is_an_error() {
        assert_eq!(parse_err("A {\nagent: \n[any]\n}\n").line, 2);
        assert_eq!(parse_err("A {\nagent: \nweight: 2\n}").line, 2);
    }

    #[test]
    fn unclosed_array_reports_line_of_brace() {
        let err = parse_err("A {\nweight: 2\nagent: [build-1\n}");
        assert_eq!(err.line, 4);
        assert_eq!(err.column, 1);
    }

    #[test]
    fn invalid_clock_duration() {
        let err = parse_err("A {\nmaxDuration: 12:\n}");
        assert_eq!(
            err.to_string(),
            "Line(2): invalid maxDuration value expected mm or hh:mm, got: '12:\\n'"
        );
    }

    #[test]
    fn invalid_minutes_duration() {
        let err = parse_err("A {\nmaxDuration: 12.0\n}");
        assert_eq!(
            err.to_string(),
            "Line(2): invalid maxDuration value, '12.0' is not a valid duration (expected mm)"
        );
    }

    #[test]
    fn out_of_range_duration_minutes() {
        let err = parse_err("A { maxDuration: 1:75 }");
        assert!(err.message.contains("minutes range"), "{err}");
    }

    #[test]
    fn weight_must_be_a_non_negative_integer() {
        assert!(parse_err("A { weight: 1.5 }").message.contains("expected integer"));
        assert!(parse_err("A { weight: -1 }").message.contains("expected number"));
    }

    #[test]
    fn on_parent_failure_must_be_known_mode() {
        let err = parse_err("A { onParentFailure: MAYBE }");
        assert!(err.message.contains("unknown onParentFailure mode"), "{err}");
    }

    #[test]
    fn malformed_statements() {
        parse_err("A -> -> B");
        parse_err("A -> B D");
        parse_err("-> A -> B");
        parse_err("A -> B -> \nC");
        parse_err("A, -> B");
    }

    #[test]
    fn reserved_names_cannot_be_nodes() {
        let err = parse_err("A -> _ALL");
        assert!(err.message.contains("reserved"), "{err}");
        assert!(parse_err("_BUILD").message.contains("expected '{' after _BUILD"));
    }

    #[test]
    fn errors_carry_columns() {
        let err = parse_err("A -> B\nC -> #");
        assert_eq!((err.line, err.column), (2, 6));
        assert_eq!(err.message, "expected build node identifier, got: '#'");
    }

    #[test]
    fn unknown_nodes_are_reported_with_suggestions() {
        let verifier = SettingsVerifier::new(["A", "B"], ["linux"]);
        let err = parse_build("A -> X", &verifier).unwrap_err();
        assert_eq!(
            err.message,
            "build node 'X' does not exist, possible options [A, B]"
        );
        assert_eq!(err.column, 6);
    }

    #[test]
    fn suggestions_are_capped() {
        let nodes: Vec<String> = (0..12).map(|i| format!("n{i:02}")).collect();
        let verifier = SettingsVerifier::new(nodes, Vec::<String>::new());
        let err = parse_build("missing", &verifier).unwrap_err();
        assert!(err.message.ends_with("n09, etc...]"), "{}", err.message);
        assert!(!err.message.contains("n10"));
    }

    #[test]
    fn unknown_agents_are_dropped() {
        let verifier = SettingsVerifier::new(["A"], ["linux"]);
        let build = parse_build("A { agent: [linux, windows] }", &verifier).unwrap();
        assert_eq!(settings(&build, "A").agent_names(), vec!["linux"]);
    }

    #[test]
    fn no_valid_agent_is_an_error() {
        let verifier = SettingsVerifier::new(["A"], ["linux"]);
        let err = parse_build("A { agent: [windows] }", &verifier).unwrap_err();
        assert_eq!(
            err.message,
            "no valid agent found, expected: [any, linux], found: [windows]"
        );
    }

    #[test]
    fn parsing_is_repeatable() {
        let input = "_ALL { weight: 2 }\nA -> B -> C\nB { agent: [x] }";
        assert_eq!(
            parse_build_no_verify(input).unwrap(),
            parse_build_no_verify(input).unwrap()
        );
    }
}
