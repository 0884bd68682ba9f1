//! The regex engine vtable (spec §9 "at least two backing regex engines
//! behind one interface"), grounded in `libsee/regex.h`'s `SEE_regex_engine`
//! struct of function pointers: `parse`, `count_captures`, `get_flags`,
//! `match_at`. Registered engines are looked up by name so a host can
//! choose one at a `RegExp` literal's compile site (spec §6).

use crate::{
    exception::{RunError, RunResult},
    interp::Interpreter,
};

bitflags::bitflags! {
    /// ECMAScript `RegExp` flags, ed.3 §15.10.7.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegexFlags: u8 {
        const GLOBAL     = 0b001;
        const IGNORECASE = 0b010;
        const MULTILINE  = 0b100;
    }
}

/// One match attempt's result: the overall match plus each capture group,
/// `None` for a group that didn't participate.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub start: usize,
    pub end: usize,
    pub groups: Vec<Option<(usize, usize)>>,
}

/// A compiled pattern, opaque to callers beyond the operations the VM
/// actually needs.
pub trait CompiledRegex: std::fmt::Debug {
    fn count_captures(&self) -> usize;
    fn flags(&self) -> RegexFlags;
    fn match_at(&self, haystack: &str, start: usize) -> RunResult<Option<MatchResult>>;
}

/// An installable regex backend. `parse` compiles a pattern/flags pair;
/// everything else is a method on the result, matching the source's
/// `engine->parse` / `engine->match` split.
pub trait RegexEngine: std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn parse(&self, pattern: &str, flags: RegexFlags) -> RunResult<Box<dyn CompiledRegex>>;
}

#[derive(Debug)]
struct StdRegexEngine;

#[derive(Debug)]
struct StdCompiled {
    inner: regex::Regex,
    flags: RegexFlags,
}

impl CompiledRegex for StdCompiled {
    fn count_captures(&self) -> usize {
        self.inner.captures_len().saturating_sub(1)
    }
    fn flags(&self) -> RegexFlags {
        self.flags
    }
    fn match_at(&self, haystack: &str, start: usize) -> RunResult<Option<MatchResult>> {
        let Some(start_byte) = char_to_byte_offset(haystack, start) else {
            return Ok(None);
        };
        let Some(caps) = self.inner.captures_at(haystack, start_byte) else {
            return Ok(None);
        };
        let m = caps.get(0).expect("group 0 always present on a match");
        let groups = (1..caps.len())
            .map(|i| caps.get(i).map(|g| (byte_to_char_offset(haystack, g.start()), byte_to_char_offset(haystack, g.end()))))
            .collect();
        Ok(Some(MatchResult {
            start: byte_to_char_offset(haystack, m.start()),
            end: byte_to_char_offset(haystack, m.end()),
            groups,
        }))
    }
}

impl RegexEngine for StdRegexEngine {
    fn name(&self) -> &'static str {
        "std"
    }
    fn parse(&self, pattern: &str, flags: RegexFlags) -> RunResult<Box<dyn CompiledRegex>> {
        let mut builder = regex::RegexBuilder::new(pattern);
        builder.case_insensitive(flags.contains(RegexFlags::IGNORECASE));
        builder.multi_line(flags.contains(RegexFlags::MULTILINE));
        let inner = builder.build().map_err(|e| RunError::throw(crate::value::Value::String(format!("invalid regular expression: {e}").into())))?;
        Ok(Box::new(StdCompiled { inner, flags }))
    }
}

/// Covers lookaround/backreferences the `regex` crate's linear-time engine
/// can't express, at the cost of potential backtracking blowup -- the
/// second engine slot spec §9 calls for.
#[derive(Debug)]
struct FancyRegexEngine;

#[derive(Debug)]
struct FancyCompiled {
    inner: fancy_regex::Regex,
    flags: RegexFlags,
}

impl CompiledRegex for FancyCompiled {
    fn count_captures(&self) -> usize {
        self.inner.captures_len().saturating_sub(1)
    }
    fn flags(&self) -> RegexFlags {
        self.flags
    }
    fn match_at(&self, haystack: &str, start: usize) -> RunResult<Option<MatchResult>> {
        let Some(start_byte) = char_to_byte_offset(haystack, start) else {
            return Ok(None);
        };
        let found = self
            .inner
            .captures_from_pos(haystack, start_byte)
            .map_err(|e| RunError::throw(crate::value::Value::String(format!("regex match failed: {e}").into())))?;
        let Some(caps) = found else {
            return Ok(None);
        };
        let m = caps.get(0).expect("group 0 always present on a match");
        let groups = (1..caps.len())
            .map(|i| caps.get(i).map(|g| (byte_to_char_offset(haystack, g.start()), byte_to_char_offset(haystack, g.end()))))
            .collect();
        Ok(Some(MatchResult {
            start: byte_to_char_offset(haystack, m.start()),
            end: byte_to_char_offset(haystack, m.end()),
            groups,
        }))
    }
}

impl RegexEngine for FancyRegexEngine {
    fn name(&self) -> &'static str {
        "fancy"
    }
    fn parse(&self, pattern: &str, flags: RegexFlags) -> RunResult<Box<dyn CompiledRegex>> {
        let mut opts = String::new();
        if flags.contains(RegexFlags::IGNORECASE) {
            opts.push('i');
        }
        if flags.contains(RegexFlags::MULTILINE) {
            opts.push('m');
        }
        let full = if opts.is_empty() { pattern.to_string() } else { format!("(?{opts}){pattern}") };
        let inner = fancy_regex::Regex::new(&full).map_err(|e| RunError::throw(crate::value::Value::String(format!("invalid regular expression: {e}").into())))?;
        Ok(Box::new(FancyCompiled { inner, flags }))
    }
}

fn char_to_byte_offset(s: &str, char_idx: usize) -> Option<usize> {
    s.char_indices().nth(char_idx).map(|(b, _)| b).or_else(|| if char_idx == s.chars().count() { Some(s.len()) } else { None })
}

fn byte_to_char_offset(s: &str, byte_idx: usize) -> usize {
    s[..byte_idx].chars().count()
}

/// Engines registered by name; the default engine is used when a `RegExp`
/// literal doesn't request one explicitly.
pub struct RegexRegistry {
    engines: Vec<Box<dyn RegexEngine>>,
    default_index: usize,
}

impl std::fmt::Debug for RegexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexRegistry").field("engines", &self.engines.iter().map(|e| e.name()).collect::<Vec<_>>()).finish()
    }
}

impl RegexRegistry {
    pub fn with_defaults() -> Self {
        Self {
            engines: vec![Box::new(StdRegexEngine), Box::new(FancyRegexEngine)],
            default_index: 0,
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn RegexEngine> {
        self.engines.iter().find(|e| e.name() == name).map(std::convert::AsRef::as_ref)
    }

    pub fn default_engine(&self) -> &dyn RegexEngine {
        self.engines[self.default_index].as_ref()
    }

    pub fn register(&mut self, engine: Box<dyn RegexEngine>) {
        self.engines.push(engine);
    }
}

/// Compiles `pattern`/`flags` with the interpreter's default regex engine,
/// the common case a `RegExp` literal or `new RegExp(...)` call takes.
pub fn compile_default(interp: &mut Interpreter, pattern: &str, flags: RegexFlags) -> RunResult<Box<dyn CompiledRegex>> {
    interp.regex.default_engine().parse(pattern, flags)
}
