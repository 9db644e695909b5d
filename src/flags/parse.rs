//! Command-line parsing of declared flags with the clap builder API.

use super::{FlagKind, FlagSpec, FlagValue, Registrar};
use crate::error::RunnerError;
use clap::error::ErrorKind;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;

const POSITIONAL_ID: &str = "__positional";

/// A flag together with the value it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFlag {
    pub name: String,
    pub full_name: String,
    pub value: FlagValue,
    /// Whether the value came from the command line rather than the default.
    pub explicit: bool,
}

/// Result of parsing the command line.
#[derive(Debug, Clone, Default)]
pub struct ParsedFlags {
    /// One entry per declared flag, in declaration order.
    pub flags: Vec<ResolvedFlag>,
    /// Arguments left after the flags.
    pub positional: Vec<String>,
}

impl ParsedFlags {
    /// Resolved value of the flag with short name `name`.
    pub fn value(&self, name: &str) -> Option<&FlagValue> {
        self.flags
            .iter()
            .find(|flag| flag.name == name)
            .map(|flag| &flag.value)
    }

    /// Resolved value of a string flag; empty when unset or not a string.
    pub fn string(&self, name: &str) -> &str {
        match self.value(name) {
            Some(FlagValue::String(v)) => v.as_str(),
            _ => "",
        }
    }
}

/// Rewrite `-name` and `-name=value` into the double-dash form clap expects.
///
/// Only declared names are rewritten, so values such as `-12` are left alone.
/// Rewriting stops at a bare `--` or at the first positional argument; every
/// later token is passed through untouched.
pub fn normalize_args<I, T>(args: I, registrar: &Registrar) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut normalized: Vec<OsString> = args.next().into_iter().collect();
    let mut passthrough = false;
    let mut value_pending = false;
    for arg in args {
        if passthrough || value_pending {
            value_pending = false;
            normalized.push(arg);
            continue;
        }
        let rewritten = match arg.to_str() {
            Some("--") => {
                passthrough = true;
                None
            }
            Some("-help") if !registrar.contains("help") => Some(OsString::from("--help")),
            Some(text) if text.starts_with('-') && text.len() > 1 => {
                let body = text.trim_start_matches('-');
                let (name, inline_value) = match body.split_once('=') {
                    Some((name, _)) => (name, true),
                    None => (body, false),
                };
                if registrar.contains(name) {
                    value_pending = !inline_value;
                    if text.starts_with("--") {
                        None
                    } else {
                        Some(OsString::from(format!("-{}", text)))
                    }
                } else {
                    None
                }
            }
            _ => {
                passthrough = true;
                None
            }
        };
        normalized.push(rewritten.unwrap_or(arg));
    }
    normalized
}

fn build_command(program: &str, registrar: &Registrar) -> Command {
    let mut command = Command::new(program.to_string());
    if registrar.contains("help") {
        command = command.disable_help_flag(true);
    }
    for spec in registrar.specs() {
        command = command.arg(build_arg(spec));
    }
    command.arg(
        Arg::new(POSITIONAL_ID)
            .num_args(0..)
            .action(ArgAction::Append)
            .trailing_var_arg(true)
            .hide(true),
    )
}

fn build_arg(spec: &FlagSpec) -> Arg {
    let kind = spec.kind();
    let arg = Arg::new(spec.name.clone())
        .long(spec.name.clone())
        .help(format!("{} (default: {:?})", spec.description, spec.default.to_string()))
        .value_name(kind.value_name())
        .num_args(1)
        .action(ArgAction::Set)
        .allow_negative_numbers(kind.is_signed());
    match kind {
        FlagKind::String => arg.value_parser(value_parser!(String)),
        FlagKind::Int => arg.value_parser(value_parser!(i64)),
        FlagKind::Uint | FlagKind::Seconds | FlagKind::Milliseconds => {
            arg.value_parser(value_parser!(u64))
        }
        FlagKind::Float32 => arg.value_parser(value_parser!(f32)),
        FlagKind::Float64 => arg.value_parser(value_parser!(f64)),
    }
}

fn resolve(spec: &FlagSpec, matches: &ArgMatches) -> Option<FlagValue> {
    let id = spec.name.as_str();
    let parsed = match spec.kind() {
        FlagKind::String => matches.get_one::<String>(id).cloned().map(FlagValue::String),
        FlagKind::Int => matches.get_one::<i64>(id).copied().map(FlagValue::Int),
        FlagKind::Uint => matches.get_one::<u64>(id).copied().map(FlagValue::Uint),
        FlagKind::Float32 => matches.get_one::<f32>(id).copied().map(FlagValue::Float32),
        FlagKind::Float64 => matches.get_one::<f64>(id).copied().map(FlagValue::Float64),
        FlagKind::Seconds => matches.get_one::<u64>(id).copied().map(FlagValue::Seconds),
        FlagKind::Milliseconds => matches
            .get_one::<u64>(id)
            .copied()
            .map(FlagValue::Milliseconds),
    };
    parsed
}

/// Parse `args` (program name first) against the declared flags.
pub fn parse_args<I, T>(registrar: &Registrar, args: I) -> Result<ParsedFlags, RunnerError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = normalize_args(args, registrar);
    let program = args
        .first()
        .and_then(|arg| arg.to_str())
        .unwrap_or("gsrunner")
        .to_string();
    let matches = build_command(&program, registrar)
        .try_get_matches_from(args)
        .map_err(|e| match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                RunnerError::Help(e.render().to_string())
            }
            _ => RunnerError::Flag(e.render().to_string()),
        })?;

    let flags = registrar
        .specs()
        .iter()
        .map(|spec| {
            let parsed = resolve(spec, &matches);
            ResolvedFlag {
                name: spec.name.clone(),
                full_name: spec.full_name.clone(),
                explicit: parsed.is_some(),
                value: parsed.unwrap_or_else(|| spec.default.clone()),
            }
        })
        .collect();
    let positional = matches
        .get_many::<String>(POSITIONAL_ID)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    Ok(ParsedFlags { flags, positional })
}
