use crate::{
    error::BuildError,
    types::{HashSet, IndexMap},
};
use rustc_hash::FxBuildHasher;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Receiver of the three events a parse pass emits, in file order.
pub trait RuleSink {
    /// A rule header declared `target`.
    fn on_new_target(&mut self, target: &str);
    /// `dependency` was appended to `target`'s dependency list.
    fn on_new_dependency(&mut self, target: &str, dependency: &str);
    /// `command` was appended to `target`'s command list.
    fn on_new_command(&mut self, target: &str, command: &str);
}

#[derive(Debug, Default)]
struct ParsedRule {
    dependencies: Vec<String>,
    commands: Vec<String>,
}

/// Reads the build file at `path` and reports the rules needed for `goals`
/// to `sink`.
///
/// With no goals the first declared target is the goal. Only rules reachable
/// from the goals through rule-type dependencies are reported.
///
/// # Errors
/// The file cannot be read, is malformed, or a goal names no rule.
pub fn parse_build_file(
    path: &Path,
    goals: &[String],
    sink: &mut impl RuleSink,
) -> Result<(), BuildError> {
    let source = fs::read_to_string(path).map_err(|source| BuildError::BuildFileUnreadable {
        path: path.to_owned(),
        source,
    })?;
    parse_str(&source, path, goals, sink)
}

/// Same as [`parse_build_file`] over already-loaded `source`; `path` is used
/// for error messages only.
///
/// # Errors
/// The source is malformed, or a goal names no rule.
pub fn parse_str(
    source: &str,
    path: &Path,
    goals: &[String],
    sink: &mut impl RuleSink,
) -> Result<(), BuildError> {
    let rules = parse_rules(source, path)?;
    let selected = select_reachable(&rules, goals)?;
    debug!(
        declared = rules.len(),
        selected = selected.len(),
        "parsed build file"
    );
    for (target, rule) in &rules {
        if !selected.contains(target.as_str()) {
            continue;
        }
        sink.on_new_target(target);
        for dependency in &rule.dependencies {
            sink.on_new_dependency(target, dependency);
        }
        for command in &rule.commands {
            sink.on_new_command(target, command);
        }
    }
    Ok(())
}

fn parse_rules(source: &str, path: &Path) -> Result<IndexMap<String, ParsedRule>, BuildError> {
    let error = |line: usize, message: &str| BuildError::Parse {
        path: PathBuf::from(path),
        line,
        message: message.to_owned(),
    };

    let mut rules: IndexMap<String, ParsedRule> = IndexMap::with_hasher(FxBuildHasher);
    let mut current: Vec<String> = Vec::new();

    for (line_no, line) in logical_lines(source) {
        if let Some(command) = line.strip_prefix('\t') {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            if current.is_empty() {
                return Err(error(line_no, "command before first rule"));
            }
            for target in &current {
                rules[target.as_str()].commands.push(command.to_owned());
            }
            continue;
        }

        let line = line.split_once('#').map_or(line.as_str(), |(head, _)| head);
        if line.trim().is_empty() {
            continue;
        }
        let Some((targets, dependencies)) = line.split_once(':') else {
            return Err(error(line_no, "expected `target: dependencies`"));
        };
        if dependencies.starts_with(':') {
            return Err(error(line_no, "double-colon rules are not supported"));
        }
        let targets: Vec<String> = targets.split_whitespace().map(str::to_owned).collect();
        if targets.is_empty() {
            return Err(error(line_no, "rule has no target name"));
        }
        for target in &targets {
            rules
                .entry(target.clone())
                .or_default()
                .dependencies
                .extend(dependencies.split_whitespace().map(str::to_owned));
        }
        current = targets;
    }
    Ok(rules)
}

/// Joins backslash-continued lines, yielding each logical line with the
/// 1-based number of its first physical line.
fn logical_lines(source: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    for (idx, raw) in source.lines().enumerate() {
        let (start, mut text) = match pending.take() {
            Some((start, mut text)) => {
                text.push(' ');
                text.push_str(raw.trim_start());
                (start, text)
            }
            None => (idx + 1, raw.to_owned()),
        };
        if text.ends_with('\\') {
            text.pop();
            pending = Some((start, text));
        } else {
            lines.push((start, text));
        }
    }
    lines.extend(pending);
    lines
}

fn select_reachable<'a>(
    rules: &'a IndexMap<String, ParsedRule>,
    goals: &'a [String],
) -> Result<HashSet<&'a str>, BuildError> {
    let mut stack: Vec<&str> = if goals.is_empty() {
        rules.keys().take(1).map(String::as_str).collect()
    } else {
        goals
            .iter()
            .map(|goal| match rules.get_key_value(goal.as_str()) {
                Some((target, _)) => Ok(target.as_str()),
                None => Err(BuildError::UnknownTarget(goal.clone())),
            })
            .collect::<Result<_, _>>()?
    };

    let mut selected = HashSet::with_capacity_and_hasher(rules.len(), FxBuildHasher);
    while let Some(target) = stack.pop() {
        if !selected.insert(target) {
            continue;
        }
        stack.extend(
            rules[target]
                .dependencies
                .iter()
                .filter_map(|dependency| rules.get_key_value(dependency.as_str()))
                .map(|(name, _)| name.as_str()),
        );
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Events(Vec<String>);

    impl RuleSink for Events {
        fn on_new_target(&mut self, target: &str) {
            self.0.push(format!("target {target}"));
        }

        fn on_new_dependency(&mut self, target: &str, dependency: &str) {
            self.0.push(format!("dep {target} {dependency}"));
        }

        fn on_new_command(&mut self, target: &str, command: &str) {
            self.0.push(format!("cmd {target} {command}"));
        }
    }

    fn parse(source: &str, goals: &[&str]) -> Result<Vec<String>, BuildError> {
        let goals: Vec<String> = goals.iter().map(|goal| (*goal).to_owned()).collect();
        let mut events = Events::default();
        parse_str(source, Path::new("makefile"), &goals, &mut events)?;
        Ok(events.0)
    }

    const SOURCE: &str = "\
# top comment
all: foo bar   # trailing comment

foo: foo.c
\tcc -c foo.c
\tcc -o foo foo.o

bar:
\techo bar

unused: all
\tfalse
";

    #[test]
    fn default_goal_is_first_target_and_its_closure() {
        let events = parse(SOURCE, &[]).unwrap();
        assert_eq!(
            events,
            [
                "target all",
                "dep all foo",
                "dep all bar",
                "target foo",
                "dep foo foo.c",
                "cmd foo cc -c foo.c",
                "cmd foo cc -o foo foo.o",
                "target bar",
                "cmd bar echo bar",
            ]
        );
    }

    #[test]
    fn explicit_goals_select_their_closure_only() {
        let events = parse(SOURCE, &["bar"]).unwrap();
        assert_eq!(events, ["target bar", "cmd bar echo bar"]);
    }

    #[test]
    fn unknown_goal_is_rejected() {
        let err = parse(SOURCE, &["nope"]).unwrap_err();
        assert!(matches!(err, BuildError::UnknownTarget(goal) if goal == "nope"));
    }

    #[test]
    fn continuation_lines_are_joined() {
        let events = parse("all: a \\\n  b\n", &[]).unwrap();
        assert_eq!(events, ["target all", "dep all a", "dep all b"]);
    }

    #[test]
    fn repeated_headers_merge_and_multi_target_headers_fan_out() {
        let events = parse("x y: d1\n\ttouch $@\nx: d2\n", &["x", "y"]).unwrap();
        assert_eq!(
            events,
            [
                "target x",
                "dep x d1",
                "dep x d2",
                "cmd x touch $@",
                "target y",
                "dep y d1",
                "cmd y touch $@",
            ]
        );
    }

    #[test]
    fn command_before_rule_reports_line() {
        let err = parse("\n\techo hi\n", &[]).unwrap_err();
        assert!(matches!(err, BuildError::Parse { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn header_without_colon_is_rejected() {
        let err = parse("all: a\nCC = cc\n", &[]).unwrap_err();
        assert!(matches!(err, BuildError::Parse { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn double_colon_header_is_rejected() {
        let err = parse("all: a\na:: b\n\ttrue\n", &[]).unwrap_err();
        assert!(
            matches!(&err, BuildError::Parse { line: 2, message, .. } if message.contains("double-colon")),
            "{err:?}"
        );
    }

    #[test]
    fn empty_file_has_nothing_to_build() {
        assert!(parse("# nothing\n", &[]).unwrap().is_empty());
    }
}
