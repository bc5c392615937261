use crate::error::{Result, TreeError, WorkspaceError};
use crate::node::{Kind, NodeId};
use crate::store::TreeStore;
use std::path::Path;
use std::time::{Duration, Instant};

/// Replay script format
///
/// A plain text file, one step per line. Nodes are addressed by path, `/`
/// meaning the root level:
/// - `create:<kind>:<parent>:<name>` - create a named file or folder
/// - `rename:<path>:<name>` - rename a node (an empty name cancels)
/// - `remove:<path>` - delete a node and its subtree
/// - `move:<path>:<parent>` - reparent a node
/// - `expect:<error>` - the next mutation must fail with this error
///   (`not_found`, `invalid_parent`, `invalid_target`, `duplicate_name`,
///   `invalid_name`)
/// - `assert:exists:<path>` / `assert:missing:<path>`
/// - `assert:count:<n>` - total number of nodes
/// - `assert:children:<parent>:<a,b,c>` - child names in order
/// - `# comment`
///
/// Example:
/// ```text
/// create:folder:/:src
/// create:file:src:a.ts
/// rename:src:app
/// assert:exists:app/a.ts
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Create {
        kind: Kind,
        parent: Option<String>,
        name: String,
    },
    Rename {
        path: String,
        name: String,
    },
    Remove {
        path: String,
    },
    Move {
        path: String,
        parent: Option<String>,
    },
    Expect(String),
    Assert(Assertion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    Exists(String),
    Missing(String),
    Count(usize),
    Children {
        parent: Option<String>,
        names: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub step: Step,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<ScriptLine>,
}

const ERROR_KINDS: &[&str] = &[
    "not_found",
    "invalid_parent",
    "invalid_target",
    "duplicate_name",
    "duplicate_id",
    "invalid_name",
];

fn parse_parent(s: &str) -> Option<String> {
    match s {
        "" | "/" => None,
        other => Some(other.to_string()),
    }
}

impl Script {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_string(&content)
    }

    pub fn from_string(content: &str) -> Result<Self> {
        let mut lines = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step = Self::parse_step(line).map_err(|message| WorkspaceError::Script {
                line: index + 1,
                message,
            })?;
            lines.push(ScriptLine {
                line: index + 1,
                step,
            });
        }

        Ok(Self { lines })
    }

    fn parse_step(line: &str) -> std::result::Result<Step, String> {
        let (verb, rest) = line
            .split_once(':')
            .ok_or_else(|| format!("Invalid step: {}", line))?;

        match verb {
            "create" => {
                let mut parts = rest.splitn(3, ':');
                let kind = parts.next().unwrap_or("").parse::<Kind>()?;
                let parent = parts
                    .next()
                    .ok_or_else(|| "Expected create:<kind>:<parent>:<name>".to_string())?;
                let name = parts
                    .next()
                    .ok_or_else(|| "Expected create:<kind>:<parent>:<name>".to_string())?;
                Ok(Step::Create {
                    kind,
                    parent: parse_parent(parent),
                    name: name.to_string(),
                })
            }
            "rename" => {
                let (path, name) = rest
                    .split_once(':')
                    .ok_or_else(|| "Expected rename:<path>:<name>".to_string())?;
                Ok(Step::Rename {
                    path: path.to_string(),
                    name: name.to_string(),
                })
            }
            "remove" | "delete" => Ok(Step::Remove {
                path: rest.to_string(),
            }),
            "move" => {
                let (path, parent) = rest
                    .split_once(':')
                    .ok_or_else(|| "Expected move:<path>:<parent>".to_string())?;
                Ok(Step::Move {
                    path: path.to_string(),
                    parent: parse_parent(parent),
                })
            }
            "expect" => {
                if ERROR_KINDS.contains(&rest) {
                    Ok(Step::Expect(rest.to_string()))
                } else {
                    Err(format!("Unknown error kind: {}", rest))
                }
            }
            "assert" => Self::parse_assertion(rest).map(Step::Assert),
            _ => Err(format!("Invalid step: {}", line)),
        }
    }

    fn parse_assertion(rest: &str) -> std::result::Result<Assertion, String> {
        let (property, value) = rest
            .split_once(':')
            .ok_or_else(|| format!("Expected assert:<property>:<value>, got '{}'", rest))?;
        match property {
            "exists" => Ok(Assertion::Exists(value.to_string())),
            "missing" => Ok(Assertion::Missing(value.to_string())),
            "count" => value
                .parse()
                .map(Assertion::Count)
                .map_err(|e| format!("Invalid count '{}': {}", value, e)),
            "children" => {
                let (parent, names) = value.split_once(':').unwrap_or((value, ""));
                let names = names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok(Assertion::Children {
                    parent: parse_parent(parent),
                    names,
                })
            }
            _ => Err(format!("Unknown assertion: {}", property)),
        }
    }
}

/// Why a mutation step did not go through
#[derive(Debug)]
enum StepError {
    UnknownPath(String),
    Tree(TreeError),
}

impl StepError {
    fn kind(&self) -> &'static str {
        match self {
            StepError::UnknownPath(_) => "not_found",
            StepError::Tree(error) => error.kind(),
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::UnknownPath(path) => write!(f, "no node at '{}'", path),
            StepError::Tree(error) => write!(f, "{}", error),
        }
    }
}

impl From<TreeError> for StepError {
    fn from(error: TreeError) -> Self {
        StepError::Tree(error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub mutations_committed: usize,
    pub rejections_expected: usize,
    pub assertions_passed: usize,
    pub failures: Vec<String>,
    pub duration: Duration,
}

impl ReplayReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} mutations, {} expected rejections, {} assertions passed, {} failures in {:?}",
            self.mutations_committed,
            self.rejections_expected,
            self.assertions_passed,
            self.failures.len(),
            self.duration
        );
        for failure in &self.failures {
            out.push_str("\n  - ");
            out.push_str(failure);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    pub script: Script,
    pub stop_on_failure: bool,
}

impl ScriptRunner {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            stop_on_failure: false,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Script::from_file(path).map(Self::new)
    }

    pub fn from_string(content: &str) -> Result<Self> {
        Script::from_string(content).map(Self::new)
    }

    /// Run every step against `store`
    pub fn run(&self, store: &mut TreeStore) -> ReplayReport {
        let start_time = Instant::now();
        let mut report = ReplayReport::default();
        let mut expected: Option<&str> = None;

        log::info!("replay: running {} steps", self.script.lines.len());

        for ScriptLine { line, step } in &self.script.lines {
            log::debug!("replay: line {}: {:?}", line, step);
            let failures_before = report.failures.len();

            match step {
                Step::Expect(kind) => expected = Some(kind.as_str()),
                Step::Assert(assertion) => match Self::check(store, assertion) {
                    Ok(()) => report.assertions_passed += 1,
                    Err(message) => report.failures.push(format!("line {}: {}", line, message)),
                },
                mutation => {
                    let result = Self::execute(store, mutation);
                    match (expected.take(), result) {
                        (None, Ok(())) => report.mutations_committed += 1,
                        (None, Err(error)) => {
                            report.failures.push(format!("line {}: {}", line, error))
                        }
                        (Some(kind), Err(error)) if error.kind() == kind => {
                            report.rejections_expected += 1
                        }
                        (Some(kind), Err(error)) => report.failures.push(format!(
                            "line {}: expected {}, got {}",
                            line,
                            kind,
                            error.kind()
                        )),
                        (Some(kind), Ok(())) => report.failures.push(format!(
                            "line {}: expected {}, but the step succeeded",
                            line, kind
                        )),
                    }
                }
            }

            if self.stop_on_failure && report.failures.len() > failures_before {
                log::warn!("replay: stopping at line {}", line);
                break;
            }
        }

        report.duration = start_time.elapsed();
        log::info!("replay: {}", report.summary());
        report
    }

    fn resolve(store: &TreeStore, path: &str) -> std::result::Result<NodeId, StepError> {
        store
            .find_by_path(path)
            .map(|node| node.id)
            .ok_or_else(|| StepError::UnknownPath(path.to_string()))
    }

    fn resolve_parent(
        store: &TreeStore,
        parent: &Option<String>,
    ) -> std::result::Result<Option<NodeId>, StepError> {
        parent
            .as_deref()
            .map(|path| Self::resolve(store, path))
            .transpose()
    }

    fn execute(store: &mut TreeStore, step: &Step) -> std::result::Result<(), StepError> {
        match step {
            Step::Create { kind, parent, name } => {
                let parent = Self::resolve_parent(store, parent)?;
                store.create_named(parent, *kind, name)?;
            }
            Step::Rename { path, name } => {
                let id = Self::resolve(store, path)?;
                store.rename(id, name)?;
            }
            Step::Remove { path } => {
                let id = Self::resolve(store, path)?;
                store.remove(id)?;
            }
            Step::Move { path, parent } => {
                let id = Self::resolve(store, path)?;
                let parent = Self::resolve_parent(store, parent)?;
                store.move_node(id, parent)?;
            }
            Step::Expect(_) | Step::Assert(_) => {}
        }
        Ok(())
    }

    fn check(store: &TreeStore, assertion: &Assertion) -> std::result::Result<(), String> {
        match assertion {
            Assertion::Exists(path) => store
                .find_by_path(path)
                .map(|_| ())
                .ok_or_else(|| format!("expected '{}' to exist", path)),
            Assertion::Missing(path) => match store.find_by_path(path) {
                None => Ok(()),
                Some(_) => Err(format!("expected '{}' to be missing", path)),
            },
            Assertion::Count(expected) => {
                let actual = store.len();
                if actual == *expected {
                    Ok(())
                } else {
                    Err(format!("expected {} nodes, found {}", expected, actual))
                }
            }
            Assertion::Children { parent, names } => {
                let children = match parent {
                    None => store.forest().roots(),
                    Some(path) => store
                        .find_by_path(path)
                        .map(|node| node.children())
                        .ok_or_else(|| format!("no node at '{}'", path))?,
                };
                let actual: Vec<&str> = children.iter().map(|n| n.name.as_str()).collect();
                if actual == *names {
                    Ok(())
                } else {
                    Err(format!("expected children {:?}, found {:?}", names, actual))
                }
            }
        }
    }
}
