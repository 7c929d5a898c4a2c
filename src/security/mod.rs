pub mod validator;

pub use validator::{CommandValidator, ValidatedCommand, ValidationError};

/// Allowlist of permitted base executables and their argument-prefix patterns
///
/// An executable mapped to an empty pattern set is allowed with any
/// arguments; that tier is reserved for read-only utilities that cannot
/// modify state no matter how they are invoked. Every other executable
/// requires its argument string to start with one of the listed prefixes.
///
/// This table is shared by the CommandValidator and the ProcessSandbox
/// (which re-validates before spawning) to ensure consistency.
/// Adding a new executable or prefix requires careful security review.
pub const DEFAULT_ALLOWLIST: &[(&str, &[&str])] = &[
    // Zero-risk read-only utilities
    ("ls", &[]),
    ("pwd", &[]),
    ("cat", &[]),
    ("head", &[]),
    ("tail", &[]),
    ("wc", &[]),
    ("grep", &[]),
    ("which", &[]),
    ("whoami", &[]),
    ("date", &[]),
    ("echo", &[]),
    ("sleep", &[]),
    // Version control
    (
        "git",
        &[
            "status",
            "log",
            "show",
            "diff",
            "branch",
            "tag",
            "remote",
            "blame",
            "describe",
            "rev-parse",
            "ls-files",
            "add",
            "commit",
            "checkout",
            "switch",
            "restore",
            "stash",
            "push",
            "pull",
            "fetch",
            "config --get",
            "config --list",
        ],
    ),
    // Build and test toolchains
    (
        "cargo",
        &["build", "check", "test", "fmt", "clippy", "run", "doc", "--version"],
    ),
    (
        "npm",
        &["install", "ci", "test", "run", "ls", "audit", "--version"],
    ),
    ("npx", &["tsc", "eslint", "jest", "vitest", "prettier"]),
    ("node", &["--version", "-v"]),
    ("python3", &["--version", "-V", "-m pytest", "-m unittest"]),
    ("go", &["build", "test", "vet", "version"]),
    ("rustc", &["--version"]),
];

/// Denylist of unconditionally dangerous command patterns
///
/// Each entry is a (class, case-insensitive regex) pair. The class names the
/// category of danger and is surfaced verbatim in the rejection reason. The
/// scan runs before allowlist matching so a dangerous command can never be
/// rescued by an allowlist coincidence.
pub const DENYLIST_PATTERNS: &[(&str, &str)] = &[
    ("recursive or forced deletion", r"\brm\s+-[a-z]*[rf]"),
    ("raw device write", r"\bdd\s+if="),
    ("privilege escalation", r"\bsudo\b|\bsu\b"),
    (
        "system power operation",
        r"\bshutdown\b|\breboot\b|\bhalt\b|\bpoweroff\b|\binit\s+0\b",
    ),
    ("disk format operation", r"\bmkfs\b|\bformat\s+[a-z]:"),
    (
        "piping into a shell interpreter",
        r"\|\s*(sh|bash|zsh|dash|powershell|pwsh|cmd)\b",
    ),
    ("output redirection to a device", r">\s*/dev/"),
    ("remote fetch piped to execution", r"\b(curl|wget)\b[^|]*\|"),
    ("dynamic code execution", r"\beval\b|\bexec\b|\bsystem\s*\("),
    ("permission widening", r"\bchmod\s+(-[a-z]+\s+)*0?777\b"),
    (
        "forceful process termination",
        r"\bkill\s+(-9|-kill)\b|\bpkill\b|\bkillall\b",
    ),
];

/// Shell metacharacters that indicate piping, redirection, chaining, or
/// background execution. Anything after the first occurrence is a second
/// command trying to ride in behind an allowlisted first segment.
pub const SHELL_METACHARACTERS: &[char] = &['|', '>', '<', '&', ';'];
