// AppError conversion tests: every module error converts into the
// top-level type and keeps its context in the message.

use execguard::config::ConfigError;
use execguard::error::AppError;
use execguard::sandbox::SandboxError;
use execguard::security::{CommandValidator, ValidationError};

#[test]
fn test_validation_error_converts() {
    let err = CommandValidator::new()
        .validate("sudo ls")
        .unwrap_err();
    let app: AppError = err.into();

    assert!(matches!(app, AppError::Security(_)));
    assert!(app.to_string().contains("privilege escalation"));
}

#[test]
fn test_sandbox_error_converts() {
    let err = SandboxError::InvalidRequest("timeout must be positive".to_string());
    let app: AppError = err.into();

    assert!(matches!(app, AppError::Sandbox(_)));
    assert!(app.to_string().contains("timeout must be positive"));
}

#[test]
fn test_config_error_converts() {
    let err = ConfigError::InvalidValue("max_output_bytes must be greater than 0".to_string());
    let app: AppError = err.into();

    assert!(matches!(app, AppError::Config(_)));
    assert!(app.to_string().contains("max_output_bytes"));
}

#[test]
fn test_io_error_converts() {
    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let app: AppError = err.into();

    assert!(matches!(app, AppError::Io(_)));
}

#[test]
fn test_validation_error_messages_are_actionable() {
    let validator = CommandValidator::new();

    let cases = [
        ("rm -rf /", "dangerous pattern"),
        ("git log | head", "redirection/piping"),
        ("nc -l 80", "not in allowlist"),
        ("", "Empty command"),
    ];

    for (command, expected) in cases {
        let message = validator.validate(command).unwrap_err().to_string();
        assert!(
            message.contains(expected),
            "command {command:?} produced message {message:?}"
        );
    }
}

#[test]
fn test_disallowed_arguments_error_names_the_program() {
    let err = CommandValidator::new()
        .validate("git gc --aggressive")
        .unwrap_err();
    assert!(matches!(err, ValidationError::DisallowedArguments { .. }));
    assert!(err.to_string().contains("git"));
}
