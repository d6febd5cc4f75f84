//! Process supervision tests.

mod launch_test;
mod supervisor_test;

/// Verify the public process types are exported from the library.
#[test]
fn test_all_process_types_exported() {
    use office_relay::process::{
        exit_code, HandlerError, LaunchError, LaunchSpec, LineHandler, NoopHandler, RelayedLine,
        RunResult, StreamOrigin, SupervisedChild, Supervisor, DEFAULT_POLL_INTERVAL,
        DEFAULT_TERMINATE_TIMEOUT,
    };

    let _ = LaunchSpec::new("true");
    let _ = Supervisor::new();
    let _: fn(std::process::ExitStatus) -> i32 = exit_code;
    let _: fn(&LaunchSpec) -> Result<SupervisedChild, LaunchError> = SupervisedChild::spawn;

    let line = RelayedLine::decode(StreamOrigin::Stdout, b"x\n");
    let mut noop = NoopHandler;
    let handled: Result<(), HandlerError> = noop.on_line(&line);
    assert!(handled.is_ok());

    let _ = RunResult {
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
        handler_failures: 0,
        cancelled: false,
    };
    assert!(DEFAULT_POLL_INTERVAL < DEFAULT_TERMINATE_TIMEOUT);
}
