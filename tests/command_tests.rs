mod common;

use adbkit_rs::commands::*;
use adbkit_rs::protocol::encode;
use adbkit_rs::{AdbError, Command};
use common::{mock_connection, value, written};
use futures::executor::block_on;
use futures::{join, StreamExt};

#[test]
fn test_clear_sends_pm_clear() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Success\r\n"[..]);
    feed.finish();

    block_on(ClearCommand::new(&mut conn).execute("foo.bar.c".to_string())).unwrap();
    assert_eq!(written(&mut writes), encode("shell:pm clear foo.bar.c").unwrap());
}

#[test]
fn test_clear_fails_on_failed() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Failed\r\n"[..]);
    feed.finish();

    let err = block_on(ClearCommand::new(&mut conn).execute("foo.bar.c".to_string())).unwrap_err();
    assert_eq!(err.to_string(), "Package 'foo.bar.c' could not be cleared");
}

#[test]
fn test_clear_fails_without_connection_close() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Failed\r\n"[..]);

    let err = block_on(ClearCommand::new(&mut conn).execute("foo.bar.c".to_string())).unwrap_err();
    assert!(matches!(err, AdbError::CommandFailed(_)));
    assert!(feed.is_closed());
}

#[test]
fn test_clear_ignores_irrelevant_lines() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Open: foo error\n\n"[..]);
    feed.push(&b"Success\r\n"[..]);
    feed.finish();

    block_on(ClearCommand::new(&mut conn).execute("foo.bar.c".to_string())).unwrap();
}

#[test]
fn test_clear_rejects_on_fail_reply() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"FAIL"[..]);
    feed.push(value("device offline"));

    let err = block_on(ClearCommand::new(&mut conn).execute("foo".to_string())).unwrap_err();
    assert!(matches!(err, AdbError::Fail(ref msg) if msg == "device offline"));
}

#[test]
fn test_uninstall_success() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Success\r\n"[..]);
    feed.finish();

    block_on(UninstallCommand::new(&mut conn).execute("foo".to_string())).unwrap();
    assert_eq!(written(&mut writes), encode("shell:pm uninstall foo").unwrap());
}

#[test]
fn test_uninstall_accepts_failures() {
    let outputs: [&'static [u8]; 4] = [
        b"Failure\r\n",
        b"Failure [DELETE_FAILED_INTERNAL_ERROR]\r\n",
        b"Failure - not installed for 0\r\n",
        b"open: Permission failed\r\nFailure\r\n",
    ];

    for output in outputs {
        let (mut conn, feed, _writes) = mock_connection();
        feed.push(&b"OKAY"[..]);
        feed.push(output);
        feed.finish();

        block_on(UninstallCommand::new(&mut conn).execute("foo".to_string())).unwrap();
    }
}

#[test]
fn test_uninstall_buggy_exception() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(
        &b"\nException occurred while dumping:\n\
java.lang.IllegalArgumentException: Unknown package: foo\n\
\tat com.android.server.pm.Settings.isOrphaned(Settings.java:4134)\n\
\tat android.os.Binder.execTransact(Binder.java:565)"[..],
    );
    feed.finish();

    block_on(UninstallCommand::new(&mut conn).execute("foo".to_string())).unwrap();
}

#[test]
fn test_uninstall_premature_eof() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Hello. Is it me you are looking for?\r\n"[..]);
    feed.finish();

    let err = block_on(UninstallCommand::new(&mut conn).execute("foo".to_string())).unwrap_err();
    assert!(matches!(err, AdbError::PrematureEof { .. }));
}

#[test]
fn test_install_escapes_path() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Success\r\n"[..]);
    feed.finish();

    block_on(InstallCommand::new(&mut conn).execute("/data/local/tmp/my $app.apk".to_string()))
        .unwrap();
    assert_eq!(
        written(&mut writes),
        encode(r#"shell:pm install -r "/data/local/tmp/my \$app.apk""#).unwrap()
    );
}

#[test]
fn test_install_failure_code() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"\tpkg: /data/local/tmp/a.apk\r\nFailure [INSTALL_FAILED_OLDER_SDK]\r\n"[..]);
    feed.finish();

    let err = block_on(InstallCommand::new(&mut conn).execute("a.apk".to_string())).unwrap_err();
    assert_eq!(
        err.to_string(),
        "a.apk could not be installed [INSTALL_FAILED_OLDER_SDK]"
    );
}

#[test]
fn test_install_failure_drains_output() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Failure [INSTALL_FAILED_INVALID_APK]\r\ntrailing noise\r\n"[..]);
    feed.finish();

    let err = block_on(InstallCommand::new(&mut conn).execute("a.apk".to_string())).unwrap_err();
    assert!(matches!(err, AdbError::CommandFailed(_)));
    assert_eq!(conn.parser().buffered(), 0);
}

#[test]
fn test_install_exception() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"Exception occurred while executing:\r\n"[..]);
    feed.finish();

    let err = block_on(InstallCommand::new(&mut conn).execute("a.apk".to_string())).unwrap_err();
    assert!(matches!(err, AdbError::CommandFailed(_)));
}

#[test]
fn test_remount_sends_remount() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.finish();

    block_on(RemountCommand::new(&mut conn).execute(())).unwrap();
    assert_eq!(written(&mut writes), encode("remount:").unwrap());
}

#[test]
fn test_unexpected_reply() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"WHAT"[..]);

    let err = block_on(RemountCommand::new(&mut conn).execute(())).unwrap_err();
    assert_eq!(err.to_string(), "Unexpected 'WHAT', was expecting OKAY or FAIL");
}

#[test]
fn test_log_sends_log_name() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.finish();

    block_on(LogCommand::new(&mut conn).execute("main".to_string())).unwrap();
    assert_eq!(written(&mut writes), encode("log:main").unwrap());
}

#[test]
fn test_log_resolves_with_stream() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"\x01\x02"[..]);

    let mut stream = block_on(LogCommand::new(&mut conn).execute("main".to_string())).unwrap();
    let (first, _) = block_on(async {
        join!(stream.next(), async { feed.push(&b"\x03"[..]) })
    });
    assert_eq!(&first.unwrap().unwrap()[..], b"\x01\x02");

    stream.end();
    assert!(feed.is_closed());
}

#[test]
fn test_shell_returns_output() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"hello\n"[..]);
    feed.finish();

    let stream = block_on(ShellCommand::new(&mut conn).execute("echo hello".to_string())).unwrap();
    assert_eq!(block_on(stream.read_all()).unwrap(), b"hello\n");
    assert_eq!(written(&mut writes), encode("shell:echo hello").unwrap());
}

#[test]
fn test_screencap_sends_command() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"\r\nlegit image"[..]);
    feed.finish();

    let stream = block_on(ScreencapCommand::new(&mut conn).execute(())).unwrap();
    assert_eq!(block_on(stream.read_all()).unwrap(), b"legit image");
    assert_eq!(
        written(&mut writes),
        encode("shell:echo && screencap -p 2>/dev/null").unwrap()
    );
}

#[test]
fn test_screencap_not_supported() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.finish();

    let err = block_on(ScreencapCommand::new(&mut conn).execute(())).unwrap_err();
    assert!(matches!(err, AdbError::PrematureEof { .. }));
}

#[test]
fn test_screencap_converts_crlf() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"\r\nfoo\r\n"[..]);
    feed.finish();

    let stream = block_on(ScreencapCommand::new(&mut conn).execute(())).unwrap();
    assert_eq!(block_on(stream.read_all()).unwrap(), b"foo\n");
}

#[test]
fn test_screencap_keeps_crlf_when_not_needed() {
    let (mut conn, feed, _writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.push(&b"\nfoo\r\n"[..]);
    feed.finish();

    let stream = block_on(ScreencapCommand::new(&mut conn).execute(())).unwrap();
    assert_eq!(block_on(stream.read_all()).unwrap(), b"foo\r\n");
}

#[test]
fn test_sync_sends_sync() {
    let (mut conn, feed, mut writes) = mock_connection();
    feed.push(&b"OKAY"[..]);
    feed.finish();

    block_on(SyncCommand::new(&mut conn).execute(())).unwrap();
    assert_eq!(written(&mut writes), encode("sync:").unwrap());
}

#[test]
fn test_send_rejects_oversized_request() {
    let (mut conn, _feed, mut writes) = mock_connection();
    let command = "x".repeat(70_000);

    let err = block_on(ShellCommand::new(&mut conn).execute(command)).unwrap_err();
    assert!(matches!(err, AdbError::PayloadTooLarge(_)));
    assert!(written(&mut writes).is_empty());
}
