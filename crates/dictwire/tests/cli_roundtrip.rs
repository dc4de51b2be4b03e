#![cfg(all(unix, feature = "cli"))]

use std::io;
use std::net::TcpListener;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use dictwire::codec::{Message, Value};
use dictwire::frame::MessageStream;
use dictwire::transport::TcpTransport;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("ephemeral bind should succeed")
        .local_addr()
        .expect("bound socket should have an address")
        .port()
}

fn wait_for_connect(addr: &str, timeout: Duration) -> io::Result<MessageStream> {
    let start = Instant::now();
    loop {
        match TcpTransport::connect(addr) {
            Ok(stream) => return Ok(MessageStream::new(stream)),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

#[test]
fn echo_server_roundtrips_typed_message() {
    let addr = format!("127.0.0.1:{}", free_port());

    let mut child = Command::new(env!("CARGO_BIN_EXE_dictwire"))
        .arg("--log-level")
        .arg("error")
        .arg("echo")
        .arg(&addr)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("echo command should start");

    let mut stream =
        wait_for_connect(&addr, Duration::from_secs(3)).expect("client should connect");

    let mut msg = Message::new();
    msg.insert("id", 7u64);
    msg.insert("label", "roundtrip");
    msg.insert("bias", -3i64);
    msg.insert("payload", vec![0xAAu8, 0xBB]);
    stream.send(&msg).expect("message should send");

    let reply = stream
        .recv_timeout(Some(Duration::from_secs(3)))
        .expect("echo should reply");
    assert_eq!(reply, msg);

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn send_command_delivers_to_listener() {
    let transport = TcpTransport::bind("127.0.0.1:0").expect("listener should bind");
    let addr = transport.local_addr().to_string();

    let acceptor = thread::spawn(move || {
        let stream = transport.accept().expect("listener should accept");
        let mut stream = MessageStream::new(stream);
        stream
            .recv_timeout(Some(Duration::from_secs(5)))
            .expect("message should arrive")
    });

    let status = Command::new(env!("CARGO_BIN_EXE_dictwire"))
        .arg("--log-level")
        .arg("error")
        .arg("send")
        .arg(&addr)
        .arg("--entry")
        .arg("id=uint64:9")
        .arg("--entry")
        .arg("note=string:from-cli")
        .status()
        .expect("send command should run");
    assert!(status.success());

    let received = acceptor.join().expect("acceptor thread should finish");
    assert_eq!(received.get("id"), Some(&Value::UInt64(9)));
    assert_eq!(
        received.get("note"),
        Some(&Value::String("from-cli".to_string()))
    );
}

#[test]
fn send_with_wait_prints_echoed_reply_as_json() {
    let addr = format!("127.0.0.1:{}", free_port());

    let mut child = Command::new(env!("CARGO_BIN_EXE_dictwire"))
        .arg("--log-level")
        .arg("error")
        .arg("echo")
        .arg(&addr)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("echo command should start");

    // Confirm the server is up before racing the send subprocess at it.
    let probe = wait_for_connect(&addr, Duration::from_secs(3)).expect("probe should connect");
    drop(probe);

    let output = Command::new(env!("CARGO_BIN_EXE_dictwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&addr)
        .arg("--entry")
        .arg("id=int64:3")
        .arg("--wait")
        .output()
        .expect("send command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"id\":3"), "unexpected stdout: {stdout}");

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_dictwire"))
        .arg("version")
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn listen_count_prints_and_exits() {
    let addr = format!("127.0.0.1:{}", free_port());

    let mut child = Command::new(env!("CARGO_BIN_EXE_dictwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&addr)
        .arg("--count")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start");

    let mut stream =
        wait_for_connect(&addr, Duration::from_secs(3)).expect("client should connect");
    let mut msg = Message::new();
    msg.insert("seq", 1i64);
    stream.send(&msg).expect("message should send");

    let output = child.wait_with_output().expect("listen should exit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"seq\":1"), "unexpected stdout: {stdout}");
}
