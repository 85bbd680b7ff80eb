//! Full sessions against a scripted POP3-like peer on loopback.

use crlf_probe::config::Mode;
use crlf_probe::connection::Connection;
use crlf_probe::framer::{Framer, ReadOutcome};
use crlf_probe::session::{Session, SessionEnd, SessionOptions};
use std::io::{Cursor, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

/// Minimal POP3-ish peer: greets, answers USER/QUIT, and records every line
/// it received until the client goes away or sends QUIT.
fn spawn_peer() -> (TcpStream, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"+OK POP3 server ready\r\n").unwrap();

        let framer = Framer::new(Duration::from_secs(5));
        let mut received = Vec::new();
        while let ReadOutcome::Line(line) = framer.read_line(&mut stream) {
            let reply: &[u8] = if line.starts_with("USER ") {
                b"+OK user accepted\r\n"
            } else if line == "QUIT" {
                b"+OK bye\r\n"
            } else {
                b"-ERR unknown command\r\n"
            };
            stream.write_all(reply).unwrap();
            let quit = line == "QUIT";
            received.push(line);
            if quit {
                break;
            }
        }
        received
    });
    (TcpStream::connect(addr).unwrap(), handle)
}

fn options(mode: Mode, greeting: bool) -> SessionOptions {
    SessionOptions {
        mode,
        greeting,
        framer: Framer::new(Duration::from_secs(2)),
    }
}

fn run(stream: TcpStream, opts: SessionOptions, input: &str) -> (SessionEnd, String) {
    let conn = Connection::new(stream, "pop.test:110");
    let mut output = Vec::new();
    let end = Session::new(conn, opts, Cursor::new(input.to_string()), &mut output)
        .run()
        .unwrap();
    (end, String::from_utf8(output).unwrap())
}

#[test]
fn test_explicit_session() {
    let (stream, peer) = spawn_peer();
    let (end, out) = run(
        stream,
        options(Mode::Explicit, true),
        "send USER alice\nrecv\nsend QUIT\nrecv\nrecv\n",
    );

    assert_eq!(end, SessionEnd::PeerClosed);
    assert_eq!(
        out,
        "recv: +OK POP3 server ready\n\
         sent: USER alice\n\
         recv: +OK user accepted\n\
         sent: QUIT\n\
         recv: +OK bye\n\
         Remote connection lost.\n\
         Closing connection to pop.test:110\n"
    );
    assert_eq!(peer.join().unwrap(), ["USER alice", "QUIT"]);
}

#[test]
fn test_auto_session() {
    let (stream, peer) = spawn_peer();
    let (end, out) = run(stream, options(Mode::Auto, false), "\nUSER bob\nQUIT\n");

    assert_eq!(end, SessionEnd::InputEnded);
    assert!(out.starts_with(
        "recv: +OK POP3 server ready\nrecv: +OK user accepted\nrecv: +OK bye\n"
    ));
    assert_eq!(peer.join().unwrap(), ["USER bob", "QUIT"]);
}

#[test]
fn test_fail_probe_session() {
    let (stream, peer) = spawn_peer();
    let (end, out) = run(stream, options(Mode::Explicit, true), "fail\n");

    assert_eq!(end, SessionEnd::ProbeFinished);
    assert_eq!(out.matches("recv: -ERR unknown command").count(), 3);
    // The unterminated "xyz" never forms a line on the peer side.
    assert_eq!(peer.join().unwrap(), ["", " ", " \n  "]);
}
