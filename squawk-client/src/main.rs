//! Squawk push-to-talk client
//!
//! Line-oriented front-end over the session core: commands on stdin, status
//! on stdout, logs on stderr. Usage:
//!
//! ```text
//! squawk [server-address]
//! ```
//!
//! Commands: `channels`, `join <channel>`, `leave <channel>`,
//! `talk <channel>`, `stop`, `replay <channel>`, `quit`.

use std::io::BufRead;

use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use squawk_client::constants::DEFAULT_CATALOG;
use squawk_client::membership::MembershipStore;
use squawk_client::session::{SessionConfig, SessionEvent, SessionHandle};
use squawk_common::DEFAULT_PORT;

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected => println!("* connected"),
        SessionEvent::Disconnected => println!("* disconnected, retrying"),
        SessionEvent::RecordingStarted(channel) => println!("* recording into [{channel}]"),
        SessionEvent::RecordingStopped(channel) => println!("* recording into [{channel}] ended"),
        SessionEvent::RecorderUnavailable(reason) => {
            println!("* microphone unavailable: {reason}");
        }
        SessionEvent::ReceivingStarted(channel) => println!("* [{channel}] receiving"),
        SessionEvent::ReceivingStopped(channel) => println!("* [{channel}] quiet"),
        SessionEvent::ClipPublished(channel) => println!("* clip sent to [{channel}]"),
        SessionEvent::SubscriptionChanged {
            channel,
            subscribed,
        } => {
            if *subscribed {
                println!("* joined [{channel}]");
            } else {
                println!("* left [{channel}]");
            }
        }
    }
}

fn print_help() {
    println!("commands:");
    println!("  channels          list the channel catalog");
    println!("  join <channel>    subscribe to a channel");
    println!("  leave <channel>   unsubscribe from a channel");
    println!("  talk <channel>    start recording into a channel");
    println!("  stop              stop recording and send the clip");
    println!("  replay <channel>  replay the last clip heard on a channel");
    println!("  quit              exit");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let server_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{DEFAULT_PORT}"));

    let catalog: Vec<String> = DEFAULT_CATALOG.iter().map(|s| s.to_string()).collect();
    info!(server = %server_addr, "Starting squawk");

    let config = SessionConfig {
        server_addr,
        catalog: catalog.clone(),
        client_id: Uuid::new_v4(),
        membership: MembershipStore::new(),
    };

    let (mut session, mut events) = SessionHandle::start(config);

    let printer = std::thread::spawn(move || {
        while let Some(event) = events.blocking_recv() {
            print_event(&event);
        }
    });

    print_help();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let trimmed = line.trim();
        let (command, rest) = match trimmed.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        match (command, rest) {
            ("", _) => {}
            ("channels", _) => {
                for name in &catalog {
                    println!("  {name}");
                }
            }
            ("join", channel) if !channel.is_empty() => session.set_subscribed(channel, true),
            ("leave", channel) if !channel.is_empty() => session.set_subscribed(channel, false),
            ("talk", channel) if !channel.is_empty() => session.start_recording(channel),
            ("stop", _) => session.stop_recording(),
            ("replay", channel) if !channel.is_empty() => session.replay(channel),
            ("quit" | "exit", _) => break,
            _ => print_help(),
        }
    }

    session.stop();
    drop(session);
    let _ = printer.join();
}
