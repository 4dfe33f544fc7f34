use crossbeam::channel::RecvTimeoutError;
use rawnet_runtime::Stack;
use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use std::process;
use std::time::Duration;

const PING_TIMEOUT: Duration = Duration::from_secs(1);
const PING_DATA: &[u8] = b"rawnet-arp-shell-ping-0123456789";

const HELP: &str = "\
commands:
  <ip>                    resolve an address with ARP
  p                       print the ARP cache
  ping <ip> [count]       send echo requests and wait for the replies
  udp <ip> <port> <text>  send a UDP datagram
  q                       quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Resolve(Ipv4Addr),
    PrintCache,
    Ping { dst: Ipv4Addr, count: u16 },
    Udp { dst: Ipv4Addr, port: u16, text: String },
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(command) => command,
            None => return Ok(Command::Help),
        };

        match command {
            "q" | "quit" => Ok(Command::Quit),
            "p" => Ok(Command::PrintCache),
            "h" | "help" | "?" => Ok(Command::Help),
            "ping" => {
                let dst = address(words.next())?;
                let count = match words.next() {
                    Some(count) => count
                        .parse()
                        .map_err(|_| format!("invalid count {:?}", count))?,
                    None => 1,
                };
                Ok(Command::Ping { dst, count })
            }
            "udp" => {
                let dst = address(words.next())?;
                let port = words
                    .next()
                    .ok_or_else(|| String::from("missing port"))?;
                let port = port
                    .parse()
                    .map_err(|_| format!("invalid port {:?}", port))?;
                let text = words.collect::<Vec<&str>>().join(" ");
                Ok(Command::Udp { dst, port, text })
            }
            other => other
                .parse()
                .map(Command::Resolve)
                .map_err(|_| format!("unknown command {:?}, try help", other)),
        }
    }
}

fn address(word: Option<&str>) -> Result<Ipv4Addr, String> {
    let word = word.ok_or_else(|| String::from("missing address"))?;
    word.parse()
        .map_err(|_| format!("invalid address {:?}", word))
}

/// Reads commands from stdin until `q` or end of input.
pub fn run(stack: &Stack) {
    let stdin = io::stdin();
    let identifier = process::id() as u16;
    let datagrams = stack.udp().datagrams();
    prompt();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                eprintln!("failed to read command: {}", err);
                break;
            }
        };

        for datagram in datagrams.try_iter() {
            println!(
                "udp from {}:{} to port {}: {:?}",
                datagram.from,
                datagram.src_port,
                datagram.dst_port,
                String::from_utf8_lossy(&datagram.data)
            );
        }

        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => execute(stack, command, identifier),
            Err(err) => println!("{}", err),
        }
        prompt();
    }
}

fn execute(stack: &Stack, command: Command, identifier: u16) {
    match command {
        Command::Resolve(ip) => match stack.arp().resolve(ip) {
            Ok(Some(mac)) => println!("{} is at {}", ip, mac),
            Ok(None) => println!("{} did not answer", ip),
            Err(err) => println!("resolving {} failed: {}", ip, err),
        },
        Command::PrintCache => {
            let entries = stack.arp().cache_entries();
            println!("{:<16} {}", "IP", "MAC");
            for (ip, mac) in entries {
                println!("{:<16} {}", ip.to_string(), mac);
            }
        }
        Command::Ping { dst, count } => ping(stack, dst, count, identifier),
        Command::Udp { dst, port, text } => match stack.udp().send(text.as_bytes(), port, dst) {
            Ok(src_port) => println!("sent {} bytes from port {}", text.len(), src_port),
            Err(err) => println!("sending to {}:{} failed: {}", dst, port, err),
        },
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

fn ping(stack: &Stack, dst: Ipv4Addr, count: u16, identifier: u16) {
    let reports = stack.icmp().rtt_reports();
    // Reports left over from an earlier ping would be mistaken for ours
    while reports.try_recv().is_ok() {}

    for sequence in 1..=count {
        if let Err(err) = stack.icmp().ping(dst, identifier, sequence, PING_DATA) {
            println!("ping {} failed: {}", dst, err);
            return;
        }
        match reports.recv_timeout(PING_TIMEOUT) {
            Ok(report) => println!(
                "{} bytes from {}: icmp_seq={} time={:.3} ms",
                PING_DATA.len(),
                report.from,
                report.sequence,
                report.rtt.as_secs_f64() * 1000.0
            ),
            Err(RecvTimeoutError::Timeout) => println!("icmp_seq={} timed out", sequence),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        let ip = Ipv4Addr::new(10, 0, 0, 2);
        assert_eq!(Command::parse("10.0.0.2"), Ok(Command::Resolve(ip)));
        assert_eq!(Command::parse("  p "), Ok(Command::PrintCache));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
        assert_eq!(Command::parse(""), Ok(Command::Help));
        assert_eq!(
            Command::parse("ping 10.0.0.2"),
            Ok(Command::Ping { dst: ip, count: 1 })
        );
        assert_eq!(
            Command::parse("ping 10.0.0.2 4"),
            Ok(Command::Ping { dst: ip, count: 4 })
        );
        assert_eq!(
            Command::parse("udp 10.0.0.2 9999 hello  there"),
            Ok(Command::Udp {
                dst: ip,
                port: 9999,
                text: String::from("hello there"),
            })
        );
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(Command::parse("10.0.0").is_err());
        assert!(Command::parse("ping").is_err());
        assert!(Command::parse("ping 10.0.0.2 many").is_err());
        assert!(Command::parse("udp 10.0.0.2").is_err());
        assert!(Command::parse("udp 10.0.0.2 70000 x").is_err());
        assert!(Command::parse("resolve").is_err());
    }
}
