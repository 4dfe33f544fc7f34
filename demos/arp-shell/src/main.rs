mod shell;
mod subscriber;

use crate::subscriber::LevelSubscriber;
use clap::{App, Arg};
use rawnet_afpacket::{interface_info, AfPacketDevice};
use rawnet_runtime::Stack;
use std::process;
use std::sync::Arc;
use tracing::Level;

fn main() {
    // Collect arguments from user
    let matches = App::new("rawnet ARP shell")
        .version("0.1")
        .author("Rawnet Contributors")
        .about("Resolve addresses, ping and send UDP from a user-space network stack")
        .arg(
            Arg::with_name("itf")
                .short("i")
                .long("itf")
                .value_name("INTERFACE")
                .help("Interface to open")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("Log every received datagram"),
        )
        .arg(
            Arg::with_name("ip_options")
                .long("ip-options")
                .value_name("HEX")
                .help("IP options carried by every datagram, as hex bytes")
                .takes_value(true),
        )
        .get_matches();

    let level = if matches.is_present("debug") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing::subscriber::set_global_default(LevelSubscriber::new(level))
        .expect("setting tracing default failed");

    let itf = matches.value_of("itf").unwrap();
    let options = match matches.value_of("ip_options").map(parse_hex) {
        Some(Ok(options)) => options,
        Some(Err(err)) => exit(&err),
        None => vec![],
    };

    let interface = match interface_info(itf) {
        Ok(interface) => interface,
        Err(err) => exit(&format!("cannot query {}: {}", itf, err)),
    };
    let device = match AfPacketDevice::open(itf) {
        Ok(device) => device,
        Err(err) => exit(&format!("cannot open {}: {}", itf, err)),
    };
    let stack = match Stack::builder(Arc::new(device), interface)
        .ip_options(options)
        .start()
    {
        Ok(stack) => stack,
        Err(err) => exit(&format!("cannot start the stack on {}: {}", itf, err)),
    };

    shell::run(&stack);
    stack.shutdown();
}

fn exit(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(1)
}

/// Decodes option bytes written as hex, with an optional `0x` prefix.
fn parse_hex(hex: &str) -> Result<Vec<u8>, String> {
    let hex = hex.trim_start_matches("0x");
    if hex.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {:?}", hex));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(|| format!("invalid hex byte at {} in {:?}", i, hex))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_option_bytes() {
        assert_eq!(parse_hex("94040000"), Ok(vec![0x94, 0x04, 0x00, 0x00]));
        assert_eq!(parse_hex("0x0107"), Ok(vec![0x01, 0x07]));
        assert_eq!(parse_hex(""), Ok(vec![]));
        assert!(parse_hex("940").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
