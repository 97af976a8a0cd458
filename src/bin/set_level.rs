use foxtron_dali::base::address::Address;
use foxtron_dali::base::command::DaliCommand;
use foxtron_dali::foxtron::master::{BootMethod, FoxtronDaliMaster, MasterConfig, SessionEvent};
use foxtron_dali::foxtron::serial::{SerialFoxtronTransport, DEFAULT_BAUD_RATE};
use tokio::time::{sleep, Duration};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

extern crate clap;
use clap::{value_parser, Arg, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let matches = Command::new("set_level")
        .about("Set the light level of DALI gear through a Foxtron adapter.")
        .arg(
            Arg::new("LEVEL")
                .required(true)
                .value_parser(value_parser!(f64))
                .help("Relative brightness, 0.0 to 1.0"),
        )
        .arg(
            Arg::new("DEVICE")
                .short('d')
                .long("device")
                .default_value("/dev/ttyUSB0")
                .help("Serial port of the adapter"),
        )
        .arg(
            Arg::new("baud")
                .short('b')
                .long("baud")
                .value_parser(value_parser!(u32))
                .help("Serial line speed"),
        )
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .value_parser(value_parser!(u8))
                .help("Short address of the gear"),
        )
        .arg(
            Arg::new("group")
                .short('g')
                .long("group")
                .value_parser(value_parser!(u8))
                .help("Group address, used when no short address is given"),
        )
        .arg(
            Arg::new("set-dtr")
                .long("set-dtr")
                .action(clap::ArgAction::SetTrue)
                .help("Raise DTR to get the adapter out of its bootloader"),
        )
        .arg(
            Arg::new("ramp")
                .short('r')
                .long("ramp")
                .action(clap::ArgAction::SetTrue)
                .help("Step the level up gradually instead of jumping"),
        )
        .get_matches();

    let level = *matches.get_one::<f64>("LEVEL").unwrap();
    let device = matches.get_one::<String>("DEVICE").unwrap();
    let baud = matches
        .get_one::<u32>("baud")
        .copied()
        .unwrap_or(DEFAULT_BAUD_RATE);
    let short = matches.get_one::<u8>("address").copied();
    let group = matches.get_one::<u8>("group").copied();
    let ramp = matches.get_flag("ramp");

    if !(0.0..=1.0).contains(&level) {
        eprintln!("Level must be between 0.0 and 1.0");
        return;
    }
    let address = match Address::from_parts(short, group) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Bad address: {}", e);
            return;
        }
    };
    let boot_method = if matches.get_flag("set-dtr") {
        BootMethod::SetDtr
    } else {
        BootMethod::Running
    };
    let transport = match SerialFoxtronTransport::open(device, baud) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to open {}: {}", device, e);
            return;
        }
    };
    let (master, mut events) = FoxtronDaliMaster::new(transport, MasterConfig {
        boot_method,
        ..Default::default()
    });
    match events.session.recv().await {
        Some(SessionEvent::Open) => {}
        other => {
            eprintln!("Channel never opened: {:?}", other);
            return;
        }
    }
    let mut any = ReceiverStream::new(events.any);
    tokio::spawn(async move {
        while let Some(resp) = any.next().await {
            println!("Bus traffic: {:?}", resp);
        }
    });

    if ramp {
        let steps = 5;
        for step in 1..steps {
            let intermediate = level * step as f64 / steps as f64;
            if let Err(e) = master.send_cmd(DaliCommand::dapc(address, intermediate)).await {
                eprintln!("Failed to set level: {}", e);
                return;
            }
            sleep(Duration::from_millis(500)).await;
        }
    }
    match master.send_cmd(DaliCommand::dapc(address, level)).await {
        Ok(resp) => println!("Result: {:?}", resp),
        Err(e) => eprintln!("Failed to set level: {}", e),
    }
    master.close();
}
