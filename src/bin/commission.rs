use foxtron_dali::base::address::Short;
use foxtron_dali::foxtron::master::{BootMethod, FoxtronDaliMaster, MasterConfig, SessionEvent};
use foxtron_dali::foxtron::serial::{SerialFoxtronTransport, DEFAULT_BAUD_RATE};
use foxtron_dali::utils::commissioning;

extern crate clap;
use clap::{value_parser, Arg, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let matches = Command::new("commission")
        .about("Assign short addresses to all unaddressed DALI gear on the bus.")
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
            Arg::new("first")
                .short('f')
                .long("first")
                .value_parser(value_parser!(u8))
                .default_value("0")
                .help("First short address to hand out"),
        )
        .arg(
            Arg::new("set-dtr")
                .long("set-dtr")
                .action(clap::ArgAction::SetTrue)
                .help("Raise DTR to get the adapter out of its bootloader"),
        )
        .get_matches();

    let device = matches.get_one::<String>("DEVICE").unwrap();
    let baud = matches
        .get_one::<u32>("baud")
        .copied()
        .unwrap_or(DEFAULT_BAUD_RATE);
    let first = match Short::from_value(*matches.get_one::<u8>("first").unwrap()) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Bad first address: {}", e);
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

    match commissioning::assign_addresses(&master, first).await {
        Ok(assigned) if assigned.is_empty() => println!("No unaddressed gear found"),
        Ok(assigned) => {
            for entry in assigned {
                println!(
                    "Short address {:2}  random address {:#08x}  {}",
                    entry.short,
                    entry.random_address,
                    if entry.verified { "verified" } else { "NOT VERIFIED" }
                );
            }
        }
        Err(e) => eprintln!("Commissioning failed: {}", e),
    }
    master.close();
}
