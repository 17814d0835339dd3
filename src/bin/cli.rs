use bufferhub::{
    error::BufferHubError, BackingType, BufferHubService, BufferHubStatus, HardwareBufferDescription,
    HubConfig, PixelFormat, Result,
};
use clap::{App, Arg, ArgMatches, SubCommand};
use std::{sync::Arc, thread, time::Instant};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("bufferhub-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("BufferHub shared buffer broker CLI tool")
        .subcommand(
            SubCommand::with_name("demo")
                .about("Allocate a buffer, share it by token and dump the hub")
                .arg(
                    Arg::with_name("width")
                        .long("width")
                        .value_name("WIDTH")
                        .help("Buffer width in pixels")
                        .default_value("640")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("height")
                        .long("height")
                        .value_name("HEIGHT")
                        .help("Buffer height in pixels")
                        .default_value("480")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("metadata")
                        .short("m")
                        .long("metadata")
                        .value_name("BYTES")
                        .help("User metadata size")
                        .default_value("64")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("stress")
                .about("Duplicate and import from many threads")
                .arg(
                    Arg::with_name("threads")
                        .short("t")
                        .long("threads")
                        .value_name("THREADS")
                        .help("Importer threads")
                        .default_value("8")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("rounds")
                        .short("r")
                        .long("rounds")
                        .value_name("ROUNDS")
                        .help("Imports per thread")
                        .default_value("1000")
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("info").about("Show version and build information"))
        .get_matches();

    let config = HubConfig::default();

    match matches.subcommand() {
        ("demo", Some(demo_matches)) => run_demo(config, demo_matches),
        ("stress", Some(stress_matches)) => run_stress(config, stress_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn parse_value<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .value_of(name)
        .ok_or_else(|| BufferHubError::invalid_parameter(name, "Missing value"))?
        .parse()
        .map_err(|_| BufferHubError::invalid_parameter(name, "Invalid number"))
}

fn run_demo(config: HubConfig, matches: &ArgMatches) -> Result<()> {
    let width: u32 = parse_value(matches, "width")?;
    let height: u32 = parse_value(matches, "height")?;
    let metadata: u32 = parse_value(matches, "metadata")?;

    let hub = BufferHubService::new(config)?;
    println!(
        "Hub using {} ({} backing, allocation timeout {:?})",
        hub.allocator_name(),
        hub.config().backing_type.name(),
        hub.config().allocation_timeout
    );
    let description =
        HardwareBufferDescription::new(width, height, 1, PixelFormat::R8G8B8A8Unorm, 0x3);

    let (producer, traits) = hub.allocate_buffer(&description, metadata)?;
    println!(
        "Allocated buffer {} ({}x{}, stride {}) as client {} with bit {:#x}",
        traits.buffer_info.buffer_id,
        traits.description.width,
        traits.description.height,
        traits.description.stride,
        producer.id(),
        traits.buffer_info.client_bit.mask()
    );

    if metadata >= 8 {
        producer.write_user_metadata(0, b"frame-01")?;
    }

    let token = producer.duplicate()?;
    println!("Minted token ({} ints)", token.num_ints());

    let (consumer, consumer_traits) = hub.import_buffer(Some(&token))?;
    println!(
        "Imported as client {} with bit {:#x}",
        consumer.id(),
        consumer_traits.buffer_info.client_bit.mask()
    );
    if metadata >= 8 {
        let shared = consumer.read_user_metadata(0, 8)?;
        println!("Consumer sees metadata {:?}", String::from_utf8_lossy(&shared));
    }

    let replay = hub.import_buffer(Some(&token));
    println!("Second import of the same token: {}", BufferHubStatus::from_result(&replay));

    println!("\n{}", hub.dump());

    producer.close()?;
    consumer.close()?;
    println!("\nAfter closing both clients:\n{}", hub.dump());
    Ok(())
}

fn run_stress(config: HubConfig, matches: &ArgMatches) -> Result<()> {
    let threads: usize = parse_value(matches, "threads")?;
    let rounds: usize = parse_value(matches, "rounds")?;

    let hub = Arc::new(BufferHubService::new(config)?);
    let description = HardwareBufferDescription::new(256, 256, 1, PixelFormat::R8G8B8A8Unorm, 0);
    let (origin, _) = hub.allocate_buffer(&description, 0)?;
    let origin = Arc::new(origin);

    println!("Running {} threads x {} imports...", threads, rounds);
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let hub = Arc::clone(&hub);
            let origin = Arc::clone(&origin);
            thread::spawn(move || -> Result<usize> {
                for _ in 0..rounds {
                    let token = origin.duplicate()?;
                    let (client, _) = hub.import_buffer(Some(&token))?;
                    client.close()?;
                }
                Ok(rounds)
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        match handle.join() {
            Ok(result) => total += result?,
            Err(_) => return Err(BufferHubError::platform("Stress thread panicked")),
        }
    }

    let elapsed = start.elapsed();
    println!("\nResults:");
    println!("  Total time: {:.2}ms", elapsed.as_millis());
    println!("  Imports/sec: {:.0}", total as f64 / elapsed.as_secs_f64());
    println!("  {}", hub.stats().summary());
    Ok(())
}

fn show_info() -> Result<()> {
    println!("BufferHub v{}", bufferhub::VERSION);
    println!("Max clients per buffer: {}", bufferhub::config::MAX_CLIENTS_PER_BUFFER);
    println!("Default backing: {}", BackingType::default().name());
    println!("Platform: {}", std::env::consts::OS);
    println!("Architecture: {}", std::env::consts::ARCH);
    Ok(())
}
