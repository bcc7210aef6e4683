//! Command line front end: decode one or more captures and print what was
//! on the bus.
//!
//! Each file is decoded on its own thread. Records come back over a channel
//! per file and are printed in file order.

use std::{path::PathBuf, process, thread};

use anyhow::Result;
use asyncbus::{
    info::decoder_info,
    output::{Event, RecordBody},
    Capture, Decoder, Options, Record, StrobePolarity,
};
use clap::{Parser, ValueEnum};
use crossbeam_channel::Receiver;
use log::{error, info};

#[derive(ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq)]
enum Format {
    /// Text annotations.
    #[default]
    Annotations,
    /// `ITEM` events.
    Items,
    Both,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Decode SRAM-like async parallel bus captures")]
struct Args {
    /// Strobe polarity: active_low or active_high.
    #[arg(long, default_value = "active_low")]
    strobe_pol: StrobePolarity,

    #[arg(long, value_enum, default_value_t = Format::Annotations)]
    format: Format,

    /// Print the decoder description and exit.
    #[arg(long)]
    info: bool,

    /// Capture files (binary or text).
    files: Vec<PathBuf>,
}

fn print_info() {
    let info = decoder_info();
    println!("{} - {}", info.id, info.longname);
    println!("  {}", info.desc);
    println!("  License: {}", info.license);
    println!("  Inputs: {}  Outputs: {}", info.inputs.join(", "), info.outputs.join(", "));
    println!("Channels:");
    for (id, channel) in info.channels.iter_enumerated() {
        println!("  {:2} {:3} {}", id.0, channel.name, channel.desc);
    }
    println!("Options:");
    for option in info.options.iter() {
        println!(
            "  {} ({}): {} [default {}]",
            option.id,
            option.desc,
            option.values.join(", "),
            option.default
        );
    }
    println!("Annotation rows:");
    for row in info.annotation_rows.iter() {
        let classes: Vec<&str> = row.classes.iter().map(|c| c.id()).collect();
        println!("  {} ({}): {}", row.id, row.desc, classes.join(", "));
    }
}

fn format_record(record: &Record, format: Format) -> Option<String> {
    match (&record.body, format) {
        (RecordBody::Annotation { class, text }, Format::Annotations | Format::Both) => {
            Some(format!("{}-{} {}: {}", record.ss, record.es, class.row(), text))
        }
        (
            RecordBody::Event(event @ Event::Item { raw, address, data }),
            Format::Items | Format::Both,
        ) => Some(format!(
            "{}-{} {}: lines={:#06x} address={:#04x}/{} data={:#04x}/{}",
            record.ss,
            record.es,
            event.kind(),
            raw,
            address.value,
            address.bits,
            data.value,
            data.bits
        )),
        _ => None,
    }
}

struct Job {
    path: PathBuf,
    records: Receiver<Record>,
    handle: thread::JoinHandle<Result<usize>>,
}

fn spawn_decoder(path: PathBuf, options: Options) -> Job {
    let (mut tx, rx) = crossbeam_channel::unbounded();
    let thread_path = path.clone();
    let handle = thread::spawn(move || {
        let capture = Capture::load(&thread_path)?;
        let mut decoder = Decoder::new(capture.cursor(), options);
        Ok(decoder.decode_all(&mut tx)?)
    });
    Job {
        path,
        records: rx,
        handle,
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if args.info {
        print_info();
        return;
    }

    if args.files.is_empty() {
        eprintln!("No capture files given (see --help)");
        process::exit(2);
    }

    let options = Options {
        strobe_polarity: args.strobe_pol,
    };

    let jobs: Vec<Job> = args
        .files
        .into_iter()
        .map(|path| spawn_decoder(path, options))
        .collect();

    let multiple = jobs.len() > 1;
    let mut failed = false;

    for job in jobs {
        if multiple {
            println!("{}:", job.path.display());
        }
        // Ends when the decoding thread drops its sender.
        for record in job.records.iter() {
            if let Some(line) = format_record(&record, args.format) {
                println!("{line}");
            }
        }
        match job.handle.join() {
            Ok(Ok(count)) => info!("{}: {count} transactions", job.path.display()),
            Ok(Err(e)) => {
                error!("{}: {e:#}", job.path.display());
                eprintln!("Error decoding {}: {e:#}", job.path.display());
                failed = true;
            }
            Err(_) => {
                eprintln!("Decoder thread for {} panicked", job.path.display());
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}
