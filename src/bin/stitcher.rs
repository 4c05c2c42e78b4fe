use std::process::exit;

use structopt::StructOpt;
use umistitch::cli::{self, Opt};

pub fn main() {
    let opt = Opt::from_args();

    fern::Dispatch::new()
        .level(log::LevelFilter::Info)
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .chain(std::io::stderr())
        .apply()
        .unwrap();

    exit(match cli::run(opt) {
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
        _ => 0,
    })
}
