#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

mod args;
mod options;

use std::env;

use clap::{CommandFactory, Parser};
use log::{debug, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::args::StatcheckArgs;
use crate::options::options;

/// Point of entry for the statcheck application.
fn main() {
    let e = env::args_os();
    if 1 == e.len() {
        let mut a = StatcheckArgs::command();
        if let Err(_e) = a.print_help() {
            println!("Error printing help. Try again with -h parameter.")
        }
        return;
    }
    let args = StatcheckArgs::parse();

    let mut logging_configured = false;
    if let Some(logging_config) = &args.logging_config {
        if let Err(e) = log4rs::init_file(logging_config, Default::default()) {
            println!(
                "ERROR: failed to configure logging using {} with {:?}. Continuing without logging.",
                logging_config, e
            );
        } else {
            logging_configured = true;
        }
    }

    if !logging_configured {
        // if there's no config, prepare one using stdout
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{m}{n}")))
            .build();
        match Config::builder()
            .appender(Appender::builder().build("stdout", Box::new(stdout)))
            .build(Root::builder().appender("stdout").build(LevelFilter::Info))
        {
            Ok(config) => {
                if let Err(e) = log4rs::init_config(config) {
                    println!(
                        "ERROR: failed to configure logging for stdout with {:?}. Continuing without logging.",
                        e
                    );
                }
            }
            Err(e) => {
                println!("ERROR: failed to prepare default logging configuration with {:?}. Continuing without logging", e);
            }
        }
    }
    debug!("statcheck start");
    options(&args);
    debug!("statcheck end");
}
