use std::io::{self, Write};

use clap::Parser;
use log::info;

mod builtin;
mod error;
mod forth;
mod lexer;
mod stack;

use forth::Forth;

#[derive(Parser, Debug)]
#[command(name = "toyforth")]
/// Small interactive Forth interpreter.
///
/// Type words at the prompt; a line containing only `q`, the word `bye`
/// or end of input leaves the interpreter.
struct CliArgs {
    /// Maximum nesting of word calls and loop bodies before a line is aborted.
    #[arg(long, default_value_t = forth::DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Prompt printed before each line.
    #[arg(long, default_value = "> ")]
    prompt: String,
    /// Do not print the banner.
    #[arg(long, short)]
    quiet: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = CliArgs::parse();
    info!("starting with {:?}", args);

    let mut forth = Forth::new().with_max_depth(args.max_depth);

    if !args.quiet {
        println!("toyforth REPL. Type 'q' to exit.");
    }

    loop {
        let mut input = String::new();

        print!("{}", args.prompt);
        if let Err(msg) = io::stdout().flush() {
            log::error!("cannot flush stdout: {}", msg);
            break;
        }

        match io::stdin().read_line(&mut input) {
            Ok(count) if count == 0 => {
                break;
            }
            Ok(_) if input.trim() == "q" => {
                break;
            }
            Ok(_) => match forth.eval(&input) {
                Ok(None) => {
                    break;
                }
                Ok(Some(())) => {
                    println!(" ok");
                }
                Err(msg) if msg.is_runtime_fault() => {
                    println!("Error: {}", msg);
                }
                Err(msg) => {
                    println!("{} ?", msg);
                }
            },
            Err(msg) => {
                println!("Error: {}", msg);
                break;
            }
        }
    }
}
