//! intcode: run Intcode programs from the command line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use intcode_vm::ascii;
use intcode_vm::compose::{best_signal, FeedbackLoop, Pipeline, Session, Turn};
use intcode_vm::config::Config;
use intcode_vm::interpreter::{Engine, EngineOptions, Fault};
use intcode_vm::program::Program;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program over a fixed input sequence and print its output
    Run {
        /// Program file (comma-separated integers)
        file: PathBuf,
        /// Input values, comma-separated
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        input: Vec<i64>,
        /// Patch memory before running
        #[arg(long, value_name = "ADDR=VALUE", value_parser = parse_patch)]
        patch: Vec<(i64, i64)>,
        /// Zero cells appended after the image
        #[arg(long)]
        extra_cells: Option<usize>,
        /// Print memory cell 0 after the run
        #[arg(long)]
        show_first_cell: bool,
    },
    /// Chain one engine per phase setting and print the final signal
    Amplify {
        /// Program file (comma-separated integers)
        file: PathBuf,
        /// Phase settings, comma-separated
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        phases: Vec<i64>,
        /// Feed the last stage's output back into the first
        #[arg(long)]
        feedback: bool,
        /// Driving value for the first stage
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        signal: i64,
        /// Try every ordering of the phases and report the best
        #[arg(long)]
        search: bool,
    },
    /// Drive an ASCII program line by line
    Ascii {
        /// Program file (comma-separated integers)
        file: PathBuf,
        /// Command script; read stdin when absent
        #[arg(long)]
        script: Option<PathBuf>,
        /// Send the whole script as one turn instead of line by line
        #[arg(long, requires = "script")]
        batch: bool,
        /// Patch memory before running
        #[arg(long, value_name = "ADDR=VALUE", value_parser = parse_patch)]
        patch: Vec<(i64, i64)>,
    },
    /// Print a sample configuration file
    Config {
        /// Print where the user configuration file lives instead
        #[arg(long)]
        path: bool,
    },
}

fn parse_patch(s: &str) -> Result<(i64, i64), String> {
    let (addr, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got {:?}", s))?;
    let addr = addr.trim().parse().map_err(|e| format!("bad address {:?}: {}", addr, e))?;
    let value = value.trim().parse().map_err(|e| format!("bad value {:?}: {}", value, e))?;
    Ok((addr, value))
}

fn load(file: &Path) -> Result<Program> {
    Program::load(file).with_context(|| format!("loading {}", file.display()))
}

fn build_engine(
    program: &Program,
    options: &EngineOptions,
    patches: &[(i64, i64)],
) -> Result<Engine> {
    let mut engine = Engine::with_options(program, options);
    for &(addr, value) in patches {
        engine
            .poke(addr, value)
            .with_context(|| format!("patching address {}", addr))?;
    }
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::get();

    match cli.command {
        Command::Run {
            file,
            input,
            patch,
            extra_cells,
            show_first_cell,
        } => {
            let program = load(&file)?;
            let mut options = EngineOptions::from_config(config);
            if let Some(extra) = extra_cells {
                options.extra_cells = extra;
            }
            let mut engine = build_engine(&program, &options, &patch)?;
            let outputs = engine.run_with_inputs(&input).context("program faulted")?;

            let text: Vec<String> = outputs.iter().map(i64::to_string).collect();
            println!("{}", text.join(","));
            if show_first_cell {
                println!("memory[0] = {}", engine.peek(0)?);
            }
            log::info!("{} instructions", engine.context().instructions);
        }

        Command::Amplify {
            file,
            phases,
            feedback,
            signal,
            search,
        } => {
            let program = load(&file)?;
            let pipeline = Pipeline::from_config(program.clone(), config);
            let looped = FeedbackLoop::from_config(program, config);
            let (pipeline, looped) = (&pipeline, &looped);

            let run = move |order: Vec<i64>| async move {
                if feedback {
                    looped.run(&order, signal).await
                } else {
                    pipeline.run_signal(&order, signal).await
                }
            };

            if search {
                match best_signal(&phases, run).await? {
                    Some((best, order)) => {
                        println!("{}", best);
                        log::info!("best phases: {:?}", order);
                    }
                    None => bail!("no phases given"),
                }
            } else {
                println!("{}", run(phases).await?);
            }
        }

        Command::Ascii {
            file,
            script,
            batch,
            patch,
        } => {
            let program = load(&file)?;
            let engine = build_engine(&program, &EngineOptions::from_config(config), &patch)?;
            let mut session = Session::from_config(engine, config);
            match script {
                Some(path) if batch => run_ascii_batch(&mut session, &path).await?,
                Some(path) => {
                    let file = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("reading script {}", path.display()))?;
                    run_ascii(&mut session, BufReader::new(file)).await?;
                }
                None => run_ascii(&mut session, BufReader::new(tokio::io::stdin())).await?,
            }
            stop(session).await?;
        }

        Command::Config { path } => {
            if path {
                match Config::user_config_path() {
                    Some(path) => println!("{}", path.display()),
                    None => bail!("no configuration directory on this platform"),
                }
            } else {
                print!("{}", Config::sample_config());
            }
        }
    }

    Ok(())
}

/// Print one turn's output as text, with out-of-range values on their own lines.
fn show(outputs: &[i64]) {
    let decoded = ascii::decode(outputs);
    print!("{}", decoded.text);
    for value in &decoded.values {
        println!("{}", value);
    }
}

async fn exchange(session: &mut Session, batch: &[i64]) -> Result<Turn> {
    match session.exchange(batch).await {
        Ok(turn) => {
            show(&turn.outputs);
            Ok(turn)
        }
        Err(err) => {
            show(session.partial_outputs());
            Err(err).context("program faulted")
        }
    }
}

/// Feed `reader` to the program one line per turn.
async fn run_ascii<R: AsyncBufRead + Unpin>(session: &mut Session, reader: R) -> Result<()> {
    let mut lines = reader.lines();

    let mut turn = exchange(session, &[]).await?;
    while !turn.halted {
        match lines.next_line().await.context("reading command")? {
            Some(line) => {
                turn = exchange(session, &ascii::encode_line(line.trim_end())).await?;
            }
            None => {
                log::warn!("input exhausted while the program still wants more");
                break;
            }
        }
    }
    Ok(())
}

async fn run_ascii_batch(session: &mut Session, path: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading script {}", path.display()))?;
    if !exchange(session, &[]).await?.halted {
        exchange(session, &ascii::encode_script(&text)).await?;
    }
    Ok(())
}

/// Close the session. A program left waiting for input is not an error.
async fn stop(session: Session) -> Result<()> {
    match session.shutdown().await {
        Ok(_) => Ok(()),
        Err(err) if matches!(err.fault(), Some(Fault::InputClosedUnexpectedly { .. })) => {
            log::debug!("program still waiting for input: {}", err);
            Ok(())
        }
        Err(err) => Err(err).context("program faulted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intcode_vm::compose::CompositionError;

    #[test]
    fn test_parse_patch() {
        assert_eq!(parse_patch("1=12"), Ok((1, 12)));
        assert_eq!(parse_patch(" 2 = -3 "), Ok((2, -3)));
        assert!(parse_patch("12").is_err());
        assert!(parse_patch("x=1").is_err());
    }

    #[tokio::test]
    async fn test_run_ascii_reads_lines_until_exhausted() {
        // echoes every input value
        let mut session = Session::start(Engine::new([3, 0, 4, 0, 1105, 1, 0], 0));
        run_ascii(&mut session, &b"hi\nyo\n"[..]).await.unwrap();
        assert!(!session.is_finished());
        assert_eq!(session.status().inputs_consumed, 6);
        stop(session).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_ascii_stops_at_halt() {
        let mut session = Session::start(Engine::new([104, 72, 104, 10, 99], 0));
        run_ascii(&mut session, &b"ignored\n"[..]).await.unwrap();
        assert!(session.is_finished());
    }

    #[tokio::test]
    async fn test_stop_tolerates_waiting_program() {
        // reads into cell 0 forever
        let mut session = Session::start(Engine::new([3, 0, 1105, 1, 0], 0));
        assert!(!session.exchange(&[]).await.unwrap().halted);
        stop(session).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_after_halt() {
        let mut session = Session::start(Engine::new([104, 1, 99], 0));
        assert!(session.exchange(&[]).await.unwrap().halted);
        stop(session).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_reports_other_faults() {
        let session = Session::start(Engine::new([1105, 1, 50], 0));
        let err = stop(session).await.unwrap_err();
        let fault = err.downcast_ref::<CompositionError>().and_then(|e| e.fault());
        assert_eq!(fault, Some(&Fault::IllegalOpcode { code: 0, pc: 50 }));
    }
}
