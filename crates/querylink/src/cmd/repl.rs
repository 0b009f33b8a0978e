use querylink_channel::{ChannelConfig, QueryChannel};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::cmd::ReplArgs;
use crate::exit::{channel_error, io_error, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

const CANCEL_COMMAND: &str = ":cancel";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Blank,
    Cancel,
    Query(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let text = line.trim();
    if text.is_empty() {
        Input::Blank
    } else if text == CANCEL_COMMAND {
        Input::Cancel
    } else {
        Input::Query(text)
    }
}

pub async fn run(_args: ReplArgs, config: ChannelConfig, format: OutputFormat) -> CliResult<i32> {
    let channel =
        QueryChannel::tcp(config).map_err(|err| channel_error("channel setup failed", err))?;
    let mut events = channel.subscribe();
    channel.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.map_err(|err| io_error("failed reading stdin", err))? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Blank => {}
                    Input::Cancel => {
                        if let Some(generation) = channel.cancel() {
                            debug!(generation, "cancelled");
                        }
                    }
                    Input::Query(query) => {
                        if let Err(err) = channel.submit(query) {
                            warn!(error = %err, "query rejected");
                        }
                    }
                }
            }
            event = events.recv() => match event {
                Some(event) => print_event(&event, format),
                None => break,
            },
        }
    }

    channel.close();
    Ok(SUCCESS)
}
