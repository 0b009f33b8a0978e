use querylink_channel::{
    ChannelConfig, ConnectionState, Event, EventSubscriber, QueryChannel, ResultEvent,
};
use tracing::{debug, warn};

use crate::cmd::{parse_duration, SearchArgs};
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_results, OutputFormat};

pub async fn run(args: SearchArgs, config: ChannelConfig, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let channel =
        QueryChannel::tcp(config).map_err(|err| channel_error("channel setup failed", err))?;
    let mut events = channel.subscribe();

    // Submitting while disconnected emits an empty result set for the same
    // generation before the real one arrives.
    let held = channel.state() != ConnectionState::Connected;
    let generation = channel
        .submit(&args.query)
        .map_err(|err| channel_error("submit failed", err))?;

    let results =
        tokio::time::timeout(wait_timeout, wait_for_results(&mut events, generation, held))
            .await
            .map_err(|_| {
                let reason = channel
                    .supervisor()
                    .last_error()
                    .map(|err| format!(" (last error: {err})"))
                    .unwrap_or_default();
                CliError::new(
                    TIMEOUT,
                    format!("no results within {wait_timeout:?}{reason}"),
                )
            })?
            .ok_or_else(|| CliError::new(INTERNAL, "event stream closed"))?;

    print_results(&results, format);
    channel.close();
    Ok(SUCCESS)
}

async fn wait_for_results(
    events: &mut EventSubscriber,
    generation: u64,
    mut skip_placeholder: bool,
) -> Option<ResultEvent> {
    loop {
        match events.recv().await? {
            Event::Results(results) if results.generation == generation => {
                if skip_placeholder {
                    skip_placeholder = false;
                    continue;
                }
                return Some(results);
            }
            Event::Results(_) => {}
            Event::Status(status) => match (status.connected, status.message.as_deref()) {
                (false, Some(message)) => {
                    warn!(error = %message, "backend unavailable; waiting for reconnect");
                }
                _ => debug!(?status, "status changed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use querylink_channel::{EventBus, StatusEvent};
    use querylink_results::ResultSet;

    use super::*;

    fn results(generation: u64, paths: &[&str]) -> ResultEvent {
        ResultEvent {
            generation,
            query: "report".into(),
            results: paths.iter().map(|p| p.to_string()).collect::<ResultSet>(),
        }
    }

    #[tokio::test]
    async fn skips_placeholder_and_other_generations() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        bus.status(StatusEvent::connecting());
        bus.results(results(2, &[]));
        bus.status(StatusEvent::disconnected("connection refused"));
        bus.results(results(1, &["/stale"]));
        bus.status(StatusEvent::connected());
        bus.results(results(2, &["/docs/report.pdf"]));

        let found = wait_for_results(&mut events, 2, true).await.unwrap();
        assert_eq!(found.results.into_paths(), vec!["/docs/report.pdf"]);
    }

    #[tokio::test]
    async fn takes_first_match_when_sent_directly() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        bus.results(results(4, &[]));

        let found = wait_for_results(&mut events, 4, false).await.unwrap();
        assert!(found.results.is_empty());
    }

    #[tokio::test]
    async fn closed_stream_ends_wait() {
        let bus = EventBus::new(4);
        let mut events = bus.subscribe();
        drop(bus);
        assert!(wait_for_results(&mut events, 1, false).await.is_none());
    }
}
