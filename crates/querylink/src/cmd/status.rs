use std::time::Duration;

use querylink_channel::{ChannelConfig, QueryChannel};

use crate::cmd::{parse_duration, StatusArgs};
use crate::exit::{
    channel_error, CliError, CliResult, HEALTH_CHECK_FAILED, INTERNAL, SUCCESS, TIMEOUT,
};
use crate::output::{print_status, OutputFormat};

const PROBE_GRACE: Duration = Duration::from_secs(1);

pub async fn run(args: StatusArgs, config: ChannelConfig, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let addr = config.addr();
    let channel = QueryChannel::tcp(config.with_connect_timeout(timeout))
        .map_err(|err| channel_error("channel setup failed", err))?;
    let mut events = channel.subscribe();
    channel.connect();

    // The connector gives up at `timeout`; the grace period lets its failure
    // arrive as a status instead of a bare timeout.
    let status = tokio::time::timeout(timeout + PROBE_GRACE, events.recv_status())
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("no status from {addr} within {timeout:?}")))?
        .ok_or_else(|| CliError::new(INTERNAL, "event stream closed"))?;

    print_status(&status, format);
    channel.close();

    if status.connected {
        Ok(SUCCESS)
    } else {
        Ok(HEALTH_CHECK_FAILED)
    }
}
