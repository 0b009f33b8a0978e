use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("querylink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: querylink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("QUERYLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "default_backend: {}:{}",
        querylink_channel::DEFAULT_HOST,
        querylink_channel::DEFAULT_PORT
    );
    println!(
        "max_frame_len: {}",
        querylink_frame::DEFAULT_MAX_FRAME_LEN
    );

    Ok(SUCCESS)
}
