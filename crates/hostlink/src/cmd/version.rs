use hostlink::channel::{CALLBACK_DELIVERY_MIN_VERSION, DEFAULT_HOST_VERSION};
use hostlink::transport::Topology;
use hostlink::wire::DEFAULT_MAX_MESSAGE_SIZE;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("hostlink {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "build: {} ({})",
        option_env!("HOSTLINK_BUILD_TARGET").unwrap_or("unknown"),
        option_env!("HOSTLINK_BUILD_PROFILE").unwrap_or("unknown"),
    );
    println!("topologies: {}, {}", Topology::Framed, Topology::Frameless);
    println!("default_host_version: {DEFAULT_HOST_VERSION}");
    println!("callback_delivery_min_host_version: {CALLBACK_DELIVERY_MIN_VERSION}");
    println!("max_message_size: {DEFAULT_MAX_MESSAGE_SIZE}");

    Ok(SUCCESS)
}
