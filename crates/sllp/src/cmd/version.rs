use sllp_frame::Version;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("sllp {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: sllp");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol: {}", Version::CURRENT);
    println!(
        "build_target: {}",
        option_env!("SLLP_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("SLLP_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("unix_sockets: {}", cfg!(unix));

    Ok(SUCCESS)
}
