use crate::cli::ChannelsArgs;
use crate::exit_codes;
use crate::output;
use acme_rs::channels::standard_channels;

pub fn execute(args: ChannelsArgs) -> i32 {
    let channels = standard_channels(&args.devices);

    if args.json {
        if let Err(e) = output::emit(&channels, false, None) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("ACME cape channels:\n");
        println!(
            "  {:<16} {:<10} {:<14} {:<28}",
            "Device", "Kind", "Column", "Label"
        );
        println!("  {}", "-".repeat(68));
        for c in &channels {
            println!(
                "  {:<16} {:<10} {:<14} {:<28}",
                c.device,
                c.kind.as_str(),
                c.column,
                c.label
            );
        }
        println!();
        println!("Filter with --kinds voltage power current time_ms");
    }

    exit_codes::SUCCESS
}
