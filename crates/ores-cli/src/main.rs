mod cli;
mod modes;

fn main() {
    if let Err(e) = cli::run() {
        // The page already printed its own error region.
        if e.downcast_ref::<cli::PageFailed>().is_some() {
            std::process::exit(1);
        }
        eprintln!("{e:#}"); // pretty anyhow chain
        std::process::exit(1);
    }
}
