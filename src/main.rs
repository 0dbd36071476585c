fn main() {
    if let Err(err) = breakwatch_lib::run() {
        log::error!("breakwatch exited with error: {err:#}");
        std::process::exit(1);
    }
}
