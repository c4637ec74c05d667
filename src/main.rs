fn main() {
    if let Err(err) = callcenter_analytics::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
