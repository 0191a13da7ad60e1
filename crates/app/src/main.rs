fn main() {
    if let Err(err) = terrain_nd::cli::dispatch() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}
