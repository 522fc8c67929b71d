fn main() {
    if let Err(e) = sonc_driver::main() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
