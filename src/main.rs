fn main() {
    if let Err(err) = tabplot::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
